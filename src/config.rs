//! CLI parser and config loading.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "tytronis")]
#[command(about = "Chat with Tytronis from the terminal", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Chat endpoint URL (receives `{"messages": [...]}` as JSON)
    #[arg(long, env = "TYTRONIS_ENDPOINT")]
    pub endpoint: String,

    /// Directory holding the database and logs (default: ~/.tytronis)
    #[arg(long, env = "TYTRONIS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Give up on a request after this many seconds (default: wait forever)
    #[arg(long, env = "TYTRONIS_REQUEST_TIMEOUT")]
    pub request_timeout: Option<u64>,

    /// Keep everything in memory; nothing is saved between runs
    #[arg(long)]
    pub ephemeral: bool,

    /// Echo log lines to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub endpoint: String,
    pub data_dir: PathBuf,
    pub request_timeout: Option<Duration>,
    pub ephemeral: bool,
    pub verbose: bool,
}

/// ~/.tytronis, or /tmp/.tytronis when HOME is unset
pub fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tytronis")
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            endpoint: cli.endpoint,
            data_dir: cli.data_dir.unwrap_or_else(default_data_dir),
            request_timeout: cli.request_timeout.map(Duration::from_secs),
            ephemeral: cli.ephemeral,
            verbose: cli.verbose,
        }
    }
}
