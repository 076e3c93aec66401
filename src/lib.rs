pub mod config;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod history;
pub mod language;
pub mod logging;
pub mod memory;
pub mod prompt;
pub mod render;
pub mod reveal;
pub mod store;
pub mod terminal;

use clap::Parser;
use config::{Cli, Config};
use dispatcher::Session;
use endpoint::{ModelEndpoint, WorkerClient};
use std::sync::Arc;
use store::{MemoryStore, SqliteStore, Store};
use terminal::TerminalSink;
use tokio::io::BufReader;

// ============ Run ============

/// Parse arguments, open the store, restore the session and chat until stdin closes
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from(Cli::parse());

    if let Err(e) = logging::init_logging(&config.data_dir, config.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    // Clean up old log files (keep last 7 days)
    let _ = logging::cleanup_old_logs(&config.data_dir);

    let store: Arc<dyn Store> = if config.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::open(&store::db_path(&config.data_dir))?)
    };

    let endpoint: Arc<dyn ModelEndpoint> =
        Arc::new(WorkerClient::new(&config.endpoint, config.request_timeout)?);

    logging::log_session(
        None,
        &format!(
            "Starting (endpoint={}, data_dir={}, ephemeral={})",
            config.endpoint,
            config.data_dir.display(),
            config.ephemeral
        ),
    );

    let sink = Arc::new(TerminalSink::new());
    let mut session = Session::start(store, sink.clone());
    let input = BufReader::new(tokio::io::stdin());

    terminal::run_loop(&mut session, endpoint, sink, input).await?;

    Ok(())
}
