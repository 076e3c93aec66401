//! Terminal render layer and input loop.

use crate::dispatcher::{PendingTurn, Session, TurnOutcome};
use crate::endpoint::ModelEndpoint;
use crate::error::{SubmitRejection, TurnError};
use crate::history::{ConversationTurn, Role};
use crate::logging;
use crate::memory::{ResponseStyle, Theme};
use crate::prompt::PERSONA_NAME;
use crate::render::{RenderEvent, RenderSink};
use crate::reveal::RevealHandle;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

const CLEAR_LINE: &str = "\r\x1b[2K";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

const HELP: &str = r#"Commands:
  /style terse|normal|verbose   choose the answer length
  /theme [dark|light]           set or toggle the theme
  /reset                        forget the conversation and the profile
  /help                         show this help
  /quit                         leave"#;

// ============ Commands ============

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Message(String),
    Style(ResponseStyle),
    Theme(Option<Theme>),
    Reset,
    Help,
    Quit,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Command::Message(line.to_string());
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();

        match (name, arg) {
            ("style" | "mode", Some(value)) => ResponseStyle::from_str(value)
                .map(Command::Style)
                .unwrap_or_else(|| Command::Invalid(format!("Unknown style: {}", value))),
            ("theme", None) => Command::Theme(None),
            ("theme", Some(value)) => Theme::from_str(value)
                .map(|theme| Command::Theme(Some(theme)))
                .unwrap_or_else(|| Command::Invalid(format!("Unknown theme: {}", value))),
            ("reset", _) => Command::Reset,
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            _ => Command::Invalid(format!("Unknown command: /{}", rest)),
        }
    }
}

// ============ Terminal Sink ============

/// Draws render events on stdout
#[derive(Default)]
pub struct TerminalSink {
    mode: Mutex<Option<(String, Theme)>>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notice(&self, message: &str) {
        self.write(&format!("{}* {}\n", CLEAR_LINE, message));
    }

    fn write(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn format_turn(turn: &ConversationTurn) -> Option<String> {
        match turn.role {
            Role::User => Some(format!("you> {}\n", turn.content)),
            Role::Assistant => Some(format!("{}> {}\n", PERSONA_NAME, turn.content)),
            Role::System => None,
        }
    }
}

impl RenderSink for TerminalSink {
    fn emit(&self, event: RenderEvent) {
        match event {
            RenderEvent::Restored(turns) => {
                let text: String = turns.iter().filter_map(Self::format_turn).collect();
                self.write(&text);
            }
            // already on screen as typed
            RenderEvent::UserTurn(_) => {}
            RenderEvent::Typing(true) => {
                self.write(&format!("{}{} is typing...", CLEAR_LINE, PERSONA_NAME));
            }
            RenderEvent::Typing(false) => self.write(CLEAR_LINE),
            RenderEvent::RevealStarted(_) => self.write(&format!("{}> ", PERSONA_NAME)),
            RenderEvent::RevealChar(_, ch) => self.write(ch.encode_utf8(&mut [0; 4])),
            RenderEvent::RevealFinished(_, _) => self.write("\n"),
            RenderEvent::Error(error) => self.notice(&error.user_message()),
            RenderEvent::ProfileChanged { style_label, theme } => {
                let Ok(mut mode) = self.mode.lock() else {
                    return;
                };
                let next = (style_label, theme);
                if mode.as_ref() != Some(&next) {
                    self.notice(&format!("Mode: {} | theme: {}", next.0, next.1.as_str()));
                    *mode = Some(next);
                }
            }
            RenderEvent::Cleared => self.write(CLEAR_SCREEN),
        }
    }
}

// ============ Input Loop ============

/// Read lines until EOF or /quit. Input stays live while a request is out,
/// so a second message is rejected rather than queued. On the way out the turn in
/// flight is still finished and every reveal is allowed to complete.
pub async fn run_loop<R>(
    session: &mut Session,
    endpoint: Arc<dyn ModelEndpoint>,
    sink: Arc<TerminalSink>,
    input: R,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(PendingTurn, Result<String, TurnError>)>();
    let mut in_flight = false;
    let mut reveals: Vec<RevealHandle> = Vec::new();

    sink.notice("Type a message, or /help for commands.");
    session.await_input();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };

                match Command::parse(&line) {
                    Command::Message(text) => match session.begin_turn(&text) {
                        Ok(turn) => {
                            in_flight = true;
                            let endpoint = endpoint.clone();
                            let done_tx = done_tx.clone();
                            tokio::spawn(async move {
                                let outcome = turn.send(endpoint.as_ref()).await;
                                let _ = done_tx.send((turn, outcome));
                            });
                        }
                        Err(SubmitRejection::Busy) => {
                            sink.notice("Still waiting for the previous reply.");
                        }
                        Err(SubmitRejection::Empty) => {}
                    },
                    Command::Style(style) => session.set_response_style(style),
                    Command::Theme(Some(theme)) => session.set_theme(theme),
                    Command::Theme(None) => {
                        session.toggle_theme();
                    }
                    Command::Reset => session.reset(),
                    Command::Help => sink.notice(HELP),
                    Command::Quit => break,
                    Command::Invalid(message) => sink.notice(&message),
                }
            }
            Some((turn, outcome)) = done_rx.recv() => {
                in_flight = false;
                finish(session, turn, outcome, &mut reveals);
            }
        }
        reveals.retain(|reveal| !reveal.is_finished());
    }

    // a send task that died drops its sender, so recv cannot hang once ours is gone
    drop(done_tx);
    if in_flight {
        logging::log_session(Some(session.id()), "Input closed, waiting for the turn in flight");
        if let Some((turn, outcome)) = done_rx.recv().await {
            finish(session, turn, outcome, &mut reveals);
        }
    }
    for reveal in reveals {
        reveal.join().await;
    }

    logging::log_session(Some(session.id()), "Input closed, leaving");
    Ok(())
}

fn finish(
    session: &mut Session,
    turn: PendingTurn,
    outcome: Result<String, TurnError>,
    reveals: &mut Vec<RevealHandle>,
) {
    if let TurnOutcome::Replied { reveal, .. } = session.finish_turn(turn, outcome) {
        reveals.push(reveal);
    }
    session.await_input();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reveal::RevealTiming;
    use crate::store::{MemoryStore, Store, CHAT_KEY};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Answers every request with the same text after a pause
    struct SlowEndpoint {
        reply: &'static str,
        pause: Duration,
    }

    #[async_trait]
    impl ModelEndpoint for SlowEndpoint {
        async fn complete(&self, _messages: &[ConversationTurn]) -> Result<String, TurnError> {
            tokio::time::sleep(self.pause).await;
            Ok(self.reply.to_string())
        }
    }

    async fn run_script(script: &'static [u8], reply: &'static str) -> (Session, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(TerminalSink::new());
        let mut session = Session::start(store.clone(), sink.clone())
            .with_reveal_timing(RevealTiming::instant());
        let endpoint: Arc<dyn ModelEndpoint> = Arc::new(SlowEndpoint {
            reply,
            pause: Duration::from_millis(200),
        });

        run_loop(&mut session, endpoint, sink, script).await.unwrap();
        (session, store)
    }

    #[tokio::test]
    async fn test_eof_waits_for_turn_in_flight() {
        let (session, store) = run_script(b"hi there\n", "hello back").await;

        assert!(session.is_send_enabled());
        assert_eq!(
            &session.turns()[1..],
            &[ConversationTurn::user("hi there"), ConversationTurn::assistant("hello back")]
        );
        assert_eq!(
            store.get(CHAT_KEY).unwrap().unwrap(),
            r#"[{"role":"user","content":"hi there"},{"role":"assistant","content":"hello back"}]"#
        );
    }

    #[tokio::test]
    async fn test_quit_waits_for_turn_in_flight() {
        let (session, _store) = run_script(b"first\nsecond\n/quit\nignored\n", "done").await;

        // "second" arrives while "first" is out and is rejected
        assert_eq!(
            &session.turns()[1..],
            &[ConversationTurn::user("first"), ConversationTurn::assistant("done")]
        );
    }

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(
            Command::parse("hello there"),
            Command::Message("hello there".to_string())
        );
    }

    #[test]
    fn test_style_commands() {
        assert_eq!(Command::parse("/style terse"), Command::Style(ResponseStyle::Terse));
        assert_eq!(Command::parse("/mode LONG"), Command::Style(ResponseStyle::Verbose));
        assert!(matches!(Command::parse("/style huge"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/style"), Command::Invalid(_)));
    }

    #[test]
    fn test_theme_commands() {
        assert_eq!(Command::parse("/theme"), Command::Theme(None));
        assert_eq!(Command::parse(" /theme light "), Command::Theme(Some(Theme::Light)));
    }

    #[test]
    fn test_other_commands() {
        assert_eq!(Command::parse("/reset"), Command::Reset);
        assert_eq!(Command::parse("/quit"), Command::Quit);
        assert_eq!(Command::parse("/help"), Command::Help);
        assert!(matches!(Command::parse("/dance"), Command::Invalid(_)));
    }
}
