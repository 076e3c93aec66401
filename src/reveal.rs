//! Typewriter reveal of a received reply.
//!
//! Each reveal is its own task bound to the turn id. Nothing cancels a reveal by
//! default; a later turn may start revealing while an earlier one is still running.

use crate::render::{RenderEvent, RenderSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Pause between receiving a reply and starting its reveal
pub const PRESENTATION_DELAY: Duration = Duration::from_millis(1000);
/// Pause between two revealed characters
pub const CHAR_DELAY: Duration = Duration::from_millis(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTiming {
    pub delay: Duration,
    pub char_delay: Duration,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            delay: PRESENTATION_DELAY,
            char_delay: CHAR_DELAY,
        }
    }
}

impl RevealTiming {
    /// No pauses at all
    pub fn instant() -> Self {
        Self {
            delay: Duration::ZERO,
            char_delay: Duration::ZERO,
        }
    }
}

pub struct RevealHandle {
    turn_id: Uuid,
    task: JoinHandle<()>,
}

impl RevealHandle {
    pub fn turn_id(&self) -> Uuid {
        self.turn_id
    }

    /// Stop the reveal where it is. `RevealFinished` is not emitted afterwards.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the reveal. Returns false if it was cancelled.
    pub async fn join(self) -> bool {
        self.task.await.is_ok()
    }
}

/// Spawn the reveal on the current tokio runtime
pub fn schedule_reveal(
    turn_id: Uuid,
    text: String,
    render: Arc<dyn RenderSink>,
    timing: RevealTiming,
) -> RevealHandle {
    let task = tokio::spawn(async move {
        tokio::time::sleep(timing.delay).await;

        render.emit(RenderEvent::Typing(false));
        render.emit(RenderEvent::RevealStarted(turn_id));

        for ch in text.chars() {
            render.emit(RenderEvent::RevealChar(turn_id, ch));
            tokio::time::sleep(timing.char_delay).await;
        }

        render.emit(RenderEvent::RevealFinished(turn_id, text));
    });

    RevealHandle { turn_id, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingSink;

    #[test]
    fn test_default_timing() {
        let timing = RevealTiming::default();
        assert_eq!(timing.delay, Duration::from_secs(1));
        assert_eq!(timing.char_delay, Duration::from_millis(15));
    }

    #[tokio::test]
    async fn test_reveal_emits_every_char_then_finishes() {
        let sink = Arc::new(RecordingSink::new());
        let id = Uuid::new_v4();

        let handle = schedule_reveal(id, "héllo".to_string(), sink.clone(), RevealTiming::instant());
        assert_eq!(handle.turn_id(), id);
        assert!(handle.join().await);

        let events = sink.events();
        assert_eq!(events[0], RenderEvent::Typing(false));
        assert_eq!(events[1], RenderEvent::RevealStarted(id));
        assert_eq!(sink.revealed_text(id), "héllo");
        assert_eq!(
            events.last(),
            Some(&RenderEvent::RevealFinished(id, "héllo".to_string()))
        );
    }

    #[tokio::test]
    async fn test_cancelled_reveal_never_finishes() {
        let sink = Arc::new(RecordingSink::new());
        let id = Uuid::new_v4();
        let timing = RevealTiming {
            delay: Duration::from_secs(60),
            char_delay: Duration::ZERO,
        };

        let handle = schedule_reveal(id, "abc".to_string(), sink.clone(), timing);
        assert!(!handle.is_finished());
        handle.cancel();
        assert!(!handle.join().await);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_reveals_run_independently() {
        let sink = Arc::new(RecordingSink::new());
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let a = schedule_reveal(first, "one".to_string(), sink.clone(), RevealTiming::instant());
        let b = schedule_reveal(second, "two".to_string(), sink.clone(), RevealTiming::instant());
        assert!(a.join().await);
        assert!(b.join().await);

        assert_eq!(sink.revealed_text(first), "one");
        assert_eq!(sink.revealed_text(second), "two");
    }
}
