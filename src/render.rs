//! Render layer boundary. The session pushes events; the surface decides how to draw them.

use crate::error::TurnError;
use crate::history::ConversationTurn;
use crate::memory::Theme;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// Non-system turns restored from the store at session start
    Restored(Vec<ConversationTurn>),
    UserTurn(String),
    /// Typing indicator on/off
    Typing(bool),
    RevealStarted(Uuid),
    RevealChar(Uuid, char),
    /// Reveal done; carries the full reply for the copy affordance
    RevealFinished(Uuid, String),
    Error(TurnError),
    ProfileChanged { style_label: String, theme: Theme },
    /// Conversation surface wiped by a reset
    Cleared,
}

pub trait RenderSink: Send + Sync {
    fn emit(&self, event: RenderEvent);
}

/// Discards everything
pub struct NullSink;

impl RenderSink for NullSink {
    fn emit(&self, _event: RenderEvent) {}
}

/// Keeps every event in order. Handy for headless callers and tests.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RenderEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Text revealed so far for one turn
    pub fn revealed_text(&self, turn_id: Uuid) -> String {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                RenderEvent::RevealChar(id, ch) if id == turn_id => Some(ch),
                _ => None,
            })
            .collect()
    }
}

impl RenderSink for RecordingSink {
    fn emit(&self, event: RenderEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
