//! Turn dispatcher
//!
//! A `Session` owns the memory profile and the conversation history and drives one
//! user turn at a time:
//!
//! `Idle -> AwaitingUserInput -> MemoryUpdated -> Sending -> Success | Failure -> Idle`
//!
//! The synchronous half (`begin_turn`) updates memory and history and builds the
//! payload. The network call happens on the returned `PendingTurn`, which borrows
//! nothing from the session. `finish_turn` applies the outcome. Sending stays
//! disabled from `begin_turn` until `finish_turn`; that is the only concurrency guard.

use crate::endpoint::ModelEndpoint;
use crate::error::{SubmitRejection, TurnError};
use crate::history::{ConversationTurn, HistoryManager};
use crate::language::{self, Language};
use crate::logging;
use crate::memory::{MemoryManager, MemoryProfile, ResponseStyle, Theme};
use crate::prompt;
use crate::render::{RenderEvent, RenderSink};
use crate::reveal::{schedule_reveal, RevealHandle, RevealTiming};
use crate::store::Store;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingUserInput,
    MemoryUpdated,
    Sending,
    Success,
    Failure,
}

/// A turn whose request is ready to go out
#[derive(Debug)]
pub struct PendingTurn {
    id: Uuid,
    language: Language,
    payload: Vec<ConversationTurn>,
}

impl PendingTurn {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Fresh persona prompt, language directive, then the whole in-memory history
    pub fn payload(&self) -> &[ConversationTurn] {
        &self.payload
    }

    /// Issue the single request for this turn
    pub async fn send(&self, endpoint: &dyn ModelEndpoint) -> Result<String, TurnError> {
        endpoint.complete(&self.payload).await
    }
}

pub enum TurnOutcome {
    Replied {
        turn_id: Uuid,
        reply: String,
        reveal: RevealHandle,
    },
    Failed {
        turn_id: Uuid,
        error: TurnError,
    },
    /// Not the turn in flight; nothing was applied
    Stale {
        turn_id: Uuid,
    },
}

pub struct Session {
    id: String,
    memory: MemoryManager,
    history: HistoryManager,
    state: TurnState,
    in_flight: Option<Uuid>,
    render: Arc<dyn RenderSink>,
    reveal_timing: RevealTiming,
}

impl Session {
    /// Load profile and history from the store and announce them to the render layer
    pub fn start(store: Arc<dyn Store>, render: Arc<dyn RenderSink>) -> Self {
        let id = Uuid::new_v4().to_string();
        let memory = MemoryManager::load(store.clone(), render.clone(), &id);
        let history = HistoryManager::initialize(store, memory.profile(), &id);

        render.emit(RenderEvent::ProfileChanged {
            style_label: memory.profile().response_style.label().to_string(),
            theme: memory.profile().theme,
        });
        render.emit(RenderEvent::Restored(history.persisted_form()));

        logging::log_session(
            Some(&id),
            &format!("Session started with {} turns", history.turns().len()),
        );

        Self {
            id,
            memory,
            history,
            state: TurnState::Idle,
            in_flight: None,
            render,
            reveal_timing: RevealTiming::default(),
        }
    }

    pub fn with_reveal_timing(mut self, timing: RevealTiming) -> Self {
        self.reveal_timing = timing;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn profile(&self) -> &MemoryProfile {
        self.memory.profile()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        self.history.turns()
    }

    pub fn is_send_enabled(&self) -> bool {
        matches!(self.state, TurnState::Idle | TurnState::AwaitingUserInput)
    }

    /// The input surface is ready for the next message
    pub fn await_input(&mut self) {
        if self.state == TurnState::Idle {
            self.transition(TurnState::AwaitingUserInput);
        }
    }

    /// Synchronous half of a turn: memory, history, payload
    pub fn begin_turn(&mut self, raw: &str) -> Result<PendingTurn, SubmitRejection> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(SubmitRejection::Empty);
        }
        if !self.is_send_enabled() {
            logging::log_dispatch(Some(&self.id), "Submission rejected, turn in flight");
            return Err(SubmitRejection::Busy);
        }

        self.memory.observe(text);
        self.history.append_user(text);
        self.render.emit(RenderEvent::UserTurn(text.to_string()));
        self.transition(TurnState::MemoryUpdated);
        self.render.emit(RenderEvent::Typing(true));

        let language = language::detect(text);
        let turns = self.history.turns();
        let mut payload = Vec::with_capacity(turns.len() + 2);
        payload.push(prompt::build_system_message(self.memory.profile()));
        payload.push(prompt::build_language_directive(language));
        payload.extend(turns.iter().cloned());

        let id = Uuid::new_v4();
        self.in_flight = Some(id);
        self.transition(TurnState::Sending);

        logging::log_dispatch(
            Some(&self.id),
            &format!(
                "Sending turn {} ({} messages, language={})",
                id,
                payload.len(),
                language.as_str()
            ),
        );

        Ok(PendingTurn {
            id,
            language,
            payload,
        })
    }

    /// Apply the network outcome. Must run inside a tokio runtime: a reply schedules its reveal.
    pub fn finish_turn(
        &mut self,
        turn: PendingTurn,
        outcome: Result<String, TurnError>,
    ) -> TurnOutcome {
        if self.in_flight != Some(turn.id) {
            logging::log_dispatch(
                Some(&self.id),
                &format!("Ignoring outcome of turn {}, not the one in flight", turn.id),
            );
            return TurnOutcome::Stale { turn_id: turn.id };
        }
        self.in_flight = None;

        match outcome {
            Ok(reply) => {
                self.history.append_assistant(&reply);
                self.transition(TurnState::Success);
                logging::log_dispatch(
                    Some(&self.id),
                    &format!("Turn {} replied ({} chars)", turn.id, reply.chars().count()),
                );

                let reveal = schedule_reveal(
                    turn.id,
                    reply.clone(),
                    self.render.clone(),
                    self.reveal_timing,
                );
                self.transition(TurnState::Idle);

                TurnOutcome::Replied {
                    turn_id: turn.id,
                    reply,
                    reveal,
                }
            }
            Err(error) => {
                self.render.emit(RenderEvent::Typing(false));
                self.render.emit(RenderEvent::Error(error.clone()));
                self.transition(TurnState::Failure);
                logging::log_error(
                    Some(&self.id),
                    &format!("Turn {} failed: {}", turn.id, error.user_message()),
                );
                self.transition(TurnState::Idle);

                TurnOutcome::Failed {
                    turn_id: turn.id,
                    error,
                }
            }
        }
    }

    /// Whole turn in one call
    pub async fn submit(
        &mut self,
        raw: &str,
        endpoint: &dyn ModelEndpoint,
    ) -> Result<TurnOutcome, SubmitRejection> {
        let turn = self.begin_turn(raw)?;
        let outcome = turn.send(endpoint).await;
        Ok(self.finish_turn(turn, outcome))
    }

    pub fn set_response_style(&mut self, style: ResponseStyle) {
        self.memory.set_response_style(style);
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.memory.set_theme(theme);
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.memory.toggle_theme()
    }

    /// Clear both saved records and start over with defaults
    pub fn reset(&mut self) {
        self.memory.reset();
        self.history.reset(self.memory.profile());
        self.render.emit(RenderEvent::Cleared);
        self.render.emit(RenderEvent::Typing(false));
        logging::log_session(Some(&self.id), "Session reset");
    }

    fn transition(&mut self, next: TurnState) {
        logging::log_dispatch(
            Some(&self.id),
            &format!("state {:?} -> {:?}", self.state, next),
        );
        self.state = next;
    }
}
