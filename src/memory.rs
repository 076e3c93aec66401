//! Memory profile module
//!
//! This module handles:
//! - The persisted user profile (name, response style, projects, theme)
//! - Deterministic extraction rules applied to every user message
//! - Explicit style/theme selections coming from the UI

use crate::error::StoreError;
use crate::logging;
use crate::render::{RenderEvent, RenderSink};
use crate::store::{Store, MEMORY_KEY};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============ Profile Types ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    #[serde(alias = "court")]
    Terse,
    #[default]
    Normal,
    #[serde(alias = "long")]
    Verbose,
}

impl ResponseStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStyle::Terse => "terse",
            ResponseStyle::Normal => "normal",
            ResponseStyle::Verbose => "verbose",
        }
    }

    /// Label shown by the mode selector
    pub fn label(&self) -> &'static str {
        match self {
            ResponseStyle::Terse => "Terse",
            ResponseStyle::Normal => "Normal",
            ResponseStyle::Verbose => "Verbose",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "terse" | "court" => Some(Self::Terse),
            "normal" => Some(Self::Normal),
            "verbose" | "long" => Some(Self::Verbose),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryProfile {
    pub name: Option<String>,
    pub response_style: ResponseStyle,
    pub projects: Vec<String>,
    pub theme: Theme,
}

// ============ Extraction Rules ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEffect {
    /// First capture group becomes the user's name
    SetName,
    SetStyle(ResponseStyle),
    /// The whole raw message is appended to the project log
    LogProject,
}

#[derive(Debug)]
pub struct ExtractionRule {
    pub label: &'static str,
    pub pattern: Regex,
    pub effect: RuleEffect,
}

impl ExtractionRule {
    fn new(label: &'static str, pattern: &str, effect: RuleEffect) -> Self {
        Self {
            label,
            pattern: Regex::new(pattern).expect("extraction rule pattern must compile"),
            effect,
        }
    }

    /// Apply this rule to `profile`. Returns whether it fired.
    pub fn apply(&self, profile: &mut MemoryProfile, text: &str) -> bool {
        match self.effect {
            RuleEffect::SetName => match self.pattern.captures(text).and_then(|c| c.get(1)) {
                Some(name) => {
                    profile.name = Some(name.as_str().to_string());
                    true
                }
                None => false,
            },
            RuleEffect::SetStyle(style) => {
                if self.pattern.is_match(text) {
                    profile.response_style = style;
                    true
                } else {
                    false
                }
            }
            RuleEffect::LogProject => {
                if self.pattern.is_match(text) {
                    profile.projects.push(text.to_string());
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Ordered rule table. Verbose is evaluated after terse, so it wins when both match.
pub static EXTRACTION_RULES: Lazy<Vec<ExtractionRule>> = Lazy::new(|| {
    vec![
        ExtractionRule::new(
            "self_introduction",
            r"(?i)(?:my name is|je m['’]appelle) ([A-Za-z]+)",
            RuleEffect::SetName,
        ),
        ExtractionRule::new(
            "terse_style",
            r"(?i)réponds court|mode court|bref|be brief|short answers|terse mode",
            RuleEffect::SetStyle(ResponseStyle::Terse),
        ),
        ExtractionRule::new(
            "verbose_style",
            r"(?i)réponds long|mode long|détaille|be detailed|long answers|verbose mode",
            RuleEffect::SetStyle(ResponseStyle::Verbose),
        ),
        ExtractionRule::new(
            "project_mention",
            r"(?i)projec?t",
            RuleEffect::LogProject,
        ),
    ]
});

/// Run every rule once against `text`, mutating `profile`. Returns the labels of rules that fired.
pub fn apply_extraction_rules(profile: &mut MemoryProfile, text: &str) -> Vec<&'static str> {
    EXTRACTION_RULES
        .iter()
        .filter_map(|rule| rule.apply(profile, text).then_some(rule.label))
        .collect()
}

// ============ Memory Manager ============

/// Sole owner of the memory profile. Every mutation is persisted and announced.
pub struct MemoryManager {
    profile: MemoryProfile,
    store: Arc<dyn Store>,
    render: Arc<dyn RenderSink>,
    session_id: String,
}

impl MemoryManager {
    /// Load the saved profile, or the default one when absent or unreadable
    pub fn load(store: Arc<dyn Store>, render: Arc<dyn RenderSink>, session_id: &str) -> Self {
        let profile = match store.get(MEMORY_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<MemoryProfile>(&raw) {
                Ok(profile) => profile,
                Err(e) => {
                    logging::log_error(
                        Some(session_id),
                        &format!("Saved profile unreadable, using defaults: {}", e),
                    );
                    MemoryProfile::default()
                }
            },
            Ok(None) => MemoryProfile::default(),
            Err(e) => {
                logging::log_error(Some(session_id), &format!("Failed to load profile: {}", e));
                MemoryProfile::default()
            }
        };

        logging::log_memory(
            Some(session_id),
            &format!(
                "Profile loaded: name={}, style={}, projects={}, theme={}",
                profile.name.as_deref().unwrap_or("-"),
                profile.response_style.as_str(),
                profile.projects.len(),
                profile.theme.as_str()
            ),
        );

        Self {
            profile,
            store,
            render,
            session_id: session_id.to_string(),
        }
    }

    pub fn profile(&self) -> &MemoryProfile {
        &self.profile
    }

    /// Apply the extraction rules to a user message
    pub fn observe(&mut self, user_text: &str) -> Vec<&'static str> {
        let fired = apply_extraction_rules(&mut self.profile, user_text);
        if !fired.is_empty() {
            logging::log_memory(
                Some(&self.session_id),
                &format!("Rules fired: {}", fired.join(", ")),
            );
        }
        self.commit();
        fired
    }

    pub fn set_response_style(&mut self, style: ResponseStyle) {
        self.profile.response_style = style;
        logging::log_memory(
            Some(&self.session_id),
            &format!("Style selected: {}", style.as_str()),
        );
        self.commit();
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.profile.theme = theme;
        logging::log_memory(
            Some(&self.session_id),
            &format!("Theme selected: {}", theme.as_str()),
        );
        self.commit();
    }

    pub fn toggle_theme(&mut self) -> Theme {
        let theme = self.profile.theme.toggled();
        self.set_theme(theme);
        theme
    }

    /// Drop the saved record and go back to the default profile
    pub fn reset(&mut self) {
        if let Err(e) = self.store.remove(MEMORY_KEY) {
            logging::log_error(
                Some(&self.session_id),
                &format!("Failed to clear saved profile: {}", e),
            );
        }
        self.profile = MemoryProfile::default();
        logging::log_memory(Some(&self.session_id), "Profile reset to defaults");
        self.notify();
    }

    fn commit(&mut self) {
        self.persist();
        self.notify();
    }

    /// Best effort: the in-memory profile stays authoritative if the write fails
    fn persist(&self) {
        let result = serde_json::to_string(&self.profile)
            .map_err(StoreError::from)
            .and_then(|raw| self.store.set(MEMORY_KEY, &raw));

        if let Err(e) = result {
            logging::log_error(
                Some(&self.session_id),
                &format!("Failed to persist profile: {}", e),
            );
        }
    }

    fn notify(&self) {
        self.render.emit(RenderEvent::ProfileChanged {
            style_label: self.profile.response_style.label().to_string(),
            theme: self.profile.theme,
        });
    }
}
