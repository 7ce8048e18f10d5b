use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    Human,
    Ai,
}

impl Speaker {
    /// Prefix used in memory buffers and transcripts.
    pub fn prefix(self) -> &'static str {
        match self {
            Speaker::Human => "Human",
            Speaker::Ai => "AI",
        }
    }
}

/// One message in the conversation. Position in the session is its timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn human(text: impl Into<String>) -> Self {
        Self { speaker: Speaker::Human, text: text.into() }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self { speaker: Speaker::Ai, text: text.into() }
    }
}

/// A transcript archived with the save action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub transcript: String,
    /// Human/AI pairs in the transcript
    #[serde(default)]
    pub exchanges: usize,
}

impl StoredSession {
    pub fn new(transcript: String, exchanges: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            saved_at: Utc::now(),
            transcript,
            exchanges,
        }
    }
}

/// Transient notices shown in the history pane; never part of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Info(text) | Notice::Error(text) => text,
        }
    }
}
