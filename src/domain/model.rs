use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Whitespace-separated words; the history budget is counted in these.
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// One dispatcher turn. `audio_path` is only set for audio replies.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryReply {
    pub text: String,
    pub audio_path: Option<PathBuf>,
}

impl QueryReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio_path: None,
        }
    }

    pub fn has_audio(&self) -> bool {
        self.audio_path.is_some()
    }
}
