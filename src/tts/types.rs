use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceEngine {
    Google,
    OpenAi,
}

impl fmt::Display for VoiceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceEngine::Google => f.write_str("google"),
            VoiceEngine::OpenAi => f.write_str("openai"),
        }
    }
}

/// A voice registered with one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    pub engine: VoiceEngine,
    pub name: String,
    /// Engine-specific id, e.g. `en-US-Neural2-F` or `nova`.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub ref_audio: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub sample_text: Option<String>,
}

impl Voice {
    pub fn new(engine: VoiceEngine, name: impl Into<String>) -> Self {
        Self {
            engine,
            name: name.into(),
            id: None,
            ref_audio: None,
            created_at: Utc::now(),
            duration_seconds: 0.0,
            sample_text: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}
