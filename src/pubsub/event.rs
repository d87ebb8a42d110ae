use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// More story details are needed from the user.
    StoryInfoNeeded,
    StoryInfoReceived,
    StoryConfigComplete,
    TtvConfigGenerated,
    TtvProcessStarted,
    TtvProcessProgress,
    TtvProcessCompleted,
    TtvProcessFailed,
    UserProfileUpdated,
    ConversationStarted,
    ConversationEnded,
    Custom,
}

impl EventType {
    pub const ALL: [EventType; 12] = [
        EventType::StoryInfoNeeded,
        EventType::StoryInfoReceived,
        EventType::StoryConfigComplete,
        EventType::TtvConfigGenerated,
        EventType::TtvProcessStarted,
        EventType::TtvProcessProgress,
        EventType::TtvProcessCompleted,
        EventType::TtvProcessFailed,
        EventType::UserProfileUpdated,
        EventType::ConversationStarted,
        EventType::ConversationEnded,
        EventType::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::StoryInfoNeeded => "STORY_INFO_NEEDED",
            EventType::StoryInfoReceived => "STORY_INFO_RECEIVED",
            EventType::StoryConfigComplete => "STORY_CONFIG_COMPLETE",
            EventType::TtvConfigGenerated => "TTV_CONFIG_GENERATED",
            EventType::TtvProcessStarted => "TTV_PROCESS_STARTED",
            EventType::TtvProcessProgress => "TTV_PROCESS_PROGRESS",
            EventType::TtvProcessCompleted => "TTV_PROCESS_COMPLETED",
            EventType::TtvProcessFailed => "TTV_PROCESS_FAILED",
            EventType::UserProfileUpdated => "USER_PROFILE_UPDATED",
            EventType::ConversationStarted => "CONVERSATION_STARTED",
            EventType::ConversationEnded => "CONVERSATION_ENDED",
            EventType::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message on the bus. `target = None` means broadcast; a target is
/// advisory and every subscriber of the type still receives the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub event_type: EventType,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: EventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            data: Map::new(),
            source: None,
            target: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn is_broadcast(&self) -> bool {
        self.target.is_none()
    }

    /// Whether `component` is addressed: broadcasts address everyone.
    pub fn is_for(&self, component: &str) -> bool {
        self.target.as_deref().map_or(true, |target| target == component)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event({}, source={}, target={})",
            self.event_type,
            self.source.as_deref().unwrap_or("None"),
            self.target.as_deref().unwrap_or("None")
        )
    }
}
