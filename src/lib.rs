pub mod config;
pub mod domain;
pub mod pubsub;
pub mod query_dispatch;
pub mod storage;
pub mod tts;
pub mod utils;

pub use utils::logger;

pub use config::GangliaConfig;
pub use domain::model::{ChatMessage, QueryReply, Role};
pub use pubsub::{Event, EventType, PubSub};
pub use query_dispatch::{ChatDispatcher, DispatcherOptions};
pub use storage::{LocalStorage, Storage};
pub use tts::{GoogleTts, OpenAiTts, TextToSpeech};
pub use utils::error::{GangliaError, Result};
