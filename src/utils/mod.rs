pub mod console;
pub mod error;
pub mod files;
pub mod logger;
pub mod monitor;
pub mod profiler;
pub mod retry;
pub mod validation;

pub use files::{default_config_path, Workspace};
pub use profiler::{ConversationTimer, Profiler};
pub use retry::{retry_with_backoff, RetryPolicy};
