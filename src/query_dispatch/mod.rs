//! Conversational client for OpenAI-compatible chat completion APIs.

mod dispatcher;
pub mod sse;
mod wire;

pub use dispatcher::{ChatDispatcher, DispatcherOptions};
pub use sse::{SentenceSplitter, SseDecoder, SseEvent};
