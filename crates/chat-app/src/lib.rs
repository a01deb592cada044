#![deny(unsafe_code)]

//! Conversational chat core.
//!
//! Holds the message/part model, the conversation store, the streaming status
//! machine, the response simulator and the submission controller that ties
//! them to a [`parley_llm::Transport`]. Rendering is expressed as
//! toolkit-independent presentation intents.

/// Chat domain: messages, status, rendering and the session controller.
pub mod chat;
pub mod clipboard;
/// Settings persistence.
pub mod settings;

pub use chat::{ChatSession, SessionCommand, SessionConfig};
pub use clipboard::{CopySink, MemoryClipboard, SinkError, SinkResult};
#[cfg(feature = "system-clipboard")]
pub use clipboard::SystemClipboard;
