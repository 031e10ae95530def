//! Chat application module for the College Resource Chatbot.
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`store`]: conversation state, submission lifecycle and change events
//! - [`commands`]: slash command parsing
//!
//! Rendering lives in [`crate::render`] and is re-exported here.

mod commands;
mod config;
mod store;

pub use crate::render::{PlainTextRenderer, TranscriptRenderer, attach};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
pub use store::{
    ConversationState, ConversationStore, InFlight, SessionStats, StoreEvent, SubscriptionId,
};
