// Public modules
pub mod chat;
pub mod classify;
pub mod client;
pub mod error;
pub mod observability;
pub mod render;
pub mod types;

// Re-exports
pub use classify::{classify, classify_reply};
pub use client::{BASE_URL_ENV, ChatClient, ChatTransport, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use types::*;
