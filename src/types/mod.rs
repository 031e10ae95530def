// Public modules
pub mod chat_request;
pub mod chat_response;
pub mod message;

// Re-exports
pub use chat_request::ChatRequest;
pub use chat_response::ChatResponse;
pub use message::{Message, MessageKind, Sender};
