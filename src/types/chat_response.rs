use serde::{Deserialize, Serialize};

/// Body of a successful `POST /chat` reply.
///
/// Extra fields sent by the server are ignored; a missing `response` field
/// fails deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    /// The chatbot's reply text.
    pub response: String,
}
