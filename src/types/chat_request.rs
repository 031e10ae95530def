use serde::{Deserialize, Serialize};

/// Body of a `POST /chat` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// The user's input exactly as it was submitted.
    pub message: String,
}

impl ChatRequest {
    /// Creates a new request carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_message_field() {
        let request = ChatRequest::new("  where is the syllabus? ");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "  where is the syllabus? "})
        );
    }
}
