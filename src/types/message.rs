use serde::{Deserialize, Serialize};

/// Who authored a transcript entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The person typing at the prompt.
    User,

    /// The remote chatbot.
    Bot,
}

/// How a message body should be presented.
///
/// Only meaningful for bot messages; user messages are always `Plain`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    /// Text to be read inline.
    #[default]
    Plain,

    /// A URL pointing at a downloadable document.
    DocumentLink,
}

/// A single entry in the conversation transcript.
///
/// Messages are immutable once created; the fields are only reachable through
/// accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    text: String,
    sender: Sender,
    kind: MessageKind,
}

impl Message {
    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            kind: MessageKind::Plain,
        }
    }

    /// Create a bot message of the given kind.
    pub fn bot(text: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
            kind,
        }
    }

    /// The message body. For document links this is the download URL.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The author of the message.
    pub fn sender(&self) -> Sender {
        self.sender
    }

    /// The presentation kind of the message.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns true if this message was typed by the user.
    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// Returns true if this is a bot reply offering a document download.
    pub fn is_document_link(&self) -> bool {
        self.sender == Sender::Bot && self.kind == MessageKind::DocumentLink
    }
}
