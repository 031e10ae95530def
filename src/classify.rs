//! Classification of chatbot replies.
//!
//! The chatbot answers either with prose or with a bare link to a course
//! document. The distinction is a coarse textual heuristic, not a URL or MIME
//! check: URLs with a query string after the extension stay plain, and so do
//! extensions in other letter cases.

use crate::types::{Message, MessageKind};

/// Extensions that mark a reply as a downloadable document.
const DOCUMENT_SUFFIXES: &[&str] = &[".pdf", ".docx"];

/// Marker that must appear somewhere in a document reply.
const LINK_MARKER: &str = "http";

/// Decide how a raw reply should be presented.
///
/// A reply is a [`MessageKind::DocumentLink`] iff it contains `"http"` and
/// ends exactly with `.pdf` or `.docx`; everything else is
/// [`MessageKind::Plain`].
///
/// # Examples
///
/// ```
/// # use crcbot::{MessageKind, classify};
/// assert_eq!(classify("Here: http://x.edu/syllabus.pdf"), MessageKind::DocumentLink);
/// assert_eq!(classify("http://x.edu/syllabus.pdf?ref=1"), MessageKind::Plain);
/// assert_eq!(classify(""), MessageKind::Plain);
/// ```
pub fn classify(response_text: &str) -> MessageKind {
    let has_marker = response_text.contains(LINK_MARKER);
    let has_suffix = DOCUMENT_SUFFIXES
        .iter()
        .any(|suffix| response_text.ends_with(suffix));
    if has_marker && has_suffix {
        MessageKind::DocumentLink
    } else {
        MessageKind::Plain
    }
}

/// Build the bot message for a raw reply. The text is kept verbatim.
pub fn classify_reply(response_text: impl Into<String>) -> Message {
    let text = response_text.into();
    let kind = classify(&text);
    Message::bot(text, kind)
}
