//! Conversation entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a message entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Typed by the operator.
    Local,
    /// Streamed back by the remote agent.
    Remote,
}

impl Origin {
    /// Whether the entry was sent from this side of the channel.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Local)
    }
}

/// Opaque file descriptor attached to a message.
///
/// The peer owns the shape; the session only carries it through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attachment(pub Value);

/// One turn of the conversation.
///
/// Entries are immutable once built; the history log only ever swaps
/// whole sequences of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntry {
    origin: Origin,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attachments: Option<Vec<Attachment>>,
}

impl MessageEntry {
    /// Create an entry with no rationale or attachments.
    #[must_use]
    pub fn new(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            origin,
            text: text.into(),
            rationale: None,
            attachments: None,
        }
    }

    /// Operator-authored entry.
    #[must_use]
    pub fn local(text: impl Into<String>) -> Self {
        Self::new(Origin::Local, text)
    }

    /// Agent-authored entry.
    #[must_use]
    pub fn remote(text: impl Into<String>) -> Self {
        Self::new(Origin::Remote, text)
    }

    /// Attach an explanatory trace. Empty traces are dropped.
    #[must_use]
    pub fn with_rationale(mut self, rationale: Option<String>) -> Self {
        self.rationale = rationale.filter(|r| !r.is_empty());
        self
    }

    /// Attach files.
    #[must_use]
    pub fn with_attachments(mut self, attachments: Option<Vec<Attachment>>) -> Self {
        self.attachments = attachments;
        self
    }

    #[must_use]
    pub const fn origin(&self) -> Origin {
        self.origin
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn rationale(&self) -> Option<&str> {
        self.rationale.as_deref()
    }

    #[must_use]
    pub fn attachments(&self) -> Option<&[Attachment]> {
        self.attachments.as_deref()
    }

    /// Whether the entry carries any text. Textless entries never reach the log.
    #[must_use]
    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}
