//! Wire protocol for client-peer communication.

use flowchat_core::{Attachment, FlowGraph, MessageEntry, Origin};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid frame: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// One record of a history snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_steps: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<Attachment>>,
}

impl TurnRecord {
    /// Convert into a log entry. Records without text yield `None`.
    #[must_use]
    pub fn into_entry(self) -> Option<MessageEntry> {
        let text = self.message.filter(|m| !m.is_empty())?;
        let origin = if self.is_bot { Origin::Remote } else { Origin::Local };
        Some(
            MessageEntry::new(origin, text)
                .with_rationale(self.intermediate_steps)
                .with_attachments(self.files),
        )
    }
}

/// Completion of the peer's current response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndFrame {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate_steps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<Attachment>>,
}

impl EndFrame {
    /// Remote entry carried by the frame, if it has text.
    #[must_use]
    pub fn into_entry(self) -> Option<MessageEntry> {
        let text = self.message.filter(|m| !m.is_empty())?;
        Some(
            MessageEntry::remote(text)
                .with_rationale(self.intermediate_steps)
                .with_attachments(self.files),
        )
    }
}

/// Frame received from the peer, routed by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Full authoritative history.
    Snapshot(Vec<TurnRecord>),
    /// `{"type": "end", ...}`.
    End(EndFrame),
    /// `{"type": "file", ...}`; contents are passed through untouched.
    File(Value),
    /// Any other shape or `type` value.
    Unknown(Option<String>),
}

impl InboundFrame {
    /// Parse a text frame.
    ///
    /// # Errors
    /// Returns error if the text is not JSON.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(Self::from_value(serde_json::from_str(text)?))
    }

    /// Route a decoded frame by shape. Arrays are snapshots; objects are
    /// dispatched on their `type` field.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Snapshot(
                items
                    .into_iter()
                    .filter_map(|item| match serde_json::from_value(item) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            tracing::debug!("skipping malformed history record: {e}");
                            None
                        }
                    })
                    .collect(),
            ),
            Value::Object(map) => {
                let kind = map.get("type").and_then(Value::as_str).map(str::to_owned);
                let value = Value::Object(map);
                match kind {
                    Some(k) if k == "end" => {
                        Self::End(serde_json::from_value(value).unwrap_or_else(|e| {
                            tracing::warn!("malformed end frame: {e}");
                            EndFrame::default()
                        }))
                    }
                    Some(k) if k == "file" => Self::File(value),
                    other => Self::Unknown(other),
                }
            }
            _ => Self::Unknown(None),
        }
    }
}

/// History entry as sent to the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEntry {
    pub message: String,
    #[serde(rename = "isSend")]
    pub is_send: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<Attachment>>,
}

impl From<&MessageEntry> for WireEntry {
    fn from(entry: &MessageEntry) -> Self {
        Self {
            message: entry.text().to_string(),
            is_send: entry.origin().is_local(),
            thought: entry.rationale().map(str::to_owned),
            files: entry.attachments().map(<[Attachment]>::to_vec),
        }
    }
}

/// Chat request: the flow graph with the message and session metadata
/// merged into the same object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(flatten)]
    pub graph: FlowGraph,
    pub message: String,
    #[serde(rename = "chatHistory")]
    pub chat_history: Vec<WireEntry>,
    pub name: String,
    pub description: String,
}

/// Out-of-band control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFrame {
    pub clear_history: bool,
}

/// Message from client to peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundPayload {
    Chat(ChatRequest),
    Control(ControlFrame),
}

impl OutboundPayload {
    /// Ask the peer to forget the conversation.
    #[must_use]
    pub const fn clear_history() -> Self {
        Self::Control(ControlFrame {
            clear_history: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_array_is_snapshot() {
        let frame = InboundFrame::parse(
            r#"[{"is_bot": false, "message": "hi", "type": "human"},
                {"is_bot": true, "message": "", "type": "bot"},
                {"is_bot": true, "message": "hello", "intermediate_steps": "thinking", "type": "bot"}]"#,
        )
        .unwrap();

        let InboundFrame::Snapshot(records) = frame else {
            panic!("Wrong frame type");
        };
        let entries: Vec<_> = records.into_iter().filter_map(TurnRecord::into_entry).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].origin(), Origin::Local);
        assert_eq!(entries[1].origin(), Origin::Remote);
        assert_eq!(entries[1].rationale(), Some("thinking"));
    }

    #[test]
    fn test_snapshot_skips_non_object_records() {
        let frame = InboundFrame::from_value(json!([1, {"is_bot": true, "message": "ok"}]));
        assert_eq!(
            frame,
            InboundFrame::Snapshot(vec![TurnRecord {
                is_bot: true,
                message: Some("ok".into()),
                ..TurnRecord::default()
            }])
        );
    }

    #[test]
    fn test_end_frame() {
        let frame = InboundFrame::parse(r#"{"type": "end", "message": "done", "files": [{"n": 1}]}"#).unwrap();
        let InboundFrame::End(end) = frame else {
            panic!("Wrong frame type");
        };
        let entry = end.into_entry().unwrap();
        assert_eq!(entry.text(), "done");
        assert_eq!(entry.origin(), Origin::Remote);
        assert_eq!(entry.attachments().map(<[Attachment]>::len), Some(1));
    }

    #[test]
    fn test_malformed_end_frame_still_routes_as_end() {
        let frame = InboundFrame::from_value(json!({"type": "end", "message": 42}));
        assert_eq!(frame, InboundFrame::End(EndFrame::default()));
    }

    #[test]
    fn test_file_and_unknown_frames() {
        assert!(matches!(
            InboundFrame::from_value(json!({"type": "file", "name": "a.txt"})),
            InboundFrame::File(_)
        ));
        assert_eq!(
            InboundFrame::from_value(json!({"type": "stream", "message": "tok"})),
            InboundFrame::Unknown(Some("stream".into()))
        );
        assert_eq!(InboundFrame::from_value(json!("hello")), InboundFrame::Unknown(None));
        assert!(InboundFrame::parse("not json").is_err());
    }

    #[test]
    fn test_chat_request_flattens_graph() {
        let graph: FlowGraph = serde_json::from_value(json!({
            "nodes": [], "edges": [], "viewport": {"x": 0}
        }))
        .unwrap();
        let history = [
            MessageEntry::local("q"),
            MessageEntry::remote("a").with_rationale(Some("why".into())),
        ];
        let payload = OutboundPayload::Chat(ChatRequest {
            graph,
            message: "next".into(),
            chat_history: history.iter().map(WireEntry::from).collect(),
            name: "Flow".into(),
            description: "desc".into(),
        });

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["viewport"]["x"], 0);
        assert_eq!(json["message"], "next");
        assert_eq!(json["chatHistory"][0], json!({"message": "q", "isSend": true}));
        assert_eq!(
            json["chatHistory"][1],
            json!({"message": "a", "isSend": false, "thought": "why"})
        );
        assert_eq!(json["name"], "Flow");
    }

    #[test]
    fn test_clear_history_payload() {
        let json = serde_json::to_string(&OutboundPayload::clear_history()).unwrap();
        assert_eq!(json, r#"{"clear_history":true}"#);
    }
}
