//! Core abstractions for flow chat sessions.
//!
//! This crate provides the fundamental building blocks:
//! - `MessageEntry` - One turn of the conversation
//! - `HistoryStore` - Ordered log with snapshot + live change feed
//! - `SendLock` - Single in-flight request guard
//! - `FlowGraph` - Read-only view of the editor's node graph
//! - `validate_nodes` - Pre-send checks over the flow graph
//! - `Notifier` - Operator-facing alerts

pub mod graph;
pub mod history;
pub mod lock;
pub mod message;
pub mod notify;
pub mod validate;

pub use graph::{Edge, FlowGraph, GraphSource, Node, TemplateField};
pub use history::{HistoryEvent, HistoryStore};
pub use lock::SendLock;
pub use message::{Attachment, MessageEntry, Origin};
pub use notify::{Alert, Notifier, TracingNotifier};
pub use validate::{snake_to_normal_case, validate_nodes};
