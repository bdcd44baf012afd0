//! Wire protocol and duplex channel for flow chat sessions.
//!
//! Provides:
//! - Wire protocol (inbound frame routing, outbound payloads)
//! - Channel abstraction (`Connector` / `Connection`)
//! - WebSocket client transport (feature: websocket)

pub mod channel;
pub mod protocol;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use channel::{ChannelEvent, ChannelState, Connection, Connector, EventSender};
pub use protocol::{
    ChatRequest, ControlFrame, EndFrame, InboundFrame, OutboundPayload, ProtocolError, TurnRecord,
    WireEntry,
};

#[cfg(feature = "websocket")]
pub use websocket::{ChannelHandle, ConnectionManager};
