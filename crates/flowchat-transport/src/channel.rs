//! Duplex channel abstraction.

use tokio::sync::mpsc;

use crate::protocol::{InboundFrame, OutboundPayload};

/// Lifecycle of one channel.
///
/// `Connecting -> Open -> Closed` or `Connecting -> Error -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Error,
    Closed,
}

/// Something that happened on the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The channel is ready for sends.
    Opened,
    /// A frame arrived from the peer.
    Frame(InboundFrame),
    /// Transport failure. Always followed by `Closed`.
    Error(String),
    /// The channel is gone.
    Closed,
}

/// Queue the channel reports into. Events arrive in order.
pub type EventSender = mpsc::UnboundedSender<ChannelEvent>;

/// An open (or opening) channel to the peer.
pub trait Connection: Send {
    /// Current state.
    fn state(&self) -> ChannelState;

    /// Serialize and transmit `payload`.
    ///
    /// Best effort: silently dropped unless the channel is `Open`.
    fn send(&self, payload: &OutboundPayload);

    /// Terminate the channel. Safe to call in any state, and more than once.
    fn close(&mut self);
}

/// Opens channels addressed by session identifier.
pub trait Connector {
    type Conn: Connection;

    /// Open a channel for `session_id`, reporting into `events`.
    fn open(&self, session_id: &str, events: EventSender) -> Self::Conn;
}
