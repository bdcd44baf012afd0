//! WebSocket client transport.

use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::{
    channel::{ChannelEvent, ChannelState, Connection, Connector, EventSender},
    protocol::{InboundFrame, OutboundPayload},
};

/// Opens one WebSocket per session at `<endpoint>/<session id>`.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    endpoint: String,
}

impl ConnectionManager {
    /// Create a manager for the given base URL.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Channel address for a session.
    #[must_use]
    pub fn address(&self, session_id: &str) -> String {
        format!("{}/{session_id}", self.endpoint.trim_end_matches('/'))
    }
}

impl Connector for ConnectionManager {
    type Conn = ChannelHandle;

    fn open(&self, session_id: &str, events: EventSender) -> ChannelHandle {
        ChannelHandle::spawn(self.address(session_id), events)
    }
}

/// Handle to one WebSocket channel.
///
/// The socket is driven by a background task; dropping the handle closes it.
/// Must be created inside a tokio runtime.
pub struct ChannelHandle {
    address: String,
    state: watch::Receiver<ChannelState>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    fn spawn(address: String, events: EventSender) -> Self {
        let (state_tx, state) = watch::channel(ChannelState::Connecting);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_channel(address.clone(), state_tx, outbound_rx, events));

        Self {
            address,
            state,
            outbound: Some(outbound_tx),
            task,
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Connection for ChannelHandle {
    fn state(&self) -> ChannelState {
        if self.outbound.is_none() {
            return ChannelState::Closed;
        }
        *self.state.borrow()
    }

    fn send(&self, payload: &OutboundPayload) {
        let Some(tx) = self.outbound.as_ref().filter(|_| self.state() == ChannelState::Open) else {
            tracing::debug!(address = %self.address, "channel not open, dropping payload");
            return;
        };

        match serde_json::to_string(payload) {
            Ok(json) => {
                let _ = tx.send(json);
            }
            Err(e) => tracing::error!("Failed to serialize message: {e}"),
        }
    }

    fn close(&mut self) {
        // Dropping the sender makes the task send a close frame and exit.
        if self.outbound.take().is_none() {
            return;
        }
        if *self.state.borrow() == ChannelState::Connecting {
            self.task.abort();
        }
        tracing::info!(address = %self.address, "closing channel");
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_channel(
    address: String,
    state: watch::Sender<ChannelState>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: EventSender,
) {
    let ws = match connect_async(address.as_str()).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            tracing::error!(%address, "WebSocket connect failed: {e}");
            fail(&state, &events, e.to_string());
            finish(&state, &events);
            return;
        }
    };

    state.send_replace(ChannelState::Open);
    tracing::info!(%address, "WebSocket connection established");
    let _ = events.send(ChannelEvent::Opened);

    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            out = outbound.recv() => {
                let Some(json) = out else {
                    let _ = ws_tx.close().await;
                    break;
                };
                if let Err(e) = ws_tx.send(Message::Text(json.into())).await {
                    tracing::error!(%address, "WebSocket send failed: {e}");
                    fail(&state, &events, e.to_string());
                    break;
                }
            }
            msg = ws_rx.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(s) => s,
                        Err(_) => continue,
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::error!(%address, "WebSocket error: {e}");
                        fail(&state, &events, e.to_string());
                        break;
                    }
                };

                match InboundFrame::parse(&text) {
                    Ok(frame) => {
                        let _ = events.send(ChannelEvent::Frame(frame));
                    }
                    Err(e) => tracing::warn!(%address, "Invalid peer frame: {e}"),
                }
            }
        }
    }

    finish(&state, &events);
}

fn fail(state: &watch::Sender<ChannelState>, events: &EventSender, message: String) {
    state.send_replace(ChannelState::Error);
    let _ = events.send(ChannelEvent::Error(message));
}

fn finish(state: &watch::Sender<ChannelState>, events: &EventSender) {
    state.send_replace(ChannelState::Closed);
    tracing::info!("channel closed");
    let _ = events.send(ChannelEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_joins_session_id() {
        let manager = ConnectionManager::new("ws://127.0.0.1:5003/chat/");
        assert_eq!(manager.address("abc"), "ws://127.0.0.1:5003/chat/abc");

        let manager = ConnectionManager::new("ws://host/chat");
        assert_eq!(manager.address("42"), "ws://host/chat/42");
    }

    #[tokio::test]
    async fn test_closed_handle_reports_closed_and_drops_sends() {
        let (events, _rx) = mpsc::unbounded_channel();
        let mut handle = ConnectionManager::new("ws://127.0.0.1:1/chat").open("s", events);

        handle.close();
        handle.close();

        assert_eq!(handle.state(), ChannelState::Closed);
        handle.send(&OutboundPayload::clear_history());
    }
}
