//! Session controller for one open chat dialog.

use std::{sync::Arc, time::Duration};

use flowchat_core::{
    Alert, GraphSource, HistoryStore, MessageEntry, Notifier, SendLock,
    notify::{EMPTY_MESSAGE, MISSING_FIELDS_TITLE, SEND_ERROR_TITLE},
    validate_nodes,
};
use flowchat_transport::{
    ChannelEvent, ChannelState, ChatRequest, Connection, Connector, InboundFrame,
    OutboundPayload, TurnRecord, WireEntry,
};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

/// Identity and metadata of the flow being chatted with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowInfo {
    /// Session identifier; also addresses the channel.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Host of the dialog, told when it may release shared UI state.
pub trait DialogHost: Send + Sync + 'static {
    fn release(&self);
}

/// Why a message was not sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("The message cannot be empty")]
    EmptyMessage,
    #[error("{} required field(s) missing", .0.len())]
    MissingFields(Vec<String>),
    #[error("A request is already in flight")]
    Locked,
}

/// Controller for one chat dialog.
///
/// Owns the channel, the history log and the send lock for as long as the
/// dialog is open. Inbound events are applied one at a time through
/// [`handle_event`](Self::handle_event), in arrival order.
pub struct SessionController<C: Connection> {
    flow: FlowInfo,
    graph: Arc<dyn GraphSource>,
    notifier: Arc<dyn Notifier>,
    history: HistoryStore,
    lock: SendLock,
    compose: String,
    connection: C,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl<C: Connection> SessionController<C> {
    /// Open the dialog's channel and start an empty session.
    pub fn open<K>(
        connector: &K,
        flow: FlowInfo,
        graph: Arc<dyn GraphSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self
    where
        K: Connector<Conn = C>,
    {
        let (tx, events) = mpsc::unbounded_channel();
        let connection = connector.open(&flow.id, tx);
        tracing::info!(session = %flow.id, "chat session opened");

        Self {
            flow,
            graph,
            notifier,
            history: HistoryStore::new(),
            lock: SendLock::new(),
            compose: String::new(),
            connection,
            events,
        }
    }

    #[must_use]
    pub const fn flow(&self) -> &FlowInfo {
        &self.flow
    }

    /// Current log, for rendering.
    #[must_use]
    pub fn history(&self) -> Arc<Vec<MessageEntry>> {
        self.history.snapshot()
    }

    /// The log itself, for subscribing to changes.
    #[must_use]
    pub const fn history_store(&self) -> &HistoryStore {
        &self.history
    }

    /// Whether a request is in flight. The send control must be disabled while true.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    /// Receiver tracking the send lock.
    #[must_use]
    pub fn lock_updates(&self) -> watch::Receiver<bool> {
        self.lock.subscribe()
    }

    #[must_use]
    pub fn channel_state(&self) -> ChannelState {
        self.connection.state()
    }

    #[must_use]
    pub fn compose(&self) -> &str {
        &self.compose
    }

    /// Replace the compose buffer.
    pub fn set_compose(&mut self, text: impl Into<String>) {
        self.compose = text.into();
    }

    /// Send the compose buffer to the peer.
    ///
    /// Empty input and unresolved required fields are reported through the
    /// notifier and leave all state untouched. On success the lock is taken,
    /// the message is logged and the buffer is cleared.
    ///
    /// # Errors
    /// Returns why nothing was sent.
    pub fn send_message(&mut self) -> Result<(), SendError> {
        if self.lock.is_locked() {
            tracing::debug!(session = %self.flow.id, "send while locked ignored");
            return Err(SendError::Locked);
        }

        if self.compose.is_empty() {
            self.notifier
                .notify(Alert::error(SEND_ERROR_TITLE, vec![EMPTY_MESSAGE.to_string()]));
            return Err(SendError::EmptyMessage);
        }

        let graph = self.graph.graph();
        let defects = validate_nodes(&graph, self.notifier.as_ref());
        if !defects.is_empty() {
            self.notifier
                .notify(Alert::error(MISSING_FIELDS_TITLE, defects.clone()));
            return Err(SendError::MissingFields(defects));
        }

        if !self.lock.try_acquire() {
            return Err(SendError::Locked);
        }

        let message = std::mem::take(&mut self.compose);
        let prior = self.history.snapshot();
        self.history.append(MessageEntry::local(message.clone()));

        let request = ChatRequest {
            graph,
            message,
            chat_history: prior.iter().map(WireEntry::from).collect(),
            name: self.flow.name.clone(),
            description: self.flow.description.clone(),
        };
        self.connection.send(&OutboundPayload::Chat(request));
        tracing::debug!(session = %self.flow.id, "chat request dispatched");

        self.reconcile_lock();
        Ok(())
    }

    /// Empty the log and ask the peer to do the same. The lock is left alone.
    pub fn clear_chat(&mut self) {
        self.history.clear();
        self.connection.send(&OutboundPayload::clear_history());
    }

    /// Wait for the next channel event. Cancel safe.
    pub async fn recv_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Apply every event already queued. Returns how many were applied.
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Apply one channel event to the session.
    pub fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened => {
                tracing::info!(session = %self.flow.id, "chat channel open");
            }
            ChannelEvent::Frame(frame) => self.handle_frame(frame),
            ChannelEvent::Error(message) => {
                tracing::error!(session = %self.flow.id, "chat channel error: {message}");
                self.notifier.notify(Alert::ChannelFailure { message });
            }
            ChannelEvent::Closed => {
                if self.lock.release() {
                    tracing::info!(session = %self.flow.id, "channel closed with request in flight");
                }
            }
        }
    }

    fn handle_frame(&mut self, frame: InboundFrame) {
        match frame {
            InboundFrame::Snapshot(records) => {
                self.history
                    .replace_all(records.into_iter().filter_map(TurnRecord::into_entry));
            }
            InboundFrame::End(end) => {
                if let Some(entry) = end.into_entry() {
                    self.history.append(entry);
                }
                self.lock.release();
            }
            InboundFrame::File(notice) => {
                tracing::debug!(session = %self.flow.id, ?notice, "file notice");
            }
            InboundFrame::Unknown(kind) => {
                tracing::debug!(session = %self.flow.id, ?kind, "ignoring frame");
            }
        }
    }

    // A send over a channel that already closed never gets a closing event.
    fn reconcile_lock(&self) {
        if self.connection.state() == ChannelState::Closed && self.lock.release() {
            tracing::debug!(session = %self.flow.id, "channel already closed, send lock released");
        }
    }

    /// Close the dialog: tear down the channel now, tell `host` after `delay`.
    pub fn close_dialog(self, host: Arc<dyn DialogHost>, delay: Duration) -> JoinHandle<()> {
        tracing::info!(session = %self.flow.id, "chat session closed");
        drop(self);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            host.release();
        })
    }
}

// Teardown happens on every exit path, including `close_dialog`.
impl<C: Connection> Drop for SessionController<C> {
    fn drop(&mut self) {
        self.connection.close();
    }
}

#[cfg(feature = "websocket")]
impl SessionController<flowchat_transport::ChannelHandle> {
    /// Open a session over WebSocket at the configured endpoint.
    pub fn connect(
        config: &crate::ChatConfig,
        flow: FlowInfo,
        graph: Arc<dyn GraphSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let manager = flowchat_transport::ConnectionManager::new(config.endpoint.clone());
        Self::open(&manager, flow, graph, notifier)
    }
}
