//! Ordered conversation log with a live change feed.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::MessageEntry;

/// Change notification for renderers.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEvent {
    /// The whole log was swapped for a new sequence.
    Replaced(Arc<Vec<MessageEntry>>),
    /// One entry was added to the tail.
    Appended(MessageEntry),
    /// The log was emptied.
    Cleared,
}

/// Conversation log.
///
/// Insertion order is conversation order. Every mutation installs a new
/// log value, so a snapshot handed out earlier never changes underneath
/// its holder.
pub struct HistoryStore {
    log: Arc<Vec<MessageEntry>>,
    sender: broadcast::Sender<HistoryEvent>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            log: Arc::new(Vec::new()),
            sender,
        }
    }

    /// Current log.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<MessageEntry>> {
        Arc::clone(&self.log)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.log.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Discard the log and install `entries`, dropping any without text.
    pub fn replace_all<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = MessageEntry>,
    {
        let next: Vec<MessageEntry> = entries.into_iter().filter(MessageEntry::has_text).collect();
        tracing::debug!(entries = next.len(), "history replaced");

        self.log = Arc::new(next);
        let _ = self.sender.send(HistoryEvent::Replaced(self.snapshot()));
    }

    /// Add one entry to the tail.
    ///
    /// Returns `false` and leaves the log untouched if the entry has no text.
    pub fn append(&mut self, entry: MessageEntry) -> bool {
        if !entry.has_text() {
            tracing::debug!("ignoring textless history entry");
            return false;
        }

        Arc::make_mut(&mut self.log).push(entry.clone());
        let _ = self.sender.send(HistoryEvent::Appended(entry));
        true
    }

    /// Empty the log.
    pub fn clear(&mut self) {
        self.log = Arc::new(Vec::new());
        let _ = self.sender.send(HistoryEvent::Cleared);
    }

    /// Get a receiver for live updates.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.sender.subscribe()
    }

    /// Stream that yields the current log first, then live updates.
    ///
    /// Lagged receivers skip the missed events; the next `Replaced` resyncs them.
    #[must_use]
    pub fn snapshot_plus_stream(&self) -> futures::stream::BoxStream<'static, HistoryEvent> {
        let (current, rx) = (self.snapshot(), self.subscribe());

        let head = futures::stream::iter([HistoryEvent::Replaced(current)]);
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        head.chain(live).boxed()
    }
}
