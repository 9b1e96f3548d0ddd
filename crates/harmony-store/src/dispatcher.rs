use std::sync::Arc;

use tokio::sync::broadcast;

/// What changed. Subscribers re-read their query when a notice matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeNotice {
    Collection(String),
    LogPath(String),
}

/// Fans change notices out to every live subscription.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for change notices; every feeder task receives all notices
    broadcast_tx: broadcast::Sender<ChangeNotice>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to change notices. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast a notice; silently dropped when nobody is listening.
    pub fn notify(&self, notice: ChangeNotice) {
        let _ = self.inner.broadcast_tx.send(notice);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
