use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;

/// A live, cancellable stream of snapshots.
///
/// `cancel()` is idempotent; once it returns no further item is yielded,
/// including ones already queued. Dropping the subscription cancels it.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<Result<T, StoreError>>,
    token: CancellationToken,
}

/// Producer half, held by whatever task feeds the subscription.
pub struct SubscriptionSender<T> {
    tx: mpsc::UnboundedSender<Result<T, StoreError>>,
    token: CancellationToken,
}

impl<T> Subscription<T> {
    pub fn channel() -> (SubscriptionSender<T>, Subscription<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        (
            SubscriptionSender {
                tx,
                token: token.clone(),
            },
            Subscription { rx, token },
        )
    }

    /// Wait for the next snapshot. `None` once cancelled or the producer is gone.
    pub async fn next(&mut self) -> Option<Result<T, StoreError>> {
        if self.token.is_cancelled() {
            return None;
        }
        self.rx.recv().await
    }

    /// Drain everything queued and return only the newest item, without
    /// waiting. An error item wins over anything queued after it.
    pub fn try_latest(&mut self) -> Option<Result<T, StoreError>> {
        if self.token.is_cancelled() {
            return None;
        }
        let mut latest = None;
        while let Ok(item) = self.rx.try_recv() {
            let is_err = item.is_err();
            latest = Some(item);
            if is_err {
                break;
            }
        }
        latest
    }

    pub fn cancel(&mut self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T, StoreError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.token.is_cancelled() {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx)
    }
}

impl<T> SubscriptionSender<T> {
    /// Returns false once the subscriber is gone or has cancelled.
    pub fn send(&self, item: Result<T, StoreError>) -> bool {
        !self.token.is_cancelled() && self.tx.send(item).is_ok()
    }

    /// Resolves when the subscriber cancels or drops the subscription.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
