use harmony_store::{StoreError, Subscription};

use crate::error::CoreError;

/// The single live subscription a component may hold.
pub(crate) struct LiveView<T> {
    subscription: Option<Subscription<T>>,
}

impl<T> LiveView<T> {
    pub(crate) fn new() -> Self {
        Self { subscription: None }
    }

    /// Replace the current subscription, cancelling the old one first.
    pub(crate) fn attach(&mut self, subscription: Subscription<T>) {
        self.detach();
        self.subscription = Some(subscription);
    }

    pub(crate) fn detach(&mut self) {
        if let Some(mut old) = self.subscription.take() {
            old.cancel();
        }
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Wait for the next snapshot. Pends forever while detached, so it can
    /// sit in a `select!` next to other sources.
    pub(crate) async fn next(&mut self) -> Result<T, CoreError> {
        let item = match self.subscription.as_mut() {
            Some(subscription) => subscription.next().await,
            None => return std::future::pending().await,
        };
        self.settle(item)
    }

    /// Newest queued snapshot, if any, without waiting.
    pub(crate) fn try_latest(&mut self) -> Result<Option<T>, CoreError> {
        let Some(subscription) = self.subscription.as_mut() else {
            return Ok(None);
        };
        match subscription.try_latest() {
            None => Ok(None),
            item => self.settle(item).map(Some),
        }
    }

    fn settle(&mut self, item: Option<Result<T, StoreError>>) -> Result<T, CoreError> {
        match item {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(e)) => {
                self.subscription = None;
                Err(CoreError::Subscription(e))
            }
            None => {
                self.subscription = None;
                Err(CoreError::Subscription(StoreError::Closed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn store_error_detaches_without_restarting() {
        let (tx, sub) = Subscription::<u32>::channel();
        let mut view = LiveView::new();
        view.attach(sub);

        assert!(tx.send(Ok(1)));
        assert!(tx.send(Err(StoreError::InvalidPath("members".into()))));
        assert!(tx.send(Ok(2)));

        assert_eq!(view.next().await.unwrap(), 1);
        assert!(matches!(
            view.next().await,
            Err(CoreError::Subscription(StoreError::InvalidPath(_)))
        ));
        assert!(!view.is_attached());
        assert!(tx.is_cancelled());

        // Nothing after the error is delivered.
        assert!(tokio::time::timeout(Duration::from_millis(50), view.next()).await.is_err());
        assert!(view.try_latest().unwrap().is_none());
    }

    #[tokio::test]
    async fn closed_producer_reports_closed() {
        let (tx, sub) = Subscription::<u32>::channel();
        let mut view = LiveView::new();
        view.attach(sub);
        drop(tx);

        assert!(matches!(view.next().await, Err(CoreError::Subscription(StoreError::Closed))));
        assert!(!view.is_attached());
    }

    #[test]
    fn polled_error_detaches() {
        let (tx, sub) = Subscription::<u32>::channel();
        let mut view = LiveView::new();
        view.attach(sub);
        tx.send(Err(StoreError::NotAnObject));

        assert!(matches!(view.try_latest(), Err(CoreError::Subscription(StoreError::NotAnObject))));
        assert!(!view.is_attached());
        assert!(view.try_latest().unwrap().is_none());
    }
}
