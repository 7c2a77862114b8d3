//! Push-based read views over the document store.
//!
//! A [`LiveQuery`] is the receiving half of a `tokio::sync::watch` channel
//! owned by the [`Store`](crate::store::Store). The store replaces the
//! snapshot on every write that can affect the query, before the write call
//! returns, so a caller that awaits a mutation and then reads
//! [`LiveQuery::current`] always observes the mutation's effect.

use tokio::sync::watch;

/// A live result set that is re-delivered whenever underlying rows change.
#[derive(Debug, Clone)]
pub struct LiveQuery<T> {
    rx: watch::Receiver<Vec<T>>,
}

impl<T: Clone> LiveQuery<T> {
    pub(crate) fn new(rx: watch::Receiver<Vec<T>>) -> Self {
        Self { rx }
    }

    /// A query that was never issued: always empty, never changes.
    ///
    /// Used when there is no project to filter by.
    pub fn inert() -> Self {
        let (_tx, rx) = watch::channel(Vec::new());
        Self { rx }
    }

    /// Latest snapshot.
    pub fn current(&self) -> Vec<T> {
        self.rx.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.rx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.borrow().is_empty()
    }

    /// Whether a snapshot was pushed since the last [`changed`](Self::changed).
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait for the next pushed snapshot.
    ///
    /// Returns `false` once the query can no longer change (the store was
    /// dropped, or the query is [`inert`](Self::inert)).
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
