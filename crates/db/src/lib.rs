pub mod error;
pub mod firebase;
pub mod memory;
mod store;

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;
pub use model::{Poll, Voter};
pub use store::{Document, Revision, Store, Watch};

use core::sync::atomic::{AtomicU64, Ordering};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

const POLL_PATH: &str = "pollData";
const VOTERS_PATH: &str = "voters";

/// Handle to an active poll subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct Inner {
    store: Arc<dyn Store>,
    /// Delivery task for every active subscription.
    subscriptions: DashMap<u64, JoinHandle<()>>,
    next: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in self.subscriptions.iter() {
            task.abort();
        }
    }
}

/// Domain operations on top of the shared poll store. Clones share the same subscriptions.
#[derive(Clone)]
pub struct Repository {
    inner: Arc<Inner>,
}

fn voter_path(name: &str) -> error::Result<String> {
    let key = model::voter::sanitize_key(name);
    if key.is_empty() {
        return Err(error::Error::EmptyKey);
    }
    Ok(format!("{VOTERS_PATH}/{key}"))
}

impl Repository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let inner = Inner { store, subscriptions: DashMap::new(), next: AtomicU64::new(0) };
        Self { inner: Arc::new(inner) }
    }

    /// Reads the poll, falling back to the default content when none exists. The fallback is
    /// not written back.
    pub async fn get_poll(&self) -> error::Result<Poll> {
        match self.inner.store.read(POLL_PATH).await? {
            Some(doc) => Ok(serde_json::from_value(doc)?),
            None => Ok(Poll::default()),
        }
    }

    /// Like [`get_poll`](Self::get_poll), but also returns the revision to hand to
    /// [`save_poll_if`](Self::save_poll_if).
    pub async fn get_poll_versioned(&self) -> error::Result<(Poll, Revision)> {
        let (doc, revision) = self.inner.store.read_with_revision(POLL_PATH).await?;
        let poll = match doc {
            Some(doc) => serde_json::from_value(doc)?,
            None => Poll::default(),
        };
        Ok((poll, revision))
    }

    /// Overwrites the whole poll document.
    pub async fn save_poll(&self, poll: &Poll) -> error::Result<()> {
        let doc = serde_json::to_value(poll)?;
        self.inner.store.write(POLL_PATH, doc).await
    }

    /// Overwrites the poll only if it is still at `revision`. Returns `false` if it moved on.
    pub async fn save_poll_if(&self, poll: &Poll, revision: &Revision) -> error::Result<bool> {
        let doc = serde_json::to_value(poll)?;
        self.inner.store.write_if(POLL_PATH, doc, revision).await
    }

    pub async fn remove_poll(&self) -> error::Result<()> {
        self.inner.store.remove(POLL_PATH).await
    }

    pub async fn get_voter(&self, name: &str) -> error::Result<Option<Voter>> {
        let path = voter_path(name)?;
        match self.inner.store.read(&path).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn save_voter(&self, name: &str, voter: &Voter) -> error::Result<()> {
        let path = voter_path(name)?;
        let doc = serde_json::to_value(voter)?;
        self.inner.store.write(&path, doc).await
    }

    pub async fn remove_all_voters(&self) -> error::Result<()> {
        self.inner.store.remove(VOTERS_PATH).await
    }

    /// Calls `on_change` with the full poll now and after every change to it, including changes
    /// made through this repository. Deletions are not reported.
    pub async fn subscribe<F>(&self, on_change: F) -> error::Result<Subscription>
    where
        F: Fn(Poll) + Send + 'static,
    {
        let mut watch = self.inner.store.watch(POLL_PATH).await?;
        let task = tokio::spawn(async move {
            while let Some(doc) = watch.recv().await {
                let Some(doc) = doc else {
                    continue;
                };
                match serde_json::from_value(doc) {
                    Ok(poll) => on_change(poll),
                    Err(err) => log::warn!("skipping malformed poll update: {err}"),
                }
            }
        });

        let id = self.inner.next.fetch_add(1, Ordering::Relaxed);
        self.inner.subscriptions.insert(id, task);
        log::debug!("poll subscription {id} started");
        Ok(Subscription(id))
    }

    /// Stops deliveries for the subscription. Unknown or already cancelled handles are ignored.
    pub fn unsubscribe(&self, subscription: Subscription) {
        if let Some((id, task)) = self.inner.subscriptions.remove(&subscription.0) {
            task.abort();
            log::debug!("poll subscription {id} stopped");
        }
    }

    /// Number of active subscriptions.
    pub fn subscriptions(&self) -> usize {
        self.inner.subscriptions.len()
    }
}
