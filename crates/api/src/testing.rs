//! Store wrappers that force concurrent operations to interleave.

use async_trait::async_trait;
use core::sync::atomic::{AtomicUsize, Ordering};
use db::{error::Result, Document, MemoryStore, Revision, Store, Watch};
use tokio::sync::Barrier;

/// Holds the first `parties` readers until all of them have read, forcing their
/// read-modify-write cycles to overlap.
pub struct Lockstep {
    inner: MemoryStore,
    barrier: Barrier,
    gated: AtomicUsize,
}

impl Lockstep {
    pub fn new(parties: usize) -> Self {
        Self { inner: MemoryStore::default(), barrier: Barrier::new(parties), gated: AtomicUsize::new(parties) }
    }

    async fn hold(&self) {
        if self.gated.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
            self.barrier.wait().await;
        }
    }
}

#[async_trait]
impl Store for Lockstep {
    async fn read(&self, path: &str) -> Result<Option<Document>> {
        let doc = self.inner.read(path).await?;
        self.hold().await;
        Ok(doc)
    }

    async fn read_with_revision(&self, path: &str) -> Result<(Option<Document>, Revision)> {
        let pair = self.inner.read_with_revision(path).await?;
        self.hold().await;
        Ok(pair)
    }

    async fn write(&self, path: &str, doc: Document) -> Result<()> {
        self.inner.write(path, doc).await
    }

    async fn write_if(&self, path: &str, doc: Document, revision: &Revision) -> Result<bool> {
        self.inner.write_if(path, doc, revision).await
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.inner.remove(path).await
    }

    async fn watch(&self, path: &str) -> Result<Watch> {
        self.inner.watch(path).await
    }
}

/// Yields to the scheduler after every read, so that joined tasks take turns between their
/// reads and their writes.
#[derive(Default)]
pub struct Yielding {
    inner: MemoryStore,
}

#[async_trait]
impl Store for Yielding {
    async fn read(&self, path: &str) -> Result<Option<Document>> {
        let doc = self.inner.read(path).await?;
        tokio::task::yield_now().await;
        Ok(doc)
    }

    async fn read_with_revision(&self, path: &str) -> Result<(Option<Document>, Revision)> {
        let pair = self.inner.read_with_revision(path).await?;
        tokio::task::yield_now().await;
        Ok(pair)
    }

    async fn write(&self, path: &str, doc: Document) -> Result<()> {
        self.inner.write(path, doc).await
    }

    async fn write_if(&self, path: &str, doc: Document, revision: &Revision) -> Result<bool> {
        self.inner.write_if(path, doc, revision).await
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.inner.remove(path).await
    }

    async fn watch(&self, path: &str) -> Result<Watch> {
        self.inner.watch(path).await
    }
}
