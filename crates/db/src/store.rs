use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A JSON document as kept by the store.
pub type Document = serde_json::Value;

/// Change feed for one path. Each message is the full document at that path after a change,
/// or `None` once the path has been deleted.
pub type Watch = mpsc::UnboundedReceiver<Option<Document>>;

/// Opaque content tag of a document, used for compare-and-set writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision(Box<str>);

impl Revision {
    pub fn new(tag: impl Into<Box<str>>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Hosted realtime document store addressed by slash-separated paths. Writes replace whole
/// documents, deleting a path deletes everything beneath it, and there are no transactions
/// across paths.
#[async_trait]
pub trait Store: Send + Sync {
    async fn read(&self, path: &str) -> Result<Option<Document>>;

    async fn read_with_revision(&self, path: &str) -> Result<(Option<Document>, Revision)>;

    async fn write(&self, path: &str, doc: Document) -> Result<()>;

    /// Writes only if the document still carries `revision`. Returns `false` when someone else
    /// changed it first.
    async fn write_if(&self, path: &str, doc: Document, revision: &Revision) -> Result<bool>;

    async fn remove(&self, path: &str) -> Result<()>;

    /// Subscribes to changes at `path`. The current value is delivered first.
    async fn watch(&self, path: &str) -> Result<Watch>;
}
