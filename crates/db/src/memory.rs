use crate::{
    error::{Error, Result},
    store::{Document, Revision, Store, Watch},
};
use async_trait::async_trait;
use core::sync::atomic::{AtomicU64, Ordering};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::Mutex;
use tokio::sync::mpsc;

struct Watcher {
    path: Box<str>,
    tx: mpsc::UnboundedSender<Option<Document>>,
}

/// In-process document tree with the same semantics as the hosted store. Notifications are sent
/// while the tree is locked, so every watcher observes writes in the order they were applied.
#[derive(Default)]
pub struct MemoryStore {
    root: Mutex<Map<String, Value>>,
    watchers: DashMap<u64, Watcher>,
    next: AtomicU64,
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|seg| !seg.is_empty())
}

/// Whether a change at one path is visible from the other.
fn overlaps(a: &str, b: &str) -> bool {
    segments(a).zip(segments(b)).all(|(x, y)| x == y)
}

fn lookup<'v>(root: &'v Map<String, Value>, path: &str) -> Option<&'v Value> {
    let mut segs = segments(path);
    let mut node = root.get(segs.next()?)?;
    for seg in segs {
        node = node.as_object()?.get(seg)?;
    }
    Some(node)
}

fn assign(root: &mut Map<String, Value>, path: &str, doc: Value) {
    let segs: Vec<_> = segments(path).collect();
    if doc.is_null() {
        prune(root, &segs);
        return;
    }

    let Some((last, parents)) = segs.split_last() else {
        return;
    };

    let mut node = root;
    for seg in parents {
        let child = node.entry(*seg).or_insert_with(|| Value::Object(Map::new()));
        if !child.is_object() {
            *child = Value::Object(Map::new());
        }
        let Value::Object(map) = child else {
            return;
        };
        node = map;
    }
    node.insert((*last).to_owned(), doc);
}

/// Deletes the path and any parents left empty by the deletion.
fn prune(map: &mut Map<String, Value>, segs: &[&str]) {
    match segs {
        [] => {}
        [last] => {
            map.remove(*last);
        }
        [first, rest @ ..] => {
            let emptied = match map.get_mut(*first) {
                Some(Value::Object(child)) => {
                    prune(child, rest);
                    child.is_empty()
                }
                _ => false,
            };
            if emptied {
                map.remove(*first);
            }
        }
    }
}

fn revision_of(doc: Option<&Value>) -> Result<Revision> {
    let bytes = serde_json::to_vec(doc.unwrap_or(&Value::Null))?;
    Ok(Revision::new(hex::encode(blake3::hash(&bytes).as_bytes())))
}

impl MemoryStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Map<String, Value>>> {
        self.root.lock().map_err(|_| Error::Unavailable)
    }

    fn notify(&self, root: &Map<String, Value>, changed: &str) {
        let mut closed = Vec::new();
        for entry in self.watchers.iter() {
            let (id, watcher) = entry.pair();
            if !overlaps(&watcher.path, changed) {
                continue;
            }
            if watcher.tx.send(lookup(root, &watcher.path).cloned()).is_err() {
                closed.push(*id);
            }
        }

        for id in closed {
            self.watchers.remove(&id);
        }
    }

    /// Number of live watchers, including ones whose receiver was dropped since the last write.
    pub fn watchers(&self) -> usize {
        self.watchers.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read(&self, path: &str) -> Result<Option<Document>> {
        let root = self.lock()?;
        Ok(lookup(&root, path).cloned())
    }

    async fn read_with_revision(&self, path: &str) -> Result<(Option<Document>, Revision)> {
        let root = self.lock()?;
        let doc = lookup(&root, path).cloned();
        let revision = revision_of(doc.as_ref())?;
        Ok((doc, revision))
    }

    async fn write(&self, path: &str, doc: Document) -> Result<()> {
        let mut root = self.lock()?;
        assign(&mut root, path, doc);
        self.notify(&root, path);
        Ok(())
    }

    async fn write_if(&self, path: &str, doc: Document, revision: &Revision) -> Result<bool> {
        let mut root = self.lock()?;
        if revision_of(lookup(&root, path))? != *revision {
            return Ok(false);
        }
        assign(&mut root, path, doc);
        self.notify(&root, path);
        Ok(true)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let mut root = self.lock()?;
        assign(&mut root, path, Value::Null);
        self.notify(&root, path);
        Ok(())
    }

    async fn watch(&self, path: &str) -> Result<Watch> {
        let root = self.lock()?;
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is still in hand, so this cannot fail.
        let _ = tx.send(lookup(&root, path).cloned());
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.watchers.insert(id, Watcher { path: path.into(), tx });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStore, Store};
    use serde_json::json;

    #[tokio::test(flavor = "current_thread")]
    async fn nested_paths_behave_like_a_tree() {
        let store = MemoryStore::default();
        assert!(store.read("voters/alice").await.unwrap().is_none());

        store.write("voters/alice", json!({ "votedFor": 1 })).await.unwrap();
        store.write("voters/bob", json!({ "votedFor": 2 })).await.unwrap();
        assert_eq!(store.read("voters/alice").await.unwrap(), Some(json!({ "votedFor": 1 })));
        assert_eq!(
            store.read("voters").await.unwrap(),
            Some(json!({ "alice": { "votedFor": 1 }, "bob": { "votedFor": 2 } }))
        );

        store.remove("voters/alice").await.unwrap();
        assert_eq!(store.read("voters").await.unwrap(), Some(json!({ "bob": { "votedFor": 2 } })));

        store.remove("voters").await.unwrap();
        assert!(store.read("voters/bob").await.unwrap().is_none());
        assert!(store.read("voters").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn writing_null_deletes_and_prunes_parents() {
        let store = MemoryStore::default();
        store.write("a/b/c", json!(1)).await.unwrap();
        store.write("a/b/c", serde_json::Value::Null).await.unwrap();
        assert!(store.read("a").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn conditional_writes_detect_interference() {
        let store = MemoryStore::default();
        let (doc, stale) = store.read_with_revision("pollData").await.unwrap();
        assert!(doc.is_none());

        store.write("pollData", json!({ "title": "first" })).await.unwrap();
        assert!(!store.write_if("pollData", json!({ "title": "lost" }), &stale).await.unwrap());

        let (doc, fresh) = store.read_with_revision("pollData").await.unwrap();
        assert_eq!(doc, Some(json!({ "title": "first" })));
        assert!(store.write_if("pollData", json!({ "title": "second" }), &fresh).await.unwrap());
        assert_eq!(store.read("pollData").await.unwrap(), Some(json!({ "title": "second" })));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn watchers_see_every_change_in_order() {
        let store = MemoryStore::default();
        store.write("pollData", json!({ "title": "zero" })).await.unwrap();

        let mut watch = store.watch("pollData").await.unwrap();
        assert_eq!(watch.recv().await.unwrap(), Some(json!({ "title": "zero" })));

        store.write("pollData", json!({ "title": "one" })).await.unwrap();
        store.write("voters/alice", json!({ "votedFor": 1 })).await.unwrap();
        store.write("pollData", json!({ "title": "two" })).await.unwrap();
        store.remove("pollData").await.unwrap();

        assert_eq!(watch.recv().await.unwrap(), Some(json!({ "title": "one" })));
        assert_eq!(watch.recv().await.unwrap(), Some(json!({ "title": "two" })));
        assert_eq!(watch.recv().await.unwrap(), None);
        assert!(watch.try_recv().is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn parent_deletions_reach_child_watchers() {
        let store = MemoryStore::default();
        store.write("voters/alice", json!({ "votedFor": 1 })).await.unwrap();

        let mut watch = store.watch("voters/alice").await.unwrap();
        assert!(watch.recv().await.unwrap().is_some());

        store.remove("voters").await.unwrap();
        assert_eq!(watch.recv().await.unwrap(), None);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn dropped_watchers_are_forgotten() {
        let store = MemoryStore::default();
        let watch = store.watch("pollData").await.unwrap();
        assert_eq!(store.watchers(), 1);

        drop(watch);
        store.write("pollData", json!({ "title": "x" })).await.unwrap();
        assert_eq!(store.watchers(), 0);
    }
}
