use crate::{
    error::{Error, Result},
    store::{Document, Revision, Store, Watch},
};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{
    header::{ACCEPT, ETAG, IF_MATCH},
    Client, Response, StatusCode, Url,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Client for a Firebase Realtime Database over its REST interface.
#[derive(Clone)]
pub struct FirebaseStore {
    client: Client,
    /// Database root, e.g. `https://example-default-rtdb.firebaseio.com` or the emulator's
    /// `http://127.0.0.1:9000?ns=<db>`.
    base: Arc<Url>,
    /// Database secret or ID token passed as the `auth` query parameter.
    auth: Option<Arc<str>>,
}

fn check(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    log::error!("remote store answered {status} for {}", res.url().path());
    Err(Error::Unavailable)
}

impl FirebaseStore {
    pub fn new(base: &str, auth: Option<&str>) -> Result<Self> {
        let base = Url::parse(base).map_err(|err| {
            log::error!("invalid database url {base}: {err}");
            Error::BadUrl
        })?;
        if base.cannot_be_a_base() {
            log::error!("database url {base} cannot hold a path");
            return Err(Error::BadUrl);
        }
        let client = Client::builder().build()?;
        Ok(Self { client, base: Arc::new(base), auth: auth.map(Into::into) })
    }

    /// REST endpoint of a document. Segments are percent-encoded and the base's query is kept.
    fn endpoint(&self, path: &str) -> Url {
        let mut url = Url::clone(&self.base);
        let segments: Vec<_> = path.split('/').filter(|seg| !seg.is_empty()).collect();
        if let Ok(mut dest) = url.path_segments_mut() {
            dest.pop_if_empty();
            match segments.split_last() {
                Some((last, parents)) => {
                    dest.extend(parents);
                    dest.push(&format!("{last}.json"));
                }
                None => {
                    dest.push(".json");
                }
            }
        }
        if let Some(auth) = self.auth.as_deref() {
            url.query_pairs_mut().append_pair("auth", auth);
        }
        url
    }
}

#[async_trait]
impl Store for FirebaseStore {
    async fn read(&self, path: &str) -> Result<Option<Document>> {
        let res = check(self.client.get(self.endpoint(path)).send().await?)?;
        let doc: Document = res.json().await?;
        Ok(Some(doc).filter(|doc| !doc.is_null()))
    }

    async fn read_with_revision(&self, path: &str) -> Result<(Option<Document>, Revision)> {
        let res = check(self.client.get(self.endpoint(path)).header("X-Firebase-ETag", "true").send().await?)?;
        let tag = res.headers().get(ETAG).and_then(|tag| tag.to_str().ok()).ok_or(Error::Unavailable)?;
        let revision = Revision::new(tag);
        let doc: Document = res.json().await?;
        Ok((Some(doc).filter(|doc| !doc.is_null()), revision))
    }

    async fn write(&self, path: &str, doc: Document) -> Result<()> {
        check(self.client.put(self.endpoint(path)).json(&doc).send().await?)?;
        Ok(())
    }

    async fn write_if(&self, path: &str, doc: Document, revision: &Revision) -> Result<bool> {
        let res = self.client.put(self.endpoint(path)).header(IF_MATCH, revision.as_str()).json(&doc).send().await?;
        if res.status() == StatusCode::PRECONDITION_FAILED {
            return Ok(false);
        }
        check(res)?;
        Ok(true)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        check(self.client.delete(self.endpoint(path)).send().await?)?;
        Ok(())
    }

    async fn watch(&self, path: &str) -> Result<Watch> {
        let res = check(self.client.get(self.endpoint(path)).header(ACCEPT, "text/event-stream").send().await?)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let store = self.clone();
        let path: Box<str> = path.into();

        // Event payloads may describe a partial update, so every change triggers a fresh read of
        // the whole document instead.
        tokio::spawn(async move {
            let mut events = EventParser::default();
            let mut body = res.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        log::warn!("change stream for {path} broke off: {err}");
                        return;
                    }
                };

                for event in events.feed(&chunk) {
                    match &*event {
                        "put" | "patch" => {
                            let Ok(doc) = store.read(&path).await else {
                                return;
                            };
                            if tx.send(doc).is_err() {
                                return;
                            }
                        }
                        "cancel" | "auth_revoked" => {
                            log::warn!("change stream for {path} was closed by the server ({event})");
                            return;
                        }
                        _ => {}
                    }
                }

                if tx.is_closed() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}

/// Incremental parser for `text/event-stream` bodies. Only event names matter here.
#[derive(Default)]
struct EventParser {
    buffer: Vec<u8>,
    event: Option<Box<str>>,
}

impl EventParser {
    /// Consumes a chunk of the stream and returns the names of the events it completed.
    fn feed(&mut self, chunk: &[u8]) -> Vec<Box<str>> {
        self.buffer.extend_from_slice(chunk);
        let mut done = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&byte| byte == b'\n') {
            let line: Vec<_> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
            if line.is_empty() {
                done.extend(self.event.take());
            } else if let Some(name) = line.strip_prefix("event:") {
                self.event = Some(name.trim().into());
            }
        }
        done
    }
}
