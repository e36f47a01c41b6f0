//! Remote document store seam used by shared mode.
//!
//! A store holds named collections of JSON documents. Readers subscribe to
//! a whole collection or a single document and receive full snapshots on a
//! `watch` channel every time the store commits a change.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("document {0} does not exist")]
    NotFound(DocPath),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates or overwrites a document.
    async fn set(&self, path: &DocPath, fields: Fields) -> StoreResult<()>;

    /// Merges fields into an existing document.
    async fn update(&self, path: &DocPath, fields: Fields) -> StoreResult<()>;

    /// Merges fields, creating the document when absent.
    async fn merge(&self, path: &DocPath, fields: Fields) -> StoreResult<()>;

    async fn delete(&self, path: &DocPath) -> StoreResult<()>;

    /// Full snapshots of `collection`, ordered by document id.
    fn subscribe_collection(&self, collection: &str) -> watch::Receiver<Vec<Document>>;

    fn subscribe_document(&self, path: &DocPath) -> watch::Receiver<Option<Document>>;
}

#[derive(Default)]
struct Inner {
    collections: BTreeMap<String, BTreeMap<String, Fields>>,
    collection_feeds: HashMap<String, watch::Sender<Vec<Document>>>,
    document_feeds: HashMap<DocPath, watch::Sender<Option<Document>>>,
}

impl Inner {
    fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn document(&self, path: &DocPath) -> Option<Document> {
        self.collections
            .get(&path.collection)
            .and_then(|docs| docs.get(&path.id))
            .map(|fields| Document {
                id: path.id.clone(),
                fields: fields.clone(),
            })
    }

    fn publish(&self, path: &DocPath) {
        if let Some(feed) = self.collection_feeds.get(&path.collection) {
            feed.send_replace(self.snapshot(&path.collection));
        }
        if let Some(feed) = self.document_feeds.get(path) {
            feed.send_replace(self.document(path));
        }
    }
}

/// In-process store with the same push semantics as a hosted document
/// database. Taking it offline parks writes until it comes back.
pub struct MemoryDocumentStore {
    inner: Mutex<Inner>,
    online: watch::Sender<bool>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryDocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDocumentStore")
            .field("online", &*self.online.borrow())
            .finish_non_exhaustive()
    }
}

enum Commit {
    Set(Fields),
    Update(Fields),
    Merge(Fields),
    Delete,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (online, _) = watch::channel(true);
        Self {
            inner: Mutex::new(Inner::default()),
            online,
        }
    }

    pub fn set_online(&self, online: bool) {
        info!(online, "document store connectivity changed");
        self.online.send_replace(online);
    }

    pub fn get(&self, path: &DocPath) -> Option<Document> {
        self.inner.lock().document(path)
    }

    async fn wait_online(&self) -> StoreResult<()> {
        let mut online = self.online.subscribe();
        let reachable = online.wait_for(|up| *up).await.map(|_| ());
        reachable.map_err(|_| StoreError::Unavailable("store shut down".to_string()))
    }

    fn commit(&self, path: &DocPath, commit: Commit) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let docs = inner.collections.entry(path.collection.clone()).or_default();

        match commit {
            Commit::Set(fields) => {
                docs.insert(path.id.clone(), fields);
            }
            Commit::Update(fields) => {
                let existing = docs
                    .get_mut(&path.id)
                    .ok_or_else(|| StoreError::NotFound(path.clone()))?;
                existing.extend(fields);
            }
            Commit::Merge(fields) => {
                docs.entry(path.id.clone()).or_default().extend(fields);
            }
            Commit::Delete => {
                docs.remove(&path.id);
            }
        }

        debug!(path = %path, "committed document change");
        inner.publish(path);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn set(&self, path: &DocPath, fields: Fields) -> StoreResult<()> {
        self.wait_online().await?;
        self.commit(path, Commit::Set(fields))
    }

    async fn update(&self, path: &DocPath, fields: Fields) -> StoreResult<()> {
        self.wait_online().await?;
        self.commit(path, Commit::Update(fields))
    }

    async fn merge(&self, path: &DocPath, fields: Fields) -> StoreResult<()> {
        self.wait_online().await?;
        self.commit(path, Commit::Merge(fields))
    }

    async fn delete(&self, path: &DocPath) -> StoreResult<()> {
        self.wait_online().await?;
        self.commit(path, Commit::Delete)
    }

    fn subscribe_collection(&self, collection: &str) -> watch::Receiver<Vec<Document>> {
        let mut inner = self.inner.lock();
        if let Some(feed) = inner.collection_feeds.get(collection) {
            return feed.subscribe();
        }
        let (feed, rx) = watch::channel(inner.snapshot(collection));
        inner.collection_feeds.insert(collection.to_string(), feed);
        rx
    }

    fn subscribe_document(&self, path: &DocPath) -> watch::Receiver<Option<Document>> {
        let mut inner = self.inner.lock();
        if let Some(feed) = inner.document_feeds.get(path) {
            return feed.subscribe();
        }
        let (feed, rx) = watch::channel(inner.document(path));
        inner.document_feeds.insert(path.clone(), feed);
        rx
    }
}
