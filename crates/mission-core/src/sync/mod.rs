//! One mutation API over two storage strategies.
//!
//! [`LocalBacked`] mutates the reconciled state and writes the slice through
//! the key-value binding. [`RemoteBacked`] gates on the caller's role and
//! queues the change for the document store; the cache only changes when the
//! store pushes the next snapshot back. Queued writes commit in the order
//! they were made.

mod local;
mod remote;

use mission_model::SidebarLayout;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{DashboardError, Result};
use crate::record::{Completable, Record};
use crate::store::StoreResult;

pub use local::{LocalBacked, LocalSettings, load_state};
pub use remote::{
    NOTES_FIELD, RemoteBacked, RemoteSettings, SETTINGS_DOCUMENT, SIDEBAR_LAYOUT_FIELD,
    SharedContext, decode_document, encode_record,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    PermissionDenied,
    NotFound,
}

/// Completion handle for a write sent to the document store.
#[derive(Debug)]
pub struct WriteAck(oneshot::Receiver<StoreResult<()>>);

impl WriteAck {
    pub(crate) fn new(reply: oneshot::Receiver<StoreResult<()>>) -> Self {
        Self(reply)
    }

    /// Resolves once the store has committed or rejected the write. While
    /// the store is unreachable this does not resolve.
    pub async fn settled(self) -> Result<()> {
        match self.0.await {
            Ok(outcome) => outcome.map_err(DashboardError::from),
            Err(_) => Err(DashboardError::RemoteUnavailable(
                "write dropped before the store answered".to_string(),
            )),
        }
    }
}

#[derive(Debug)]
pub enum Mutation<T> {
    /// Applied and durable.
    Committed(T),
    /// Sent to the document store; `ack` resolves on commit.
    Pending { value: T, ack: WriteAck },
    Skipped(SkipReason),
}

impl<T> Mutation<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Mutation::Committed(value) | Mutation::Pending { value, .. } => Some(value),
            Mutation::Skipped(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Mutation::Committed(value) | Mutation::Pending { value, .. } => Some(value),
            Mutation::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Mutation::Skipped(reason) => Some(*reason),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Mutation::Skipped(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Mutation::Pending { .. })
    }

    /// Waits for a pending write and returns the value, or `None` when the
    /// mutation was skipped.
    pub async fn settled(self) -> Result<Option<T>> {
        match self {
            Mutation::Committed(value) => Ok(Some(value)),
            Mutation::Pending { value, ack } => {
                ack.settled().await?;
                Ok(Some(value))
            }
            Mutation::Skipped(_) => Ok(None),
        }
    }
}

pub trait CollectionSync<T: Record>: Send + Sync {
    /// Current cached value.
    fn get(&self, id: &str) -> Option<T>;

    /// Assigns a fresh id and adds the record.
    fn create(&self, draft: T::Draft) -> Result<Mutation<T>>;

    fn update(&self, id: &str, patch: T::Patch) -> Result<Mutation<()>>;

    fn delete(&self, id: &str) -> Result<Mutation<()>>;
}

/// Flips `isCompleted` based on the currently known value.
pub fn toggle_complete<T: Completable>(
    sync: &dyn CollectionSync<T>,
    id: &str,
) -> Result<Mutation<()>> {
    let Some(current) = sync.get(id) else {
        return Ok(Mutation::Skipped(SkipReason::NotFound));
    };
    sync.update(id, T::completion_patch(!current.is_completed()))
}

/// Notes and sidebar layout live in one settings document.
pub trait SettingsSync: Send + Sync {
    fn set_notes(&self, notes: String) -> Result<Mutation<()>>;

    fn set_layout(&self, layout: SidebarLayout) -> Result<Mutation<()>>;
}

/// Owns every subscription task of one dashboard and aborts them together.
#[derive(Debug, Default)]
pub struct ListenerGuard {
    tasks: Vec<JoinHandle<()>>,
}

impl ListenerGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
