use std::marker::PhantomData;
use std::sync::Arc;

use mission_model::{SidebarLayout, new_record_id};
use serde::Serialize;
use serde::ser::Error as _;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CollectionSync, Mutation, SettingsSync, SkipReason, WriteAck};
use crate::error::{DashboardError, Result};
use crate::record::Record;
use crate::role::RoleResolver;
use crate::state::{DashboardState, StateCell};
use crate::store::{DocPath, Document, DocumentStore, Fields, StoreResult};

pub const SETTINGS_DOCUMENT: &str = "dashboard";
pub const NOTES_FIELD: &str = "notes";
pub const SIDEBAR_LAYOUT_FIELD: &str = "sidebarLayout";

enum WriteOp {
    Set(Fields),
    Update(Fields),
    Merge(Fields),
    Delete,
}

struct WriteJob {
    path: DocPath,
    op: WriteOp,
    reply: oneshot::Sender<StoreResult<()>>,
}

/// Everything the remote strategies share: the store connection, the cache
/// they reconcile into, the caller's role and the queue feeding the single
/// writer task.
#[derive(Clone)]
pub struct SharedContext {
    store: Arc<dyn DocumentStore>,
    state: Arc<StateCell>,
    roles: Arc<RoleResolver>,
    namespace: String,
    runtime: Handle,
    writes: mpsc::UnboundedSender<WriteJob>,
}

impl SharedContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        state: Arc<StateCell>,
        roles: Arc<RoleResolver>,
        namespace: impl Into<String>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|err| {
            DashboardError::RemoteUnavailable(format!("no async runtime: {err}"))
        })?;
        let (writes, queue) = mpsc::unbounded_channel();
        runtime.spawn(drain_writes(Arc::clone(&store), queue));
        Ok(Self {
            store,
            state,
            roles,
            namespace: namespace.into(),
            runtime,
            writes,
        })
    }

    pub fn collection(&self, name: &str) -> String {
        format!("{}/{name}", self.namespace)
    }

    pub fn settings_path(&self) -> DocPath {
        DocPath::new(self.collection("settings"), SETTINGS_DOCUMENT)
    }

    pub fn can_edit(&self) -> bool {
        self.roles.can_edit()
    }

    /// Queues a write behind every earlier one from this context.
    fn send(&self, path: DocPath, op: WriteOp) -> WriteAck {
        let (reply, ack) = oneshot::channel();
        if let Err(mpsc::error::SendError(job)) = self.writes.send(WriteJob { path, op, reply }) {
            warn!(path = %job.path, "writer stopped; dropping write");
        }
        WriteAck::new(ack)
    }

    /// Replaces the cached `T` collection with every pushed snapshot.
    pub(crate) fn listen_collection<T: Record>(&self) -> JoinHandle<()> {
        let collection = self.collection(T::SLICE);
        let mut feed = self.store.subscribe_collection(&collection);
        let state = Arc::clone(&self.state);

        self.runtime.spawn(async move {
            loop {
                let documents = feed.borrow_and_update().clone();
                let records: Vec<T> = documents.iter().filter_map(decode_document::<T>).collect();
                debug!(collection = %collection, count = records.len(), "collection snapshot");
                state.write(|cache| *T::slot_mut(cache) = records);

                if feed.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Applies the settings document unconditionally, optimistic values
    /// included.
    pub(crate) fn listen_settings(&self) -> JoinHandle<()> {
        let path = self.settings_path();
        let mut feed = self.store.subscribe_document(&path);
        let state = Arc::clone(&self.state);

        self.runtime.spawn(async move {
            loop {
                let snapshot = feed.borrow_and_update().clone();
                if let Some(document) = snapshot {
                    state.write(|cache| apply_settings(cache, &document.fields));
                }

                if feed.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

/// Runs queued writes one at a time until every sender is gone. A write
/// that stalls holds back the ones behind it.
async fn drain_writes(store: Arc<dyn DocumentStore>, mut queue: mpsc::UnboundedReceiver<WriteJob>) {
    while let Some(WriteJob { path, op, reply }) = queue.recv().await {
        debug!(path = %path, "sending write");
        let outcome = match op {
            WriteOp::Set(fields) => store.set(&path, fields).await,
            WriteOp::Update(fields) => store.update(&path, fields).await,
            WriteOp::Merge(fields) => store.merge(&path, fields).await,
            WriteOp::Delete => store.delete(&path).await,
        };
        match &outcome {
            Ok(()) => debug!(path = %path, "store committed write"),
            Err(err) => warn!(path = %path, error = %err, "store rejected write"),
        }
        // The caller may have stopped waiting.
        let _ = reply.send(outcome);
    }
    debug!("write queue closed");
}

fn apply_settings(state: &mut DashboardState, fields: &Fields) {
    if let Some(notes) = fields.get(NOTES_FIELD).and_then(Value::as_str) {
        state.notes = notes.to_string();
    }

    let Some(raw) = fields.get(SIDEBAR_LAYOUT_FIELD) else {
        return;
    };
    match serde_json::from_value::<SidebarLayout>(raw.clone()) {
        Ok(layout) if layout.is_complete() => state.layout = layout,
        Ok(_) => warn!("ignoring incomplete sidebar layout from store"),
        Err(err) => warn!(error = %err, "ignoring undecodable sidebar layout from store"),
    }
}

/// Record fields without the id; the id is the document id.
pub fn encode_record<T: Record>(record: &T) -> Result<Fields> {
    let mut fields = to_fields(record)?;
    fields.remove("id");
    Ok(fields)
}

fn to_fields<S: Serialize + ?Sized>(value: &S) -> Result<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(serde_json::Error::custom(format!("expected an object, got {other}")).into()),
    }
}

/// `None` (with a warning) when the document does not decode as `T`.
pub fn decode_document<T: Record>(document: &Document) -> Option<T> {
    let mut fields = document.fields.clone();
    fields.insert("id".to_string(), Value::String(document.id.clone()));

    match serde_json::from_value(Value::Object(fields)) {
        Ok(record) => Some(record),
        Err(err) => {
            warn!(id = %document.id, slice = T::SLICE, error = %err, "skipping undecodable document");
            None
        }
    }
}

/// Shared strategy: role gated, asynchronous, cache updated by the
/// subscription only.
pub struct RemoteBacked<T> {
    ctx: SharedContext,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> RemoteBacked<T> {
    pub fn new(ctx: SharedContext) -> Self {
        Self {
            ctx,
            _record: PhantomData,
        }
    }

    fn path(&self, id: &str) -> DocPath {
        DocPath::new(self.ctx.collection(T::SLICE), id)
    }
}

impl<T: Record> CollectionSync<T> for RemoteBacked<T> {
    fn get(&self, id: &str) -> Option<T> {
        T::slot(&self.ctx.state.read())
            .iter()
            .find(|record| record.id() == id)
            .cloned()
    }

    #[tracing::instrument(skip(self, draft), fields(slice = T::SLICE))]
    fn create(&self, draft: T::Draft) -> Result<Mutation<T>> {
        if !self.ctx.can_edit() {
            debug!("create skipped: read-only role");
            return Ok(Mutation::Skipped(SkipReason::PermissionDenied));
        }
        T::validate_draft(&draft)?;

        let record = T::from_draft(new_record_id(), draft);
        let fields = encode_record(&record)?;
        let ack = self.ctx.send(self.path(record.id()), WriteOp::Set(fields));

        info!(id = record.id(), "create sent");
        Ok(Mutation::Pending { value: record, ack })
    }

    #[tracing::instrument(skip(self, patch), fields(slice = T::SLICE))]
    fn update(&self, id: &str, patch: T::Patch) -> Result<Mutation<()>> {
        if !self.ctx.can_edit() {
            debug!("update skipped: read-only role");
            return Ok(Mutation::Skipped(SkipReason::PermissionDenied));
        }
        T::validate_patch(&patch)?;

        let fields = to_fields(&patch)?;
        let ack = self.ctx.send(self.path(id), WriteOp::Update(fields));
        Ok(Mutation::Pending { value: (), ack })
    }

    #[tracing::instrument(skip(self), fields(slice = T::SLICE))]
    fn delete(&self, id: &str) -> Result<Mutation<()>> {
        if !self.ctx.can_edit() {
            debug!("delete skipped: read-only role");
            return Ok(Mutation::Skipped(SkipReason::PermissionDenied));
        }

        let ack = self.ctx.send(self.path(id), WriteOp::Delete);
        info!("delete sent");
        Ok(Mutation::Pending { value: (), ack })
    }
}

/// Notes and layout: apply to the cache first, then merge into the
/// settings document. The next snapshot wins either way.
pub struct RemoteSettings {
    ctx: SharedContext,
}

impl RemoteSettings {
    pub fn new(ctx: SharedContext) -> Self {
        Self { ctx }
    }

    fn optimistic(
        &self,
        apply: impl FnOnce(&mut DashboardState),
        field: &'static str,
        value: Value,
    ) -> Mutation<()> {
        if !self.ctx.can_edit() {
            debug!(field, "settings write skipped: read-only role");
            return Mutation::Skipped(SkipReason::PermissionDenied);
        }

        self.ctx.state.write(apply);

        let mut fields = Fields::new();
        fields.insert(field.to_string(), value);
        let ack = self.ctx.send(self.ctx.settings_path(), WriteOp::Merge(fields));
        Mutation::Pending { value: (), ack }
    }
}

impl SettingsSync for RemoteSettings {
    fn set_notes(&self, notes: String) -> Result<Mutation<()>> {
        let value = Value::String(notes.clone());
        Ok(self.optimistic(|state| state.notes = notes, NOTES_FIELD, value))
    }

    fn set_layout(&self, layout: SidebarLayout) -> Result<Mutation<()>> {
        layout.validate()?;
        let value = serde_json::to_value(&layout)?;
        Ok(self.optimistic(|state| state.layout = layout, SIDEBAR_LAYOUT_FIELD, value))
    }
}

#[cfg(test)]
mod tests {
    use mission_model::{Mission, MissionDraft, Todo};
    use serde_json::json;

    use super::*;

    #[test]
    fn encoded_records_leave_the_id_to_the_document_path() {
        let mission = Mission::from_draft(
            "m-1".to_string(),
            MissionDraft {
                title: "Galxe".to_string(),
                url: "https://galxe.com".to_string(),
                ..MissionDraft::default()
            },
        );
        let fields = encode_record(&mission).expect("encode");
        assert!(!fields.contains_key("id"));
        assert_eq!(fields["title"], json!("Galxe"));
        assert_eq!(fields["isCompleted"], json!(false));
    }

    #[test]
    fn decoding_restores_the_id() {
        let mut fields = Fields::new();
        fields.insert("text".to_string(), json!("claim"));
        fields.insert("isCompleted".to_string(), json!(true));
        let todo: Todo = decode_document(&Document {
            id: "t-9".to_string(),
            fields,
        })
        .expect("decodes");
        assert_eq!(todo.id, "t-9");
        assert!(todo.is_completed);
    }

    #[test]
    fn undecodable_documents_are_skipped() {
        let mut fields = Fields::new();
        fields.insert("text".to_string(), json!(42));
        let decoded: Option<Todo> = decode_document(&Document {
            id: "bad".to_string(),
            fields,
        });
        assert!(decoded.is_none());
    }

    #[test]
    fn settings_snapshot_keeps_fields_it_lacks() {
        let mut state = DashboardState {
            notes: "keep".to_string(),
            ..DashboardState::default()
        };
        let mut fields = Fields::new();
        fields.insert(
            SIDEBAR_LAYOUT_FIELD.to_string(),
            json!({"column1": ["notes"], "column2": []}),
        );
        apply_settings(&mut state, &fields);
        assert_eq!(state.notes, "keep");
        assert_eq!(state.layout, SidebarLayout::default());

        fields.insert(NOTES_FIELD.to_string(), json!("gm"));
        apply_settings(&mut state, &fields);
        assert_eq!(state.notes, "gm");
    }
}
