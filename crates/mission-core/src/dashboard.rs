//! The UI-facing aggregate: one reconciled state and one mutation API,
//! backed either by local key-value storage or a shared document store.

use std::sync::Arc;

use chrono::NaiveDate;
use mission_model::{
    Column, DEFAULT_PINNED_TAG, ImportantDate, Mission, PanelKey, QuickLink, SidebarLayout, Slot,
    Todo, TodoDraft,
};
use parking_lot::RwLockReadGuard;
use tokio::sync::watch;
use tracing::info;

use crate::error::{DashboardError, Result};
use crate::kv::{DEFAULT_NAMESPACE, KvBinding};
use crate::role::RoleResolver;
use crate::state::{Completion, DashboardState, StateCell, slice};
use crate::store::DocumentStore;
use crate::sync::{
    CollectionSync, ListenerGuard, LocalBacked, LocalSettings, Mutation, RemoteBacked,
    RemoteSettings, SettingsSync, SharedContext, SkipReason, load_state, toggle_complete,
};
use crate::transfer::{self, ImportOutcome, ImportReport, Snapshot};

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    /// Remote collection prefix in shared mode.
    pub namespace: String,
    pub pinned_tag: String,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            pinned_tag: DEFAULT_PINNED_TAG.to_string(),
        }
    }
}

enum Backing {
    Local {
        kv: KvBinding,
    },
    Shared {
        roles: Arc<RoleResolver>,
        _listeners: ListenerGuard,
    },
}

pub struct Dashboard {
    state: Arc<StateCell>,
    missions: Box<dyn CollectionSync<Mission>>,
    todos: Box<dyn CollectionSync<Todo>>,
    quick_links: Box<dyn CollectionSync<QuickLink>>,
    important_dates: Box<dyn CollectionSync<ImportantDate>>,
    settings: Box<dyn SettingsSync>,
    pinned_tag: String,
    backing: Backing,
}

impl Dashboard {
    /// Loads every slice from `kv`; mutations write straight back to it.
    pub fn open_local(kv: KvBinding, options: DashboardOptions) -> Self {
        let state = Arc::new(StateCell::new(load_state(&kv)));
        Self {
            missions: Box::new(LocalBacked::<Mission>::new(state.clone(), kv.clone())),
            todos: Box::new(LocalBacked::<Todo>::new(state.clone(), kv.clone())),
            quick_links: Box::new(LocalBacked::<QuickLink>::new(state.clone(), kv.clone())),
            important_dates: Box::new(LocalBacked::<ImportantDate>::new(
                state.clone(),
                kv.clone(),
            )),
            settings: Box::new(LocalSettings::new(state.clone(), kv.clone())),
            state,
            pinned_tag: options.pinned_tag,
            backing: Backing::Local { kv },
        }
    }

    /// Subscribes to every shared collection and the settings document.
    /// Must run inside a tokio runtime.
    #[tracing::instrument(skip(store, roles, options), fields(namespace = %options.namespace))]
    pub fn connect_shared(
        store: Arc<dyn DocumentStore>,
        roles: Arc<RoleResolver>,
        options: DashboardOptions,
    ) -> Result<Self> {
        let state = Arc::new(StateCell::new(DashboardState::default()));
        let ctx = SharedContext::new(store, state.clone(), roles.clone(), options.namespace)?;

        let mut listeners = ListenerGuard::new();
        listeners.push(ctx.listen_collection::<Mission>());
        listeners.push(ctx.listen_collection::<Todo>());
        listeners.push(ctx.listen_collection::<QuickLink>());
        listeners.push(ctx.listen_collection::<ImportantDate>());
        listeners.push(ctx.listen_settings());
        info!(listeners = listeners.len(), "shared dashboard connected");

        Ok(Self {
            missions: Box::new(RemoteBacked::<Mission>::new(ctx.clone())),
            todos: Box::new(RemoteBacked::<Todo>::new(ctx.clone())),
            quick_links: Box::new(RemoteBacked::<QuickLink>::new(ctx.clone())),
            important_dates: Box::new(RemoteBacked::<ImportantDate>::new(ctx.clone())),
            settings: Box::new(RemoteSettings::new(ctx)),
            state,
            pinned_tag: options.pinned_tag,
            backing: Backing::Shared {
                roles,
                _listeners: listeners,
            },
        })
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.backing, Backing::Shared { .. })
    }

    pub fn can_edit(&self) -> bool {
        match &self.backing {
            Backing::Local { .. } => true,
            Backing::Shared { roles, .. } => roles.can_edit(),
        }
    }

    pub fn pinned_tag(&self) -> &str {
        &self.pinned_tag
    }

    pub fn state(&self) -> RwLockReadGuard<'_, DashboardState> {
        self.state.read()
    }

    pub fn snapshot(&self) -> DashboardState {
        self.state.snapshot()
    }

    pub fn revision(&self) -> u64 {
        self.state.revision()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.state.subscribe()
    }

    /// Resolves once `ready` holds for the reconciled state.
    pub async fn wait_until(&self, ready: impl Fn(&DashboardState) -> bool) {
        let mut revisions = self.subscribe();
        loop {
            if ready(&self.state.read()) {
                return;
            }
            if revisions.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn missions(&self) -> &dyn CollectionSync<Mission> {
        self.missions.as_ref()
    }

    pub fn todos(&self) -> &dyn CollectionSync<Todo> {
        self.todos.as_ref()
    }

    pub fn quick_links(&self) -> &dyn CollectionSync<QuickLink> {
        self.quick_links.as_ref()
    }

    pub fn important_dates(&self) -> &dyn CollectionSync<ImportantDate> {
        self.important_dates.as_ref()
    }

    pub fn toggle_mission(&self, id: &str) -> Result<Mutation<()>> {
        toggle_complete(self.missions(), id)
    }

    pub fn toggle_todo(&self, id: &str) -> Result<Mutation<()>> {
        toggle_complete(self.todos(), id)
    }

    pub fn add_todo(&self, text: &str) -> Result<Mutation<Todo>> {
        self.todos.create(TodoDraft {
            text: text.trim().to_string(),
        })
    }

    pub fn set_notes(&self, notes: impl Into<String>) -> Result<Mutation<()>> {
        self.settings.set_notes(notes.into())
    }

    pub fn set_layout(&self, layout: SidebarLayout) -> Result<Mutation<()>> {
        self.settings.set_layout(layout)
    }

    /// Drag-reorder of one sidebar panel.
    pub fn move_panel(&self, from: Slot, to: Slot) -> Result<Mutation<()>> {
        let moved = self.state.read().layout.moved(from, to);
        match moved {
            Some(layout) => self.settings.set_layout(layout),
            None => Ok(Mutation::Skipped(SkipReason::NotFound)),
        }
    }

    pub fn mission_progress(&self) -> Completion {
        self.state.read().mission_progress()
    }

    pub fn todo_progress(&self) -> Completion {
        self.state.read().todo_progress()
    }

    pub fn pinned(&self) -> Vec<Mission> {
        self.state
            .read()
            .pinned(&self.pinned_tag)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn upcoming_dates(&self, today: NaiveDate) -> Vec<ImportantDate> {
        self.state
            .read()
            .upcoming_dates(today)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn visible_panels(&self, column: Column) -> Vec<PanelKey> {
        self.state.read().visible_panels(column, &self.pinned_tag)
    }

    fn local_kv(&self, operation: &'static str) -> Result<&KvBinding> {
        match &self.backing {
            Backing::Local { kv } => Ok(kv),
            Backing::Shared { .. } => Err(DashboardError::LocalOnly(operation)),
        }
    }

    pub fn export(&self) -> Result<Snapshot> {
        self.local_kv("export")?;
        Ok(Snapshot::from(&*self.state.read()))
    }

    pub fn export_json(&self) -> Result<String> {
        self.local_kv("export")?;
        transfer::export_json(&self.state.read())
    }

    /// Replaces the whole dashboard with a backup document once `confirm`
    /// accepts the parsed report. Every slice is persisted afterwards.
    #[tracing::instrument(skip_all, fields(bytes = raw.len()))]
    pub fn import(
        &self,
        raw: &str,
        confirm: impl FnOnce(&ImportReport) -> bool,
    ) -> Result<ImportOutcome> {
        let kv = self.local_kv("import")?;
        let report = transfer::parse_backup(raw)?;
        if !confirm(&report) {
            info!("import declined");
            return Ok(ImportOutcome::Declined);
        }

        let replacement = DashboardState::from(report.snapshot.clone());
        self.state.write(|state| {
            *state = replacement;
            kv.save(slice::TASKS, &state.missions);
            kv.save(slice::TODOS, &state.todos);
            kv.save(slice::NOTES, &state.notes);
            kv.save(slice::QUICK_LINKS, &state.quick_links);
            kv.save(slice::IMPORTANT_DATES, &state.important_dates);
            kv.save(slice::SIDEBAR_LAYOUT, &state.layout);
        });
        info!(issues = report.issues.len(), "import applied");
        Ok(ImportOutcome::Applied(report))
    }
}
