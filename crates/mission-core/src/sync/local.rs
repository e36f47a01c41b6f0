use std::marker::PhantomData;
use std::sync::Arc;

use mission_model::{SidebarLayout, new_record_id};
use tracing::{debug, info};

use super::{CollectionSync, Mutation, SettingsSync, SkipReason};
use crate::error::Result;
use crate::kv::KvBinding;
use crate::record::Record;
use crate::state::{DashboardState, StateCell, slice};

/// Reads every persisted slice, falling back to defaults slice by slice.
#[tracing::instrument(skip(kv))]
pub fn load_state(kv: &KvBinding) -> DashboardState {
    let state = DashboardState {
        missions: kv.load(slice::TASKS, Vec::new()),
        todos: kv.load(slice::TODOS, Vec::new()),
        quick_links: kv.load(slice::QUICK_LINKS, Vec::new()),
        important_dates: kv.load(slice::IMPORTANT_DATES, Vec::new()),
        notes: kv.load(slice::NOTES, String::new()),
        layout: load_layout(kv),
    };
    info!(
        missions = state.missions.len(),
        todos = state.todos.len(),
        quick_links = state.quick_links.len(),
        important_dates = state.important_dates.len(),
        "loaded local state"
    );
    state
}

fn load_layout(kv: &KvBinding) -> SidebarLayout {
    let layout: SidebarLayout = kv.load(slice::SIDEBAR_LAYOUT, SidebarLayout::default());
    if layout.is_complete() {
        layout
    } else {
        debug!("stored layout incomplete; using default");
        SidebarLayout::default()
    }
}

/// Single-user strategy: synchronous, durable on return, no permission check.
pub struct LocalBacked<T> {
    state: Arc<StateCell>,
    kv: KvBinding,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> LocalBacked<T> {
    pub fn new(state: Arc<StateCell>, kv: KvBinding) -> Self {
        Self {
            state,
            kv,
            _record: PhantomData,
        }
    }

    fn persist(&self, state: &DashboardState) {
        self.kv.save(T::SLICE, T::slot(state));
    }
}

impl<T: Record> CollectionSync<T> for LocalBacked<T> {
    fn get(&self, id: &str) -> Option<T> {
        T::slot(&self.state.read())
            .iter()
            .find(|record| record.id() == id)
            .cloned()
    }

    #[tracing::instrument(skip(self, draft), fields(slice = T::SLICE))]
    fn create(&self, draft: T::Draft) -> Result<Mutation<T>> {
        T::validate_draft(&draft)?;
        let record = T::from_draft(new_record_id(), draft);

        self.state.write(|state| {
            T::slot_mut(state).push(record.clone());
            self.persist(state);
        });
        info!(id = record.id(), "created");
        Ok(Mutation::Committed(record))
    }

    #[tracing::instrument(skip(self, patch), fields(slice = T::SLICE))]
    fn update(&self, id: &str, patch: T::Patch) -> Result<Mutation<()>> {
        T::validate_patch(&patch)?;
        if self.get(id).is_none() {
            return Ok(Mutation::Skipped(SkipReason::NotFound));
        }

        self.state.write(|state| {
            if let Some(record) = T::slot_mut(state).iter_mut().find(|r| r.id() == id) {
                record.apply_patch(patch);
            }
            self.persist(state);
        });
        debug!("updated");
        Ok(Mutation::Committed(()))
    }

    #[tracing::instrument(skip(self), fields(slice = T::SLICE))]
    fn delete(&self, id: &str) -> Result<Mutation<()>> {
        if self.get(id).is_none() {
            return Ok(Mutation::Skipped(SkipReason::NotFound));
        }

        self.state.write(|state| {
            T::slot_mut(state).retain(|record| record.id() != id);
            self.persist(state);
        });
        info!("deleted");
        Ok(Mutation::Committed(()))
    }
}

pub struct LocalSettings {
    state: Arc<StateCell>,
    kv: KvBinding,
}

impl LocalSettings {
    pub fn new(state: Arc<StateCell>, kv: KvBinding) -> Self {
        Self { state, kv }
    }
}

impl SettingsSync for LocalSettings {
    fn set_notes(&self, notes: String) -> Result<Mutation<()>> {
        self.state.write(|state| {
            state.notes = notes;
            self.kv.save(slice::NOTES, &state.notes);
        });
        Ok(Mutation::Committed(()))
    }

    fn set_layout(&self, layout: SidebarLayout) -> Result<Mutation<()>> {
        layout.validate()?;
        self.state.write(|state| {
            state.layout = layout;
            self.kv.save(slice::SIDEBAR_LAYOUT, &state.layout);
        });
        Ok(Mutation::Committed(()))
    }
}
