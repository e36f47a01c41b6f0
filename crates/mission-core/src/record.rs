use std::fmt::Debug;

use mission_model::{
    ImportantDate, ImportantDateDraft, ImportantDatePatch, Mission, MissionDraft, MissionPatch,
    QuickLink, QuickLinkDraft, QuickLinkPatch, Todo, TodoDraft, TodoPatch, ValidationError,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::state::{DashboardState, slice};

/// A collection member the synchronizers can create, patch and delete.
pub trait Record: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Draft: Debug + Send + 'static;
    type Patch: Debug + Clone + Serialize + Send + 'static;

    /// Slice key locally, collection name remotely.
    const SLICE: &'static str;

    fn id(&self) -> &str;
    fn validate_draft(draft: &Self::Draft) -> Result<(), ValidationError>;
    fn validate_patch(patch: &Self::Patch) -> Result<(), ValidationError>;
    fn from_draft(id: String, draft: Self::Draft) -> Self;
    fn apply_patch(&mut self, patch: Self::Patch);

    fn slot(state: &DashboardState) -> &Vec<Self>;
    fn slot_mut(state: &mut DashboardState) -> &mut Vec<Self>;
}

pub trait Completable: Record {
    fn is_completed(&self) -> bool;
    fn completion_patch(done: bool) -> Self::Patch;
}

impl Record for Mission {
    type Draft = MissionDraft;
    type Patch = MissionPatch;

    const SLICE: &'static str = slice::TASKS;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate_draft(draft: &MissionDraft) -> Result<(), ValidationError> {
        draft.validate()
    }

    fn validate_patch(patch: &MissionPatch) -> Result<(), ValidationError> {
        patch.validate()
    }

    fn from_draft(id: String, draft: MissionDraft) -> Self {
        Mission::from_draft(id, draft)
    }

    fn apply_patch(&mut self, patch: MissionPatch) {
        self.apply(patch);
    }

    fn slot(state: &DashboardState) -> &Vec<Self> {
        &state.missions
    }

    fn slot_mut(state: &mut DashboardState) -> &mut Vec<Self> {
        &mut state.missions
    }
}

impl Completable for Mission {
    fn is_completed(&self) -> bool {
        self.is_completed
    }

    fn completion_patch(done: bool) -> MissionPatch {
        MissionPatch::completion(done)
    }
}

impl Record for Todo {
    type Draft = TodoDraft;
    type Patch = TodoPatch;

    const SLICE: &'static str = slice::TODOS;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate_draft(draft: &TodoDraft) -> Result<(), ValidationError> {
        draft.validate()
    }

    fn validate_patch(patch: &TodoPatch) -> Result<(), ValidationError> {
        patch.validate()
    }

    fn from_draft(id: String, draft: TodoDraft) -> Self {
        Todo::from_draft(id, draft)
    }

    fn apply_patch(&mut self, patch: TodoPatch) {
        self.apply(patch);
    }

    fn slot(state: &DashboardState) -> &Vec<Self> {
        &state.todos
    }

    fn slot_mut(state: &mut DashboardState) -> &mut Vec<Self> {
        &mut state.todos
    }
}

impl Completable for Todo {
    fn is_completed(&self) -> bool {
        self.is_completed
    }

    fn completion_patch(done: bool) -> TodoPatch {
        TodoPatch::completion(done)
    }
}

impl Record for QuickLink {
    type Draft = QuickLinkDraft;
    type Patch = QuickLinkPatch;

    const SLICE: &'static str = slice::QUICK_LINKS;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate_draft(draft: &QuickLinkDraft) -> Result<(), ValidationError> {
        draft.validate()
    }

    fn validate_patch(patch: &QuickLinkPatch) -> Result<(), ValidationError> {
        patch.validate()
    }

    fn from_draft(id: String, draft: QuickLinkDraft) -> Self {
        QuickLink::from_draft(id, draft)
    }

    fn apply_patch(&mut self, patch: QuickLinkPatch) {
        self.apply(patch);
    }

    fn slot(state: &DashboardState) -> &Vec<Self> {
        &state.quick_links
    }

    fn slot_mut(state: &mut DashboardState) -> &mut Vec<Self> {
        &mut state.quick_links
    }
}

impl Record for ImportantDate {
    type Draft = ImportantDateDraft;
    type Patch = ImportantDatePatch;

    const SLICE: &'static str = slice::IMPORTANT_DATES;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate_draft(draft: &ImportantDateDraft) -> Result<(), ValidationError> {
        draft.validate()
    }

    fn validate_patch(patch: &ImportantDatePatch) -> Result<(), ValidationError> {
        patch.validate()
    }

    fn from_draft(id: String, draft: ImportantDateDraft) -> Self {
        ImportantDate::from_draft(id, draft)
    }

    fn apply_patch(&mut self, patch: ImportantDatePatch) {
        self.apply(patch);
    }

    fn slot(state: &DashboardState) -> &Vec<Self> {
        &state.important_dates
    }

    fn slot_mut(state: &mut DashboardState) -> &mut Vec<Self> {
        &mut state.important_dates
    }
}
