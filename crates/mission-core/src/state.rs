use std::fmt;

use chrono::NaiveDate;
use mission_model::{Column, ImportantDate, Mission, PanelKey, QuickLink, SidebarLayout, Todo};
use parking_lot::{RwLock, RwLockReadGuard};
use tokio::sync::watch;

/// Key names shared by the persisted slices, the backup document and the
/// remote collections.
pub mod slice {
    pub const TASKS: &str = "tasks";
    pub const TODOS: &str = "todos";
    pub const NOTES: &str = "notes";
    pub const QUICK_LINKS: &str = "quickLinks";
    pub const IMPORTANT_DATES: &str = "importantDates";
    pub const SIDEBAR_LAYOUT: &str = "sidebarLayout";
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardState {
    pub missions: Vec<Mission>,
    pub todos: Vec<Todo>,
    pub quick_links: Vec<QuickLink>,
    pub important_dates: Vec<ImportantDate>,
    pub notes: String,
    pub layout: SidebarLayout,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Completion {
    pub completed: usize,
    pub total: usize,
}

impl Completion {
    fn tally(flags: impl Iterator<Item = bool>) -> Self {
        flags.fold(Self::default(), |acc, done| Self {
            completed: acc.completed + usize::from(done),
            total: acc.total + 1,
        })
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} completed", self.completed, self.total)
    }
}

impl DashboardState {
    pub fn mission_progress(&self) -> Completion {
        Completion::tally(self.missions.iter().map(|m| m.is_completed))
    }

    pub fn todo_progress(&self) -> Completion {
        Completion::tally(self.todos.iter().map(|t| t.is_completed))
    }

    /// Open missions before completed ones, otherwise insertion order.
    pub fn missions_open_first(&self) -> Vec<&Mission> {
        let mut missions: Vec<&Mission> = self.missions.iter().collect();
        missions.sort_by_key(|m| m.is_completed);
        missions
    }

    /// Missions tagged `tag`, open ones first.
    pub fn pinned(&self, tag: &str) -> Vec<&Mission> {
        self.missions_open_first()
            .into_iter()
            .filter(|m| m.has_tag(tag))
            .collect()
    }

    /// Dates on or after `today`, earliest first. Past entries stay stored.
    pub fn upcoming_dates(&self, today: NaiveDate) -> Vec<&ImportantDate> {
        let mut upcoming: Vec<&ImportantDate> = self
            .important_dates
            .iter()
            .filter(|d| d.date >= today)
            .collect();
        upcoming.sort_by_key(|d| d.date);
        upcoming
    }

    pub fn todos_open_first(&self) -> Vec<&Todo> {
        let mut todos: Vec<&Todo> = self.todos.iter().collect();
        todos.sort_by_key(|t| t.is_completed);
        todos
    }

    pub fn panel_is_hidden(&self, key: PanelKey, pinned_tag: &str) -> bool {
        key == PanelKey::Pinned && !self.missions.iter().any(|m| m.has_tag(pinned_tag))
    }

    pub fn visible_panels(&self, column: Column, pinned_tag: &str) -> Vec<PanelKey> {
        self.layout
            .visible(column, |key| self.panel_is_hidden(key, pinned_tag))
    }
}

/// The reconciled state plus a revision counter bumped on every write.
#[derive(Debug)]
pub struct StateCell {
    state: RwLock<DashboardState>,
    revision: watch::Sender<u64>,
}

impl StateCell {
    pub fn new(state: DashboardState) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: RwLock::new(state),
            revision,
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, DashboardState> {
        self.state.read()
    }

    pub fn snapshot(&self) -> DashboardState {
        self.state.read().clone()
    }

    pub fn write<R>(&self, apply: impl FnOnce(&mut DashboardState) -> R) -> R {
        let out = {
            let mut state = self.state.write();
            apply(&mut state)
        };
        self.revision.send_modify(|rev| *rev += 1);
        out
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
