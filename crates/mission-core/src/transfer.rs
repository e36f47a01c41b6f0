//! Whole-dashboard backup document.

use std::fmt;

use mission_model::{ImportantDate, Mission, QuickLink, SidebarLayout, Todo};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{DashboardError, Result};
use crate::state::{DashboardState, slice};

pub const BACKUP_FILE_NAME: &str = "infofi-mission-control-backup.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub tasks: Vec<Mission>,
    pub todos: Vec<Todo>,
    pub notes: String,
    pub quick_links: Vec<QuickLink>,
    pub important_dates: Vec<ImportantDate>,
    pub sidebar_layout: SidebarLayout,
}

impl From<&DashboardState> for Snapshot {
    fn from(state: &DashboardState) -> Self {
        Self {
            tasks: state.missions.clone(),
            todos: state.todos.clone(),
            notes: state.notes.clone(),
            quick_links: state.quick_links.clone(),
            important_dates: state.important_dates.clone(),
            sidebar_layout: state.layout.clone(),
        }
    }
}

impl From<Snapshot> for DashboardState {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            missions: snapshot.tasks,
            todos: snapshot.todos,
            quick_links: snapshot.quick_links,
            important_dates: snapshot.important_dates,
            notes: snapshot.notes,
            layout: snapshot.sidebar_layout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    Missing,
    Malformed(String),
}

/// A field that could not be taken from the document and was defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportIssue {
    pub field: &'static str,
    pub kind: IssueKind,
}

impl fmt::Display for ImportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::Missing => write!(f, "{} is missing; using the default", self.field),
            IssueKind::Malformed(reason) => {
                write!(f, "{} is malformed ({reason}); using the default", self.field)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub snapshot: Snapshot,
    pub issues: Vec<ImportIssue>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn summary(&self) -> String {
        let s = &self.snapshot;
        format!(
            "{} missions, {} todos, {} quick links, {} dates, {} chars of notes",
            s.tasks.len(),
            s.todos.len(),
            s.quick_links.len(),
            s.important_dates.len(),
            s.notes.chars().count()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Applied(ImportReport),
    Declined,
}

/// Pretty-printed backup document.
pub fn export_json(state: &DashboardState) -> Result<String> {
    Ok(serde_json::to_string_pretty(&Snapshot::from(state))?)
}

/// Reads a backup document. Anything that is not a JSON object fails;
/// individual fields that are absent or malformed fall back to defaults and
/// are listed in the report.
pub fn parse_backup(raw: &str) -> Result<ImportReport> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| DashboardError::ImportMalformed(format!("not valid JSON: {err}")))?;
    let Value::Object(mut object) = value else {
        return Err(DashboardError::ImportMalformed(
            "top level is not a JSON object".to_string(),
        ));
    };

    let mut issues = Vec::new();
    let tasks = take_field(&mut object, slice::TASKS, &mut issues);
    let todos = take_field(&mut object, slice::TODOS, &mut issues);
    let notes = take_field(&mut object, slice::NOTES, &mut issues);
    let quick_links = take_field(&mut object, slice::QUICK_LINKS, &mut issues);
    let important_dates = take_field(&mut object, slice::IMPORTANT_DATES, &mut issues);

    let mut sidebar_layout: SidebarLayout =
        take_field(&mut object, slice::SIDEBAR_LAYOUT, &mut issues);
    if let Err(err) = sidebar_layout.validate() {
        issues.push(ImportIssue {
            field: slice::SIDEBAR_LAYOUT,
            kind: IssueKind::Malformed(err.to_string()),
        });
        sidebar_layout = SidebarLayout::default();
    }

    for issue in &issues {
        warn!(field = issue.field, "{issue}");
    }

    Ok(ImportReport {
        snapshot: Snapshot {
            tasks,
            todos,
            notes,
            quick_links,
            important_dates,
            sidebar_layout,
        },
        issues,
    })
}

fn take_field<T: DeserializeOwned + Default>(
    object: &mut Map<String, Value>,
    field: &'static str,
    issues: &mut Vec<ImportIssue>,
) -> T {
    match object.remove(field) {
        None | Some(Value::Null) => {
            issues.push(ImportIssue {
                field,
                kind: IssueKind::Missing,
            });
            T::default()
        }
        Some(value) => serde_json::from_value(value).unwrap_or_else(|err| {
            issues.push(ImportIssue {
                field,
                kind: IssueKind::Malformed(err.to_string()),
            });
            T::default()
        }),
    }
}
