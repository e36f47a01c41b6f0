mod backup;
mod missions;
mod sidebar;

use std::io::{self, BufRead, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::{debug, instrument};

use crate::cli::Command;
use crate::dashboard::Dashboard;
use crate::record::Record;
use crate::render::Renderer;
use crate::sync::{Mutation, SkipReason};

/// Everything a command needs: the dashboard, where to print and how to
/// ask the user for confirmation.
pub struct Session<'a> {
    pub dashboard: &'a Dashboard,
    pub renderer: &'a Renderer,
    pub today: NaiveDate,
    pub out: &'a mut dyn Write,
    pub confirm: &'a mut dyn FnMut(&str) -> anyhow::Result<bool>,
}

#[instrument(skip(session))]
pub fn dispatch(session: &mut Session<'_>, command: Command) -> anyhow::Result<()> {
    debug!(today = %session.today, "dispatching command");

    match command {
        Command::Status => missions::status(session),
        Command::List { tag, pinned } => missions::list(session, tag.as_deref(), pinned),
        Command::Add(args) => missions::add(session, args),
        Command::Edit(args) => missions::edit(session, args),
        Command::Done { id } => missions::toggle(session, &id),
        Command::Delete { id, yes } => missions::delete(session, &id, yes),
        Command::Todo(action) => sidebar::todo(session, action),
        Command::Link(action) => sidebar::link(session, action),
        Command::Date(action) => sidebar::date(session, action),
        Command::Notes(action) => sidebar::notes(session, action),
        Command::Layout(action) => sidebar::layout(session, action),
        Command::Export { out } => backup::export(session, &out),
        Command::Import { file, yes } => backup::import(session, &file, yes),
    }
}

/// Interactive `[y/N]` prompt on stderr. End of input counts as no.
pub fn ask_stdin(question: &str) -> anyhow::Result<bool> {
    let mut err = io::stderr().lock();
    write!(err, "{question} [y/N] ")?;
    err.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Exact id, or the single record whose id starts with `prefix`.
pub fn resolve_id<T: Record>(records: &[T], prefix: &str, kind: &str) -> anyhow::Result<String> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Err(anyhow!("{kind} id cannot be empty"));
    }
    if let Some(exact) = records.iter().find(|record| record.id() == prefix) {
        return Ok(exact.id().to_string());
    }

    let mut matches = records.iter().filter(|record| record.id().starts_with(prefix));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no {kind} matches id {prefix:?}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("id {prefix:?} matches more than one {kind}"));
    }
    Ok(first.id().to_string())
}

fn applied<T>(mutation: Mutation<T>, what: &str) -> anyhow::Result<T> {
    match mutation {
        Mutation::Committed(value) | Mutation::Pending { value, .. } => Ok(value),
        Mutation::Skipped(SkipReason::NotFound) => Err(anyhow!("{what}: not found")),
        Mutation::Skipped(SkipReason::PermissionDenied) => {
            Err(anyhow!("{what}: read-only access"))
        }
    }
}
