use std::io::{self, Read, Write};

use anyhow::{Context, anyhow};
use mission_model::{Column, ImportantDate, ImportantDateDraft, PanelKey, QuickLinkDraft, Slot};

use super::{Session, applied, resolve_id};
use crate::cli::{DateCommand, LayoutCommand, LinkCommand, NotesCommand, TodoCommand};
use crate::dates::parse_date_expr;

pub(super) fn todo(session: &mut Session<'_>, action: TodoCommand) -> anyhow::Result<()> {
    match action {
        TodoCommand::List => {
            let state = session.dashboard.state();
            session
                .renderer
                .todos(&mut *session.out, &state.todos_open_first())?;
            writeln!(session.out, "{}", state.todo_progress())?;
        }
        TodoCommand::Add { text } => {
            let todo = applied(session.dashboard.add_todo(&text.join(" "))?, "add todo")?;
            writeln!(session.out, "Added todo {}.", todo.id)?;
        }
        TodoCommand::Toggle { id } => {
            let id = resolve_id(&session.dashboard.state().todos, &id, "todo")?;
            applied(session.dashboard.toggle_todo(&id)?, "toggle todo")?;
            writeln!(session.out, "{}", session.dashboard.todo_progress())?;
        }
        TodoCommand::Delete { id } => {
            let id = resolve_id(&session.dashboard.state().todos, &id, "todo")?;
            applied(session.dashboard.todos().delete(&id)?, "delete todo")?;
            writeln!(session.out, "Deleted todo {id}.")?;
        }
    }
    Ok(())
}

pub(super) fn link(session: &mut Session<'_>, action: LinkCommand) -> anyhow::Result<()> {
    match action {
        LinkCommand::List => {
            let state = session.dashboard.state();
            session
                .renderer
                .quick_links(&mut *session.out, &state.quick_links)?;
        }
        LinkCommand::Add { title, url } => {
            let draft = QuickLinkDraft {
                title: title.trim().to_string(),
                url: url.trim().to_string(),
            };
            let link = applied(session.dashboard.quick_links().create(draft)?, "add link")?;
            writeln!(session.out, "Added {} -> {}.", link.title, link.href())?;
        }
        LinkCommand::Delete { id } => {
            let id = resolve_id(&session.dashboard.state().quick_links, &id, "link")?;
            applied(session.dashboard.quick_links().delete(&id)?, "delete link")?;
            writeln!(session.out, "Deleted link {id}.")?;
        }
    }
    Ok(())
}

pub(super) fn date(session: &mut Session<'_>, action: DateCommand) -> anyhow::Result<()> {
    match action {
        DateCommand::List { all } => {
            let state = session.dashboard.state();
            let dates: Vec<&ImportantDate> = if all {
                let mut every: Vec<&ImportantDate> = state.important_dates.iter().collect();
                every.sort_by_key(|entry| entry.date);
                every
            } else {
                state.upcoming_dates(session.today)
            };
            session
                .renderer
                .dates(&mut *session.out, &dates, session.today)?;
        }
        DateCommand::Add { date, text } => {
            let draft = ImportantDateDraft {
                date: parse_date_expr(&date, session.today)?,
                text: text.join(" ").trim().to_string(),
            };
            let entry = applied(
                session.dashboard.important_dates().create(draft)?,
                "add date",
            )?;
            writeln!(session.out, "Added {} on {}.", entry.text, entry.date)?;
        }
        DateCommand::Delete { id } => {
            let id = resolve_id(&session.dashboard.state().important_dates, &id, "date")?;
            applied(session.dashboard.important_dates().delete(&id)?, "delete date")?;
            writeln!(session.out, "Deleted date {id}.")?;
        }
    }
    Ok(())
}

pub(super) fn notes(session: &mut Session<'_>, action: NotesCommand) -> anyhow::Result<()> {
    match action {
        NotesCommand::Show => {
            let notes = session.dashboard.state().notes.clone();
            if notes.is_empty() {
                writeln!(session.out, "(no notes)")?;
            } else {
                writeln!(session.out, "{notes}")?;
            }
        }
        NotesCommand::Set { text } => {
            let notes = if text.is_empty() {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .context("failed reading notes from stdin")?;
                buf.trim_end().to_string()
            } else {
                text.join(" ")
            };
            applied(session.dashboard.set_notes(notes)?, "set notes")?;
            writeln!(session.out, "Notes saved.")?;
        }
    }
    Ok(())
}

pub(super) fn layout(session: &mut Session<'_>, action: LayoutCommand) -> anyhow::Result<()> {
    match action {
        LayoutCommand::Show => {}
        LayoutCommand::Move {
            panel,
            column,
            index,
        } => {
            let key: PanelKey = panel.parse()?;
            let column: Column = column.parse()?;
            let (from, target_len) = {
                let state = session.dashboard.state();
                let from = state
                    .layout
                    .position(key)
                    .ok_or_else(|| anyhow!("panel {key} is not in the layout"))?;
                (from, state.layout.column(column).len())
            };
            let to = Slot::new(column, index.unwrap_or(target_len));
            applied(session.dashboard.move_panel(from, to)?, "move panel")?;
        }
    }

    let state = session.dashboard.state();
    session
        .renderer
        .layout(&mut *session.out, &state, session.dashboard.pinned_tag())
}
