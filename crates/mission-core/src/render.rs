use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use mission_model::{Column, Deadline, ImportantDate, Mission, QuickLink, Todo};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::state::DashboardState;

/// Ids are shown shortened; any unique prefix is accepted back.
const SHORT_ID: usize = 8;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color() && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all, fields(count = missions.len()))]
    pub fn missions<W: Write + ?Sized>(
        &self,
        out: &mut W,
        missions: &[&Mission],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let headers = ["ID", "Done", "Title", "URL", "Tags", "Deadline"];
        let rows = missions
            .iter()
            .map(|mission| {
                vec![
                    self.paint(short_id(&mission.id), "33"),
                    checkbox(mission.is_completed).to_string(),
                    mission.title.clone(),
                    mission.url.clone(),
                    mission.tags.join(", "),
                    self.deadline(mission.deadline(today)),
                ]
            })
            .collect();
        write_table(out, &headers, rows)
    }

    pub fn mission_detail<W: Write + ?Sized>(
        &self,
        out: &mut W,
        mission: &Mission,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "id        {}", mission.id)?;
        writeln!(out, "title     {}", mission.title)?;
        writeln!(out, "url       {}", mission.url)?;
        if !mission.description.is_empty() {
            writeln!(out, "desc      {}", mission.description)?;
        }
        writeln!(out, "tags      {}", mission.tags.join(", "))?;
        writeln!(out, "done      {}", mission.is_completed)?;
        if let Some(end) = mission.end_date {
            writeln!(out, "ends      {end} ({})", self.deadline(mission.deadline(today)))?;
        }
        if let Some(referral) = &mission.referral_url {
            writeln!(out, "referral  {referral}")?;
        }
        if mission.logo.is_some() {
            writeln!(out, "logo      inline image")?;
        }
        Ok(())
    }

    pub fn todos<W: Write + ?Sized>(&self, out: &mut W, todos: &[&Todo]) -> anyhow::Result<()> {
        let rows = todos
            .iter()
            .map(|todo| {
                let text = if todo.is_completed {
                    self.paint(&todo.text, "2")
                } else {
                    todo.text.clone()
                };
                vec![
                    self.paint(short_id(&todo.id), "33"),
                    checkbox(todo.is_completed).to_string(),
                    text,
                ]
            })
            .collect();
        write_table(out, &["ID", "Done", "Text"], rows)
    }

    pub fn quick_links<W: Write + ?Sized>(
        &self,
        out: &mut W,
        links: &[QuickLink],
    ) -> anyhow::Result<()> {
        let rows = links
            .iter()
            .map(|link| {
                vec![
                    self.paint(short_id(&link.id), "33"),
                    link.title.clone(),
                    link.href(),
                ]
            })
            .collect();
        write_table(out, &["ID", "Title", "Link"], rows)
    }

    pub fn dates<W: Write + ?Sized>(
        &self,
        out: &mut W,
        dates: &[&ImportantDate],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let rows = dates
            .iter()
            .map(|entry| {
                let date = entry.date.format("%Y-%m-%d").to_string();
                let date = if entry.date < today {
                    self.paint(&date, "2")
                } else if entry.date == today {
                    self.paint(&date, "31")
                } else {
                    date
                };
                vec![self.paint(short_id(&entry.id), "33"), date, entry.text.clone()]
            })
            .collect();
        write_table(out, &["ID", "Date", "Text"], rows)
    }

    /// Both columns in order; hidden panels are marked, not dropped.
    pub fn layout<W: Write + ?Sized>(
        &self,
        out: &mut W,
        state: &DashboardState,
        pinned_tag: &str,
    ) -> anyhow::Result<()> {
        for column in [Column::Column1, Column::Column2] {
            writeln!(out, "{}", column.as_str())?;
            for (index, key) in state.layout.column(column).iter().enumerate() {
                let hidden = if state.panel_is_hidden(*key, pinned_tag) {
                    " (hidden: nothing pinned)"
                } else {
                    ""
                };
                writeln!(out, "  {index}. {:<10} {}{hidden}", key.as_str(), key.title())?;
            }
        }
        Ok(())
    }

    pub fn status<W: Write + ?Sized>(
        &self,
        out: &mut W,
        state: &DashboardState,
        pinned_tag: &str,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "Missions  {}", state.mission_progress())?;
        writeln!(out, "To-dos    {}", state.todo_progress())?;

        let pinned = state.pinned(pinned_tag);
        if !pinned.is_empty() {
            writeln!(out)?;
            writeln!(out, "Pinned")?;
            self.missions(out, &pinned, today)?;
        }

        let upcoming = state.upcoming_dates(today);
        if !upcoming.is_empty() {
            writeln!(out)?;
            writeln!(out, "Upcoming")?;
            self.dates(out, &upcoming, today)?;
        }
        Ok(())
    }

    fn deadline(&self, deadline: Option<Deadline>) -> String {
        let Some(deadline) = deadline else {
            return String::new();
        };
        let text = match deadline {
            Deadline::Ended { days_ago } => format!("ended {days_ago}d ago"),
            Deadline::EndsToday => "ends today".to_string(),
            Deadline::Left { days } => format!("{days}d left"),
        };
        if deadline.is_urgent() {
            self.paint(&text, "31")
        } else {
            text
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn short_id(id: &str) -> &str {
    id.char_indices()
        .nth(SHORT_ID)
        .map_or(id, |(cut, _)| &id[..cut])
}

fn checkbox(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

fn write_table<W: Write + ?Sized>(
    writer: &mut W,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    if rows.is_empty() {
        writeln!(writer, "(none)")?;
        return Ok(());
    }

    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(*header))
        .collect();

    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, &width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for &width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
