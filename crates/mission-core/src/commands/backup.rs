use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use tracing::info;

use super::Session;
use crate::transfer::{ImportOutcome, ImportReport};

/// Writes the backup to `out`, or to stdout when `out` is `-`.
#[tracing::instrument(skip(session))]
pub(super) fn export(session: &mut Session<'_>, out: &Path) -> anyhow::Result<()> {
    let json = session.dashboard.export_json()?;
    if out == Path::new("-") {
        writeln!(session.out, "{json}")?;
        return Ok(());
    }

    fs::write(out, format!("{json}\n"))
        .with_context(|| format!("failed to write {}", out.display()))?;
    info!(file = %out.display(), "exported backup");
    writeln!(session.out, "Exported to {}.", out.display())?;
    Ok(())
}

fn review(
    session: &mut Session<'_>,
    report: &ImportReport,
    yes: bool,
) -> anyhow::Result<bool> {
    writeln!(session.out, "Backup holds {}.", report.summary())?;
    for issue in &report.issues {
        writeln!(session.out, "  {issue}")?;
    }
    if yes {
        return Ok(true);
    }
    (session.confirm)("Replace all current data with this backup?")
}

#[tracing::instrument(skip(session))]
pub(super) fn import(session: &mut Session<'_>, file: &Path, yes: bool) -> anyhow::Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let dashboard = session.dashboard;
    let mut prompt_failure = None;
    let outcome = dashboard.import(&raw, |report| match review(session, report, yes) {
        Ok(answer) => answer,
        Err(err) => {
            prompt_failure = Some(err);
            false
        }
    })?;
    if let Some(err) = prompt_failure {
        return Err(err);
    }

    match outcome {
        ImportOutcome::Applied(_) => writeln!(session.out, "Import complete.")?,
        ImportOutcome::Declined => writeln!(session.out, "Import cancelled; nothing changed.")?,
    }
    Ok(())
}
