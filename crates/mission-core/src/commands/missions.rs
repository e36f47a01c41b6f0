use std::io::Write;

use anyhow::anyhow;
use mission_model::{Mission, MissionDraft, MissionPatch, parse_tags};
use tracing::info;

use super::{Session, applied, resolve_id};
use crate::cli::{EditArgs, MissionArgs};
use crate::dates::parse_date_expr;
use crate::logo::read_logo;

pub(super) fn status(session: &mut Session<'_>) -> anyhow::Result<()> {
    let state = session.dashboard.state();
    session.renderer.status(
        &mut *session.out,
        &state,
        session.dashboard.pinned_tag(),
        session.today,
    )
}

pub(super) fn list(
    session: &mut Session<'_>,
    tag: Option<&str>,
    pinned: bool,
) -> anyhow::Result<()> {
    let state = session.dashboard.state();
    let missions: Vec<&Mission> = if pinned {
        state.pinned(session.dashboard.pinned_tag())
    } else if let Some(tag) = tag {
        state
            .missions_open_first()
            .into_iter()
            .filter(|m| m.has_tag(tag))
            .collect()
    } else {
        state.missions_open_first()
    };

    session.renderer.missions(&mut *session.out, &missions, session.today)?;
    writeln!(session.out, "{}", state.mission_progress())?;
    Ok(())
}

fn optional_text(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[tracing::instrument(skip_all, fields(title = %args.title))]
pub(super) fn add(session: &mut Session<'_>, args: MissionArgs) -> anyhow::Result<()> {
    let draft = MissionDraft {
        title: args.title.trim().to_string(),
        url: args.url.trim().to_string(),
        description: args.description.trim().to_string(),
        tags: parse_tags(&args.tags),
        logo: args.logo.as_deref().map(read_logo).transpose()?,
        end_date: args
            .end_date
            .as_deref()
            .map(|raw| parse_date_expr(raw, session.today))
            .transpose()?,
        referral_url: optional_text(args.referral_url),
    };

    let mission = applied(session.dashboard.missions().create(draft)?, "add mission")?;
    info!(id = %mission.id, "mission added");
    writeln!(session.out, "Created mission {}.", mission.id)?;
    Ok(())
}

#[tracing::instrument(skip_all, fields(id = %args.id))]
pub(super) fn edit(session: &mut Session<'_>, args: EditArgs) -> anyhow::Result<()> {
    let id = resolve_id(&session.dashboard.state().missions, &args.id, "mission")?;

    let logo = if args.no_logo {
        Some(None)
    } else {
        args.logo.as_deref().map(read_logo).transpose()?.map(Some)
    };
    let end_date = if args.no_end {
        Some(None)
    } else {
        args.end_date
            .as_deref()
            .map(|raw| parse_date_expr(raw, session.today))
            .transpose()?
            .map(Some)
    };
    let referral_url = if args.no_referral {
        Some(None)
    } else {
        optional_text(args.referral_url).map(Some)
    };

    let patch = MissionPatch {
        title: args.title.map(|t| t.trim().to_string()),
        url: args.url.map(|u| u.trim().to_string()),
        description: args.description.map(|d| d.trim().to_string()),
        tags: args.tags.as_deref().map(parse_tags),
        is_completed: None,
        logo,
        end_date,
        referral_url,
    };
    if patch.is_empty() {
        return Err(anyhow!("nothing to change; pass at least one field"));
    }

    applied(session.dashboard.missions().update(&id, patch)?, "edit mission")?;
    if let Some(mission) = session.dashboard.missions().get(&id) {
        session
            .renderer
            .mission_detail(&mut *session.out, &mission, session.today)?;
    }
    Ok(())
}

pub(super) fn toggle(session: &mut Session<'_>, prefix: &str) -> anyhow::Result<()> {
    let id = resolve_id(&session.dashboard.state().missions, prefix, "mission")?;
    applied(session.dashboard.toggle_mission(&id)?, "toggle mission")?;

    if let Some(mission) = session.dashboard.missions().get(&id) {
        let verb = if mission.is_completed { "Completed" } else { "Reopened" };
        writeln!(session.out, "{verb} {:?}.", mission.title)?;
    }
    writeln!(session.out, "{}", session.dashboard.mission_progress())?;
    Ok(())
}

pub(super) fn delete(session: &mut Session<'_>, prefix: &str, yes: bool) -> anyhow::Result<()> {
    let id = resolve_id(&session.dashboard.state().missions, prefix, "mission")?;
    let title = session
        .dashboard
        .missions()
        .get(&id)
        .map(|mission| mission.title)
        .unwrap_or_default();

    if !yes && !(session.confirm)(&format!("Delete mission {title:?}?"))? {
        writeln!(session.out, "Kept {title:?}.")?;
        return Ok(());
    }

    applied(session.dashboard.missions().delete(&id)?, "delete mission")?;
    info!(id = %id, "mission deleted");
    writeln!(session.out, "Deleted {title:?}.")?;
    Ok(())
}
