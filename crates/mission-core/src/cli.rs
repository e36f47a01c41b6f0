use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::transfer::BACKUP_FILE_NAME;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mission",
    version,
    about = "Mission control: missions, to-dos, links, dates and notes in one dashboard",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "missionrc")]
    pub missionrc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Completion counters, pinned missions and upcoming dates.
    Status,
    /// List missions.
    List {
        /// Only missions carrying this tag.
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, conflicts_with = "tag")]
        pinned: bool,
    },
    /// Add a mission.
    Add(MissionArgs),
    /// Edit fields of a mission.
    Edit(EditArgs),
    /// Toggle a mission's completion.
    Done { id: String },
    /// Delete a mission.
    Delete {
        id: String,
        #[arg(short = 'y', long)]
        yes: bool,
    },
    #[command(subcommand)]
    Todo(TodoCommand),
    #[command(subcommand)]
    Link(LinkCommand),
    #[command(subcommand)]
    Date(DateCommand),
    #[command(subcommand)]
    Notes(NotesCommand),
    #[command(subcommand)]
    Layout(LayoutCommand),
    /// Write a backup document.
    Export {
        /// `-` prints to stdout.
        #[arg(short = 'o', long = "out", default_value = BACKUP_FILE_NAME)]
        out: PathBuf,
    },
    /// Replace everything with a backup document.
    Import {
        file: PathBuf,
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct MissionArgs {
    pub title: String,
    pub url: String,
    #[arg(short = 'd', long, default_value = "")]
    pub description: String,
    /// Comma separated.
    #[arg(short = 't', long, default_value = "")]
    pub tags: String,
    /// Image file stored inline as the logo.
    #[arg(long)]
    pub logo: Option<PathBuf>,
    /// `YYYY-MM-DD`, `tomorrow`, `+3d`, a weekday name...
    #[arg(long = "end")]
    pub end_date: Option<String>,
    #[arg(long = "referral")]
    pub referral_url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub url: Option<String>,
    #[arg(short = 'd', long)]
    pub description: Option<String>,
    #[arg(short = 't', long)]
    pub tags: Option<String>,
    #[arg(long, conflicts_with = "no_logo")]
    pub logo: Option<PathBuf>,
    #[arg(long)]
    pub no_logo: bool,
    #[arg(long = "end", conflicts_with = "no_end")]
    pub end_date: Option<String>,
    #[arg(long)]
    pub no_end: bool,
    #[arg(long = "referral", conflicts_with = "no_referral")]
    pub referral_url: Option<String>,
    #[arg(long)]
    pub no_referral: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TodoCommand {
    List,
    Add { text: Vec<String> },
    Toggle { id: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum LinkCommand {
    List,
    Add { title: String, url: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum DateCommand {
    /// Upcoming dates; `--all` includes past ones.
    List {
        #[arg(long)]
        all: bool,
    },
    Add { date: String, text: Vec<String> },
    Delete { id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum NotesCommand {
    Show,
    /// Replace the notes; reads stdin when no text is given.
    Set { text: Vec<String> },
}

#[derive(Subcommand, Debug, Clone)]
pub enum LayoutCommand {
    Show,
    /// Move a panel, e.g. `layout move notes 1 0`.
    Move {
        panel: String,
        /// `1` or `2`.
        column: String,
        /// Clamped to the column length.
        index: Option<usize>,
    },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls `rc.key=value` words out of the argument list so they can sit
/// anywhere on the command line.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest
                .split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()));

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
