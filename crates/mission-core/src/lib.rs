pub mod cli;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod dates;
pub mod error;
pub mod kv;
pub mod logo;
pub mod record;
pub mod render;
pub mod role;
pub mod state;
pub mod store;
pub mod sync;
pub mod transfer;

use std::ffi::OsString;
use std::io;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use dashboard::{
  Dashboard,
  DashboardOptions
};
pub use error::DashboardError;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting mission CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.missionrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let medium =
    kv::FileMedium::open(&data_dir)
      .with_context(|| {
        format!(
          "failed to open data \
           directory {}",
          data_dir.display()
        )
      })?;
  let binding = kv::KvBinding::new(
    Arc::new(medium),
    cfg.namespace()
  );
  let dashboard = Dashboard::open_local(
    binding,
    DashboardOptions {
      namespace:  cfg.namespace(),
      pinned_tag: cfg.pinned_tag()
    }
  );

  let renderer =
    render::Renderer::new(&cfg);
  let today = cfg.clock()?.today();
  let stdout = io::stdout();
  let mut out = stdout.lock();
  let mut confirm = commands::ask_stdin;
  let mut session = commands::Session {
    dashboard: &dashboard,
    renderer: &renderer,
    today,
    out: &mut out,
    confirm: &mut confirm
  };

  commands::dispatch(
    &mut session,
    cli
      .command
      .unwrap_or(cli::Command::Status)
  )?;

  info!("done");
  Ok(())
}
