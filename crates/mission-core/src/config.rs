use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  bail
};
use mission_model::DEFAULT_PINNED_TAG;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::dates::Clock;
use crate::kv::DEFAULT_NAMESPACE;

pub const RC_ENV_VAR: &str = "MISSIONRC";
const RC_FILE_NAME: &str = ".missionrc";
const DATA_DIR_NAME: &str = ".mission";

/// One meaningful line of a missionrc.
#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Include(&'a str),
  Setting(&'a str, &'a str)
}

/// Classifies a raw line; `None` for
/// blanks and comments.
fn classify(
  raw: &str
) -> Option<Result<RcLine<'_>, ()>> {
  let line = match raw.find('#') {
    | Some(at) => &raw[..at],
    | None => raw
  }
  .trim();
  if line.is_empty() {
    return None;
  }
  if let Some(target) =
    line.strip_prefix("include ")
  {
    return Some(Ok(RcLine::Include(
      target.trim()
    )));
  }
  Some(
    line
      .split_once('=')
      .map(|(k, v)| {
        RcLine::Setting(k.trim(), v.trim())
      })
      .ok_or(())
  )
}

/// Settings read from the rc chain and
/// `rc.` overrides. Unset keys fall
/// back to the dashboard defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
  values: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();
    match locate_rc(rc_override) {
      | Some(path) => {
        info!(missionrc = %path.display(), "loading missionrc");
        cfg.read_rc(&home_relative(
          &path
        ))?;
      }
      | None => {
        debug!("no missionrc; defaults")
      }
    }
    Ok(cfg)
  }

  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let key = key
        .strip_prefix("rc.")
        .map(str::to_string)
        .unwrap_or(key);
      debug!(%key, %value, "rc override");
      self.values.insert(key, value);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<&str> {
    self
      .values
      .get(key)
      .map(String::as_str)
      .filter(|v| !v.trim().is_empty())
  }

  pub fn namespace(&self) -> String {
    self
      .get("storage.namespace")
      .unwrap_or(DEFAULT_NAMESPACE)
      .to_string()
  }

  pub fn pinned_tag(&self) -> String {
    self
      .get("pinned.tag")
      .unwrap_or(DEFAULT_PINNED_TAG)
      .to_string()
  }

  /// Color stays on unless switched
  /// off explicitly.
  pub fn color(&self) -> bool {
    !matches!(
      self
        .get("color")
        .map(str::to_ascii_lowercase)
        .as_deref(),
      Some("off" | "no" | "false" | "0")
    )
  }

  /// `timezone` when set, otherwise
  /// local time.
  pub fn clock(
    &self
  ) -> anyhow::Result<Clock> {
    self.get("timezone").map_or(
      Ok(Clock::default()),
      |zone| {
        Clock::from_zone_name(zone)
          .context(
            "invalid timezone setting"
          )
      }
    )
  }

  fn read_rc(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let text = fs::read_to_string(path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    self.loaded_files.push(path.into());
    let dir = path
      .parent()
      .unwrap_or(Path::new("."));

    for (n, raw) in
      text.lines().enumerate()
    {
      match classify(raw) {
        | None => {}
        | Some(Ok(RcLine::Include(
          target
        ))) => {
          let target =
            dir.join(home_relative(
              Path::new(target)
            ));
          if target.is_file() {
            self.read_rc(&target)?;
          } else {
            warn!(include = %target.display(), "missing include skipped");
          }
        }
        | Some(Ok(RcLine::Setting(
          key,
          value
        ))) => {
          trace!(key, value, "rc setting");
          self
            .values
            .insert(key.into(), value.into());
        }
        | Some(Err(())) => {
          bail!(
            "invalid config line {}:{}: \
             {raw}",
            path.display(),
            n + 1
          )
        }
      }
    }
    Ok(())
  }
}

/// The data directory from the flag,
/// `data.location` or `~/.mission`,
/// created when missing.
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match (
    override_dir,
    cfg.get("data.location")
  ) {
    | (Some(dir), _) => dir.into(),
    | (None, Some(loc)) => {
      home_relative(Path::new(loc))
    }
    | (None, None) => {
      dirs::home_dir()
        .context(
          "cannot determine home \
           directory"
        )?
        .join(DATA_DIR_NAME)
    }
  };
  fs::create_dir_all(&dir)
    .with_context(|| {
      format!(
        "failed to create {}",
        dir.display()
      )
    })?;
  Ok(dir)
}

/// Flag, then `MISSIONRC` (`/dev/null`
/// disables), then `~/.missionrc`.
fn locate_rc(
  flag: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = flag {
    return Some(path.into());
  }
  if let Ok(env) =
    std::env::var(RC_ENV_VAR)
  {
    return (env != "/dev/null")
      .then(|| env.into());
  }
  dirs::home_dir()
    .map(|home| home.join(RC_FILE_NAME))
    .filter(|rc| rc.is_file())
}

fn home_relative(path: &Path) -> PathBuf {
  match (
    path.strip_prefix("~"),
    dirs::home_dir()
  ) {
    | (Ok(rest), Some(home)) => {
      home.join(rest)
    }
    | _ => path.to_path_buf()
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::*;

  #[test]
  fn defaults_cover_every_setting() {
    let cfg = Config::default();
    assert_eq!(
      cfg.namespace(),
      "crypto-missions"
    );
    assert_eq!(
      cfg.pinned_tag(),
      "yaping"
    );
    assert!(cfg.color());
    assert!(
      cfg
        .clock()
        .expect("local clock")
        .zone()
        .is_none()
    );
  }

  #[test]
  fn rc_file_with_include_and_comments()
  {
    let temp =
      tempdir().expect("tempdir");
    fs::write(
      temp.path().join("extra.rc"),
      "pinned.tag = alpha\n"
    )
    .expect("write include");
    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "# dashboard settings\n\
       storage.namespace = team-a  # \
       shared\n\
       color = off\n\
       include extra.rc\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(&rc))
      .expect("load rc");
    assert_eq!(cfg.namespace(), "team-a");
    assert_eq!(cfg.pinned_tag(), "alpha");
    assert!(!cfg.color());
    assert_eq!(cfg.loaded_files.len(), 2);
  }

  #[test]
  fn overrides_win_and_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides([
      (
        "rc.timezone".to_string(),
        "Asia/Tokyo".to_string()
      ),
      (
        "pinned.tag".to_string(),
        "gm".to_string()
      )
    ]);
    assert_eq!(cfg.pinned_tag(), "gm");
    assert!(
      cfg
        .clock()
        .expect("tokyo")
        .zone()
        .is_some()
    );
  }

  #[test]
  fn malformed_lines_name_the_file() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "just words\n")
      .expect("write rc");
    let err = Config::load(Some(&rc))
      .expect_err("invalid line");
    assert!(
      err
        .to_string()
        .contains("bad.rc:1")
    );
  }

  #[test]
  fn classifies_rc_lines() {
    assert_eq!(classify("  # note"), None);
    assert_eq!(
      classify("include ~/shared.rc"),
      Some(Ok(RcLine::Include(
        "~/shared.rc"
      )))
    );
    assert_eq!(
      classify("color=off#quiet"),
      Some(Ok(RcLine::Setting(
        "color", "off"
      )))
    );
    assert_eq!(classify("oops"), Some(Err(())));
  }

  #[test]
  fn blank_values_keep_defaults() {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "storage.namespace".to_string(),
      "  ".to_string()
    )]);
    assert_eq!(
      cfg.namespace(),
      "crypto-missions"
    );
  }
}
