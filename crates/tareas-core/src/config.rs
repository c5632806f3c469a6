use std::collections::{
  BTreeMap,
  BTreeSet
};
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::api::DEFAULT_API_URL;

pub const API_URL_ENV: &str =
  "TAREAS_API_URL";
pub const RC_ENV: &str = "TAREASRC";

const KNOWN_KEYS: [&str; 4] = [
  "api.url",
  "api.timeout",
  "color",
  "data.location"
];

/// Raw `key = value` settings, layered
/// as defaults, then the rc file, then
/// the environment, then command-line
/// overrides.
#[derive(Debug, Clone)]
pub struct Config {
  values:      BTreeMap<String, String>,
  pub sources: Vec<PathBuf>
}

/// Settings the client runs with,
/// validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  pub api_url:     String,
  pub api_timeout: Duration,
  pub color:       bool,
  pub data_dir:    PathBuf
}

impl Config {
  pub fn defaults() -> Self {
    let values = [
      ("api.url", DEFAULT_API_URL),
      ("api.timeout", "30"),
      ("color", "on"),
      ("data.location", "~/.tareas")
    ]
    .into_iter()
    .map(|(k, v)| {
      (k.to_string(), v.to_string())
    })
    .collect();

    Self {
      values,
      sources: Vec::new()
    }
  }

  #[tracing::instrument(skip_all)]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::defaults();

    match locate_rc(rc_override) {
      | Some(path) => {
        info!(rc = %path.display(), "reading tareasrc");
        let mut visited =
          BTreeSet::new();
        cfg.read_rc(
          &path,
          &mut visited
        )?;
      }
      | None => {
        debug!("no tareasrc; built-in defaults apply")
      }
    }

    if let Ok(url) =
      std::env::var(API_URL_ENV)
      && !url.trim().is_empty()
    {
      debug!(%url, "api.url from environment");
      cfg.set("api.url", url.trim());
    }

    Ok(cfg)
  }

  /// Accepts keys with or without the
  /// `rc.` prefix.
  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) {
    let key = key
      .trim()
      .strip_prefix("rc.")
      .unwrap_or(key.trim());
    if !KNOWN_KEYS.contains(&key) {
      warn!(key, "unrecognized setting; ignored");
      return;
    }
    trace!(key, value, "setting");
    self.values.insert(
      key.to_string(),
      value.trim().to_string()
    );
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
      debug!(%key, %value, "command-line override");
      self.set(&key, &value);
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
  }

  /// Checks every value. `data_override`
  /// wins over `data.location`.
  pub fn settings(
    &self,
    data_override: Option<&Path>
  ) -> anyhow::Result<Settings> {
    let api_url = self
      .get("api.url")
      .unwrap_or(DEFAULT_API_URL)
      .to_string();
    if !api_url.starts_with("http://")
      && !api_url
        .starts_with("https://")
    {
      bail!(
        "api.url must be an http(s) \
         URL, got: {api_url}"
      );
    }

    let raw_timeout = self
      .get("api.timeout")
      .unwrap_or("30");
    let secs = raw_timeout
      .parse::<u64>()
      .ok()
      .filter(|secs| *secs > 0)
      .ok_or_else(|| {
        anyhow!(
          "api.timeout must be a \
           positive number of \
           seconds, got: \
           {raw_timeout}"
        )
      })?;

    let color = match self
      .get("color")
      .unwrap_or("on")
      .to_ascii_lowercase()
      .as_str()
    {
      | "on" | "yes" | "true" | "1" => {
        true
      }
      | "off" | "no" | "false"
      | "0" => false,
      | other => {
        bail!(
          "color must be on or off, \
           got: {other}"
        )
      }
    };

    let data_dir = match data_override
    {
      | Some(path) => path.to_path_buf(),
      | None => expand_home(Path::new(
        self
          .get("data.location")
          .unwrap_or("~/.tareas")
      ))?
    };

    Ok(Settings {
      api_url,
      api_timeout: Duration::from_secs(
        secs
      ),
      color,
      data_dir
    })
  }

  fn read_rc(
    &mut self,
    path: &Path,
    visited: &mut BTreeSet<PathBuf>
  ) -> anyhow::Result<()> {
    let path = expand_home(path)?;
    let canonical = path
      .canonicalize()
      .unwrap_or_else(|_| path.clone());
    if !visited.insert(canonical) {
      warn!(rc = %path.display(), "include cycle; file already read");
      return Ok(());
    }

    let text = fs::read_to_string(
      &path
    )
    .with_context(|| {
      format!(
        "cannot read {}",
        path.display()
      )
    })?;
    self.sources.push(path.clone());

    let dir = path
      .parent()
      .unwrap_or(Path::new("."))
      .to_path_buf();

    for (idx, raw) in
      text.lines().enumerate()
    {
      let line = raw
        .split_once('#')
        .map_or(raw, |(head, _)| head)
        .trim();
      if line.is_empty() {
        continue;
      }

      if let Some(target) =
        line.strip_prefix("include ")
      {
        let target = target.trim();
        if target.is_empty() {
          bail!(
            "{}:{}: include needs a \
             path",
            path.display(),
            idx + 1
          );
        }
        let target = expand_home(
          Path::new(target)
        )?;
        let target =
          if target.is_absolute() {
            target
          } else {
            dir.join(target)
          };
        if target.exists() {
          self
            .read_rc(&target, visited)?;
        } else {
          warn!(include = %target.display(), "included rc file missing; skipped");
        }
        continue;
      }

      let Some((key, value)) =
        line.split_once('=')
      else {
        bail!(
          "{}:{}: expected key = \
           value, got: {}",
          path.display(),
          idx + 1,
          raw.trim()
        );
      };
      self.set(key, value);
    }

    Ok(())
  }
}

/// `--tareasrc`, then `TAREASRC`
/// (`/dev/null` turns the rc file off),
/// then `~/.tareasrc` when present.
fn locate_rc(
  explicit: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = explicit {
    return Some(path.to_path_buf());
  }

  match std::env::var(RC_ENV) {
    | Ok(value) if value == "/dev/null" => {
      None
    }
    | Ok(value) => {
      Some(PathBuf::from(value))
    }
    | Err(_) => dirs::home_dir()
      .map(|home| {
        home.join(".tareasrc")
      })
      .filter(|path| path.exists())
  }
}

fn expand_home(
  path: &Path
) -> anyhow::Result<PathBuf> {
  let Some(rest) = path
    .to_str()
    .and_then(|text| {
      text.strip_prefix("~/")
    })
  else {
    return Ok(path.to_path_buf());
  };
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot expand ~: no home \
         directory"
      )
    })?;
  Ok(home.join(rest))
}
