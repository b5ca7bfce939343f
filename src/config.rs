//! API key resolution.
//!
//! Precedence: `--api_key` flag, then the `WALLHAVEN_API_KEY` environment
//! variable, then a `settings.env` file in the working directory.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Environment variable (and `settings.env` key) holding the API key.
pub(crate) const API_KEY_VAR: &str = "WALLHAVEN_API_KEY";

/// Dotenv-style file checked last.
pub(crate) const SETTINGS_FILE: &str = "settings.env";

/// Where the API key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeySource {
    Flag,
    Environment,
    SettingsFile,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag => f.write_str("--api_key"),
            Self::Environment => f.write_str(API_KEY_VAR),
            Self::SettingsFile => f.write_str(SETTINGS_FILE),
        }
    }
}

/// Picks the API key by precedence. Blank values are treated as absent.
///
/// # Errors
///
/// Returns an error only when `settings_path` exists but cannot be read or
/// parsed.
pub(crate) fn resolve_api_key(
    flag: Option<&str>,
    env_value: Option<String>,
    settings_path: &Path,
) -> Result<Option<(String, KeySource)>> {
    if let Some(key) = non_blank(flag) {
        return Ok(Some((key, KeySource::Flag)));
    }
    if let Some(key) = non_blank(env_value.as_deref()) {
        return Ok(Some((key, KeySource::Environment)));
    }
    if !settings_path.exists() {
        debug!(path = %settings_path.display(), "no settings file");
        return Ok(None);
    }
    Ok(read_settings_key(settings_path)?
        .and_then(|v| non_blank(Some(v.as_str())))
        .map(|key| (key, KeySource::SettingsFile)))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reads `WALLHAVEN_API_KEY` from a dotenv file without touching the
/// process environment. The last assignment wins.
fn read_settings_key(settings_path: &Path) -> Result<Option<String>> {
    let entries = dotenvy::from_path_iter(settings_path)
        .with_context(|| format!("failed to read {}", settings_path.display()))?;

    let mut found = None;
    for entry in entries {
        let (name, value) =
            entry.with_context(|| format!("failed to parse {}", settings_path.display()))?;
        if name == API_KEY_VAR {
            found = Some(value);
        }
    }
    Ok(found)
}
