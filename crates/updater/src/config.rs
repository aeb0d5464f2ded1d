//! Environment-driven configuration for the updater job and the launcher.

use crate::error::{Result, UpdaterError};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SCHEDULE: &str = "0 */5 * * * *";
const DEFAULT_SESSION_FOLDER: &str = "self-updater";

/// Settings for the scheduled update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterConfig {
    /// Human-readable logs instead of JSON lines.
    pub is_dev: bool,
    /// Cron expression, seconds field optional.
    pub schedule: String,
    /// Run one check immediately, before the first scheduled tick.
    pub run_at_boot: bool,
    /// Deadline for each of the manifest and signature downloads.
    pub manifest_timeout: Duration,
    /// Artifacts are binaries, so they get a longer budget than manifests.
    pub artifact_timeout: Duration,
    /// Overrides the manifest URL derived from the release source.
    pub manifest_url: Option<String>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            is_dev: false,
            schedule: DEFAULT_SCHEDULE.to_string(),
            run_at_boot: true,
            manifest_timeout: Duration::from_secs(30),
            artifact_timeout: Duration::from_secs(600),
            manifest_url: None,
        }
    }
}

impl UpdaterConfig {
    /// Read `UPDATER_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            is_dev: parse_var(&lookup, "UPDATER_IS_DEV", defaults.is_dev)?,
            schedule: lookup("UPDATER_SCHEDULE").unwrap_or(defaults.schedule),
            run_at_boot: parse_var(&lookup, "UPDATER_RUN_AT_BOOT", defaults.run_at_boot)?,
            manifest_timeout: Duration::from_secs(parse_var(
                &lookup,
                "UPDATER_MANIFEST_TIMEOUT_SECS",
                defaults.manifest_timeout.as_secs(),
            )?),
            artifact_timeout: Duration::from_secs(parse_var(
                &lookup,
                "UPDATER_ARTIFACT_TIMEOUT_SECS",
                defaults.artifact_timeout.as_secs(),
            )?),
            manifest_url: lookup("UPDATER_MANIFEST_URL").filter(|url| !url.trim().is_empty()),
        })
    }
}

/// Settings for the supervising launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    /// Human-readable logs instead of JSON lines.
    pub is_dev: bool,
    /// Root that per-launcher session directories are created under.
    pub session_root: PathBuf,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            is_dev: false,
            session_root: std::env::temp_dir().join(DEFAULT_SESSION_FOLDER),
        }
    }
}

impl LauncherConfig {
    /// Read `LAUNCHER_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let folder =
            lookup("LAUNCHER_SESSION_FOLDER").unwrap_or_else(|| DEFAULT_SESSION_FOLDER.to_string());
        Ok(Self {
            is_dev: parse_var(&lookup, "LAUNCHER_IS_DEV", false)?,
            // Relative folders live under the OS temp dir; absolute ones are kept.
            session_root: std::env::temp_dir().join(folder),
        })
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|err: T::Err| UpdaterError::Config {
            var,
            reason: format!("`{raw}`: {err}"),
        }),
    }
}
