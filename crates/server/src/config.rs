use crate::error::{Result, ServerError};
use std::time::Duration;

/// Settings for the worker's HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Human-readable logs instead of JSON lines.
    pub is_dev: bool,
    /// Listen port on all interfaces; `0` picks a free one.
    pub port: u16,
    /// How long in-flight requests may run once shutdown starts.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            is_dev: false,
            port: 3000,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Read `SERVER_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            is_dev: parse(&lookup, "SERVER_IS_DEV", defaults.is_dev)?,
            port: parse(&lookup, "SERVER_PORT", defaults.port)?,
            shutdown_grace: Duration::from_secs(parse(
                &lookup,
                "SERVER_SHUTDOWN_GRACE_SECS",
                defaults.shutdown_grace.as_secs(),
            )?),
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(var).map_or(Ok(default), |raw| {
        raw.trim().parse().map_err(|err: T::Err| ServerError::Config {
            var,
            reason: format!("`{raw}`: {err}"),
        })
    })
}
