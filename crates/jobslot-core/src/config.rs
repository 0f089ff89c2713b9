//! Configuration - バックエンド選択と SQLite の設定
//!
//! Read from the environment:
//! - `JOBSLOT_BACKEND`: `memory` (default) or `sqlite`
//! - `JOBSLOT_SQLITE_DIR`: directory of per-namespace database files
//! - `JOBSLOT_BUSY_TIMEOUT_MS`: how long a writer waits on a locked database

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::ReservationError;

pub const ENV_BACKEND: &str = "JOBSLOT_BACKEND";
pub const ENV_SQLITE_DIR: &str = "JOBSLOT_SQLITE_DIR";
pub const ENV_BUSY_TIMEOUT_MS: &str = "JOBSLOT_BUSY_TIMEOUT_MS";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Process-local; only useful for tests and single-process runs.
    #[default]
    Memory,
    /// Shared SQLite files; safe across processes and hosts sharing the directory.
    Sqlite,
}

impl FromStr for BackendKind {
    type Err = ReservationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(ReservationError::Config(format!(
                "unknown backend '{other}' (expected memory or sqlite)"
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => f.write_str("memory"),
            BackendKind::Sqlite => f.write_str("sqlite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    #[serde(default = "default_sqlite_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_sqlite_dir() -> PathBuf {
    PathBuf::from("./jobslot-data")
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            dir: default_sqlite_dir(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobslotConfig {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub sqlite: SqliteConfig,
}

impl JobslotConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, ReservationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ReservationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_BACKEND) {
            config.backend = v.parse()?;
        }
        if let Some(v) = lookup(ENV_SQLITE_DIR) {
            config.sqlite.dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.sqlite.busy_timeout_ms = v.trim().parse().map_err(|e| {
                ReservationError::Config(format!("{ENV_BUSY_TIMEOUT_MS}='{v}': {e}"))
            })?;
        }
        Ok(config)
    }
}
