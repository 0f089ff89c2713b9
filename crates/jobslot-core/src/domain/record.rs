//! Job record: one row per outstanding or errored reservation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ReservationError;
use super::key_hash::KeyHash;

/// Upper bound of `error_message`, in characters.
pub const MAX_ERROR_MESSAGE_LEN: usize = 1023;

/// Upper bound of `work_unit` and `host`, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Fractional-second digits kept on `timestamp`; every medium stores
/// microseconds.
const TIMESTAMP_PRECISION: u16 = 6;

/// Reject work unit names a medium cannot key on.
///
/// Long names are refused rather than cut, so two names sharing their first
/// [`MAX_NAME_LEN`] characters never collapse into one work unit.
pub fn check_work_unit(work_unit: &str) -> Result<(), ReservationError> {
    if work_unit.is_empty() {
        return Err(ReservationError::InvalidWorkUnit(
            "work unit name is empty".to_string(),
        ));
    }
    let len = work_unit.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ReservationError::InvalidWorkUnit(format!(
            "{len} characters, at most {MAX_NAME_LEN} allowed"
        )));
    }
    Ok(())
}

/// Record status.
///
/// Absence of a record means the unit of work is available.
///
/// State transitions:
/// - (absent) -> Reserved            (reserve)
/// - Reserved -> (absent)            (complete)
/// - Reserved | (absent) -> Error    (error)
/// - any -> Ignore                   (operator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Claimed by a worker that has not reported back yet.
    Reserved,

    /// The worker reported a failure. Blocks re-reservation until cleared.
    Error,

    /// Marked by operator tooling as permanently skipped.
    Ignore,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Reserved => "reserved",
            JobStatus::Error => "error",
            JobStatus::Ignore => "ignore",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown job status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(JobStatus::Reserved),
            "error" => Ok(JobStatus::Error),
            "ignore" => Ok(JobStatus::Ignore),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Who wrote a record. Diagnostic only; never used for correctness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerIdentity {
    pub host: String,
    pub pid: u32,
}

/// Persisted job record, keyed by `(work_unit, key_hash)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub work_unit: String,
    pub key_hash: KeyHash,
    pub status: JobStatus,

    /// Copy of the identifying key, kept on error / ignore records.
    pub key: Option<serde_json::Value>,

    /// Empty unless `status` is `Error`.
    pub error_message: String,
    pub error_stack: Option<String>,

    pub host: String,
    pub pid: u32,

    /// Write time, set by the store's clock. Microsecond precision.
    pub timestamp: DateTime<Utc>,
}

impl JobRecord {
    fn base(
        work_unit: &str,
        key_hash: KeyHash,
        status: JobStatus,
        worker: &WorkerIdentity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            work_unit: work_unit.to_string(),
            key_hash,
            status,
            key: None,
            error_message: String::new(),
            error_stack: None,
            host: truncate_chars(&worker.host, MAX_NAME_LEN),
            pid: worker.pid,
            timestamp: timestamp.trunc_subsecs(TIMESTAMP_PRECISION),
        }
    }

    pub fn reserved(
        work_unit: &str,
        key_hash: KeyHash,
        worker: &WorkerIdentity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::base(work_unit, key_hash, JobStatus::Reserved, worker, timestamp)
    }

    /// Error record. `message` is cut to [`MAX_ERROR_MESSAGE_LEN`] characters.
    pub fn errored(
        work_unit: &str,
        key_hash: KeyHash,
        key: serde_json::Value,
        message: &str,
        stack: Option<&str>,
        worker: &WorkerIdentity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut record = Self::base(work_unit, key_hash, JobStatus::Error, worker, timestamp);
        record.key = Some(key);
        record.error_message = truncate_chars(message, MAX_ERROR_MESSAGE_LEN);
        record.error_stack = stack.map(str::to_string);
        record
    }

    pub fn ignored(
        work_unit: &str,
        key_hash: KeyHash,
        key: serde_json::Value,
        worker: &WorkerIdentity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut record = Self::base(work_unit, key_hash, JobStatus::Ignore, worker, timestamp);
        record.key = Some(key);
        record
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Selection of records for listing / purging. Empty filter matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub work_unit: Option<String>,
    pub status: Option<JobStatus>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn work_unit(mut self, work_unit: impl Into<String>) -> Self {
        self.work_unit = Some(work_unit.into());
        self
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, record: &JobRecord) -> bool {
        self.work_unit
            .as_deref()
            .is_none_or(|w| w == record.work_unit)
            && self.status.is_none_or(|s| s == record.status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub reserved: usize,
    pub error: usize,
    pub ignore: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: JobStatus) {
        match status {
            JobStatus::Reserved => self.reserved += 1,
            JobStatus::Error => self.error += 1,
            JobStatus::Ignore => self.ignore += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.reserved + self.error + self.ignore
    }
}
