//! Identity port - host / pid の取得
//!
//! Host and pid are written onto every record so operators can find the
//! worker behind a stuck or errored reservation.

use crate::domain::WorkerIdentity;

pub trait IdentitySource: Send + Sync {
    fn identity(&self) -> WorkerIdentity;
}

/// Identity of the current process.
///
/// The hostname is resolved once at construction. If it cannot be read the
/// host field is left empty, which only degrades diagnostics.
#[derive(Debug, Clone)]
pub struct SystemIdentity {
    host: String,
}

impl SystemIdentity {
    pub fn new() -> Self {
        let host = match hostname::get() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                tracing::debug!(error = %e, "hostname unavailable, recording empty host");
                String::new()
            }
        };
        Self { host }
    }
}

impl Default for SystemIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySource for SystemIdentity {
    fn identity(&self) -> WorkerIdentity {
        WorkerIdentity {
            host: self.host.clone(),
            pid: std::process::id(),
        }
    }
}

/// テスト用
#[derive(Debug, Clone)]
pub struct FixedIdentity(pub WorkerIdentity);

impl FixedIdentity {
    pub fn new(host: impl Into<String>, pid: u32) -> Self {
        Self(WorkerIdentity {
            host: host.into(),
            pid,
        })
    }
}

impl IdentitySource for FixedIdentity {
    fn identity(&self) -> WorkerIdentity {
        self.0.clone()
    }
}
