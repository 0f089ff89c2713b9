//! Reservation outcome.

use serde::{Deserialize, Serialize};

/// Result of [`ReservationStore::reserve`](crate::app::ReservationStore::reserve).
///
/// Losing the race is expected and frequent, so it is a value rather than
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reservation {
    /// The caller now owns the unit of work and must report back with
    /// `complete` or `error`.
    Acquired,

    /// Another worker holds (or held and errored on) this unit of work.
    AlreadyTaken,
}

impl Reservation {
    pub fn is_acquired(self) -> bool {
        matches!(self, Reservation::Acquired)
    }
}

impl From<Reservation> for bool {
    fn from(r: Reservation) -> Self {
        r.is_acquired()
    }
}
