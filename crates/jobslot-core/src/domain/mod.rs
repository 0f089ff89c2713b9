//! Domain model (keys, key hashes, records, outcomes, errors).

pub mod errors;
pub mod key;
pub mod key_hash;
pub mod namespace;
pub mod outcome;
pub mod record;

pub use self::errors::{ReservationError, StorageError};
pub use self::key::{JobKey, KeyValue};
pub use self::key_hash::{KEY_HASH_LEN, KeyHash, compute_key_hash};
pub use self::namespace::Namespace;
pub use self::outcome::Reservation;
pub use self::record::{
    JobRecord, JobStatus, MAX_ERROR_MESSAGE_LEN, MAX_NAME_LEN, RecordFilter, StatusCounts,
    WorkerIdentity, check_work_unit,
};
