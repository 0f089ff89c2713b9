//! jobslot-core
//!
//! Distributed job reservation: independent workers agree on who computes a
//! unit of work by racing a conditional insert on a shared job table.
//!
//! # モジュール構成
//! - **domain**: JobKey, KeyHash, JobRecord, Reservation, errors
//! - **ports**: JobTable（共有ストレージ契約）, IdentitySource, Clock
//! - **impls**: MemoryMedium, SqliteMedium, Backend
//! - **app**: ReservationStore, StoreRegistry
//! - **config**: 環境変数からの設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{ReservationStore, StoreRegistry};
pub use config::{BackendKind, JobslotConfig, SqliteConfig};
pub use domain::{
    JobKey, JobRecord, JobStatus, KeyHash, KeyValue, RecordFilter, Reservation,
    ReservationError, StatusCounts, StorageError, compute_key_hash,
};
pub use impls::{Backend, MemoryMedium, SqliteMedium};
