//! JobTable port - 共有ストレージ媒体の契約
//!
//! All mutual exclusion lives behind this trait. An implementation must
//! guarantee, across every process sharing the medium:
//! - `insert` is an atomic create-if-absent on `(work_unit, key_hash)` and
//!   reports an existing row as [`InsertOutcome::Duplicate`], never as an error
//! - `replace` atomically removes any row with the same key and writes the new one
//! - `delete` is unconditional and idempotent
//!
//! # 実装
//! - **MemoryMedium**: 同一プロセス内（テスト・開発用）
//! - **SqliteMedium**: 共有ファイル（複数プロセス・複数ホスト）

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{JobRecord, KeyHash, Namespace, RecordFilter, StorageError};

/// Outcome of a conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same `(work_unit, key_hash)` already exists.
    Duplicate,
}

/// Job table of one namespace.
#[async_trait]
pub trait JobTable: Send + Sync {
    /// Atomic conditional insert.
    async fn insert(&self, record: JobRecord) -> Result<InsertOutcome, StorageError>;

    /// Atomic insert-or-replace.
    async fn replace(&self, record: JobRecord) -> Result<(), StorageError>;

    /// Delete by composite key. Returns whether a row was removed.
    async fn delete(&self, work_unit: &str, key_hash: &KeyHash) -> Result<bool, StorageError>;

    async fn get(
        &self,
        work_unit: &str,
        key_hash: &KeyHash,
    ) -> Result<Option<JobRecord>, StorageError>;

    /// Matching rows ordered by timestamp, then key hash.
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<JobRecord>, StorageError>;

    /// Delete every matching row. Returns the number removed.
    async fn delete_where(&self, filter: &RecordFilter) -> Result<u64, StorageError>;

    /// Remove the table itself.
    async fn drop_table(&self) -> Result<(), StorageError>;
}

/// Opens job tables by namespace (the "connection" a registry holds).
#[async_trait]
pub trait JobTableFactory: Send + Sync {
    /// Open the job table of `namespace`, declaring it if absent.
    ///
    /// Declaration must be create-if-absent so concurrent openers in other
    /// processes are harmless.
    async fn open(&self, namespace: &Namespace) -> Result<Arc<dyn JobTable>, StorageError>;
}
