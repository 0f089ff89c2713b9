//! MemoryMedium - 同一プロセス内の共有ストレージ
//!
//! # 実装詳細
//! - HashMap<Namespace, HashMap<(work_unit, key_hash), JobRecord>>
//! - std Mutex で排他制御（await をまたいで保持しない）
//! - clone したハンドルは同じ媒体を共有する（複数 registry = 複数 worker の模擬）
//!
//! The mutex here is the medium's own uniqueness guarantee, playing the
//! role a database's unique index plays for [`SqliteMedium`](super::SqliteMedium).

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::{JobRecord, KeyHash, Namespace, RecordFilter, StorageError};
use crate::ports::{InsertOutcome, JobTable, JobTableFactory};

type Table = HashMap<(String, KeyHash), JobRecord>;
type Tables = Arc<Mutex<HashMap<Namespace, Table>>>;

/// In-process storage medium shared by every handle cloned from it.
#[derive(Debug, Clone, Default)]
pub struct MemoryMedium {
    tables: Tables,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobTableFactory for MemoryMedium {
    async fn open(&self, namespace: &Namespace) -> Result<Arc<dyn JobTable>, StorageError> {
        let mut tables = self.tables.lock().map_err(|_| StorageError::Poisoned)?;
        tables.entry(namespace.clone()).or_default();
        Ok(Arc::new(MemoryJobTable {
            namespace: namespace.clone(),
            tables: Arc::clone(&self.tables),
        }))
    }
}

/// Job table of one namespace inside a [`MemoryMedium`].
pub struct MemoryJobTable {
    namespace: Namespace,
    tables: Tables,
}

impl MemoryJobTable {
    fn with_table<R>(&self, f: impl FnOnce(&mut Table) -> R) -> Result<R, StorageError> {
        let mut tables = self.tables.lock().map_err(|_| StorageError::Poisoned)?;
        let table = tables
            .get_mut(&self.namespace)
            .ok_or_else(|| StorageError::MissingTable(self.namespace.to_string()))?;
        Ok(f(table))
    }
}

#[async_trait]
impl JobTable for MemoryJobTable {
    async fn insert(&self, record: JobRecord) -> Result<InsertOutcome, StorageError> {
        self.with_table(|table| {
            match table.entry((record.work_unit.clone(), record.key_hash.clone())) {
                Entry::Occupied(_) => InsertOutcome::Duplicate,
                Entry::Vacant(slot) => {
                    slot.insert(record);
                    InsertOutcome::Inserted
                }
            }
        })
    }

    async fn replace(&self, record: JobRecord) -> Result<(), StorageError> {
        self.with_table(|table| {
            table.insert((record.work_unit.clone(), record.key_hash.clone()), record);
        })
    }

    async fn delete(&self, work_unit: &str, key_hash: &KeyHash) -> Result<bool, StorageError> {
        self.with_table(|table| {
            table
                .remove(&(work_unit.to_string(), key_hash.clone()))
                .is_some()
        })
    }

    async fn get(
        &self,
        work_unit: &str,
        key_hash: &KeyHash,
    ) -> Result<Option<JobRecord>, StorageError> {
        self.with_table(|table| {
            table
                .get(&(work_unit.to_string(), key_hash.clone()))
                .cloned()
        })
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<JobRecord>, StorageError> {
        self.with_table(|table| {
            let mut records: Vec<JobRecord> = table
                .values()
                .filter(|r| filter.matches(r))
                .cloned()
                .collect();
            records.sort_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| a.key_hash.cmp(&b.key_hash))
            });
            records
        })
    }

    async fn delete_where(&self, filter: &RecordFilter) -> Result<u64, StorageError> {
        self.with_table(|table| {
            let before = table.len();
            table.retain(|_, r| !filter.matches(r));
            (before - table.len()) as u64
        })
    }

    async fn drop_table(&self) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().map_err(|_| StorageError::Poisoned)?;
        tables.remove(&self.namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobKey, JobStatus, WorkerIdentity, compute_key_hash};
    use chrono::{TimeZone, Utc};

    fn ns(name: &str) -> Namespace {
        Namespace::new(name).unwrap()
    }

    fn reserved(work_unit: &str, id: i64) -> JobRecord {
        let hash = compute_key_hash(&JobKey::new().with("id", id)).unwrap();
        let worker = WorkerIdentity {
            host: "h".to_string(),
            pid: 1,
        };
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, id as u32 % 60).unwrap();
        JobRecord::reserved(work_unit, hash, &worker, ts)
    }

    #[tokio::test]
    async fn second_insert_is_duplicate() {
        let table = MemoryMedium::new().open(&ns("lab")).await.unwrap();
        assert_eq!(
            table.insert(reserved("T", 1)).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            table.insert(reserved("T", 1)).await.unwrap(),
            InsertOutcome::Duplicate
        );
        // same key under another work unit is a different row
        assert_eq!(
            table.insert(reserved("U", 1)).await.unwrap(),
            InsertOutcome::Inserted
        );
    }

    #[tokio::test]
    async fn clones_share_the_medium() {
        let medium = MemoryMedium::new();
        let a = medium.clone().open(&ns("lab")).await.unwrap();
        let b = medium.open(&ns("lab")).await.unwrap();

        a.insert(reserved("T", 1)).await.unwrap();
        assert_eq!(
            b.insert(reserved("T", 1)).await.unwrap(),
            InsertOutcome::Duplicate
        );
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let medium = MemoryMedium::new();
        let a = medium.open(&ns("lab_a")).await.unwrap();
        let b = medium.open(&ns("lab_b")).await.unwrap();

        a.insert(reserved("T", 1)).await.unwrap();
        assert_eq!(
            b.insert(reserved("T", 1)).await.unwrap(),
            InsertOutcome::Inserted
        );
    }

    #[tokio::test]
    async fn replace_overwrites_and_delete_is_idempotent() {
        let table = MemoryMedium::new().open(&ns("lab")).await.unwrap();
        let mut record = reserved("T", 1);
        table.insert(record.clone()).await.unwrap();

        record.status = JobStatus::Error;
        table.replace(record.clone()).await.unwrap();
        let stored = table.get("T", &record.key_hash).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Error);

        assert!(table.delete("T", &record.key_hash).await.unwrap());
        assert!(!table.delete("T", &record.key_hash).await.unwrap());
    }

    #[tokio::test]
    async fn list_and_delete_where_respect_filter() {
        let table = MemoryMedium::new().open(&ns("lab")).await.unwrap();
        for id in [3, 1, 2] {
            table.insert(reserved("T", id)).await.unwrap();
        }
        table.insert(reserved("U", 1)).await.unwrap();

        let listed = table.list(&RecordFilter::all().work_unit("T")).await.unwrap();
        let seconds: Vec<u32> = listed
            .iter()
            .map(|r| chrono::Timelike::second(&r.timestamp))
            .collect();
        assert_eq!(seconds, vec![1, 2, 3]);

        let removed = table
            .delete_where(&RecordFilter::all().work_unit("T"))
            .await
            .unwrap();
        assert_eq!(removed, 3);
        assert_eq!(table.list(&RecordFilter::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropped_table_reports_missing() {
        let medium = MemoryMedium::new();
        let table = medium.open(&ns("lab")).await.unwrap();
        table.drop_table().await.unwrap();

        let err = table.insert(reserved("T", 1)).await.unwrap_err();
        assert!(matches!(err, StorageError::MissingTable(_)));

        // reopening declares it again
        let table = medium.open(&ns("lab")).await.unwrap();
        assert_eq!(
            table.insert(reserved("T", 1)).await.unwrap(),
            InsertOutcome::Inserted
        );
    }
}
