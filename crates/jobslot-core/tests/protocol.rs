//! Reservation protocol properties, checked against every medium.

use std::path::Path;
use std::sync::Arc;

use jobslot_core::ports::{FixedIdentity, JobTableFactory};
use jobslot_core::{
    JobKey, JobStatus, MemoryMedium, RecordFilter, Reservation, SqliteConfig, SqliteMedium,
    StoreRegistry,
};
use rstest::rstest;
use tokio::sync::Barrier;

#[derive(Debug, Clone, Copy)]
enum Medium {
    Memory,
    Sqlite,
}

/// One factory per simulated worker process. Memory workers share a
/// medium; SQLite workers share only the directory, each with its own
/// connection.
struct Cluster {
    memory: MemoryMedium,
    _dir: tempfile::TempDir,
    sqlite: SqliteConfig,
    medium: Medium,
}

impl Cluster {
    fn new(medium: Medium) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = SqliteConfig {
            dir: dir.path().to_path_buf(),
            busy_timeout_ms: 30_000,
        };
        Self {
            memory: MemoryMedium::new(),
            _dir: dir,
            sqlite,
            medium,
        }
    }

    fn factory(&self) -> Arc<dyn JobTableFactory> {
        match self.medium {
            Medium::Memory => Arc::new(self.memory.clone()),
            Medium::Sqlite => Arc::new(SqliteMedium::new(&self.sqlite)),
        }
    }

    fn worker(&self, id: u32) -> StoreRegistry {
        StoreRegistry::new(self.factory())
            .with_identity(Arc::new(FixedIdentity::new(format!("host-{id}"), id)))
    }

    fn dir(&self) -> &Path {
        &self.sqlite.dir
    }
}

fn key(id: i64) -> JobKey {
    JobKey::new().with("id", id)
}

#[rstest]
#[case::memory(Medium::Memory)]
#[case::sqlite(Medium::Sqlite)]
#[tokio::test]
async fn second_reserve_is_taken(#[case] medium: Medium) {
    let cluster = Cluster::new(medium);
    let store = cluster.worker(1).get("lab").await.unwrap();

    assert_eq!(store.reserve("T", &key(1)).await.unwrap(), Reservation::Acquired);
    assert_eq!(
        store.reserve("T", &key(1)).await.unwrap(),
        Reservation::AlreadyTaken
    );
}

#[rstest]
#[case::memory(Medium::Memory)]
#[case::sqlite(Medium::Sqlite)]
#[tokio::test]
async fn complete_then_reserve_again(#[case] medium: Medium) {
    let cluster = Cluster::new(medium);
    let store = cluster.worker(1).get("lab").await.unwrap();

    assert!(store.reserve("T", &key(1)).await.unwrap().is_acquired());
    store.complete("T", &key(1)).await.unwrap();
    assert!(store.reserve("T", &key(1)).await.unwrap().is_acquired());
}

#[rstest]
#[case::memory(Medium::Memory)]
#[case::sqlite(Medium::Sqlite)]
#[tokio::test]
async fn error_then_reserve_is_taken(#[case] medium: Medium) {
    let cluster = Cluster::new(medium);
    let store = cluster.worker(1).get("lab").await.unwrap();

    assert!(store.reserve("T", &key(1)).await.unwrap().is_acquired());
    store.error("T", &key(1), "boom", None).await.unwrap();
    assert_eq!(
        store.reserve("T", &key(1)).await.unwrap(),
        Reservation::AlreadyTaken
    );

    let record = store.get("T", &key(1)).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Error);
    assert_eq!(record.error_message, "boom");
}

#[rstest]
#[case::memory(Medium::Memory)]
#[case::sqlite(Medium::Sqlite)]
#[tokio::test]
async fn complete_on_unreserved_key_is_noop(#[case] medium: Medium) {
    let cluster = Cluster::new(medium);
    let store = cluster.worker(1).get("lab").await.unwrap();

    store.complete("T", &key(1)).await.unwrap();
    assert_eq!(store.counts().await.unwrap().total(), 0);
}

#[rstest]
#[case::memory(Medium::Memory)]
#[case::sqlite(Medium::Sqlite)]
#[tokio::test]
async fn key_order_does_not_change_identity(#[case] medium: Medium) {
    let cluster = Cluster::new(medium);
    let store = cluster.worker(1).get("lab").await.unwrap();

    let forward = JobKey::new().with("subject", 3).with("session", "am");
    let backward = JobKey::new().with("session", "am").with("subject", 3);
    assert!(store.reserve("T", &forward).await.unwrap().is_acquired());
    assert!(!store.reserve("T", &backward).await.unwrap().is_acquired());
}

#[rstest]
#[case::memory(Medium::Memory)]
#[case::sqlite(Medium::Sqlite)]
#[tokio::test]
async fn workers_see_each_others_records(#[case] medium: Medium) {
    let cluster = Cluster::new(medium);
    let a = cluster.worker(1).get("lab").await.unwrap();
    let b = cluster.worker(2).get("lab").await.unwrap();

    assert!(a.reserve("T", &key(1)).await.unwrap().is_acquired());
    assert!(!b.reserve("T", &key(1)).await.unwrap().is_acquired());

    let record = b.get("T", &key(1)).await.unwrap().unwrap();
    assert_eq!(record.host, "host-1");
    assert_eq!(record.pid, 1);

    // b may not own it, but completion by a frees it for b
    a.complete("T", &key(1)).await.unwrap();
    assert!(b.reserve("T", &key(1)).await.unwrap().is_acquired());
}

#[rstest]
#[case::memory(Medium::Memory)]
#[case::sqlite(Medium::Sqlite)]
#[tokio::test]
async fn system_clock_timestamps_match_across_media(#[case] medium: Medium) {
    let cluster = Cluster::new(medium);
    let store = cluster.worker(1).get("lab").await.unwrap();

    store.reserve("T", &key(1)).await.unwrap();
    let record = store.get("T", &key(1)).await.unwrap().unwrap();
    assert_eq!(record.timestamp.timestamp_subsec_nanos() % 1_000, 0);
    let listed = store.list(&RecordFilter::all()).await.unwrap();
    assert_eq!(listed[0].timestamp, record.timestamp);
}

#[rstest]
#[case::memory_1(Medium::Memory, 1)]
#[case::memory_2(Medium::Memory, 2)]
#[case::memory_32(Medium::Memory, 32)]
#[case::sqlite_1(Medium::Sqlite, 1)]
#[case::sqlite_8(Medium::Sqlite, 8)]
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn exactly_one_concurrent_reserver_wins(#[case] medium: Medium, #[case] workers: usize) {
    let cluster = Cluster::new(medium);

    // open every worker's store first so the race is only about reserve
    let mut stores = Vec::with_capacity(workers);
    for id in 0..workers {
        stores.push(cluster.worker(id as u32).get("lab").await.unwrap());
    }

    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = stores
        .into_iter()
        .map(|store| {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                store.reserve("T", &key(1)).await.unwrap()
            })
        })
        .collect();

    let mut acquired = 0;
    for h in handles {
        if h.await.unwrap().is_acquired() {
            acquired += 1;
        }
    }
    assert_eq!(acquired, 1);
}

#[tokio::test]
async fn sqlite_records_survive_reopen() {
    let cluster = Cluster::new(Medium::Sqlite);
    {
        let store = cluster.worker(1).get("lab").await.unwrap();
        store.reserve("T", &key(1)).await.unwrap();
        store.error("T", &key(2), "disk full", Some("stack")).await.unwrap();
    }
    assert!(cluster.dir().join("lab.sqlite3").exists());

    // a new "process" with its own registry and connection
    let store = cluster.worker(2).get("lab").await.unwrap();
    let errors = store
        .list(&RecordFilter::all().status(JobStatus::Error))
        .await
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_message, "disk full");
    assert_eq!(errors[0].error_stack.as_deref(), Some("stack"));
    assert!(!store.reserve("T", &key(1)).await.unwrap().is_acquired());
}

#[tokio::test]
async fn sqlite_drop_table_is_redeclared_by_fresh_registry() {
    let cluster = Cluster::new(Medium::Sqlite);
    let store = cluster.worker(1).get("lab").await.unwrap();
    store.reserve("T", &key(1)).await.unwrap();
    store.drop_table().await.unwrap();
    assert!(store.reserve("T", &key(1)).await.is_err());

    let fresh = cluster.worker(1).get("lab").await.unwrap();
    assert!(fresh.reserve("T", &key(1)).await.unwrap().is_acquired());
}
