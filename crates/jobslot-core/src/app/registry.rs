//! StoreRegistry - namespace ごとの ReservationStore キャッシュ
//!
//! # ライフサイクル
//! - worker の起動時に作成し、worker context が所有する（グローバルではない）
//! - `get()` の初回呼び出しで store を作成（テーブルが無ければ宣言）
//! - evict しない。プロセス終了とともに破棄

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::store::ReservationStore;
use crate::domain::{Namespace, ReservationError};
use crate::ports::{Clock, IdentitySource, JobTableFactory, SystemClock, SystemIdentity};

/// Process-local cache of reservation stores, keyed by namespace.
///
/// # 使用例
/// ```ignore
/// let registry = StoreRegistry::new(Arc::new(Backend::from_config(&config)));
/// let store = registry.get("lab").await?;
/// if store.reserve("Spikes", &key).await?.is_acquired() {
///     // compute, then complete / error
/// }
/// ```
pub struct StoreRegistry {
    factory: Arc<dyn JobTableFactory>,
    identity: Arc<dyn IdentitySource>,
    clock: Arc<dyn Clock>,
    // held across `open` so concurrent first lookups build a single store
    stores: Mutex<HashMap<Namespace, Arc<ReservationStore>>>,
}

impl StoreRegistry {
    pub fn new(factory: Arc<dyn JobTableFactory>) -> Self {
        Self {
            factory,
            identity: Arc::new(SystemIdentity::new()),
            clock: Arc::new(SystemClock),
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentitySource>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Store of `namespace`, created on first request.
    pub async fn get(&self, namespace: &str) -> Result<Arc<ReservationStore>, ReservationError> {
        let namespace = Namespace::new(namespace)?;
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(&namespace) {
            return Ok(Arc::clone(store));
        }

        let table = self.factory.open(&namespace).await?;
        let store = Arc::new(ReservationStore::new(
            namespace.clone(),
            table,
            Arc::clone(&self.identity),
            Arc::clone(&self.clock),
        ));
        stores.insert(namespace.clone(), Arc::clone(&store));
        tracing::debug!(%namespace, "created reservation store");
        Ok(store)
    }

    /// Namespaces with a cached store, sorted.
    pub async fn namespaces(&self) -> Vec<Namespace> {
        let mut names: Vec<Namespace> = self.stores.lock().await.keys().cloned().collect();
        names.sort();
        names
    }
}
