//! Backend - 設定から選ばれる媒体

use std::sync::Arc;

use async_trait::async_trait;

use super::{MemoryMedium, SqliteMedium};
use crate::config::{BackendKind, JobslotConfig};
use crate::domain::{Namespace, StorageError};
use crate::ports::{JobTable, JobTableFactory};

/// Storage medium selected by [`JobslotConfig`].
#[derive(Debug, Clone)]
pub enum Backend {
    Memory(MemoryMedium),
    Sqlite(SqliteMedium),
}

impl Backend {
    pub fn from_config(config: &JobslotConfig) -> Self {
        match config.backend {
            BackendKind::Memory => Backend::Memory(MemoryMedium::new()),
            BackendKind::Sqlite => Backend::Sqlite(SqliteMedium::new(&config.sqlite)),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Memory(_) => BackendKind::Memory,
            Backend::Sqlite(_) => BackendKind::Sqlite,
        }
    }
}

#[async_trait]
impl JobTableFactory for Backend {
    async fn open(&self, namespace: &Namespace) -> Result<Arc<dyn JobTable>, StorageError> {
        match self {
            Backend::Memory(m) => m.open(namespace).await,
            Backend::Sqlite(s) => s.open(namespace).await,
        }
    }
}
