//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **MemoryMedium**: 同一プロセス内の媒体（テスト・開発用）
//! - **SqliteMedium**: 共有ファイル上の媒体（複数プロセス・複数ホスト）
//! - **Backend**: 設定からどちらかを選ぶ

pub mod backend;
pub mod memory;
pub mod sqlite;

pub use self::backend::Backend;
pub use self::memory::{MemoryJobTable, MemoryMedium};
pub use self::sqlite::{SqliteJobTable, SqliteMedium};
