//! App - アプリケーション層
//!
//! ports を組み合わせて予約プロトコルを実装します。
//!
//! # 主要コンポーネント
//! - **ReservationStore**: reserve / complete / error（と運用向け操作）
//! - **StoreRegistry**: namespace -> ReservationStore のキャッシュ

pub mod registry;
pub mod store;

pub use self::registry::StoreRegistry;
pub use self::store::ReservationStore;
