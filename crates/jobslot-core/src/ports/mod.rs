//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（共有ストレージ、OS、時計）へのインターフェースを提供し、
//! 実装の詳細を隠蔽します。

pub mod clock;
pub mod identity;
pub mod job_table;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::identity::{FixedIdentity, IdentitySource, SystemIdentity};
pub use self::job_table::{InsertOutcome, JobTable, JobTableFactory};
