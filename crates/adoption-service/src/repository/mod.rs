//! 存储仓储层
//!
//! 提供兑换码目录和认养账本的数据访问接口。
//!
//! ## 设计原则
//!
//! - 服务层只依赖 trait，具体实现通过构造函数注入
//! - 兑换码消费必须是单条原子操作（比较并交换），不允许先查后改
//! - 账本只追加，不覆盖也不删除
//! - 兑换落库通过 `RedemptionStore`：PostgreSQL 使用单事务，内存实现使用补偿释放
//! - 内存实现基于 DashMap，PostgreSQL 实现基于 SQLx

mod code_repo;
mod ledger_repo;
mod memory;
mod redemption_repo;
mod settlement;
mod traits;

pub use code_repo::PgCodeRegistry;
pub use ledger_repo::PgAdoptionLedger;
pub use memory::{MemoryAdoptionLedger, MemoryCodeRegistry};
pub use redemption_repo::PgRedemptionStore;
pub use settlement::CompensatingRedemptionStore;
pub use traits::*;

/// 嵌入的数据库迁移
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
