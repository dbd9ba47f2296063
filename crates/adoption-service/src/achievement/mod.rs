//! 成就模块
//!
//! 根据用户的认养账本推导徽章解锁集合，并与调用方已知的解锁做差集。
//!
//! ## 单调性
//!
//! 账本只追加，树木数、树种数和认养天数都不会减少，
//! 徽章条件又是静态的，因此解锁集合只增不减。
//! 引擎只返回事件，通知投递由调用方负责。

mod catalog;
mod engine;

pub use catalog::{BadgeCatalog, default_catalog};
pub use engine::{AchievementEngine, LedgerSnapshot, ReconcileOutcome};
