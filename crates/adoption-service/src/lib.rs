//! 树木认养兑换服务
//!
//! 把一次性兑换码转换为用户拥有的认养记录，并根据认养记录推导徽章解锁。
//!
//! ## 模块结构
//!
//! - `repository`: 兑换码目录与认养账本（内存 / PostgreSQL）
//! - `sampler`: 树种与初始环境指标采样
//! - `service`: 兑换服务与查询服务
//! - `achievement`: 徽章目录与成就引擎
//! - `notification`: 解锁通知投递
//! - `api`: REST 接口

pub mod achievement;
pub mod api;
pub mod error;
pub mod models;
pub mod notification;
pub mod repository;
pub mod sampler;
pub mod service;

pub use achievement::{AchievementEngine, BadgeCatalog, ReconcileOutcome};
pub use error::{AdoptionError, Result};
pub use models::*;
pub use repository::{
    AdoptionLedger, CodeRegistry, CompensatingRedemptionStore, MemoryAdoptionLedger,
    MemoryCodeRegistry, PgAdoptionLedger, PgCodeRegistry, PgRedemptionStore, RedemptionStore,
};
pub use sampler::{MetricSampler, SeededMetricSampler};
pub use service::{AdoptionQueryService, CodeStatusDto, RedeemRequest, RedemptionService};
