//! 认养服务领域模型
//!
//! 包含兑换码、认养记录、徽章与解锁的核心实体定义

pub mod adoption;
pub mod badge;
pub mod code;

pub use adoption::{AdoptionRecord, ImpactSummary, SampledTree, TreeLocation, TreeMetrics};
pub use badge::{Badge, BadgeProgress, BadgeRequirement, RequirementType, Unlock};
pub use code::{CodeLookup, CodeStatus, ConsumeToken, normalize_code};
