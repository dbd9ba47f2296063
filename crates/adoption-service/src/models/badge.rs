//! 徽章与解锁实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 解锁条件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementType {
    /// 认养树木数量
    Trees,
    /// 认养的不同树种数量
    Species,
    /// 自首次认养以来的整天数
    Days,
}

/// 解锁条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeRequirement {
    #[serde(rename = "type")]
    pub requirement_type: RequirementType,
    pub count: u32,
}

impl BadgeRequirement {
    pub fn trees(count: u32) -> Self {
        Self {
            requirement_type: RequirementType::Trees,
            count,
        }
    }
}

/// 徽章定义（静态目录项）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    /// 徽章图片资源路径
    pub image: String,
    pub requirement: BadgeRequirement,
}

impl Badge {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        image: impl Into<String>,
        requirement: BadgeRequirement,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            image: image.into(),
            requirement,
        }
    }
}

/// 徽章解锁事件
///
/// 首次满足条件时创建，`unlocked_at` 之后不再重新计算
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unlock {
    pub badge_id: String,
    pub unlocked_at: DateTime<Utc>,
}

impl Unlock {
    pub fn new(badge_id: impl Into<String>, unlocked_at: DateTime<Utc>) -> Self {
        Self {
            badge_id: badge_id.into(),
            unlocked_at,
        }
    }
}

/// 徽章进度视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeProgress {
    pub badge: Badge,
    /// 当前进度（不超过 required）
    pub current: u32,
    pub required: u32,
    pub eligible: bool,
}
