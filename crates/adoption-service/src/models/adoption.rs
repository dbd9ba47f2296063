//! 认养记录相关实体定义
//!
//! 包含认养记录、环境指标、种植位置以及影响力汇总

use std::iter::Sum;
use std::ops::Add;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::code::ConsumeToken;

/// 环境指标
///
/// 所有字段均为非负数；只允许由外部生长过程单调推进
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeMetrics {
    /// 吸收的 CO2（kg）
    pub co2_absorbed: f64,
    /// 产生的氧气（kg）
    pub oxygen_produced: f64,
    /// 节约的水（升）
    pub water_saved: f64,
    /// 创造的栖息地面积（m²）
    pub habitat_created: f64,
}

impl TreeMetrics {
    pub fn new(co2_absorbed: f64, oxygen_produced: f64, water_saved: f64, habitat_created: f64) -> Self {
        Self {
            co2_absorbed,
            oxygen_produced,
            water_saved,
            habitat_created,
        }
    }

    /// 检查所有指标是否为有限的非负数
    pub fn is_valid(&self) -> bool {
        [
            self.co2_absorbed,
            self.oxygen_produced,
            self.water_saved,
            self.habitat_created,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl Add for TreeMetrics {
    type Output = TreeMetrics;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            co2_absorbed: self.co2_absorbed + rhs.co2_absorbed,
            oxygen_produced: self.oxygen_produced + rhs.oxygen_produced,
            water_saved: self.water_saved + rhs.water_saved,
            habitat_created: self.habitat_created + rhs.habitat_created,
        }
    }
}

impl<'a> Sum<&'a TreeMetrics> for TreeMetrics {
    fn sum<I: Iterator<Item = &'a TreeMetrics>>(iter: I) -> Self {
        iter.fold(TreeMetrics::default(), |acc, m| acc + *m)
    }
}

/// 种植位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub country: String,
}

impl TreeLocation {
    pub fn new(latitude: f64, longitude: f64, country: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            country: country.into(),
        }
    }
}

/// 采样结果：新认养树木的树种、位置与初始指标
#[derive(Debug, Clone, PartialEq)]
pub struct SampledTree {
    pub species: String,
    pub location: TreeLocation,
    pub metrics: TreeMetrics,
}

/// 认养记录
///
/// 每条记录对应一次成功的兑换，归属唯一的用户，创建后不可修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionRecord {
    pub id: Uuid,
    /// 所属用户 ID
    pub owner_id: String,
    /// 用户为树取的名字
    pub label: String,
    /// 目录中登记的兑换码
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub species: String,
    pub location: TreeLocation,
    pub metrics: TreeMetrics,
}

impl AdoptionRecord {
    /// 基于消费凭证和采样结果构建新记录
    pub fn from_redemption(
        owner_id: impl Into<String>,
        label: impl Into<String>,
        token: &ConsumeToken,
        sampled: SampledTree,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            owner_id: owner_id.into(),
            label: label.into(),
            code: token.code.clone(),
            created_at: Utc::now(),
            species: sampled.species,
            location: sampled.location,
            metrics: sampled.metrics,
        }
    }
}

/// 用户影响力汇总视图
///
/// 用于展示用户所有树木的累计环境贡献，非存储实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    pub owner_id: String,
    pub tree_count: u64,
    pub totals: TreeMetrics,
}

impl ImpactSummary {
    pub fn from_records(owner_id: impl Into<String>, records: &[AdoptionRecord]) -> Self {
        Self {
            owner_id: owner_id.into(),
            tree_count: records.len() as u64,
            totals: records.iter().map(|r| &r.metrics).sum(),
        }
    }
}
