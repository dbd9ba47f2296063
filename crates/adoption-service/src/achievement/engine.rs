//! 成就引擎
//!
//! 从账本快照计算满足条件的徽章，与已知解锁合并后得出全部解锁和新增解锁。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::BadgeCatalog;
use crate::error::Result;
use crate::models::{AdoptionRecord, Badge, BadgeProgress, RequirementType, Unlock};
use crate::repository::AdoptionLedger;
use adoption_shared::observability::metrics;

/// 账本快照
///
/// 只包含徽章条件需要的统计值
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub tree_count: u64,
    pub distinct_species: u64,
    /// 自首次认养以来的整天数
    pub days_active: u64,
}

impl LedgerSnapshot {
    pub fn from_records(records: &[AdoptionRecord], now: DateTime<Utc>) -> Self {
        let distinct_species = records
            .iter()
            .map(|r| r.species.as_str())
            .collect::<HashSet<_>>()
            .len() as u64;

        let days_active = records
            .iter()
            .map(|r| r.created_at)
            .min()
            .map(|first| (now - first).num_days().max(0) as u64)
            .unwrap_or(0);

        Self {
            tree_count: records.len() as u64,
            distinct_species,
            days_active,
        }
    }

    pub fn value_for(&self, requirement_type: RequirementType) -> u64 {
        match requirement_type {
            RequirementType::Trees => self.tree_count,
            RequirementType::Species => self.distinct_species,
            RequirementType::Days => self.days_active,
        }
    }

    pub fn satisfies(&self, badge: &Badge) -> bool {
        self.value_for(badge.requirement.requirement_type) >= u64::from(badge.requirement.count)
    }
}

/// 对账结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    /// 全部已解锁徽章（按目录顺序）
    pub all_unlocked: Vec<Unlock>,
    /// 本次新增解锁
    pub newly_unlocked: Vec<Unlock>,
}

/// 成就引擎
pub struct AchievementEngine {
    ledger: Arc<dyn AdoptionLedger>,
    catalog: Arc<BadgeCatalog>,
}

impl AchievementEngine {
    pub fn new(ledger: Arc<dyn AdoptionLedger>, catalog: Arc<BadgeCatalog>) -> Self {
        Self { ledger, catalog }
    }

    pub fn catalog(&self) -> &BadgeCatalog {
        &self.catalog
    }

    /// 以当前时间对账
    pub async fn reconcile(&self, owner_id: &str, known: &[Unlock]) -> Result<ReconcileOutcome> {
        self.reconcile_at(owner_id, known, Utc::now()).await
    }

    /// 对账
    ///
    /// - 只有满足条件的徽章进入全部解锁，已知解锁只沿用最早的 `unlocked_at`
    /// - 已知但当前不满足条件的徽章不计入结果
    /// - 目录中不存在的已知 ID 被忽略
    /// - 新增解锁 = 满足条件且不在已知集合中的徽章
    #[instrument(skip(self, known), fields(owner_id = %owner_id, known = known.len()))]
    pub async fn reconcile_at(
        &self,
        owner_id: &str,
        known: &[Unlock],
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome> {
        let snapshot = self.snapshot(owner_id, now).await?;

        let mut earliest: HashMap<&str, DateTime<Utc>> = HashMap::new();
        for unlock in known {
            if !self.catalog.contains(&unlock.badge_id) {
                warn!(badge_id = %unlock.badge_id, "忽略目录中不存在的已知解锁");
                continue;
            }
            earliest
                .entry(unlock.badge_id.as_str())
                .and_modify(|at| *at = (*at).min(unlock.unlocked_at))
                .or_insert(unlock.unlocked_at);
        }

        let mut outcome = ReconcileOutcome::default();
        for badge in self.catalog.iter() {
            if !snapshot.satisfies(badge) {
                if earliest.contains_key(badge.id.as_str()) {
                    warn!(badge_id = %badge.id, "已知解锁不满足当前条件，不计入结果");
                }
                continue;
            }
            match earliest.get(badge.id.as_str()) {
                Some(at) => outcome.all_unlocked.push(Unlock::new(&badge.id, *at)),
                None => {
                    let unlock = Unlock::new(&badge.id, now);
                    outcome.all_unlocked.push(unlock.clone());
                    outcome.newly_unlocked.push(unlock);
                }
            }
        }

        for unlock in &outcome.newly_unlocked {
            metrics::record_badge_unlock(&unlock.badge_id);
            info!(badge_id = %unlock.badge_id, "徽章解锁");
        }

        debug!(
            tree_count = snapshot.tree_count,
            all = outcome.all_unlocked.len(),
            newly = outcome.newly_unlocked.len(),
            "成就对账完成"
        );

        Ok(outcome)
    }

    /// 各徽章的当前进度
    pub async fn progress(&self, owner_id: &str) -> Result<Vec<BadgeProgress>> {
        let snapshot = self.snapshot(owner_id, Utc::now()).await?;

        Ok(self
            .catalog
            .iter()
            .map(|badge| {
                let required = badge.requirement.count;
                let value = snapshot.value_for(badge.requirement.requirement_type);
                BadgeProgress {
                    badge: badge.clone(),
                    current: value.min(u64::from(required)) as u32,
                    required,
                    eligible: snapshot.satisfies(badge),
                }
            })
            .collect())
    }

    async fn snapshot(&self, owner_id: &str, now: DateTime<Utc>) -> Result<LedgerSnapshot> {
        // 纯数量条件只需要计数，避免读取全部记录
        if self.catalog.only_counts_trees() {
            let tree_count = self.ledger.count(owner_id).await?;
            return Ok(LedgerSnapshot {
                tree_count,
                ..Default::default()
            });
        }

        let records = self.ledger.get(owner_id).await?;
        Ok(LedgerSnapshot::from_records(&records, now))
    }
}
