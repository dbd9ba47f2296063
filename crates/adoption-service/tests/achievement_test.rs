//! 成就对账集成测试
//!
//! 兑换写入内存账本后对账，验证阈值跨越、单调性和通知不重复。

use std::collections::HashSet;
use std::sync::Arc;

use adoption_shared::config::SeedCode;
use adoption_shared::test_utils::{test_code, test_owner_id};
use chrono::{Duration, Utc};
use tree_adoption::{
    AchievementEngine, BadgeCatalog, MemoryAdoptionLedger, MemoryCodeRegistry, RedeemRequest,
    RedemptionService, SeededMetricSampler, Unlock,
};

struct Harness {
    codes: Vec<SeedCode>,
    redemption: RedemptionService,
    engine: AchievementEngine,
}

impl Harness {
    fn new(code_count: usize) -> Self {
        let codes: Vec<SeedCode> = (0..code_count)
            .map(|_| SeedCode::new(test_code(), None))
            .collect();
        let registry = Arc::new(MemoryCodeRegistry::with_codes(&codes));
        let ledger = Arc::new(MemoryAdoptionLedger::new());

        Self {
            redemption: RedemptionService::new(
                registry,
                ledger.clone(),
                Arc::new(SeededMetricSampler::with_seed(5)),
            ),
            engine: AchievementEngine::new(ledger, Arc::new(BadgeCatalog::default())),
            codes,
        }
    }

    /// 为用户兑换第 index 个兑换码
    async fn adopt(&self, owner: &str, index: usize) {
        self.redemption
            .redeem(RedeemRequest::new(&self.codes[index].code, "Albero", owner))
            .await
            .unwrap();
    }
}

fn ids(unlocks: &[Unlock]) -> Vec<&str> {
    unlocks.iter().map(|u| u.badge_id.as_str()).collect()
}

#[tokio::test]
async fn test_threshold_crossings() {
    let h = Harness::new(5);
    let owner = test_owner_id();

    let empty = h.engine.reconcile(&owner, &[]).await.unwrap();
    assert!(empty.all_unlocked.is_empty());

    h.adopt(&owner, 0).await;
    let first = h.engine.reconcile(&owner, &[]).await.unwrap();
    assert_eq!(ids(&first.newly_unlocked), vec!["badge-1"]);

    for i in 1..5 {
        h.adopt(&owner, i).await;
    }
    let fifth = h
        .engine
        .reconcile(&owner, &first.all_unlocked)
        .await
        .unwrap();
    assert_eq!(ids(&fifth.newly_unlocked), vec!["badge-2"]);
    assert_eq!(ids(&fifth.all_unlocked), vec!["badge-1", "badge-2"]);
}

#[tokio::test]
async fn test_unlocks_are_monotonic() {
    let h = Harness::new(12);
    let owner = test_owner_id();
    let t1 = Utc::now();

    h.adopt(&owner, 0).await;
    let at_t1 = h.engine.reconcile_at(&owner, &[], t1).await.unwrap();
    let badge_1 = at_t1.all_unlocked[0].clone();
    assert_eq!(badge_1.unlocked_at, t1);

    let mut known = at_t1.all_unlocked;
    for i in 1..12 {
        h.adopt(&owner, i).await;
        let later = t1 + Duration::minutes(i as i64);
        let outcome = h.engine.reconcile_at(&owner, &known, later).await.unwrap();

        assert!(outcome.all_unlocked.contains(&badge_1));
        for previous in &known {
            assert!(outcome.all_unlocked.contains(previous));
        }
        known = outcome.all_unlocked;
    }

    assert_eq!(ids(&known), vec!["badge-1", "badge-2", "badge-3"]);
}

#[tokio::test]
async fn test_no_duplicate_notifications() {
    let h = Harness::new(25);
    let owner = test_owner_id();

    let mut known: Vec<Unlock> = Vec::new();
    let mut announced = Vec::new();

    for i in 0..25 {
        h.adopt(&owner, i).await;
        let outcome = h.engine.reconcile(&owner, &known).await.unwrap();
        announced.extend(outcome.newly_unlocked.iter().map(|u| u.badge_id.clone()));

        // 重复调用不产生新事件
        let repeat = h.engine.reconcile(&owner, &outcome.all_unlocked).await.unwrap();
        assert!(repeat.newly_unlocked.is_empty());
        assert_eq!(repeat.all_unlocked, outcome.all_unlocked);

        known = outcome.all_unlocked;
    }

    let distinct: HashSet<_> = announced.iter().collect();
    assert_eq!(distinct.len(), announced.len());
    assert_eq!(announced, vec!["badge-1", "badge-2", "badge-3", "badge-4"]);
}

#[tokio::test]
async fn test_progress_tracks_ledger() {
    let h = Harness::new(3);
    let owner = test_owner_id();

    for i in 0..3 {
        h.adopt(&owner, i).await;
    }

    let progress = h.engine.progress(&owner).await.unwrap();
    let view: Vec<(&str, u32, bool)> = progress
        .iter()
        .map(|p| (p.badge.id.as_str(), p.current, p.eligible))
        .collect();
    assert_eq!(
        view,
        vec![
            ("badge-1", 1, true),
            ("badge-2", 3, false),
            ("badge-3", 3, false),
            ("badge-4", 3, false),
        ]
    );
}
