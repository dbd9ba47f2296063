//! 内存存储实现
//!
//! 使用 DashMap 实现的高并发存储，适用于开发环境和测试。
//! 兑换码的比较并交换在分片写锁内完成，保证同一兑换码只会被消费一次。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};
use uuid::Uuid;

use super::traits::{AdoptionLedger, CodeRegistry};
use crate::error::{AdoptionError, Result};
use crate::models::{AdoptionRecord, CodeLookup, ConsumeToken, normalize_code};
use adoption_shared::config::SeedCode;

/// 消费持有者
#[derive(Debug, Clone, Copy)]
struct Holder {
    token_id: Uuid,
    consumed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CodeEntry {
    /// 目录中登记的原始写法
    code: String,
    species_hint: Option<String>,
    holder: Option<Holder>,
}

/// 内存兑换码目录
///
/// 以规范化兑换码为键，值记录目录写法和消费状态
#[derive(Debug, Default)]
pub struct MemoryCodeRegistry {
    codes: DashMap<String, CodeEntry>,
}

impl MemoryCodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用预置兑换码创建目录
    pub fn with_codes(seed: &[SeedCode]) -> Self {
        let registry = Self::new();
        registry.provision(seed);
        registry
    }

    /// 登记兑换码，已存在的兑换码保持原状
    ///
    /// 返回新登记的数量
    pub fn provision(&self, seed: &[SeedCode]) -> usize {
        let mut added = 0;
        for item in seed {
            let key = normalize_code(&item.code);
            if key.is_empty() {
                continue;
            }
            if let Entry::Vacant(slot) = self.codes.entry(key) {
                slot.insert(CodeEntry {
                    code: item.code.trim().to_string(),
                    species_hint: item.species.clone(),
                    holder: None,
                });
                added += 1;
            }
        }
        info!(added, total = self.codes.len(), "兑换码目录已加载");
        added
    }

    /// 目录中的兑换码数量
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[async_trait]
impl CodeRegistry for MemoryCodeRegistry {
    async fn lookup(&self, code: &str) -> Result<CodeLookup> {
        let key = normalize_code(code);
        let lookup = match self.codes.get(&key) {
            Some(entry) => CodeLookup {
                known: true,
                used: entry.holder.is_some(),
                species_hint: entry.species_hint.clone(),
            },
            None => CodeLookup::unknown(),
        };
        Ok(lookup)
    }

    async fn try_consume(&self, code: &str) -> Result<ConsumeToken> {
        let key = normalize_code(code);

        // get_mut 持有分片写锁，检查与标记在同一临界区内完成
        let mut entry = self
            .codes
            .get_mut(&key)
            .ok_or_else(|| AdoptionError::InvalidCode(key.clone()))?;

        if entry.holder.is_some() {
            return Err(AdoptionError::AlreadyRedeemed(key));
        }

        let token = ConsumeToken::issue(entry.code.clone(), entry.species_hint.clone());
        entry.holder = Some(Holder {
            token_id: token.token_id,
            consumed_at: token.consumed_at,
        });

        debug!(code = %key, token = %token.token_id, "兑换码已消费");
        Ok(token)
    }

    async fn release(&self, token: &ConsumeToken) -> Result<bool> {
        let Some(mut entry) = self.codes.get_mut(&token.code_key) else {
            return Ok(false);
        };

        let current = entry.holder;
        match current {
            Some(holder) if holder.token_id == token.token_id => {
                entry.holder = None;
                debug!(
                    code = %token.code_key,
                    held_since = %holder.consumed_at,
                    "兑换码已释放"
                );
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// 内存认养账本
///
/// 按用户保存插入顺序，同时维护记录 ID 索引和兑换码索引
#[derive(Debug, Default)]
pub struct MemoryAdoptionLedger {
    by_owner: DashMap<String, Vec<AdoptionRecord>>,
    by_id: DashMap<Uuid, AdoptionRecord>,
    /// 规范化兑换码 -> 记录 ID
    by_code: DashMap<String, Uuid>,
}

impl MemoryAdoptionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 账本中的记录总数
    pub fn total(&self) -> usize {
        self.by_id.len()
    }
}

#[async_trait]
impl AdoptionLedger for MemoryAdoptionLedger {
    async fn add(&self, record: &AdoptionRecord) -> Result<()> {
        let code_key = normalize_code(&record.code);

        // 兑换码索引最后写入，按码查到的记录一定已经完整可读
        match self.by_code.entry(code_key) {
            Entry::Occupied(existing) => Err(AdoptionError::AlreadyRedeemed(existing.key().clone())),
            Entry::Vacant(slot) => {
                self.by_id.insert(record.id, record.clone());
                self.by_owner
                    .entry(record.owner_id.clone())
                    .or_default()
                    .push(record.clone());
                slot.insert(record.id);
                Ok(())
            }
        }
    }

    async fn get(&self, owner_id: &str) -> Result<Vec<AdoptionRecord>> {
        Ok(self
            .by_owner
            .get(owner_id)
            .map(|records| records.clone())
            .unwrap_or_default())
    }

    async fn count(&self, owner_id: &str) -> Result<u64> {
        Ok(self
            .by_owner
            .get(owner_id)
            .map(|records| records.len() as u64)
            .unwrap_or(0))
    }

    async fn find(&self, record_id: Uuid) -> Result<Option<AdoptionRecord>> {
        Ok(self.by_id.get(&record_id).map(|r| r.clone()))
    }

    async fn find_by_code(&self, code_key: &str) -> Result<Option<AdoptionRecord>> {
        let Some(record_id) = self.by_code.get(&normalize_code(code_key)).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.by_id.get(&record_id).map(|r| r.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SampledTree, TreeLocation, TreeMetrics};

    fn registry() -> MemoryCodeRegistry {
        MemoryCodeRegistry::with_codes(&[
            SeedCode::new("NATURA2023", Some("Pino Mediterraneo")),
            SeedCode::new("VERDE2023", None),
        ])
    }

    fn record(owner: &str, label: &str, token: &ConsumeToken) -> AdoptionRecord {
        AdoptionRecord::from_redemption(
            owner,
            label,
            token,
            SampledTree {
                species: "Quercia".to_string(),
                location: TreeLocation::new(45.0, 9.0, "Italia"),
                metrics: TreeMetrics::new(1.0, 1.0, 1.0, 1.0),
            },
        )
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let registry = registry();

        let lookup = registry.lookup("natura2023").await.unwrap();
        assert!(lookup.known);
        assert!(!lookup.used);
        assert_eq!(lookup.species_hint.as_deref(), Some("Pino Mediterraneo"));

        let unknown = registry.lookup("FAKECODE").await.unwrap();
        assert!(!unknown.known);
    }

    #[tokio::test]
    async fn test_consume_once() {
        let registry = registry();

        let token = registry.try_consume(" natura2023 ").await.unwrap();
        assert_eq!(token.code, "NATURA2023");
        assert!(registry.lookup("NATURA2023").await.unwrap().used);

        let second = registry.try_consume("NATURA2023").await;
        assert!(matches!(second, Err(AdoptionError::AlreadyRedeemed(_))));

        let unknown = registry.try_consume("FAKECODE").await;
        assert!(matches!(unknown, Err(AdoptionError::InvalidCode(_))));
    }

    #[tokio::test]
    async fn test_release_requires_same_token() {
        let registry = registry();
        let token = registry.try_consume("VERDE2023").await.unwrap();

        let stranger = ConsumeToken::issue("VERDE2023", None);
        assert!(!registry.release(&stranger).await.unwrap());
        assert!(registry.lookup("VERDE2023").await.unwrap().used);

        assert!(registry.release(&token).await.unwrap());
        assert!(!registry.lookup("VERDE2023").await.unwrap().used);

        // 释放后重新消费，旧凭证不能再释放新消费
        let renewed = registry.try_consume("VERDE2023").await.unwrap();
        assert!(!registry.release(&token).await.unwrap());
        assert!(registry.release(&renewed).await.unwrap());
    }

    #[tokio::test]
    async fn test_provision_keeps_existing_state() {
        let registry = registry();
        registry.try_consume("NATURA2023").await.unwrap();

        let added = registry.provision(&[
            SeedCode::new("natura2023", None),
            SeedCode::new("BOSCO2024", None),
            SeedCode::new("   ", None),
        ]);
        assert_eq!(added, 1);
        assert_eq!(registry.len(), 3);
        assert!(registry.lookup("NATURA2023").await.unwrap().used);
    }

    #[tokio::test]
    async fn test_ledger_preserves_order() {
        let ledger = MemoryAdoptionLedger::new();
        let first = record("alice", "Oak1", &ConsumeToken::issue("CODE000001", None));
        let second = record("alice", "Oak2", &ConsumeToken::issue("CODE000002", None));

        ledger.add(&first).await.unwrap();
        ledger.add(&second).await.unwrap();

        let records = ledger.get("alice").await.unwrap();
        let labels: Vec<_> = records.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Oak1", "Oak2"]);
        assert_eq!(ledger.count("alice").await.unwrap(), 2);
        assert_eq!(ledger.count("bob").await.unwrap(), 0);
        assert!(ledger.get("bob").await.unwrap().is_empty());

        let found = ledger.find(second.id).await.unwrap().unwrap();
        assert_eq!(found.label, "Oak2");
        assert!(ledger.find(Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ledger_rejects_duplicate_code() {
        let ledger = MemoryAdoptionLedger::new();
        let token = ConsumeToken::issue("NATURA2023", None);

        ledger.add(&record("alice", "Oak1", &token)).await.unwrap();
        let result = ledger.add(&record("bob", "Oak9", &token)).await;

        assert!(matches!(result, Err(AdoptionError::AlreadyRedeemed(_))));
        assert_eq!(ledger.total(), 1);
        assert_eq!(ledger.count("bob").await.unwrap(), 0);

        let holder = ledger.find_by_code("natura2023").await.unwrap().unwrap();
        assert_eq!(holder.owner_id, "alice");
        assert!(ledger.find_by_code("VERDE2023").await.unwrap().is_none());
    }
}
