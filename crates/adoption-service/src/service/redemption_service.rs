//! 兑换服务
//!
//! 把一次性兑换码转换为用户拥有的认养记录。
//!
//! ## 兑换流程
//!
//! 1. 参数校验（失败时不触碰任何存储）
//! 2. 预检兑换码状态（仅作提示，不是最终判断）
//! 3. 原子消费兑换码（唯一权威步骤）
//! 4. 采样指标并构建记录
//! 5. 写入账本
//!
//! 第 3-5 步交给 `RedemptionStore` 作为一个整体落库，并在独立任务中执行，
//! 调用方放弃等待也不会打断这一组步骤。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};
use validator::Validate;

use super::dto::RedeemRequest;
use crate::error::{AdoptionError, Result};
use crate::models::{AdoptionRecord, ConsumeToken, normalize_code};
use crate::repository::{
    AdoptionLedger, CodeRegistry, CompensatingRedemptionStore, RecordBuilder, RedemptionStore,
};
use crate::sampler::MetricSampler;
use adoption_shared::observability::metrics;

/// 兑换服务
#[derive(Clone)]
pub struct RedemptionService {
    registry: Arc<dyn CodeRegistry>,
    store: Arc<dyn RedemptionStore>,
    sampler: Arc<dyn MetricSampler>,
}

impl RedemptionService {
    /// 使用补偿式落库创建服务
    pub fn new(
        registry: Arc<dyn CodeRegistry>,
        ledger: Arc<dyn AdoptionLedger>,
        sampler: Arc<dyn MetricSampler>,
    ) -> Self {
        Self {
            store: Arc::new(CompensatingRedemptionStore::new(registry.clone(), ledger)),
            registry,
            sampler,
        }
    }

    /// 替换落库实现（如 PostgreSQL 事务式落库）
    pub fn with_store(mut self, store: Arc<dyn RedemptionStore>) -> Self {
        self.store = store;
        self
    }

    /// 兑换
    #[instrument(skip(self, request), fields(owner_id = %request.owner_id, code = %request.code))]
    pub async fn redeem(&self, request: RedeemRequest) -> Result<AdoptionRecord> {
        let started = Instant::now();
        let result = self.execute(request).await;

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.error_code(),
        };
        metrics::record_redemption(status, started.elapsed().as_secs_f64());

        result
    }

    async fn execute(&self, request: RedeemRequest) -> Result<AdoptionRecord> {
        let request = request.trimmed();
        request.validate()?;

        let code_key = normalize_code(&request.code);

        let lookup = self.registry.lookup(&code_key).await?;
        if !lookup.known {
            return Err(AdoptionError::InvalidCode(code_key));
        }
        if lookup.used {
            return Err(AdoptionError::AlreadyRedeemed(code_key));
        }

        let RedeemRequest {
            label, owner_id, ..
        } = request;
        let store = self.store.clone();
        let build = record_builder(self.sampler.clone(), owner_id.clone(), label);
        let key = code_key.clone();

        let result = tokio::spawn(async move { store.redeem(&key, build).await }).await?;

        match &result {
            Ok(record) => info!(
                record_id = %record.id,
                owner_id = %record.owner_id,
                code = %record.code,
                species = %record.species,
                "兑换成功"
            ),
            // 预检通过后仍然冲突，说明输给了并发请求
            Err(AdoptionError::AlreadyRedeemed(_)) => {
                metrics::record_consume_conflict();
                warn!(code = %code_key, owner_id = %owner_id, "兑换码已被并发请求抢先消费");
            }
            Err(_) => {}
        }

        result
    }
}

/// 采样指标并构建记录，采样 panic 或指标非法都视为内部错误
fn record_builder(
    sampler: Arc<dyn MetricSampler>,
    owner_id: String,
    label: String,
) -> RecordBuilder {
    Box::new(move |token: &ConsumeToken| {
        let hint = token.species_hint.clone();
        let sampled = std::panic::catch_unwind(AssertUnwindSafe(|| sampler.sample(hint)))
            .map_err(|_| AdoptionError::Internal("指标采样失败".to_string()))?;
        if !sampled.metrics.is_valid() {
            return Err(AdoptionError::Internal("采样得到非法指标".to_string()));
        }
        Ok(AdoptionRecord::from_redemption(owner_id, label, token, sampled))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CodeLookup, SampledTree, TreeLocation, TreeMetrics};
    use crate::repository::{MockAdoptionLedger, MockCodeRegistry};
    use crate::sampler::{MockMetricSampler, SeededMetricSampler};
    use mockall::predicate::eq;

    fn service(
        registry: MockCodeRegistry,
        ledger: MockAdoptionLedger,
        sampler: Arc<dyn MetricSampler>,
    ) -> RedemptionService {
        RedemptionService::new(Arc::new(registry), Arc::new(ledger), sampler)
    }

    fn unused(species: Option<&str>) -> CodeLookup {
        CodeLookup {
            known: true,
            used: false,
            species_hint: species.map(str::to_string),
        }
    }

    struct PanickingSampler;

    impl MetricSampler for PanickingSampler {
        fn sample(&self, _species_hint: Option<String>) -> SampledTree {
            panic!("rng poisoned")
        }
    }

    fn sampler() -> Arc<dyn MetricSampler> {
        Arc::new(SeededMetricSampler::with_seed(1))
    }

    #[tokio::test]
    async fn test_validation_precedes_mutation() {
        // 未设置期望的 mock 一旦被调用就会 panic
        let svc = service(MockCodeRegistry::new(), MockAdoptionLedger::new(), sampler());

        for (code, label, owner) in [
            ("", "x", "u1"),
            ("short", "", "u1"),
            ("NATURA2023", "Oak1", "  "),
            ("  abcde ", "Oak1", "u1"),
        ] {
            let result = svc.redeem(RedeemRequest::new(code, label, owner)).await;
            assert!(
                matches!(result, Err(AdoptionError::InvalidInput(_))),
                "{code:?}/{label:?}/{owner:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_code_never_consumed() {
        let mut registry = MockCodeRegistry::new();
        registry
            .expect_lookup()
            .with(eq("FAKECODE"))
            .times(1)
            .returning(|_| Ok(CodeLookup::unknown()));

        let svc = service(registry, MockAdoptionLedger::new(), sampler());
        let result = svc.redeem(RedeemRequest::new("fakecode", "Oak1", "alice")).await;

        assert!(matches!(result, Err(AdoptionError::InvalidCode(code)) if code == "FAKECODE"));
    }

    #[tokio::test]
    async fn test_used_code_fails_before_consume() {
        let mut registry = MockCodeRegistry::new();
        registry.expect_lookup().returning(|_| {
            Ok(CodeLookup {
                known: true,
                used: true,
                species_hint: None,
            })
        });

        let svc = service(registry, MockAdoptionLedger::new(), sampler());
        let result = svc.redeem(RedeemRequest::new("NATURA2023", "Oak1", "alice")).await;

        assert!(matches!(result, Err(AdoptionError::AlreadyRedeemed(_))));
    }

    #[tokio::test]
    async fn test_lost_race_writes_nothing() {
        let mut registry = MockCodeRegistry::new();
        registry.expect_lookup().returning(|_| Ok(unused(None)));
        registry
            .expect_try_consume()
            .times(1)
            .returning(|code| Err(AdoptionError::AlreadyRedeemed(code.to_string())));

        let svc = service(registry, MockAdoptionLedger::new(), sampler());
        let result = svc.redeem(RedeemRequest::new("NATURA2023", "Oak2", "bob")).await;

        assert!(matches!(result, Err(AdoptionError::AlreadyRedeemed(_))));
    }

    #[tokio::test]
    async fn test_sampler_panic_releases_code() {
        let token = ConsumeToken::issue("NATURA2023", None);

        let mut registry = MockCodeRegistry::new();
        registry.expect_lookup().returning(|_| Ok(unused(None)));
        registry
            .expect_try_consume()
            .returning(move |_| Ok(token.clone()));
        registry.expect_release().times(1).returning(|_| Ok(true));

        let svc = service(registry, MockAdoptionLedger::new(), Arc::new(PanickingSampler));
        let result = svc.redeem(RedeemRequest::new("NATURA2023", "Oak1", "alice")).await;

        assert!(matches!(result, Err(AdoptionError::Internal(_))));
    }

    #[tokio::test]
    async fn test_invalid_metrics_release_code() {
        let token = ConsumeToken::issue("NATURA2023", None);

        let mut registry = MockCodeRegistry::new();
        registry.expect_lookup().returning(|_| Ok(unused(None)));
        registry
            .expect_try_consume()
            .returning(move |_| Ok(token.clone()));
        registry.expect_release().times(1).returning(|_| Ok(true));

        let mut sampler = MockMetricSampler::new();
        sampler.expect_sample().returning(|_| SampledTree {
            species: "Quercia".to_string(),
            location: TreeLocation::new(41.9, 12.5, "Italia"),
            metrics: TreeMetrics::new(-1.0, 0.0, 0.0, 0.0),
        });

        let svc = service(registry, MockAdoptionLedger::new(), Arc::new(sampler));
        let result = svc.redeem(RedeemRequest::new("NATURA2023", "Oak1", "alice")).await;

        assert!(matches!(result, Err(AdoptionError::Internal(_))));
    }

    #[tokio::test]
    async fn test_success_uses_catalog_spelling_and_hint() {
        let token = ConsumeToken::issue("NATURA2023", Some("Pino Mediterraneo".to_string()));

        let mut registry = MockCodeRegistry::new();
        registry
            .expect_lookup()
            .returning(|_| Ok(unused(Some("Pino Mediterraneo"))));
        registry
            .expect_try_consume()
            .with(eq("NATURA2023"))
            .returning(move |_| Ok(token.clone()));

        let mut ledger = MockAdoptionLedger::new();
        ledger
            .expect_add()
            .withf(|r| r.owner_id == "alice" && r.label == "Oak1")
            .times(1)
            .returning(|_| Ok(()));

        let svc = service(registry, ledger, sampler());
        let record = svc
            .redeem(RedeemRequest::new(" natura2023 ", " Oak1 ", "alice"))
            .await
            .unwrap();

        assert_eq!(record.code, "NATURA2023");
        assert_eq!(record.label, "Oak1");
        assert_eq!(record.species, "Pino Mediterraneo");
        assert!(record.metrics.is_valid());
    }
}
