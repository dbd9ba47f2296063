//! 补偿式兑换落库
//!
//! 兑换码目录和认养账本不共享事务时使用：先消费兑换码再写入账本，
//! 写入失败后先确认账本中确实没有该兑换码的记录，再用消费凭证释放。
//! 账本状态无法确认时兑换码保持已使用。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, warn};

use super::traits::{AdoptionLedger, CodeRegistry, RecordBuilder, RedemptionStore};
use crate::error::{AdoptionError, Result};
use crate::models::{AdoptionRecord, ConsumeToken};
use adoption_shared::observability::metrics;

/// 补偿式兑换落库
pub struct CompensatingRedemptionStore {
    registry: Arc<dyn CodeRegistry>,
    ledger: Arc<dyn AdoptionLedger>,
}

impl CompensatingRedemptionStore {
    pub fn new(registry: Arc<dyn CodeRegistry>, ledger: Arc<dyn AdoptionLedger>) -> Self {
        Self { registry, ledger }
    }

    /// 账本写入报告失败后的处理
    async fn settle_failure(
        &self,
        token: &ConsumeToken,
        record: AdoptionRecord,
        cause: AdoptionError,
    ) -> Result<AdoptionRecord> {
        match self.ledger.find_by_code(&token.code_key).await {
            Ok(Some(existing)) if existing.id == record.id => {
                warn!(
                    code = %token.code_key,
                    record_id = %record.id,
                    error = %cause,
                    "账本写入报告失败但记录已生效"
                );
                Ok(existing)
            }
            Ok(Some(existing)) => {
                warn!(
                    code = %token.code_key,
                    record_id = %existing.id,
                    "兑换码已对应其他记录，保持已使用"
                );
                Err(AdoptionError::AlreadyRedeemed(token.code_key.clone()))
            }
            Ok(None) => {
                self.release(token).await;
                Err(cause)
            }
            Err(e) => {
                metrics::record_code_release("unverified");
                error!(
                    code = %token.code_key,
                    token = %token.token_id,
                    error = %e,
                    "无法确认账本状态，兑换码保持已使用"
                );
                Err(cause)
            }
        }
    }

    /// 回滚消费，释放失败只记录不覆盖原始错误
    async fn release(&self, token: &ConsumeToken) {
        match self.registry.release(token).await {
            Ok(true) => {
                metrics::record_code_release("released");
                warn!(code = %token.code_key, token = %token.token_id, "兑换未完成，兑换码已释放");
            }
            Ok(false) => {
                metrics::record_code_release("not_held");
                error!(code = %token.code_key, token = %token.token_id, "兑换码已不由该凭证持有，未释放");
            }
            Err(e) => {
                metrics::record_code_release("failed");
                error!(code = %token.code_key, token = %token.token_id, error = %e, "兑换码释放失败");
            }
        }
    }
}

#[async_trait]
impl RedemptionStore for CompensatingRedemptionStore {
    async fn redeem(&self, code_key: &str, build: RecordBuilder) -> Result<AdoptionRecord> {
        // 消费阶段 panic 时没有凭证，无需释放
        let token = match AssertUnwindSafe(async { self.registry.try_consume(code_key).await })
            .catch_unwind()
            .await
        {
            Ok(consumed) => consumed?,
            Err(_) => return Err(AdoptionError::Internal("兑换码消费异常".to_string())),
        };

        let record = match build(&token) {
            Ok(record) => record,
            Err(e) => {
                self.release(&token).await;
                return Err(e);
            }
        };

        let written = match AssertUnwindSafe(async { self.ledger.add(&record).await })
            .catch_unwind()
            .await
        {
            Ok(written) => written,
            Err(_) => Err(AdoptionError::Internal("账本写入异常".to_string())),
        };

        match written {
            Ok(()) => Ok(record),
            // 唯一约束冲突说明该兑换码已有记录
            Err(AdoptionError::AlreadyRedeemed(key)) => {
                warn!(code = %key, "账本中已有该兑换码的记录，保持已使用");
                Err(AdoptionError::AlreadyRedeemed(key))
            }
            Err(e) => self.settle_failure(&token, record, e).await,
        }
    }
}
