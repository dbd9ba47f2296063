//! 兑换落库仓储（PostgreSQL）
//!
//! 在同一个事务内执行：
//! - 条件更新消费兑换码（行锁持续到事务结束）
//! - 由消费凭证构建认养记录
//! - 写入账本
//!
//! 任一步失败事务回滚，兑换码与记录要么同时生效要么都不生效。

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::code_repo::{PgCodeRegistry, consume_row};
use super::ledger_repo::insert_record;
use super::traits::{RecordBuilder, RedemptionStore};
use crate::error::Result;
use crate::models::{AdoptionRecord, normalize_code};

/// 事务式兑换落库
pub struct PgRedemptionStore {
    pool: PgPool,
    registry: PgCodeRegistry,
}

impl PgRedemptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            registry: PgCodeRegistry::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl RedemptionStore for PgRedemptionStore {
    async fn redeem(&self, code_key: &str, build: RecordBuilder) -> Result<AdoptionRecord> {
        let key = normalize_code(code_key);
        let mut tx = self.pool.begin().await?;

        let Some(token) = consume_row(&mut *tx, &key).await? else {
            tx.rollback().await?;
            return Err(self.registry.consume_miss(key).await);
        };

        let record = match build(&token) {
            Ok(record) => record,
            Err(e) => {
                tx.rollback().await?;
                return Err(e);
            }
        };

        // 出错时 tx 被丢弃即回滚
        insert_record(&mut *tx, &record).await?;
        tx.commit().await?;

        debug!(code = %key, record_id = %record.id, "兑换事务已提交");
        Ok(record)
    }
}
