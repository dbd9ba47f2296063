//! 兑换码目录仓储（PostgreSQL）
//!
//! 消费通过带条件的单条 UPDATE 完成，数据库行锁保证并发下只有一个请求命中

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::traits::CodeRegistry;
use crate::error::{AdoptionError, Result};
use crate::models::{CodeLookup, ConsumeToken, normalize_code};
use adoption_shared::config::SeedCode;

/// 兑换码目录仓储
pub struct PgCodeRegistry {
    pool: PgPool,
}

impl PgCodeRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 消费未命中时区分未登记和已使用
    pub(super) async fn consume_miss(&self, key: String) -> AdoptionError {
        match self.lookup(&key).await {
            Ok(lookup) if lookup.known => AdoptionError::AlreadyRedeemed(key),
            Ok(_) => AdoptionError::InvalidCode(key),
            Err(e) => e,
        }
    }

    /// 登记兑换码，已存在的兑换码不做修改
    pub async fn provision(&self, seed: &[SeedCode]) -> Result<u64> {
        let mut added = 0;
        for item in seed {
            let key = normalize_code(&item.code);
            if key.is_empty() {
                continue;
            }
            let result = sqlx::query(
                r#"
                INSERT INTO tree_codes (code_key, code, species_hint)
                VALUES ($1, $2, $3)
                ON CONFLICT (code_key) DO NOTHING
                "#,
            )
            .bind(&key)
            .bind(item.code.trim())
            .bind(item.species.as_deref())
            .execute(&self.pool)
            .await?;
            added += result.rows_affected();
        }

        info!(added, "兑换码目录已同步");
        Ok(added)
    }
}

/// 条件更新消费兑换码，未命中返回 None
///
/// 接受连接池或事务，事务内执行时行锁持续到提交
pub(super) async fn consume_row<'e, E>(executor: E, key: &str) -> Result<Option<ConsumeToken>>
where
    E: PgExecutor<'e>,
{
    let token_id = Uuid::now_v7();

    let row = sqlx::query(
        r#"
        UPDATE tree_codes
        SET used = TRUE, consume_token = $2, consumed_at = NOW()
        WHERE code_key = $1 AND used = FALSE
        RETURNING code, species_hint, consumed_at
        "#,
    )
    .bind(key)
    .bind(token_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|row| {
        let consumed_at: DateTime<Utc> = row.get("consumed_at");
        debug!(code = %key, token = %token_id, "兑换码已消费");
        ConsumeToken {
            token_id,
            code_key: key.to_string(),
            code: row.get("code"),
            species_hint: row.get("species_hint"),
            consumed_at,
        }
    }))
}

#[async_trait]
impl CodeRegistry for PgCodeRegistry {
    async fn lookup(&self, code: &str) -> Result<CodeLookup> {
        let row = sqlx::query(
            r#"
            SELECT used, species_hint
            FROM tree_codes
            WHERE code_key = $1
            "#,
        )
        .bind(normalize_code(code))
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => CodeLookup {
                known: true,
                used: row.get("used"),
                species_hint: row.get("species_hint"),
            },
            None => CodeLookup::unknown(),
        })
    }

    async fn try_consume(&self, code: &str) -> Result<ConsumeToken> {
        let key = normalize_code(code);

        match consume_row(&self.pool, &key).await? {
            Some(token) => Ok(token),
            None => Err(self.consume_miss(key).await),
        }
    }

    async fn release(&self, token: &ConsumeToken) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tree_codes
            SET used = FALSE, consume_token = NULL, consumed_at = NULL
            WHERE code_key = $1 AND consume_token = $2
            "#,
        )
        .bind(&token.code_key)
        .bind(token.token_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
