//! 认养账本仓储（PostgreSQL）
//!
//! adoption_records 以 BIGSERIAL 保持插入顺序，code_key 唯一约束保证一码一记录

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use super::traits::AdoptionLedger;
use crate::error::{AdoptionError, Result};
use crate::models::{AdoptionRecord, TreeLocation, TreeMetrics, normalize_code};

#[derive(Debug, FromRow)]
struct AdoptionRow {
    id: Uuid,
    owner_id: String,
    label: String,
    code: String,
    species: String,
    latitude: f64,
    longitude: f64,
    country: String,
    co2_absorbed: f64,
    oxygen_produced: f64,
    water_saved: f64,
    habitat_created: f64,
    created_at: DateTime<Utc>,
}

impl From<AdoptionRow> for AdoptionRecord {
    fn from(row: AdoptionRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            label: row.label,
            code: row.code,
            created_at: row.created_at,
            species: row.species,
            location: TreeLocation::new(row.latitude, row.longitude, row.country),
            metrics: TreeMetrics::new(
                row.co2_absorbed,
                row.oxygen_produced,
                row.water_saved,
                row.habitat_created,
            ),
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, owner_id, label, code, species, latitude, longitude, country,
           co2_absorbed, oxygen_produced, water_saved, habitat_created, created_at
    FROM adoption_records
"#;

/// 写入一条记录，兑换码唯一约束冲突映射为 `AlreadyRedeemed`
pub(super) async fn insert_record<'e, E>(executor: E, record: &AdoptionRecord) -> Result<()>
where
    E: PgExecutor<'e>,
{
    let code_key = normalize_code(&record.code);

    let result = sqlx::query(
        r#"
        INSERT INTO adoption_records (
            id, owner_id, label, code, code_key, species,
            latitude, longitude, country,
            co2_absorbed, oxygen_produced, water_saved, habitat_created,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(record.id)
    .bind(&record.owner_id)
    .bind(&record.label)
    .bind(&record.code)
    .bind(&code_key)
    .bind(&record.species)
    .bind(record.location.latitude)
    .bind(record.location.longitude)
    .bind(&record.location.country)
    .bind(record.metrics.co2_absorbed)
    .bind(record.metrics.oxygen_produced)
    .bind(record.metrics.water_saved)
    .bind(record.metrics.habitat_created)
    .bind(record.created_at)
    .execute(executor)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(AdoptionError::AlreadyRedeemed(code_key))
        }
        Err(e) => Err(e.into()),
    }
}

/// 认养账本仓储
pub struct PgAdoptionLedger {
    pool: PgPool,
}

impl PgAdoptionLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdoptionLedger for PgAdoptionLedger {
    async fn add(&self, record: &AdoptionRecord) -> Result<()> {
        insert_record(&self.pool, record).await
    }

    async fn get(&self, owner_id: &str) -> Result<Vec<AdoptionRecord>> {
        let rows = sqlx::query_as::<_, AdoptionRow>(&format!(
            "{SELECT_COLUMNS} WHERE owner_id = $1 ORDER BY seq ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&self, owner_id: &str) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM adoption_records WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count.max(0) as u64)
    }

    async fn find(&self, record_id: Uuid) -> Result<Option<AdoptionRecord>> {
        let row = sqlx::query_as::<_, AdoptionRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn find_by_code(&self, code_key: &str) -> Result<Option<AdoptionRecord>> {
        let row =
            sqlx::query_as::<_, AdoptionRow>(&format!("{SELECT_COLUMNS} WHERE code_key = $1"))
                .bind(normalize_code(code_key))
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Into::into))
    }
}
