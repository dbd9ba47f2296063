//! 认养查询服务
//!
//! 只读操作：兑换码状态、用户认养列表、单条记录和环境贡献汇总

use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use super::dto::CodeStatusDto;
use crate::error::{AdoptionError, Result};
use crate::models::{AdoptionRecord, ImpactSummary, normalize_code};
use crate::repository::{AdoptionLedger, CodeRegistry};

/// 认养查询服务
#[derive(Clone)]
pub struct AdoptionQueryService {
    registry: Arc<dyn CodeRegistry>,
    ledger: Arc<dyn AdoptionLedger>,
}

impl AdoptionQueryService {
    pub fn new(registry: Arc<dyn CodeRegistry>, ledger: Arc<dyn AdoptionLedger>) -> Self {
        Self { registry, ledger }
    }

    /// 查询兑换码状态
    #[instrument(skip(self))]
    pub async fn check_status(&self, code: &str) -> Result<CodeStatusDto> {
        let code_key = normalize_code(code);
        if code_key.is_empty() {
            return Err(AdoptionError::InvalidInput("兑换码不能为空".to_string()));
        }

        let lookup = self.registry.lookup(&code_key).await?;
        Ok(CodeStatusDto::from_lookup(code_key, &lookup))
    }

    /// 按认养顺序列出用户的记录
    #[instrument(skip(self))]
    pub async fn list_owned(&self, owner_id: &str) -> Result<Vec<AdoptionRecord>> {
        let owner_id = require_owner(owner_id)?;
        self.ledger.get(owner_id).await
    }

    /// 获取用户的单条记录
    ///
    /// 记录属于其他用户时同样返回 NotFound
    #[instrument(skip(self))]
    pub async fn get_record(&self, owner_id: &str, record_id: Uuid) -> Result<AdoptionRecord> {
        let owner_id = require_owner(owner_id)?;

        self.ledger
            .find(record_id)
            .await?
            .filter(|record| record.owner_id == owner_id)
            .ok_or_else(|| AdoptionError::not_found("adoption_record", record_id))
    }

    /// 汇总用户全部树木的环境贡献
    #[instrument(skip(self))]
    pub async fn impact_summary(&self, owner_id: &str) -> Result<ImpactSummary> {
        let owner_id = require_owner(owner_id)?;
        let records = self.ledger.get(owner_id).await?;
        Ok(ImpactSummary::from_records(owner_id, &records))
    }
}

/// 去除首尾空白后的用户 ID，为空时返回 `InvalidInput`
pub(crate) fn require_owner(owner_id: &str) -> Result<&str> {
    let owner_id = owner_id.trim();
    if owner_id.is_empty() {
        return Err(AdoptionError::InvalidInput("用户 ID 不能为空".to_string()));
    }
    Ok(owner_id)
}
