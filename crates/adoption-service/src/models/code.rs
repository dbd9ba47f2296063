//! 兑换码相关实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 兑换码规范化
///
/// 去除首尾空白并统一为大写，所有比较都基于规范化后的值
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// 兑换码状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeStatus {
    /// 不在兑换码目录中
    Unknown,
    /// 有效且未使用
    ValidUnused,
    /// 有效但已被兑换
    ValidUsed,
}

/// 兑换码查询结果
///
/// 只读快照，不作为消费依据
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodeLookup {
    pub known: bool,
    pub used: bool,
    pub species_hint: Option<String>,
}

impl CodeLookup {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn status(&self) -> CodeStatus {
        match (self.known, self.used) {
            (false, _) => CodeStatus::Unknown,
            (true, false) => CodeStatus::ValidUnused,
            (true, true) => CodeStatus::ValidUsed,
        }
    }
}

/// 消费凭证
///
/// 由 `CodeRegistry::try_consume` 成功时签发，是兑换码已被当前调用独占的证明。
/// 写入认养记录失败时凭此凭证回滚；只有凭证与当前持有者一致时回滚才生效。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeToken {
    pub token_id: Uuid,
    /// 规范化后的兑换码（存储主键）
    pub code_key: String,
    /// 目录中登记的原始兑换码
    pub code: String,
    pub species_hint: Option<String>,
    pub consumed_at: DateTime<Utc>,
}

impl ConsumeToken {
    pub fn issue(code: impl Into<String>, species_hint: Option<String>) -> Self {
        let code = code.into();
        Self {
            token_id: Uuid::now_v7(),
            code_key: normalize_code(&code),
            code,
            species_hint,
            consumed_at: Utc::now(),
        }
    }
}
