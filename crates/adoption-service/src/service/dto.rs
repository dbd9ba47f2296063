//! 服务层数据传输对象

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{CodeLookup, CodeStatus, Unlock};

/// 兑换请求
///
/// 长度规则作用于去除首尾空白后的值，按字符计数
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RedeemRequest {
    #[validate(length(min = 6, message = "兑换码至少需要6个字符"))]
    pub code: String,
    #[validate(length(min = 2, message = "名称至少需要2个字符"))]
    pub label: String,
    #[validate(length(min = 1, message = "用户 ID 不能为空"))]
    pub owner_id: String,
}

impl RedeemRequest {
    pub fn new(
        code: impl Into<String>,
        label: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            owner_id: owner_id.into(),
        }
    }

    /// 去除各字段首尾空白
    pub fn trimmed(self) -> Self {
        Self {
            code: self.code.trim().to_string(),
            label: self.label.trim().to_string(),
            owner_id: self.owner_id.trim().to_string(),
        }
    }
}

/// 兑换码状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeStatusDto {
    /// 规范化后的兑换码
    pub code: String,
    pub known: bool,
    pub used: bool,
    pub status: CodeStatus,
}

impl CodeStatusDto {
    pub fn from_lookup(code: String, lookup: &CodeLookup) -> Self {
        Self {
            code,
            known: lookup.known,
            used: lookup.used,
            status: lookup.status(),
        }
    }
}

/// 成就对账请求
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    #[serde(default)]
    pub known_unlocks: Vec<Unlock>,
}
