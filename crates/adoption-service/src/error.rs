//! 认养服务错误类型
//!
//! 定义兑换、查询、成就对账的业务错误和系统错误，并提供 HTTP 映射。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// 认养服务错误类型
#[derive(Debug, Error)]
pub enum AdoptionError {
    // === 调用方错误 ===
    #[error("参数校验失败: {0}")]
    InvalidInput(String),

    #[error("兑换码无效: {0}")]
    InvalidCode(String),

    #[error("兑换码已被使用: {0}")]
    AlreadyRedeemed(String),

    #[error("记录不存在: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // === 系统错误 ===
    #[error("存储暂时不可用: {0}")]
    TransientFailure(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 认养服务 Result 类型别名
pub type Result<T> = std::result::Result<T, AdoptionError>;

impl AdoptionError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// 检查是否为可重试的错误
    ///
    /// 兑换的预检与消费步骤可安全重放，存储类故障由调用方整体重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFailure(_) | Self::Database(_))
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::InvalidCode(_)
                | Self::AlreadyRedeemed(_)
                | Self::NotFound { .. }
        )
    }

    /// 获取错误码（用于 API 响应和指标标签）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidCode(_) => "INVALID_CODE",
            Self::AlreadyRedeemed(_) => "ALREADY_REDEEMED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::TransientFailure(_) | Self::Database(_) => "TRANSIENT_FAILURE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCode(_) | Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AlreadyRedeemed(_) => StatusCode::CONFLICT,
            Self::TransientFailure(_) | Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AdoptionError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务暂时不可用，请稍后重试".to_string()
            }
            Self::TransientFailure(e) => {
                tracing::error!(error = %e, "存储暂时不可用");
                "服务暂时不可用，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for AdoptionError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::InvalidInput(errors.to_string())
    }
}

/// 后台任务异常（panic 或被取消）
impl From<tokio::task::JoinError> for AdoptionError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("后台任务异常终止: {}", err))
    }
}
