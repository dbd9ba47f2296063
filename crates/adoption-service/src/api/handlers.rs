//! API 处理器

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::json;
use uuid::Uuid;

use super::{ApiResponse, AppState};
use crate::achievement::ReconcileOutcome;
use crate::error::Result;
use crate::models::{AdoptionRecord, Badge, BadgeProgress, ImpactSummary};
use crate::notification::UnlockNotification;
use crate::service::query_service::require_owner;
use crate::service::{CodeStatusDto, RedeemRequest, ReconcileRequest};

/// 兑换
///
/// POST /api/v1/redemptions
pub async fn redeem(
    State(state): State<AppState>,
    Json(request): Json<RedeemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AdoptionRecord>>)> {
    let record = state.redemption.redeem(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(record, "Albero adottato con successo!")),
    ))
}

/// 查询兑换码状态
///
/// GET /api/v1/codes/{code}
pub async fn check_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<CodeStatusDto>>> {
    let status = state.query.check_status(&code).await?;
    Ok(Json(ApiResponse::success(status)))
}

/// GET /api/v1/owners/{owner_id}/adoptions
pub async fn list_adoptions(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<AdoptionRecord>>>> {
    let records = state.query.list_owned(&owner_id).await?;
    Ok(Json(ApiResponse::success(records)))
}

/// GET /api/v1/owners/{owner_id}/adoptions/{id}
pub async fn get_adoption(
    State(state): State<AppState>,
    Path((owner_id, id)): Path<(String, Uuid)>,
) -> Result<Json<ApiResponse<AdoptionRecord>>> {
    let record = state.query.get_record(&owner_id, id).await?;
    Ok(Json(ApiResponse::success(record)))
}

/// GET /api/v1/owners/{owner_id}/impact
pub async fn impact(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<ApiResponse<ImpactSummary>>> {
    let summary = state.query.impact_summary(&owner_id).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// 成就对账
///
/// POST /api/v1/owners/{owner_id}/achievements/reconcile
///
/// 新增解锁交给通知发送器异步投递
pub async fn reconcile_achievements(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Json(request): Json<ReconcileRequest>,
) -> Result<Json<ApiResponse<ReconcileOutcome>>> {
    let owner_id = require_owner(&owner_id)?;

    let outcome = state
        .achievements
        .reconcile(owner_id, &request.known_unlocks)
        .await?;

    let catalog = state.achievements.catalog();
    let notifications: Vec<UnlockNotification> = outcome
        .newly_unlocked
        .iter()
        .filter_map(|unlock| catalog.get(&unlock.badge_id))
        .map(UnlockNotification::from)
        .collect();
    state.notifier.send_unlocks(owner_id, notifications);

    Ok(Json(ApiResponse::success(outcome)))
}

/// GET /api/v1/owners/{owner_id}/achievements/progress
pub async fn achievement_progress(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<BadgeProgress>>>> {
    let owner_id = require_owner(&owner_id)?;
    let progress = state.achievements.progress(owner_id).await?;
    Ok(Json(ApiResponse::success(progress)))
}

/// GET /api/v1/badges
pub async fn list_badges(State(state): State<AppState>) -> Json<ApiResponse<Vec<Badge>>> {
    Json(ApiResponse::success(
        state.achievements.catalog().badges().to_vec(),
    ))
}

/// 存活探针
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "tree-adoption-service"
    }))
}

/// 就绪探针
///
/// PostgreSQL 存储下检查数据库连通性，不可用时返回 503
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let Some(db) = &state.database else {
        return (
            StatusCode::OK,
            Json(json!({ "status": "ready", "storage": "memory" })),
        );
    };

    match db.health_check().await {
        Ok(latency) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "storage": "postgres",
                "latencyMs": latency.as_millis() as u64
            })),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "storage": "postgres" })),
        ),
    }
}
