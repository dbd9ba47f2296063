//! 路由配置模块

use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::timeout::TimeoutLayer;

use super::{AppState, handlers};
use adoption_shared::observability::middleware as obs_middleware;

/// 认养相关路由
fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/owners/{owner_id}/adoptions", get(handlers::list_adoptions))
        .route(
            "/owners/{owner_id}/adoptions/{id}",
            get(handlers::get_adoption),
        )
        .route("/owners/{owner_id}/impact", get(handlers::impact))
        .route(
            "/owners/{owner_id}/achievements/reconcile",
            post(handlers::reconcile_achievements),
        )
        .route(
            "/owners/{owner_id}/achievements/progress",
            get(handlers::achievement_progress),
        )
}

/// 所有 /api/v1 路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/redemptions", post(handlers::redeem))
        .route("/codes/{code}", get(handlers::check_code))
        .route("/badges", get(handlers::list_badges))
        .merge(owner_routes())
}

/// 构建完整应用
///
/// 包含请求超时、HTTP 追踪指标和请求 ID 中间件，CORS 由调用方按部署环境添加
pub fn app(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
