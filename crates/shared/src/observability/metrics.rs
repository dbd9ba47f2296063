//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册通用指标描述
///
/// 描述会出现在 /metrics 端点的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!("redemptions_total", "Total number of code redemptions");
    metrics::describe_histogram!(
        "redemption_duration_seconds",
        "Redemption duration in seconds"
    );
    metrics::describe_counter!(
        "code_consume_conflicts_total",
        "Consume attempts that lost the race for an already redeemed code"
    );
    metrics::describe_counter!(
        "code_releases_total",
        "Consumed codes released after a failed record write"
    );

    metrics::describe_counter!("badge_unlocks_total", "Total number of badge unlocks");
    metrics::describe_counter!("notifications_total", "Total number of unlock notifications");

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录兑换结果
///
/// status 取值为错误码或 "success"
#[inline]
pub fn record_redemption(status: &str, duration_secs: f64) {
    metrics::counter!("redemptions_total", "status" => status.to_string()).increment(1);

    metrics::histogram!("redemption_duration_seconds", "status" => status.to_string())
        .record(duration_secs);
}

/// 记录兑换码抢占冲突
#[inline]
pub fn record_consume_conflict() {
    metrics::counter!("code_consume_conflicts_total").increment(1);
}

/// 记录兑换码回滚释放
#[inline]
pub fn record_code_release(status: &str) {
    metrics::counter!("code_releases_total", "status" => status.to_string()).increment(1);
}

/// 记录徽章解锁
#[inline]
pub fn record_badge_unlock(badge_id: &str) {
    metrics::counter!("badge_unlocks_total", "badge_id" => badge_id.to_string()).increment(1);
}

/// 记录通知投递
#[inline]
pub fn record_notification(status: &str) {
    metrics::counter!("notifications_total", "status" => status.to_string()).increment(1);
}
