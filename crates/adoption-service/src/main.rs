//! 树木认养兑换服务
//!
//! 提供兑换、认养查询和成就对账的 REST API。

use std::sync::Arc;
use std::time::Duration;

use adoption_shared::{
    config::{AppConfig, StorageBackend},
    database::Database,
    observability,
};
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tree_adoption::{
    AdoptionLedger, BadgeCatalog, CodeRegistry, MemoryAdoptionLedger, MemoryCodeRegistry,
    PgAdoptionLedger, PgCodeRegistry, PgRedemptionStore, SeededMetricSampler,
    api::{self, AppState},
    notification::LogNotificationSink,
    repository::MIGRATOR,
};

const SERVICE_NAME: &str = "tree-adoption-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("配置加载失败，使用默认配置: {e}");
        AppConfig {
            service_name: SERVICE_NAME.to_string(),
            ..Default::default()
        }
    });

    config.validate()?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting {} on {}", config.service_name, config.server_addr());

    let (registry, ledger, db) = build_storage(&config).await?;

    let sampler = Arc::new(SeededMetricSampler::from_seed_option(
        config.redemption.sampler_seed,
    ));
    if config.redemption.sampler_seed.is_some() {
        info!("Metric sampler running with fixed seed");
    }

    let mut state = AppState::new(
        registry,
        ledger,
        sampler,
        Arc::new(BadgeCatalog::default()),
        Arc::new(LogNotificationSink),
    );
    if let Some(db) = &db {
        // 消费兑换码与写入记录在同一事务内提交
        state = state
            .with_redemption_store(Arc::new(PgRedemptionStore::new(db.pool().clone())))
            .with_database(db.clone());
    }

    let app = api::app(
        state,
        Duration::from_secs(config.server.request_timeout_seconds),
    )
    .layer(cors_layer(config.is_production()));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(db) = db {
        db.close().await;
    }
    info!("Server shutdown complete");

    Ok(())
}

type Storage = (
    Arc<dyn CodeRegistry>,
    Arc<dyn AdoptionLedger>,
    Option<Database>,
);

/// 按配置选择存储后端，并预置兑换码目录
async fn build_storage(config: &AppConfig) -> anyhow::Result<Storage> {
    let seed = &config.redemption.seed_codes;

    match config.storage.backend {
        StorageBackend::Memory => {
            if config.is_production() {
                warn!("生产环境使用内存存储，重启后数据将丢失");
            }
            let registry = MemoryCodeRegistry::with_codes(seed);
            Ok((
                Arc::new(registry),
                Arc::new(MemoryAdoptionLedger::new()),
                None,
            ))
        }
        StorageBackend::Postgres => {
            let db = Database::connect(&config.database).await?;
            MIGRATOR.run(db.pool()).await?;
            info!("Database migrations applied");

            let registry = PgCodeRegistry::new(db.pool().clone());
            registry.provision(seed).await?;

            Ok((
                Arc::new(registry),
                Arc::new(PgAdoptionLedger::new(db.pool().clone())),
                Some(db),
            ))
        }
    }
}

/// CORS 配置：通过 ADOPTION_CORS_ORIGINS 环境变量控制允许的来源
fn cors_layer(production: bool) -> CorsLayer {
    let allowed_origins = std::env::var("ADOPTION_CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:5173,http://localhost:8080".to_string());

    if allowed_origins == "*" {
        if production {
            warn!("ADOPTION_CORS_ORIGINS=\"*\" 在生产环境中不安全，请设置为具体域名");
        }
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    info!("CORS allowed_origins: {}", allowed_origins);
    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// 监听关闭信号（Ctrl+C 或 SIGTERM）
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
