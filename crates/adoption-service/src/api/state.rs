//! 应用状态定义

use std::sync::Arc;

use adoption_shared::database::Database;

use crate::achievement::{AchievementEngine, BadgeCatalog};
use crate::notification::{NotificationSender, NotificationSink};
use crate::repository::{AdoptionLedger, CodeRegistry, RedemptionStore};
use crate::sampler::MetricSampler;
use crate::service::{AdoptionQueryService, RedemptionService};

/// Axum 应用共享状态
///
/// 所有服务共用同一组存储实例，通过 Arc 在 handler 间共享
#[derive(Clone)]
pub struct AppState {
    pub redemption: Arc<RedemptionService>,
    pub query: Arc<AdoptionQueryService>,
    pub achievements: Arc<AchievementEngine>,
    pub notifier: NotificationSender,
    /// PostgreSQL 存储时用于就绪探针
    pub database: Option<Database>,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn CodeRegistry>,
        ledger: Arc<dyn AdoptionLedger>,
        sampler: Arc<dyn MetricSampler>,
        catalog: Arc<BadgeCatalog>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            redemption: Arc::new(RedemptionService::new(
                registry.clone(),
                ledger.clone(),
                sampler,
            )),
            query: Arc::new(AdoptionQueryService::new(registry, ledger.clone())),
            achievements: Arc::new(AchievementEngine::new(ledger, catalog)),
            notifier: NotificationSender::new(sink),
            database: None,
        }
    }

    /// 兑换改用指定的落库实现
    pub fn with_redemption_store(mut self, store: Arc<dyn RedemptionStore>) -> Self {
        self.redemption = Arc::new((*self.redemption).clone().with_store(store));
        self
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }
}
