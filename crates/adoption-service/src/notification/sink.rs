//! 通知渠道

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::models::Badge;

/// 徽章解锁通知内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockNotification {
    pub badge_id: String,
    pub name: String,
    pub description: String,
}

impl From<&Badge> for UnlockNotification {
    fn from(badge: &Badge) -> Self {
        Self {
            badge_id: badge.id.clone(),
            name: badge.name.clone(),
            description: badge.description.clone(),
        }
    }
}

/// 通知渠道 trait
///
/// 实现应当是无状态的，便于并发调用
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// 渠道名称（用于日志）
    fn name(&self) -> &str;

    async fn deliver(&self, owner_id: &str, notification: &UnlockNotification) -> Result<()>;
}

/// 日志渠道
///
/// 未接入真实推送时使用，仅把通知写入日志
#[derive(Debug, Default, Clone)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, owner_id: &str, notification: &UnlockNotification) -> Result<()> {
        info!(
            owner_id = %owner_id,
            badge_id = %notification.badge_id,
            name = %notification.name,
            "Nuovo badge sbloccato"
        );
        Ok(())
    }
}
