//! 通知发送器
//!
//! 业务侧只调用 `send_unlocks`，投递在独立任务中进行，不阻塞请求

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use super::sink::{NotificationSink, UnlockNotification};
use adoption_shared::observability::metrics;

/// 通知发送器
#[derive(Clone)]
pub struct NotificationSender {
    sink: Arc<dyn NotificationSink>,
}

impl NotificationSender {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// 异步投递一组解锁通知（fire-and-forget）
    ///
    /// 返回的句柄只用于测试等待投递完成，调用方可以直接丢弃
    pub fn send_unlocks(
        &self,
        owner_id: &str,
        notifications: Vec<UnlockNotification>,
    ) -> Option<JoinHandle<()>> {
        if notifications.is_empty() {
            return None;
        }

        let sink = self.sink.clone();
        let owner_id = owner_id.to_string();

        Some(tokio::spawn(async move {
            for notification in notifications {
                match sink.deliver(&owner_id, &notification).await {
                    Ok(()) => {
                        metrics::record_notification("success");
                        info!(
                            owner_id = %owner_id,
                            badge_id = %notification.badge_id,
                            sink = sink.name(),
                            "解锁通知已发送"
                        );
                    }
                    Err(e) => {
                        metrics::record_notification("failed");
                        error!(
                            owner_id = %owner_id,
                            badge_id = %notification.badge_id,
                            sink = sink.name(),
                            error = %e,
                            "解锁通知发送失败"
                        );
                    }
                }
            }
        }))
    }
}
