//! 解锁通知
//!
//! 将新增的徽章解锁投递给外部通知渠道。投递是 fire-and-forget：
//! 失败只记录日志和指标，不影响对账结果。

mod sender;
mod sink;

pub use sender::NotificationSender;
pub use sink::{LogNotificationSink, NotificationSink, UnlockNotification};
