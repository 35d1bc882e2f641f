//! Database repositories.

mod notification_log;
mod push_subscription;
mod user;

pub use notification_log::{LogCounts, NotificationLogRepository};
pub use push_subscription::PushSubscriptionRepository;
pub use user::UserRepository;
