//! Database entities.

pub mod notification_log;
pub mod push_subscription;
pub mod user;

pub use notification_log::Entity as NotificationLog;
pub use push_subscription::Entity as PushSubscription;
pub use user::Entity as User;
