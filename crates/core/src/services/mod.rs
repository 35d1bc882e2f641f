//! Business logic services.

#![allow(missing_docs)]

pub mod audience;
pub mod push_notification;
pub mod transport;

pub use audience::{Audience, AudienceResolver};
pub use push_notification::{
    BroadcastReport, DeliveryReport, EndpointResult, NotificationAction, NotificationInput,
    NotificationStats, PushNotificationService, UserSendResult,
};
pub use transport::{PushTransport, SendOutcome, VapidConfig, WebPushTransport};
