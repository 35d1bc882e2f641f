//! Notification log entity.
//!
//! One row per (notification, recipient user) pair, not per endpoint.
//! A user with three devices gets one log row for a send, marked `sent`
//! when at least one device accepted delivery.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    #[sea_orm(string_value = "course")]
    Course,
    #[sea_orm(string_value = "exam")]
    Exam,
    #[sea_orm(string_value = "announcement")]
    Announcement,
    #[sea_orm(string_value = "reminder")]
    Reminder,
    #[sea_orm(string_value = "achievement")]
    Achievement,
    #[sea_orm(string_value = "system")]
    System,
    #[default]
    #[sea_orm(string_value = "custom")]
    Custom,
}

/// Notification priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[sea_orm(string_value = "low")]
    Low,
    #[default]
    #[sea_orm(string_value = "normal")]
    Normal,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "urgent")]
    Urgent,
}

/// Delivery status of a log entry.
///
/// Transitions are monotonic: pending → {sent, failed}, sent → clicked.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "clicked")]
    Clicked,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Recipient user ID
    #[sea_orm(indexed)]
    pub user_id: String,

    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub body: String,

    /// Notification category
    pub notification_type: NotificationType,

    /// Icon URL override
    #[sea_orm(nullable)]
    pub icon: Option<String>,

    /// URL opened on click
    #[sea_orm(nullable)]
    pub url: Option<String>,

    /// Caller-supplied metadata, an open JSON map
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub data: Option<Json>,

    pub priority: Priority,

    /// Free-text grouping tag for reporting
    #[sea_orm(nullable)]
    pub campaign: Option<String>,

    pub status: DeliveryStatus,

    #[sea_orm(nullable)]
    pub sent_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub clicked_at: Option<DateTimeWithTimeZone>,

    /// Last failure reason, meaningful only when status is failed
    #[sea_orm(nullable)]
    pub error: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
