//! Push subscription entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Device classification derived from the user agent at subscribe time.
///
/// Best-effort metadata for reporting; never consulted by the delivery
/// path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[sea_orm(string_value = "desktop")]
    Desktop,
    #[sea_orm(string_value = "mobile")]
    Mobile,
    #[sea_orm(string_value = "tablet")]
    Tablet,
    #[default]
    #[sea_orm(string_value = "unknown")]
    Unknown,
}

impl DeviceType {
    /// Classify a user agent by substring matching, case-insensitive.
    ///
    /// Mobile indicators win over tablet indicators; anything else with a
    /// non-empty user agent is a desktop.
    #[must_use]
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent else {
            return Self::Unknown;
        };
        if ua.is_empty() {
            return Self::Unknown;
        }

        let ua = ua.to_lowercase();
        if ua.contains("mobile") || ua.contains("android") || ua.contains("iphone") {
            Self::Mobile
        } else if ua.contains("tablet") || ua.contains("ipad") {
            Self::Tablet
        } else {
            Self::Desktop
        }
    }
}

/// Push subscription entity for Web Push notifications.
///
/// One row per registered browser/device endpoint. Rows are never
/// deleted; dead endpoints are deactivated in place so delivery history
/// keeps its linkage.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "push_subscription")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning user ID
    #[sea_orm(indexed)]
    pub user_id: String,

    /// Push service endpoint URL, globally unique
    #[sea_orm(column_type = "Text")]
    pub endpoint: String,

    /// P256DH public key for payload encryption
    pub p256dh: String,

    /// Auth secret for payload encryption
    pub auth: String,

    /// User agent of the device at subscribe time
    #[sea_orm(nullable)]
    pub user_agent: Option<String>,

    /// Device classification derived from the user agent
    pub device_type: DeviceType,

    /// False means "known dead, skip on send"
    #[sea_orm(default_value = true)]
    pub is_active: bool,

    /// Updated on every successful delivery
    pub last_used_at: DateTimeWithTimeZone,

    /// Timestamp when the subscription was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the subscription was last updated
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

/// Relations for push subscription.
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
