//! Push notification endpoints.
//!
//! Subscription management is available to any authenticated user;
//! targeted sends and global reporting are admin-only.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use oddhay_common::{AppError, AppResult};
use oddhay_core::{BroadcastReport, DeliveryReport, NotificationInput, NotificationStats};
use oddhay_db::entities::notification_log;
use oddhay_db::entities::user::UserRole;

use crate::{
    extractors::{AdminUser, AuthUser},
    middleware::AppState,
};

/// Upper bound on log page size.
const MAX_PAGE_LIMIT: u64 = 100;

/// Browser subscription keys as produced by `PushManager.subscribe`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionKeys {
    /// Client public key for payload encryption.
    #[validate(length(min = 1, message = "p256dh key is required"))]
    pub p256dh: String,
    /// Client auth secret.
    #[validate(length(min = 1, message = "auth secret is required"))]
    pub auth: String,
}

/// Request to register a push subscription.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    /// Push service endpoint URL.
    #[validate(url(message = "endpoint must be a valid URL"))]
    pub endpoint: String,
    #[validate(nested)]
    pub keys: SubscriptionKeys,
}

/// Request to unregister a push subscription.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeRequest {
    /// Push service endpoint URL.
    pub endpoint: String,
}

/// Request to send a notification to one user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendToUserRequest {
    /// Recipient user ID.
    pub user_id: String,
    #[serde(flatten)]
    pub notification: NotificationInput,
}

/// Request to send a notification to every user with a role.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendToRoleRequest {
    /// Recipient role.
    pub role: UserRole,
    #[serde(flatten)]
    pub notification: NotificationInput,
}

/// Request to send a notification to every student in a class level.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendToClassRequest {
    /// Class level, e.g. "Class 6".
    pub class_level: String,
    #[serde(flatten)]
    pub notification: NotificationInput,
}

/// Request to send a notification to every user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendToAllRequest {
    #[serde(flatten)]
    pub notification: NotificationInput,
}

/// VAPID public key response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidKeyResponse {
    /// Key the browser passes to `PushManager.subscribe`; empty when
    /// push is not configured.
    pub public_key: String,
}

/// Subscription mutation acknowledgement.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

/// Stats query parameters.
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Request platform-wide stats instead of the caller's own.
    pub all: Option<bool>,
}

/// Log listing query parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Scope to one user; absent means platform-wide.
    pub user_id: Option<String>,
}

/// One page of delivery log entries.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsResponse {
    pub logs: Vec<notification_log::Model>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

/// Reject a send whose notification has no title or body.
fn require_content(notification: &NotificationInput) -> AppResult<()> {
    if notification.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    if notification.body.trim().is_empty() {
        return Err(AppError::Validation("body is required".to_string()));
    }
    Ok(())
}

/// Get the VAPID public key browsers subscribe with.
async fn vapid_public_key(State(state): State<AppState>) -> Json<VapidKeyResponse> {
    Json(VapidKeyResponse {
        public_key: state.push_service.public_key().unwrap_or("").to_string(),
    })
}

/// Register or refresh the caller's push subscription.
async fn subscribe(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(req): Json<SubscribeRequest>,
) -> AppResult<Json<StatusResponse>> {
    req.validate()?;

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    state
        .push_service
        .save_subscription(
            &user.id,
            &req.endpoint,
            &req.keys.p256dh,
            &req.keys.auth,
            user_agent,
        )
        .await?;

    Ok(Json(StatusResponse {
        success: true,
        message: "Subscription saved".to_string(),
    }))
}

/// Deactivate the subscription for an endpoint.
async fn unsubscribe(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UnsubscribeRequest>,
) -> AppResult<Json<StatusResponse>> {
    state.push_service.remove_subscription(&req.endpoint).await?;

    Ok(Json(StatusResponse {
        success: true,
        message: "Subscription removed".to_string(),
    }))
}

/// Send the caller a canned self-test notification.
///
/// This is the one user-visible failure path: delivery problems are
/// surfaced in the report so the user can tell their browser setup is
/// broken.
async fn send_test(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DeliveryReport>> {
    let notification = NotificationInput {
        title: "Test Notification".to_string(),
        body: "Push notifications are working correctly!".to_string(),
        notification_type: notification_log::NotificationType::System,
        ..NotificationInput::default()
    };

    let report = state.push_service.send_to_user(&user.id, &notification).await?;
    Ok(Json(report))
}

/// Send a notification to one user (admin only).
async fn send_to_user(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Json(req): Json<SendToUserRequest>,
) -> AppResult<Json<DeliveryReport>> {
    require_content(&req.notification)?;

    let report = state
        .push_service
        .send_to_user(&req.user_id, &req.notification)
        .await?;
    Ok(Json(report))
}

/// Send a notification to every user with a role (admin only).
async fn send_to_role(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Json(req): Json<SendToRoleRequest>,
) -> AppResult<Json<BroadcastReport>> {
    require_content(&req.notification)?;

    let report = state
        .push_service
        .send_to_role(req.role, &req.notification)
        .await?;
    Ok(Json(report))
}

/// Send a notification to every student in a class level (admin only).
async fn send_to_class(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Json(req): Json<SendToClassRequest>,
) -> AppResult<Json<BroadcastReport>> {
    require_content(&req.notification)?;

    let report = state
        .push_service
        .send_to_class_level(&req.class_level, &req.notification)
        .await?;
    Ok(Json(report))
}

/// Send a notification to every user on the platform (admin only).
async fn send_to_all(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Json(req): Json<SendToAllRequest>,
) -> AppResult<Json<BroadcastReport>> {
    require_content(&req.notification)?;

    let report = state.push_service.send_to_all(&req.notification).await?;
    Ok(Json(report))
}

/// Delivery statistics for the caller, or platform-wide for admins.
async fn stats(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<NotificationStats>> {
    let scope = if query.all.unwrap_or(false) {
        if !user.role.is_admin() {
            return Err(AppError::Forbidden(
                "Global stats require admin access".to_string(),
            ));
        }
        None
    } else {
        Some(user.id.as_str())
    };

    let stats = state.push_service.stats(scope).await?;
    Ok(Json(stats))
}

/// One page of the delivery log, newest first (admin only).
async fn logs(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> AppResult<Json<LogsResponse>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, MAX_PAGE_LIMIT);

    let (logs, total, pages) = state
        .push_service
        .logs_page(query.user_id.as_deref(), page, limit)
        .await?;

    Ok(Json(LogsResponse {
        logs,
        page,
        limit,
        total,
        pages,
    }))
}

/// Record a click on a delivered notification.
async fn log_clicked(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<StatusResponse>> {
    state.push_service.mark_clicked(&id).await?;

    Ok(Json(StatusResponse {
        success: true,
        message: "Click recorded".to_string(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/vapid-public-key", get(vapid_public_key))
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
        .route("/test", post(send_test))
        .route("/send-to-user", post(send_to_user))
        .route("/send-to-role", post(send_to_role))
        .route("/send-to-class", post(send_to_class))
        .route("/send-to-all", post(send_to_all))
        .route("/stats", get(stats))
        .route("/logs", get(logs))
        .route("/logs/{id}/clicked", post(log_clicked))
}
