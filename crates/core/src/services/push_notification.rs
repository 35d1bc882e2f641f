//! Push notification delivery service.
//!
//! The orchestrator for the delivery pipeline: resolves audiences, fans
//! out per-subscription sends, interprets per-send outcomes, updates
//! subscription health and the delivery log, and aggregates results.
//!
//! Failure semantics: missing VAPID configuration is fatal and
//! immediate; per-endpoint transport failures are data, captured in the
//! returned report and never thrown; only store faults propagate as
//! errors.

use std::sync::Arc;

use chrono::Utc;
use futures::future;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::json;

use oddhay_common::{AppError, AppResult, IdGenerator};
use oddhay_db::entities::notification_log::{
    self, DeliveryStatus, NotificationType, Priority,
};
use oddhay_db::entities::push_subscription::{self, DeviceType};
use oddhay_db::entities::user::UserRole;
use oddhay_db::repositories::{NotificationLogRepository, PushSubscriptionRepository};

use super::audience::{Audience, AudienceResolver};
use super::transport::{PushTransport, SendOutcome};

/// Default icon asset served to devices when the caller supplies none.
const DEFAULT_ICON: &str = "/images/icon-192.png";
/// Default badge asset.
const DEFAULT_BADGE: &str = "/images/badge-72.png";
/// Default click-through URL.
const DEFAULT_URL: &str = "/";
/// Default grouping tag; repeated notifications of one kind replace each
/// other on-device.
const DEFAULT_TAG: &str = "oddhay-notification";

/// Reason recorded on the log entry when no endpoint accepted delivery.
const ALL_FAILED_REASON: &str = "All subscriptions failed";

/// An action button shown on the device notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAction {
    /// Action identifier reported back on click.
    pub action: String,
    /// Button label.
    pub title: String,
    /// Optional button icon URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// A notification to deliver, as supplied by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationInput {
    /// Notification title (mandatory).
    pub title: String,
    /// Notification body (mandatory).
    pub body: String,
    /// Notification category.
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Icon URL override.
    pub icon: Option<String>,
    /// Badge URL override.
    pub badge: Option<String>,
    /// URL opened when the notification is clicked.
    pub url: Option<String>,
    /// On-device grouping tag.
    pub tag: Option<String>,
    /// Keep the notification on screen until dismissed.
    pub require_interaction: Option<bool>,
    /// Arbitrary caller metadata, forwarded verbatim.
    pub data: Option<serde_json::Value>,
    /// Action buttons.
    pub actions: Option<Vec<NotificationAction>>,
    /// Priority, recorded for reporting.
    pub priority: Priority,
    /// Free-text campaign tag.
    pub campaign: Option<String>,
}

impl NotificationInput {
    /// Build the wire payload the device's background script decodes.
    ///
    /// This shape is a compatibility contract with the receiving client
    /// and must be reproduced exactly.
    #[must_use]
    pub fn wire_payload(&self) -> serde_json::Value {
        json!({
            "title": self.title,
            "body": self.body,
            "icon": self.icon.as_deref().unwrap_or(DEFAULT_ICON),
            "badge": self.badge.as_deref().unwrap_or(DEFAULT_BADGE),
            "url": self.url.as_deref().unwrap_or(DEFAULT_URL),
            "tag": self.tag.as_deref().unwrap_or(DEFAULT_TAG),
            "requireInteraction": self.require_interaction.unwrap_or(false),
            "data": self.data.clone().unwrap_or_else(|| json!({})),
            "actions": self.actions.clone().unwrap_or_default(),
        })
    }
}

/// Outcome of one per-endpoint delivery attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointResult {
    /// The endpoint attempted.
    pub endpoint: String,
    /// Whether the push service accepted the message.
    pub success: bool,
    /// Failure reason when unsuccessful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a single-user send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    /// Whether at least one endpoint accepted delivery.
    pub success: bool,
    /// Number of active subscriptions attempted.
    pub total: usize,
    /// Number of endpoints that accepted delivery.
    pub sent: usize,
    /// Explanation for a benign zero-work result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-endpoint outcomes.
    pub endpoints: Vec<EndpointResult>,
}

impl DeliveryReport {
    fn no_subscriptions() -> Self {
        Self {
            success: false,
            total: 0,
            sent: 0,
            error: Some("No subscriptions".to_string()),
            endpoints: Vec::new(),
        }
    }
}

/// Per-user entry in a broadcast result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSendResult {
    /// The user attempted.
    pub user_id: String,
    /// Whether at least one of the user's endpoints accepted delivery.
    pub success: bool,
    /// Failure or skip reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate result of a multi-user send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReport {
    /// Whether any user received the notification.
    pub success: bool,
    /// Number of users in the resolved audience.
    pub total: usize,
    /// Number of users with at least one successful delivery.
    pub sent: usize,
    /// Per-user outcomes.
    pub results: Vec<UserSendResult>,
}

/// Delivery log statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    /// All log entries in scope.
    pub total: u64,
    /// Entries marked sent.
    pub sent: u64,
    /// Entries marked failed.
    pub failed: u64,
    /// Entries marked clicked.
    pub clicked: u64,
    /// `clicked / sent * 100`, rounded to 2 decimals, 0 when nothing sent.
    pub click_rate: f64,
    /// Active subscriptions in scope.
    pub active_subscriptions: u64,
}

/// Push notification service.
#[derive(Clone)]
pub struct PushNotificationService {
    subscription_repo: PushSubscriptionRepository,
    log_repo: NotificationLogRepository,
    audience_resolver: AudienceResolver,
    transport: Option<Arc<dyn PushTransport>>,
    vapid_public_key: Option<String>,
    id_gen: IdGenerator,
}

impl PushNotificationService {
    /// Create a new push notification service.
    ///
    /// `transport` and `vapid_public_key` are both present when push is
    /// configured and both absent otherwise; sends fail immediately with
    /// [`AppError::NotConfigured`] while subscription management keeps
    /// working.
    #[must_use]
    pub fn new(
        subscription_repo: PushSubscriptionRepository,
        log_repo: NotificationLogRepository,
        audience_resolver: AudienceResolver,
        transport: Option<Arc<dyn PushTransport>>,
        vapid_public_key: Option<String>,
    ) -> Self {
        Self {
            subscription_repo,
            log_repo,
            audience_resolver,
            transport,
            vapid_public_key,
            id_gen: IdGenerator::new(),
        }
    }

    /// Check if push notifications are enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Get the VAPID public key handed to browsers at subscription time.
    #[must_use]
    pub fn public_key(&self) -> Option<&str> {
        self.vapid_public_key.as_deref()
    }

    /// Register or refresh a subscription for an endpoint.
    ///
    /// Idempotent per endpoint: re-subscribing overwrites owner, keys and
    /// device metadata instead of duplicating, and reactivates the row.
    pub async fn save_subscription(
        &self,
        user_id: &str,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
        user_agent: Option<String>,
    ) -> AppResult<push_subscription::Model> {
        if endpoint.is_empty() {
            return Err(AppError::Validation("endpoint is required".to_string()));
        }
        if p256dh.is_empty() || auth.is_empty() {
            return Err(AppError::Validation(
                "subscription keys p256dh and auth are required".to_string(),
            ));
        }

        let device_type = DeviceType::from_user_agent(user_agent.as_deref());
        let now = Utc::now();

        let subscription = push_subscription::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            endpoint: Set(endpoint.to_string()),
            p256dh: Set(p256dh.to_string()),
            auth: Set(auth.to_string()),
            user_agent: Set(user_agent),
            device_type: Set(device_type),
            is_active: Set(true),
            last_used_at: Set(now.into()),
            created_at: Set(now.into()),
            updated_at: Set(Some(now.into())),
        };

        let saved = self.subscription_repo.upsert(subscription).await?;
        tracing::debug!(
            user_id = %user_id,
            device_type = ?saved.device_type,
            "Saved push subscription"
        );
        Ok(saved)
    }

    /// Deactivate the subscription for an endpoint.
    ///
    /// Idempotent; unknown endpoints succeed silently.
    pub async fn remove_subscription(&self, endpoint: &str) -> AppResult<()> {
        self.subscription_repo.deactivate_by_endpoint(endpoint).await
    }

    /// Send a notification to a single user, fanning out to every active
    /// subscription concurrently.
    pub async fn send_to_user(
        &self,
        user_id: &str,
        notification: &NotificationInput,
    ) -> AppResult<DeliveryReport> {
        let transport = self.transport.as_ref().ok_or(AppError::NotConfigured)?;

        let subscriptions = self.subscription_repo.find_active_by_user(user_id).await?;
        if subscriptions.is_empty() {
            tracing::debug!(user_id = %user_id, "No active subscriptions, nothing to send");
            return Ok(DeliveryReport::no_subscriptions());
        }

        // The log entry exists before fan-out so a crash mid-send leaves a
        // pending record rather than nothing.
        let log_entry = self
            .log_repo
            .create(notification_log::ActiveModel {
                id: Set(self.id_gen.generate()),
                user_id: Set(user_id.to_string()),
                title: Set(notification.title.clone()),
                body: Set(notification.body.clone()),
                notification_type: Set(notification.notification_type),
                icon: Set(notification.icon.clone()),
                url: Set(notification.url.clone()),
                data: Set(notification.data.clone()),
                priority: Set(notification.priority),
                campaign: Set(notification.campaign.clone()),
                status: Set(DeliveryStatus::Pending),
                sent_at: Set(None),
                clicked_at: Set(None),
                error: Set(None),
                created_at: Set(Utc::now().into()),
            })
            .await?;

        // One payload shared across all of this user's endpoints.
        let payload = notification.wire_payload().to_string();

        let attempts = subscriptions.iter().map(|subscription| {
            let payload = payload.as_str();
            let transport = Arc::clone(transport);
            async move {
                let outcome = transport.deliver(subscription, payload).await;
                self.apply_endpoint_outcome(subscription, &outcome).await;

                EndpointResult {
                    endpoint: subscription.endpoint.clone(),
                    success: outcome.is_delivered(),
                    error: match outcome {
                        SendOutcome::Delivered => None,
                        SendOutcome::Transient(reason) | SendOutcome::Permanent(reason) => {
                            Some(reason)
                        }
                    },
                }
            }
        });

        // Settle every attempt; the sent/failed decision needs the full
        // tally, so no short-circuiting on first success or failure.
        let endpoints = future::join_all(attempts).await;
        let sent = endpoints.iter().filter(|r| r.success).count();

        if sent > 0 {
            self.log_repo.mark_sent(&log_entry.id).await?;
        } else {
            self.log_repo
                .mark_failed(&log_entry.id, ALL_FAILED_REASON)
                .await?;
        }

        tracing::info!(
            user_id = %user_id,
            sent = sent,
            total = endpoints.len(),
            "Delivered notification"
        );

        Ok(DeliveryReport {
            success: sent > 0,
            total: endpoints.len(),
            sent,
            error: None,
            endpoints,
        })
    }

    /// Send a notification to many users, each isolated from the others.
    ///
    /// A user whose send fails outright (store fault included) becomes a
    /// failed entry in the per-user results; it never aborts siblings.
    pub async fn send_to_many(
        &self,
        user_ids: &[String],
        notification: &NotificationInput,
    ) -> AppResult<BroadcastReport> {
        // Configuration absence is fatal before any per-user work starts.
        if self.transport.is_none() {
            return Err(AppError::NotConfigured);
        }

        let sends = user_ids.iter().map(|user_id| async move {
            match self.send_to_user(user_id, notification).await {
                Ok(report) => UserSendResult {
                    user_id: user_id.clone(),
                    success: report.success,
                    error: report.error,
                },
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Send failed for user");
                    UserSendResult {
                        user_id: user_id.clone(),
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            }
        });

        let results = future::join_all(sends).await;
        let sent = results.iter().filter(|r| r.success).count();

        Ok(BroadcastReport {
            success: sent > 0,
            total: user_ids.len(),
            sent,
            results,
        })
    }

    /// Send to every user with the given role.
    pub async fn send_to_role(
        &self,
        role: UserRole,
        notification: &NotificationInput,
    ) -> AppResult<BroadcastReport> {
        let user_ids = self
            .audience_resolver
            .resolve(&Audience::Role(role))
            .await?;
        self.send_to_many(&user_ids, notification).await
    }

    /// Send to every student in the given class level.
    pub async fn send_to_class_level(
        &self,
        class_level: &str,
        notification: &NotificationInput,
    ) -> AppResult<BroadcastReport> {
        let user_ids = self
            .audience_resolver
            .resolve(&Audience::ClassLevel(class_level.to_string()))
            .await?;
        self.send_to_many(&user_ids, notification).await
    }

    /// Send to every user on the platform.
    pub async fn send_to_all(
        &self,
        notification: &NotificationInput,
    ) -> AppResult<BroadcastReport> {
        let user_ids = self.audience_resolver.resolve(&Audience::All).await?;
        self.send_to_many(&user_ids, notification).await
    }

    /// Record a click on a delivered notification.
    pub async fn mark_clicked(&self, log_id: &str) -> AppResult<()> {
        self.log_repo.mark_clicked(log_id).await?;
        Ok(())
    }

    /// Delivery statistics, globally or scoped to one user.
    pub async fn stats(&self, user_id: Option<&str>) -> AppResult<NotificationStats> {
        let counts = self.log_repo.counts(user_id).await?;
        let active_subscriptions = self.subscription_repo.count_active(user_id).await?;

        Ok(NotificationStats {
            total: counts.total,
            sent: counts.sent,
            failed: counts.failed,
            clicked: counts.clicked,
            click_rate: click_rate(counts.sent, counts.clicked),
            active_subscriptions,
        })
    }

    /// One page of log entries, newest first, with pagination metadata.
    ///
    /// Returns `(rows, total, pages)`; `page` is 1-based.
    pub async fn logs_page(
        &self,
        user_id: Option<&str>,
        page: u64,
        limit: u64,
    ) -> AppResult<(Vec<notification_log::Model>, u64, u64)> {
        let limit = limit.max(1);
        let (rows, total) = self.log_repo.find_page(user_id, page, limit).await?;
        let pages = total.div_ceil(limit);
        Ok((rows, total, pages))
    }

    /// Update subscription health from one endpoint's outcome.
    ///
    /// Bookkeeping failures are row-scoped operational metadata, so they
    /// are logged and swallowed rather than failing the whole send.
    async fn apply_endpoint_outcome(
        &self,
        subscription: &push_subscription::Model,
        outcome: &SendOutcome,
    ) {
        match outcome {
            SendOutcome::Delivered => {
                if let Err(e) = self.subscription_repo.mark_used(&subscription.id).await {
                    tracing::warn!(
                        subscription_id = %subscription.id,
                        error = %e,
                        "Failed to record successful delivery"
                    );
                }
            }
            SendOutcome::Permanent(reason) => {
                tracing::info!(
                    subscription_id = %subscription.id,
                    endpoint = %subscription.endpoint,
                    reason = %reason,
                    "Deactivating expired push subscription"
                );
                if let Err(e) = self.subscription_repo.deactivate(&subscription.id).await {
                    tracing::warn!(
                        subscription_id = %subscription.id,
                        error = %e,
                        "Failed to deactivate dead subscription"
                    );
                }
            }
            SendOutcome::Transient(reason) => {
                tracing::warn!(
                    subscription_id = %subscription.id,
                    error = %reason,
                    "Push delivery failed, subscription left active"
                );
            }
        }
    }
}

fn click_rate(sent: u64, clicked: u64) -> f64 {
    if sent == 0 {
        return 0.0;
    }
    let rate = clicked as f64 / sent as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use oddhay_db::repositories::UserRepository;

    use super::*;

    /// Transport double returning a scripted outcome per endpoint.
    struct ScriptedTransport {
        outcomes: HashMap<String, SendOutcome>,
    }

    impl ScriptedTransport {
        fn new(outcomes: impl IntoIterator<Item = (&'static str, SendOutcome)>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: outcomes
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl PushTransport for ScriptedTransport {
        async fn deliver(
            &self,
            subscription: &push_subscription::Model,
            _payload: &str,
        ) -> SendOutcome {
            self.outcomes
                .get(&subscription.endpoint)
                .cloned()
                .unwrap_or(SendOutcome::Delivered)
        }
    }

    fn service(
        db: sea_orm::DatabaseConnection,
        transport: Option<Arc<dyn PushTransport>>,
    ) -> PushNotificationService {
        let db = Arc::new(db);
        let public_key = transport.as_ref().map(|_| "test-public-key".to_string());
        PushNotificationService::new(
            PushSubscriptionRepository::new(Arc::clone(&db)),
            NotificationLogRepository::new(Arc::clone(&db)),
            AudienceResolver::new(UserRepository::new(db)),
            transport,
            public_key,
        )
    }

    fn notification(title: &str) -> NotificationInput {
        NotificationInput {
            title: title.to_string(),
            body: "body".to_string(),
            ..NotificationInput::default()
        }
    }

    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        btreemap! { "num_items" => sea_orm::Value::from(n) }
    }

    #[test]
    fn wire_payload_applies_platform_defaults() {
        let payload = notification("Hello").wire_payload();

        assert_eq!(payload["title"], "Hello");
        assert_eq!(payload["body"], "body");
        assert_eq!(payload["icon"], "/images/icon-192.png");
        assert_eq!(payload["badge"], "/images/badge-72.png");
        assert_eq!(payload["url"], "/");
        assert_eq!(payload["tag"], "oddhay-notification");
        assert_eq!(payload["requireInteraction"], false);
        assert_eq!(payload["data"], json!({}));
        assert_eq!(payload["actions"], json!([]));
    }

    #[test]
    fn wire_payload_keeps_caller_values_verbatim() {
        let mut input = notification("Exam tomorrow");
        input.icon = Some("/images/exam.png".to_string());
        input.url = Some("/exams/42".to_string());
        input.require_interaction = Some(true);
        input.data = Some(json!({"examId": 42}));

        let payload = input.wire_payload();
        assert_eq!(payload["icon"], "/images/exam.png");
        assert_eq!(payload["url"], "/exams/42");
        assert_eq!(payload["requireInteraction"], true);
        assert_eq!(payload["data"]["examId"], 42);
    }

    #[test]
    fn click_rate_rounds_to_two_decimals() {
        assert_eq!(click_rate(10, 3), 30.0);
        assert_eq!(click_rate(3, 1), 33.33);
        assert_eq!(click_rate(0, 0), 0.0);
        assert_eq!(click_rate(0, 5), 0.0);
    }

    #[tokio::test]
    async fn send_without_vapid_config_fails_immediately() {
        // No mock results appended: the send must touch nothing.
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = service(db, None);

        let err = svc
            .send_to_user("user1", &notification("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotConfigured));
    }

    #[tokio::test]
    async fn send_with_no_subscriptions_creates_no_log_entry() {
        // Only the subscription query is scripted; any log insert would
        // hit an exhausted mock and fail the test.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<push_subscription::Model>::new()])
            .into_connection();
        let svc = service(db, Some(ScriptedTransport::new([])));

        let report = svc.send_to_user("user1", &notification("hi")).await.unwrap();

        assert!(!report.success);
        assert_eq!(report.total, 0);
        assert_eq!(report.sent, 0);
        assert_eq!(report.error.as_deref(), Some("No subscriptions"));
    }

    #[tokio::test]
    async fn batch_isolates_one_users_store_fault() {
        // u1's subscription query errors; u2's returns no subscriptions.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([sea_orm::DbErr::Custom("connection reset".to_string())])
            .append_query_results([Vec::<push_subscription::Model>::new()])
            .into_connection();
        let svc = service(db, Some(ScriptedTransport::new([])));

        let report = svc
            .send_to_many(
                &["u1".to_string(), "u2".to_string()],
                &notification("broadcast"),
            )
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.total, 2);
        assert_eq!(report.sent, 0);
        assert_eq!(report.results.len(), 2);

        // u1's infrastructure fault is captured, not thrown
        assert!(!report.results[0].success);
        assert!(report.results[0].error.as_deref().unwrap().contains("Database"));

        // u2 still got its true (benign) outcome
        assert!(!report.results[1].success);
        assert_eq!(report.results[1].error.as_deref(), Some("No subscriptions"));
    }

    #[tokio::test]
    async fn batch_without_vapid_config_is_fatal_before_any_send() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = service(db, None);

        let err = svc
            .send_to_many(&["u1".to_string()], &notification("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotConfigured));
    }

    #[tokio::test]
    async fn empty_audience_is_zero_recipients_not_an_error() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = service(db, Some(ScriptedTransport::new([])));

        let report = svc.send_to_many(&[], &notification("hi")).await.unwrap();

        assert!(!report.success);
        assert_eq!(report.total, 0);
        assert_eq!(report.sent, 0);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_for_unknown_endpoints() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let svc = service(db, None);

        // Unknown endpoint: zero rows touched, still Ok
        svc.remove_subscription("https://push.example/never-seen")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn subscribe_rejects_empty_keys_before_touching_the_store() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = service(db, None);

        let err = svc
            .save_subscription("user1", "https://push.example/ep", "", "auth", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = svc
            .save_subscription("user1", "", "p256dh", "auth", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn click_on_pending_entry_is_a_guarded_noop() {
        let pending = notification_log::Model {
            id: "log1".to_string(),
            user_id: "user1".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            notification_type: NotificationType::Custom,
            icon: None,
            url: None,
            data: None,
            priority: Priority::Normal,
            campaign: None,
            status: DeliveryStatus::Pending,
            sent_at: None,
            clicked_at: None,
            error: None,
            created_at: Utc::now().into(),
        };

        // Only the lookup is scripted; an update would exhaust the mock.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[pending]])
            .into_connection();
        let svc = service(db, None);

        svc.mark_clicked("log1").await.unwrap();
    }

    #[tokio::test]
    async fn stats_math_matches_the_reporting_contract() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                [count_row(20)], // total
                [count_row(10)], // sent
                [count_row(7)],  // failed
                [count_row(3)],  // clicked
                [count_row(2)],  // active subscriptions
            ])
            .into_connection();
        let svc = service(db, None);

        let stats = svc.stats(Some("user1")).await.unwrap();
        assert_eq!(stats.total, 20);
        assert_eq!(stats.sent, 10);
        assert_eq!(stats.failed, 7);
        assert_eq!(stats.clicked, 3);
        assert_eq!(stats.click_rate, 30.0);
        assert_eq!(stats.active_subscriptions, 2);
    }

    #[tokio::test]
    async fn stats_with_nothing_sent_has_zero_click_rate() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                [count_row(4)],
                [count_row(0)],
                [count_row(4)],
                [count_row(0)],
                [count_row(0)],
            ])
            .into_connection();
        let svc = service(db, None);

        let stats = svc.stats(None).await.unwrap();
        assert_eq!(stats.sent, 0);
        assert_eq!(stats.click_rate, 0.0);
    }

    #[tokio::test]
    async fn logs_page_computes_pagination_metadata() {
        // 3 entries at page size 2: a full first page, 2 pages overall
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[count_row(3)]])
            .append_query_results([vec![
                log_entry(DeliveryStatus::Sent),
                log_entry(DeliveryStatus::Sent),
            ]])
            .into_connection();
        let svc = service(db, None);

        let (rows, total, pages) = svc.logs_page(None, 1, 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(total, 3);
        assert_eq!(pages, 2);
    }

    #[tokio::test]
    async fn logs_page_clamps_a_zero_limit_to_one() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[count_row(3)]])
            .append_query_results([vec![log_entry(DeliveryStatus::Sent)]])
            .into_connection();
        let svc = service(db, None);

        let (rows, total, pages) = svc.logs_page(None, 1, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(total, 3);
        assert_eq!(pages, 3);
    }

    fn subscription(id: &str, endpoint: &str) -> push_subscription::Model {
        let now = Utc::now().into();
        push_subscription::Model {
            id: id.to_string(),
            user_id: "user1".to_string(),
            endpoint: endpoint.to_string(),
            p256dh: "p256dh-key".to_string(),
            auth: "auth-secret".to_string(),
            user_agent: None,
            device_type: DeviceType::Unknown,
            is_active: true,
            last_used_at: now,
            created_at: now,
            updated_at: None,
        }
    }

    fn log_entry(status: DeliveryStatus) -> notification_log::Model {
        notification_log::Model {
            id: "log1".to_string(),
            user_id: "user1".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            notification_type: NotificationType::Custom,
            icon: None,
            url: None,
            data: None,
            priority: Priority::Normal,
            campaign: None,
            status,
            sent_at: None,
            clicked_at: None,
            error: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn fanout_isolates_endpoint_failures_and_marks_sent_on_partial_success() {
        let sub_a = subscription("sub-a", "https://push.example/a");
        let sub_b = subscription("sub-b", "https://push.example/b");
        let sub_c = subscription("sub-c", "https://push.example/c");

        // Scripted mock queries, in call order: subscription lookup, log
        // insert, then per-endpoint bookkeeping (a delivered, b gone) and
        // the final sent mark. The transient endpoint c touches nothing.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sub_a.clone(), sub_b.clone(), sub_c.clone()]])
            .append_query_results([vec![log_entry(DeliveryStatus::Pending)]])
            .append_query_results([vec![sub_a.clone()]])
            .append_query_results([vec![sub_a]])
            .append_query_results([vec![sub_b.clone()]])
            .append_query_results([vec![sub_b]])
            .append_query_results([vec![log_entry(DeliveryStatus::Pending)]])
            .append_query_results([vec![log_entry(DeliveryStatus::Sent)]])
            .into_connection();

        let transport = ScriptedTransport::new([
            ("https://push.example/a", SendOutcome::Delivered),
            (
                "https://push.example/b",
                SendOutcome::Permanent("410 Gone".to_string()),
            ),
            (
                "https://push.example/c",
                SendOutcome::Transient("503 upstream".to_string()),
            ),
        ]);
        let svc = service(db, Some(transport));

        let report = svc.send_to_user("user1", &notification("hi")).await.unwrap();

        assert!(report.success);
        assert_eq!(report.total, 3);
        assert_eq!(report.sent, 1);
        assert_eq!(report.endpoints.len(), 3);

        assert!(report.endpoints[0].success);
        assert!(report.endpoints[0].error.is_none());

        assert!(!report.endpoints[1].success);
        assert!(report.endpoints[1].error.as_deref().unwrap().contains("410"));

        assert!(!report.endpoints[2].success);
        assert!(report.endpoints[2].error.as_deref().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn all_endpoints_failing_marks_the_log_entry_failed() {
        let sub = subscription("sub-a", "https://push.example/a");

        // Subscription lookup, log insert, then the failed mark. The
        // transient failure leaves the subscription alone.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sub]])
            .append_query_results([vec![log_entry(DeliveryStatus::Pending)]])
            .append_query_results([vec![log_entry(DeliveryStatus::Pending)]])
            .append_query_results([vec![log_entry(DeliveryStatus::Failed)]])
            .into_connection();

        let transport = ScriptedTransport::new([(
            "https://push.example/a",
            SendOutcome::Transient("timeout".to_string()),
        )]);
        let svc = service(db, Some(transport));

        let report = svc.send_to_user("user1", &notification("hi")).await.unwrap();

        assert!(!report.success);
        assert_eq!(report.total, 1);
        assert_eq!(report.sent, 0);
        assert_eq!(report.endpoints[0].error.as_deref(), Some("timeout"));
    }
}
