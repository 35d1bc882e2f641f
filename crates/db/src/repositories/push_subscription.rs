//! Push subscription repository.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::push_subscription::{ActiveModel, Column, Entity, Model};
use oddhay_common::{AppError, AppResult};

/// Repository for push subscription operations.
#[derive(Clone)]
pub struct PushSubscriptionRepository {
    db: Arc<DatabaseConnection>,
}

impl PushSubscriptionRepository {
    /// Create a new push subscription repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a push subscription by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Model>> {
        Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a push subscription by ID or return an error.
    pub async fn get_by_id(&self, id: &str) -> AppResult<Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Push subscription {id} not found")))
    }

    /// Insert a subscription, or overwrite the existing row for the same
    /// endpoint.
    ///
    /// The endpoint carries a unique index; conflicting writers race with
    /// last-writer-wins semantics and can never produce duplicate rows.
    /// Re-registration re-homes the endpoint: owner, keys, user agent and
    /// device type are all replaced and the row is reactivated.
    pub async fn upsert(&self, subscription: ActiveModel) -> AppResult<Model> {
        Entity::insert(subscription)
            .on_conflict(
                OnConflict::column(Column::Endpoint)
                    .update_columns([
                        Column::UserId,
                        Column::P256dh,
                        Column::Auth,
                        Column::UserAgent,
                        Column::DeviceType,
                        Column::IsActive,
                        Column::LastUsedAt,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_with_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find all active subscriptions for a user.
    pub async fn find_active_by_user(&self, user_id: &str) -> AppResult<Vec<Model>> {
        Entity::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::IsActive.eq(true))
            .order_by_desc(Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find active subscriptions for a set of users (batch fan-out form).
    pub async fn find_active_by_users(&self, user_ids: &[String]) -> AppResult<Vec<Model>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        Entity::find()
            .filter(Column::UserId.is_in(user_ids.iter().cloned()))
            .filter(Column::IsActive.eq(true))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Deactivate the subscription owning an endpoint.
    ///
    /// Idempotent; an unknown endpoint is a no-op, not an error.
    pub async fn deactivate_by_endpoint(&self, endpoint: &str) -> AppResult<()> {
        Entity::update_many()
            .filter(Column::Endpoint.eq(endpoint))
            .col_expr(Column::IsActive, false.into())
            .col_expr(Column::UpdatedAt, Utc::now().fixed_offset().into())
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Deactivate a subscription by ID (permanent delivery failure path).
    pub async fn deactivate(&self, id: &str) -> AppResult<Model> {
        let subscription = self.get_by_id(id).await?;
        let mut active: ActiveModel = subscription.into();

        active.is_active = Set(false);
        active.updated_at = Set(Some(Utc::now().into()));

        self.update(active).await
    }

    /// Refresh the last-used timestamp after a successful delivery.
    pub async fn mark_used(&self, id: &str) -> AppResult<Model> {
        let subscription = self.get_by_id(id).await?;
        let mut active: ActiveModel = subscription.into();

        active.last_used_at = Set(Utc::now().into());
        active.updated_at = Set(Some(Utc::now().into()));

        self.update(active).await
    }

    /// Count active subscriptions, globally or for one user.
    pub async fn count_active(&self, user_id: Option<&str>) -> AppResult<u64> {
        let mut query = Entity::find().filter(Column::IsActive.eq(true));

        if let Some(user_id) = user_id {
            query = query.filter(Column::UserId.eq(user_id));
        }

        query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a push subscription.
    async fn update(&self, subscription: ActiveModel) -> AppResult<Model> {
        subscription
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
