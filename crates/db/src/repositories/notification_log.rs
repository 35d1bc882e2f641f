//! Notification log repository.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::notification_log::{ActiveModel, Column, DeliveryStatus, Entity, Model};
use oddhay_common::{AppError, AppResult};

/// Raw delivery-log counters for stats reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCounts {
    /// All log entries in scope.
    pub total: u64,
    /// Entries with status `sent`.
    pub sent: u64,
    /// Entries with status `failed`.
    pub failed: u64,
    /// Entries with status `clicked`.
    pub clicked: u64,
}

/// Repository for notification log operations.
#[derive(Clone)]
pub struct NotificationLogRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationLogRepository {
    /// Create a new notification log repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a log entry by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Model>> {
        Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a log entry by ID or return an error.
    pub async fn get_by_id(&self, id: &str) -> AppResult<Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification log {id} not found")))
    }

    /// Create a new log entry (status starts at pending).
    pub async fn create(&self, entry: ActiveModel) -> AppResult<Model> {
        entry
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark an entry as sent.
    pub async fn mark_sent(&self, id: &str) -> AppResult<Model> {
        let entry = self.get_by_id(id).await?;
        let mut active: ActiveModel = entry.into();

        active.status = Set(DeliveryStatus::Sent);
        active.sent_at = Set(Some(Utc::now().into()));

        self.update(active).await
    }

    /// Mark an entry as failed, recording the reason.
    pub async fn mark_failed(&self, id: &str, reason: &str) -> AppResult<Model> {
        let entry = self.get_by_id(id).await?;
        let mut active: ActiveModel = entry.into();

        active.status = Set(DeliveryStatus::Failed);
        active.error = Set(Some(reason.to_string()));

        self.update(active).await
    }

    /// Mark an entry as clicked.
    ///
    /// Click callbacks arrive asynchronously from the client and may race
    /// delivery finalization, so a non-sent entry is left untouched with a
    /// warning rather than treated as an error.
    pub async fn mark_clicked(&self, id: &str) -> AppResult<Model> {
        let entry = self.get_by_id(id).await?;

        if entry.status != DeliveryStatus::Sent {
            tracing::warn!(
                log_id = %entry.id,
                status = ?entry.status,
                "Ignoring click on a notification log entry that was never sent"
            );
            return Ok(entry);
        }

        let mut active: ActiveModel = entry.into();
        active.status = Set(DeliveryStatus::Clicked);
        active.clicked_at = Set(Some(Utc::now().into()));

        self.update(active).await
    }

    /// Count log entries, globally or scoped to one user.
    pub async fn counts(&self, user_id: Option<&str>) -> AppResult<LogCounts> {
        Ok(LogCounts {
            total: self.count_filtered(user_id, None).await?,
            sent: self
                .count_filtered(user_id, Some(DeliveryStatus::Sent))
                .await?,
            failed: self
                .count_filtered(user_id, Some(DeliveryStatus::Failed))
                .await?,
            clicked: self
                .count_filtered(user_id, Some(DeliveryStatus::Clicked))
                .await?,
        })
    }

    /// Fetch one page of log entries, newest first.
    ///
    /// `page` is 1-based; returns the rows plus the total entry count.
    pub async fn find_page(
        &self,
        user_id: Option<&str>,
        page: u64,
        limit: u64,
    ) -> AppResult<(Vec<Model>, u64)> {
        let mut query = Entity::find().order_by_desc(Column::CreatedAt);

        if let Some(user_id) = user_id {
            query = query.filter(Column::UserId.eq(user_id));
        }

        let paginator = query.paginate(self.db.as_ref(), limit.max(1));
        let total = paginator
            .num_items()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((rows, total))
    }

    async fn count_filtered(
        &self,
        user_id: Option<&str>,
        status: Option<DeliveryStatus>,
    ) -> AppResult<u64> {
        let mut query = Entity::find();

        if let Some(user_id) = user_id {
            query = query.filter(Column::UserId.eq(user_id));
        }
        if let Some(status) = status {
            query = query.filter(Column::Status.eq(status));
        }

        query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update(&self, entry: ActiveModel) -> AppResult<Model> {
        entry
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
