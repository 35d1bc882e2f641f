//! User repository.
//!
//! The notification pipeline only reads users: token lookup for
//! authentication and the audience queries (role, class level, all).

use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect,
};

use crate::entities::user::{self, Column, UserRole};
use oddhay_common::{AppError, AppResult};

/// Repository for user lookups.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        user::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by access token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<user::Model>> {
        user::Entity::find()
            .filter(Column::Token.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of all users with the given role.
    pub async fn find_ids_by_role(&self, role: UserRole) -> AppResult<Vec<String>> {
        user::Entity::find()
            .select_only()
            .column(Column::Id)
            .filter(Column::Role.eq(role))
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of all students in the given class level.
    pub async fn find_student_ids_by_class_level(&self, class_level: &str) -> AppResult<Vec<String>> {
        user::Entity::find()
            .select_only()
            .column(Column::Id)
            .filter(Column::Role.eq(UserRole::Student))
            .filter(Column::ClassLevel.eq(class_level))
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of every user on the platform.
    pub async fn find_all_ids(&self) -> AppResult<Vec<String>> {
        user::Entity::find()
            .select_only()
            .column(Column::Id)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
