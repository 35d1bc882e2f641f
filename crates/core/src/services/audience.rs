//! Audience resolution for broadcast sends.
//!
//! Pure mapping from a targeting specifier to a user-id set. Read-only;
//! an empty result is zero recipients, never an error.

use oddhay_common::AppResult;
use oddhay_db::entities::user::UserRole;
use oddhay_db::repositories::UserRepository;

/// A targeting specifier for a notification send.
#[derive(Debug, Clone)]
pub enum Audience {
    /// One user.
    User(String),
    /// Every user with the given role.
    Role(UserRole),
    /// Every student in the given class level.
    ClassLevel(String),
    /// Every user on the platform.
    All,
}

/// Resolves an [`Audience`] to the set of user IDs it names.
#[derive(Clone)]
pub struct AudienceResolver {
    user_repo: UserRepository,
}

impl AudienceResolver {
    /// Create a new audience resolver.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self { user_repo }
    }

    /// Expand an audience to user IDs.
    pub async fn resolve(&self, audience: &Audience) -> AppResult<Vec<String>> {
        match audience {
            Audience::User(user_id) => Ok(vec![user_id.clone()]),
            Audience::Role(role) => self.user_repo.find_ids_by_role(role.clone()).await,
            Audience::ClassLevel(level) => {
                self.user_repo.find_student_ids_by_class_level(level).await
            }
            Audience::All => self.user_repo.find_all_ids().await,
        }
    }
}
