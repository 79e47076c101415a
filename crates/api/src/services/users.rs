//! User management: listing, profiles, and account status.

use thiserror::Error;

use bazaar_core::UserId;

use crate::db::{RepositoryError, UserStore};
use crate::models::{Principal, ProfileChanges, User};

/// Errors from user management.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found: {0}")]
    NotFound(UserId),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error("cannot deactivate your own account")]
    SelfDeactivation,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// User management over a [`UserStore`].
pub struct UserService<'a> {
    users: &'a dyn UserStore,
}

impl<'a> UserService<'a> {
    #[must_use]
    pub const fn new(users: &'a dyn UserStore) -> Self {
        Self { users }
    }

    /// All users, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `UserError::Repository` if the store fails.
    pub async fn list(&self) -> Result<Vec<User>, UserError> {
        Ok(self.users.list().await?)
    }

    /// Fetch a user the caller is allowed to see.
    ///
    /// # Errors
    ///
    /// Returns `UserError::Forbidden` unless the caller is the user or an
    /// admin, and `UserError::NotFound` if there is no such user.
    pub async fn get(&self, caller: Principal, id: UserId) -> Result<User, UserError> {
        if !caller.can_access(id) {
            return Err(UserError::Forbidden(
                "You are not authorized to access this user",
            ));
        }
        self.users
            .get_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))
    }

    /// Apply a validated profile update.
    ///
    /// Only admins may change a role, including their own.
    ///
    /// # Errors
    ///
    /// Returns `UserError::Forbidden` or `UserError::NotFound`.
    pub async fn update_profile(
        &self,
        caller: Principal,
        id: UserId,
        changes: ProfileChanges,
    ) -> Result<User, UserError> {
        if !caller.can_access(id) {
            return Err(UserError::Forbidden(
                "You are not authorized to update this user",
            ));
        }
        if changes.role.is_some() && !caller.is_admin() {
            return Err(UserError::Forbidden("Only an admin can change user roles"));
        }

        let user = self
            .users
            .update_profile(id, changes)
            .await?
            .ok_or(UserError::NotFound(id))?;
        tracing::info!(user_id = %id, updated_by = %caller.id, "User profile updated");
        Ok(user)
    }

    /// Activate or deactivate an account.
    ///
    /// # Errors
    ///
    /// Returns `UserError::SelfDeactivation` when an admin targets their own
    /// account, or `UserError::NotFound`.
    pub async fn set_status(
        &self,
        caller: Principal,
        id: UserId,
        active: bool,
    ) -> Result<User, UserError> {
        if caller.id == id && !active {
            return Err(UserError::SelfDeactivation);
        }

        let user = self
            .users
            .set_active(id, active)
            .await?
            .ok_or(UserError::NotFound(id))?;
        tracing::info!(user_id = %id, active, changed_by = %caller.id, "User status changed");
        Ok(user)
    }
}
