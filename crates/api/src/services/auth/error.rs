//! Authentication and account error types.

use thiserror::Error;

use bazaar_core::UserId;

use super::token::TokenError;
use crate::db::RepositoryError;
use crate::models::ValidationError;

/// Errors that can occur during authentication and account management.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Request body failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Unknown email or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account has been deactivated by an admin.
    #[error("account deactivated")]
    AccountDisabled,

    /// No bearer token on a protected request.
    #[error("missing token")]
    MissingToken,

    /// The token was revoked by logout.
    #[error("token revoked")]
    TokenRevoked,

    /// Bad signature, malformed, or expired token.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    /// A token could not be signed.
    #[error("token signing failed: {0}")]
    Signing(TokenError),

    /// The token's user no longer exists.
    #[error("token user not found")]
    TokenUserNotFound,

    /// Caller lacks the role or ownership for this action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Email is already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// User not found.
    #[error("user not found")]
    UserNotFound(Option<UserId>),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Current password did not match on a password change.
    #[error("current password is incorrect")]
    IncorrectPassword,

    /// No user holds this reset token, or it expired.
    #[error("invalid reset token")]
    InvalidResetToken,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
