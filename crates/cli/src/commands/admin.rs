//! Admin account management.
//!
//! Public registration never grants the admin role, so the first admin is
//! created here.

use bazaar_api::db::{self, RepositoryError, Storage, UserStore};
use bazaar_api::models::{NewUser, ValidationError, user::validate_name};
use bazaar_api::services::auth::{AuthError, hash_password, validate_password};
use bazaar_core::{Email, Role, UserId};
use thiserror::Error;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid name: {0}")]
    InvalidName(#[from] ValidationError),

    /// Password policy or hashing failure.
    #[error("{0}")]
    Password(#[from] AuthError),

    #[error("User already exists with email: {0}")]
    UserExists(String),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

/// Create an admin account and return its id.
///
/// # Errors
///
/// Returns `AdminError` for invalid input, an existing account, or a
/// database failure.
pub async fn create_admin(name: &str, email: &str, password: &str) -> Result<UserId, AdminError> {
    let name = validate_name(name)?;
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    validate_password(password)?;

    let database_url =
        super::database_url().ok_or(AdminError::MissingEnvVar("BAZAAR_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;
    let storage = Storage::postgres(pool);

    tracing::info!("Creating admin account: {}", email);

    let user = storage
        .users
        .create(NewUser {
            name,
            email: email.clone(),
            password_hash: hash_password(password)?,
            role: Role::Admin,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(email.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!("Admin account created. ID: {}, Email: {}", user.id, user.email);
    Ok(user.id)
}
