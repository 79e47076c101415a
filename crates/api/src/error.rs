//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. `AppError` maps the domain
//! errors onto HTTP status codes and renders them in the response envelope
//! `{"success": false, "error": "..."}`. Server-side failures are captured to
//! Sentry before the response is written and never leak their details.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::ValidationError;
use crate::services::{AuthError, CatalogError, OrderError, UserError};

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication or account operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// User management operation failed.
    #[error("User error: {0}")]
    User(#[from] UserError),

    /// Catalog operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Order workflow failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Request body failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks the role for this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code and client-facing message.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(_) | Self::Internal(_) => internal(),
            Self::Auth(err) => auth_status(err),
            Self::User(err) => match err {
                UserError::NotFound(id) => (
                    StatusCode::NOT_FOUND,
                    format!("User not found with id of {id}"),
                ),
                UserError::Forbidden(msg) => (StatusCode::FORBIDDEN, (*msg).to_owned()),
                UserError::SelfDeactivation => (
                    StatusCode::BAD_REQUEST,
                    "Cannot deactivate your own account".to_owned(),
                ),
                UserError::Repository(_) => internal(),
            },
            Self::Catalog(err) => match err {
                CatalogError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "Product not found".to_owned())
                }
                CatalogError::DuplicateNames(names) => (
                    StatusCode::BAD_REQUEST,
                    format!(
                        "Duplicate product names found in the database: {}. Please use unique names.",
                        names.join(", ")
                    ),
                ),
                CatalogError::AlreadyRated(_) => (
                    StatusCode::BAD_REQUEST,
                    "You have already rated this product".to_owned(),
                ),
                CatalogError::Repository(_) => internal(),
            },
            Self::Order(err) => match err {
                OrderError::ProductNotFound(id) => (
                    StatusCode::NOT_FOUND,
                    format!("Product with ID {id} does not exist."),
                ),
                OrderError::InsufficientStock { name, available } => (
                    StatusCode::BAD_REQUEST,
                    format!(
                        "Insufficient stock for product \"{name}\". Only {available} units are available."
                    ),
                ),
                OrderError::NotFound(_) => (StatusCode::NOT_FOUND, "Order not found".to_owned()),
                OrderError::NoOrders => (StatusCode::NOT_FOUND, "No orders found".to_owned()),
                OrderError::Forbidden(msg) => (StatusCode::FORBIDDEN, (*msg).to_owned()),
                OrderError::NotCancellable => (
                    StatusCode::BAD_REQUEST,
                    "Only pending orders can be canceled.".to_owned(),
                ),
                OrderError::TotalTooLarge => (
                    StatusCode::BAD_REQUEST,
                    "Order total is too large.".to_owned(),
                ),
                OrderError::Repository(_) => internal(),
            },
            Self::Validation(err) => (StatusCode::BAD_REQUEST, err.0.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        }
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        INTERNAL_MESSAGE.to_owned(),
    )
}

fn auth_status(err: &AuthError) -> (StatusCode, String) {
    let unauthorized = |msg: &str| (StatusCode::UNAUTHORIZED, msg.to_owned());
    match err {
        AuthError::Validation(v) => (StatusCode::BAD_REQUEST, v.0.clone()),
        AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        AuthError::UserAlreadyExists => (
            StatusCode::BAD_REQUEST,
            "User already exists with this email".to_owned(),
        ),
        AuthError::InvalidResetToken => (StatusCode::BAD_REQUEST, "Invalid token".to_owned()),
        AuthError::InvalidCredentials => unauthorized("Invalid email or password"),
        AuthError::AccountDisabled => unauthorized("User account is deactivated"),
        AuthError::MissingToken => unauthorized(
            "Authentication token is missing. Please provide a valid token to access this resource.",
        ),
        AuthError::TokenRevoked => {
            unauthorized("This token is invalid as the user has logged out.")
        }
        AuthError::InvalidToken(_) => {
            unauthorized("Token verification failed. Please provide a valid token.")
        }
        AuthError::TokenUserNotFound => unauthorized("User associated with this token not found."),
        AuthError::IncorrectPassword => unauthorized("Current password is incorrect"),
        AuthError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
        AuthError::UserNotFound(Some(id)) => (
            StatusCode::NOT_FOUND,
            format!("User not found with id of {id}"),
        ),
        AuthError::UserNotFound(None) => (StatusCode::NOT_FOUND, "User not found".to_owned()),
        AuthError::Signing(_) | AuthError::Repository(_) | AuthError::PasswordHash => internal(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use bazaar_core::{OrderId, ProductId};

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let (status, body) = render(AppError::NotFound("Nothing here".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Nothing here");
    }

    #[tokio::test]
    async fn test_order_errors() {
        let (status, body) = render(
            OrderError::InsufficientStock {
                name: "Laptop".into(),
                available: 5,
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Insufficient stock for product \"Laptop\". Only 5 units are available."
        );

        let (status, body) = render(OrderError::ProductNotFound(ProductId::new(7)).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Product with ID 7 does not exist.");

        let (status, _) = render(OrderError::NotFound(OrderId::new(1)).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = render(OrderError::Forbidden("nope").into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = render(OrderError::NotCancellable.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Only pending orders can be canceled.");

        let (status, body) = render(OrderError::TotalTooLarge.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Order total is too large.");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) = render(AppError::Database(RepositoryError::DataCorruption(
            "secret table layout".into(),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], INTERNAL_MESSAGE);

        let (status, body) = render(AuthError::PasswordHash.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn test_auth_status_codes() {
        let (status, _) = render(AuthError::InvalidCredentials.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = render(AuthError::TokenRevoked.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body["error"],
            "This token is invalid as the user has logged out."
        );

        let (status, _) = render(AuthError::Forbidden("admins only".into()).into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = render(AuthError::WeakPassword("too short".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
