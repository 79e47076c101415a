//! Authentication extractors.
//!
//! Handlers opt into authentication by taking [`RequireAuth`] or
//! [`RequireAdmin`] as an argument. Both read a bearer token from the
//! `Authorization` header and resolve it to an active user; failures become
//! 401/403 error envelopes.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::Span;

use crate::error::{AppError, set_sentry_user};
use crate::models::{Principal, User};
use crate::services::auth::{AuthError, Claims};
use crate::state::AppState;

/// The user behind a verified bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    /// Claims of the presented token, needed to revoke it on logout.
    pub claims: Claims,
}

impl CurrentUser {
    #[must_use]
    pub const fn principal(&self) -> Principal {
        self.user.principal()
    }
}

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(current): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", current.user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        let (user, claims) = state.auth_service().authenticate(token).await?;

        Span::current().record("user_id", user.id.as_i32());
        set_sentry_user(&user.id, Some(user.email.as_str()));

        Ok(Self(CurrentUser { user, claims }))
    }
}

/// Extractor that requires a valid bearer token for an admin.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(current) = RequireAuth::from_request_parts(parts, state).await?;

        if !current.user.role.is_admin() {
            tracing::warn!(
                user_id = %current.user.id,
                path = %parts.uri.path(),
                "Non-admin denied"
            );
            return Err(AppError::Forbidden(format!(
                "Access denied. Your role ({}) is not authorized to access this resource.",
                current.user.role
            )));
        }

        Ok(Self(current))
    }
}

/// The token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
