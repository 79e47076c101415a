//! Auth endpoints: registration, login, tokens, password recovery.

use axum::extract::State;

use crate::error::{Result, clear_sentry_user};
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAuth;
use crate::models::{
    ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest, User, UserProfile,
};
use crate::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<ApiResponse<UserProfile>> {
    let session = state.auth_service().register(body).await?;
    Ok(
        ApiResponse::created("User registered successfully", session.user.profile())
            .with_token(session.token),
    )
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<ApiResponse<UserProfile>> {
    let session = state.auth_service().login(body).await?;
    Ok(ApiResponse::ok("Login successful", session.user.profile()).with_token(session.token))
}

/// GET /api/v1/auth/me
///
/// Returns the current user with a fresh token.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<ApiResponse<User>> {
    let session = state.auth_service().start_session(current.user)?;
    Ok(
        ApiResponse::ok("User profile retrieved successfully", session.user)
            .with_token(session.token),
    )
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<ApiResponse<()>> {
    state.auth_service().logout(&current.claims).await?;
    clear_sentry_user();
    Ok(ApiResponse::message("Successfully logged out"))
}

/// POST /api/v1/auth/refresh-token
pub async fn refresh_token(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<ApiResponse<UserProfile>> {
    let session = state.auth_service().start_session(current.user)?;
    Ok(
        ApiResponse::ok("Token refreshed successfully", session.user.profile())
            .with_token(session.token),
    )
}

/// POST /api/v1/auth/forgot-password
///
/// The reset token is never part of the response.
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> Result<ApiResponse<()>> {
    state.auth_service().forgot_password(body).await?;
    Ok(ApiResponse::message("Password reset email sent"))
}

/// PUT /api/v1/auth/reset-password/{token}
pub async fn reset_password(
    State(state): State<AppState>,
    ApiPath(token): ApiPath<String>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> Result<ApiResponse<UserProfile>> {
    let session = state.auth_service().reset_password(&token, body).await?;
    Ok(
        ApiResponse::ok("Password reset successful", session.user.profile())
            .with_token(session.token),
    )
}
