//! User management endpoints.

use axum::extract::State;
use serde_json::{Map, Value};

use bazaar_core::UserId;

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{
    ChangePasswordRequest, CreateUserRequest, ProfileChanges, User, UserProfile,
    UserStatusRequest,
};
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/users
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<ApiResponse<Vec<User>>> {
    let users = state.user_service().list().await?;
    Ok(ApiResponse::ok("Users retrieved successfully", users))
}

/// POST /api/v1/users
///
/// Unlike self-registration, an admin may pick any role.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> Result<ApiResponse<UserProfile>> {
    let user = state.auth_service().create_user(body.validate()?).await?;
    tracing::info!(user_id = %user.id, created_by = %admin.user.id, role = %user.role, "User created");
    Ok(ApiResponse::created(
        "User created successfully",
        user.profile(),
    ))
}

/// GET /api/v1/users/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    ApiPath(id): ApiPath<UserId>,
) -> Result<ApiResponse<User>> {
    let user = state.user_service().get(current.principal(), id).await?;
    Ok(ApiResponse::ok("User retrieved successfully", user))
}

/// PUT /api/v1/users/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(body): ApiJson<Map<String, Value>>,
) -> Result<ApiResponse<User>> {
    let changes = ProfileChanges::from_body(&body)?;
    let user = state
        .user_service()
        .update_profile(current.principal(), id, changes)
        .await?;
    Ok(ApiResponse::ok("User profile updated successfully", user))
}

/// PUT /api/v1/users/password
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Result<ApiResponse<()>> {
    state
        .auth_service()
        .change_password(&current.user, body)
        .await?;
    Ok(ApiResponse::message("Password updated successfully"))
}

/// PUT /api/v1/users/{id}/status
pub async fn set_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(body): ApiJson<UserStatusRequest>,
) -> Result<ApiResponse<User>> {
    let user = state
        .user_service()
        .set_status(admin.principal(), id, body.active)
        .await?;
    let message = if user.active {
        "User account activated successfully"
    } else {
        "User account deactivated successfully"
    };
    Ok(ApiResponse::ok(message, user))
}
