//! Order endpoints.

use axum::extract::State;

use bazaar_core::OrderId;

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAuth;
use crate::models::{CreateOrderRequest, Order};
use crate::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/orders
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    ApiJson(body): ApiJson<CreateOrderRequest>,
) -> Result<ApiResponse<Order>> {
    let draft = body.validate()?;
    let order = state
        .order_service()
        .create_order(current.user.id, draft)
        .await?;
    Ok(ApiResponse::created(
        "Order placed successfully! Thank you for shopping with us.",
        order,
    ))
}

/// GET /api/v1/orders
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<ApiResponse<Vec<Order>>> {
    let orders = state.order_service().list_orders(current.user.id).await?;
    Ok(ApiResponse::ok("Orders retrieved successfully.", orders))
}

/// GET /api/v1/orders/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<ApiResponse<Order>> {
    let order = state
        .order_service()
        .get_order(current.principal(), id)
        .await?;
    Ok(ApiResponse::ok("Order details retrieved successfully.", order))
}

/// PUT /api/v1/orders/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<ApiResponse<Order>> {
    let order = state
        .order_service()
        .cancel_order(current.principal(), id)
        .await?;
    Ok(ApiResponse::ok(
        "Order has been successfully canceled and stock restored.",
        order,
    ))
}
