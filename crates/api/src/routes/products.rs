//! Product catalog endpoints.

use axum::extract::State;
use serde::Serialize;

use bazaar_core::ProductId;

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{CreateProductsRequest, Product, Rating, RatingRequest, UpdateProductRequest};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Payload of a successful rating.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub product_id: ProductId,
    pub ratings: Vec<Rating>,
    pub average_rating: f64,
}

/// GET /api/v1/products
pub async fn list(State(state): State<AppState>) -> Result<ApiResponse<Vec<Product>>> {
    let products = state.catalog_service().list().await?;
    Ok(ApiResponse::ok("All products retrieved successfully", products))
}

/// GET /api/v1/products/{id}
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<ApiResponse<Product>> {
    let product = state.catalog_service().get(id).await?;
    Ok(ApiResponse::ok("Product retrieved successfully", product))
}

/// POST /api/v1/products
///
/// Accepts a single product object or an array of them.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<CreateProductsRequest>,
) -> Result<ApiResponse<Vec<Product>>> {
    let products = body.validate(admin.user.id)?;
    let created = state.catalog_service().create(products).await?;
    Ok(ApiResponse::created(
        format!("{} product(s) created successfully!", created.len()),
        created,
    ))
}

/// PUT /api/v1/products/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<UpdateProductRequest>,
) -> Result<ApiResponse<Product>> {
    let changes = body.validate()?;
    let product = state.catalog_service().update(id, changes).await?;
    Ok(ApiResponse::ok("Product updated successfully", product))
}

/// DELETE /api/v1/products/{id}
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<ApiResponse<()>> {
    state.catalog_service().delete(id).await?;
    Ok(ApiResponse::message("Product deleted successfully"))
}

/// POST /api/v1/products/{id}/ratings
pub async fn rate(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<RatingRequest>,
) -> Result<ApiResponse<RatingSummary>> {
    let rating = body.validate(current.user.id)?;
    let product = state.catalog_service().rate(id, rating).await?;
    Ok(ApiResponse::created(
        "Product rating added successfully",
        RatingSummary {
            product_id: product.id,
            ratings: product.ratings,
            average_rating: product.average_rating,
        },
    ))
}
