//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                           - Liveness
//! GET  /health/ready                     - Readiness (database)
//!
//! # Under /api/v1
//! GET  /status                           - API is running
//!
//! # Auth
//! POST /auth/register                    - Register, returns token
//! POST /auth/login                       - Login, returns token
//! GET  /auth/me                          - Current user + fresh token (bearer)
//! POST /auth/logout                      - Revoke the presented token (bearer)
//! POST /auth/refresh-token               - New token (bearer)
//! POST /auth/forgot-password             - Issue a password-reset token
//! PUT  /auth/reset-password/{token}      - Redeem a password-reset token
//!
//! # Users
//! GET  /users                            - List users (admin)
//! POST /users                            - Create user with any role (admin)
//! PUT  /users/password                   - Change own password (bearer)
//! GET  /users/{id}                       - User details (self or admin)
//! PUT  /users/{id}                       - Update name/role (self or admin)
//! PUT  /users/{id}/status                - Activate/deactivate (admin)
//!
//! # Products
//! GET    /products                       - List products
//! POST   /products                       - Create one or many (admin)
//! GET    /products/{id}                  - Product details
//! PUT    /products/{id}                  - Partial update (admin)
//! DELETE /products/{id}                  - Delete (admin)
//! POST   /products/{id}/ratings          - Rate once per user (bearer)
//!
//! # Orders (bearer)
//! POST /orders                           - Place an order
//! GET  /orders                           - Own orders
//! GET  /orders/{id}                      - Order details (owner or admin)
//! PUT  /orders/{id}/cancel               - Cancel a pending order (owner or admin)
//! ```

pub mod auth;
pub mod orders;
pub mod products;
pub mod status;
pub mod users;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout))
        .route("/refresh-token", post(auth::refresh_token))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password/{token}", put(auth::reset_password))
}

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list).post(users::create))
        .route("/password", put(users::change_password))
        .route("/{id}", get(users::show).put(users::update))
        .route("/{id}/status", put(users::set_status))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list).post(products::create))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/{id}/ratings", post(products::rate))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", put(orders::cancel))
}

/// All versioned API routes, to be nested under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status::status))
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/products", product_routes())
        .nest("/orders", order_routes())
}
