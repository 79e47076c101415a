//! Integration tests for Bazaar.
//!
//! Tests drive the full router in-process against the in-memory stores, so
//! they need no database or running server:
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `auth_flow` - registration, login, logout, token handling
//! - `catalog` - admin product management and ratings
//! - `orders` - placement, stock reservation, cancellation

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use bazaar_api::app;
use bazaar_api::config::{ApiConfig, SentryConfig, StorageBackend};
use bazaar_api::db::{Storage, UserStore};
use bazaar_api::models::NewUser;
use bazaar_api::services::auth::hash_password;
use bazaar_api::state::AppState;
use bazaar_core::{Email, Role};

/// Password that satisfies the password policy.
pub const PASSWORD: &str = "Str0ng!pass";

/// An API instance backed by fresh in-memory stores.
pub struct TestApp {
    router: Router,
    storage: Storage,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Build an app after adjusting the default test configuration.
    #[must_use]
    pub fn with_config(adjust: impl FnOnce(&mut ApiConfig)) -> Self {
        let mut config = ApiConfig {
            storage: StorageBackend::Memory,
            database_url: None,
            host: [127, 0, 0, 1].into(),
            port: 5000,
            token_secret: SecretString::from("k9$Lm2#Qx7!Vb4@Zr8%Tn1^Wp6&Hy3*J"),
            token_ttl: Duration::from_secs(3600),
            reset_token_ttl: Duration::from_secs(600),
            empty_orders_not_found: true,
            log_json: false,
            sentry: SentryConfig::default(),
        };
        adjust(&mut config);

        let storage = Storage::memory(config.token_ttl);
        let router = app::router(AppState::new(config, storage.clone()));
        Self { router, storage }
    }

    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Send a request and return the status with the decoded JSON body.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, path, token, None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, token, Some(body)).await
    }

    pub async fn put(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, path, token, Some(body)).await
    }

    /// Register a regular user and return `(token, user id)`.
    pub async fn register(&self, name: &str, email: &str) -> (String, i64) {
        let (status, body) = self
            .post(
                "/api/v1/auth/register",
                None,
                json!({
                    "name": name,
                    "email": email,
                    "password": PASSWORD,
                    "passwordConfirm": PASSWORD
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        (
            body["token"].as_str().unwrap().to_owned(),
            body["data"]["id"].as_i64().unwrap(),
        )
    }

    /// Insert an admin account directly and log in as it.
    pub async fn admin_token(&self) -> String {
        let email = "admin@bazaar.test";
        self.storage
            .users
            .create(NewUser {
                name: "Store Admin".to_owned(),
                email: Email::parse(email).unwrap(),
                password_hash: hash_password(PASSWORD).unwrap(),
                role: Role::Admin,
            })
            .await
            .unwrap();

        let (status, body) = self
            .post(
                "/api/v1/auth/login",
                None,
                json!({"email": email, "password": PASSWORD}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {body}");
        body["token"].as_str().unwrap().to_owned()
    }

    /// Create a product as admin and return its id.
    pub async fn create_product(&self, admin: &str, name: &str, price: f64, stock: u32) -> i64 {
        let (status, body) = self
            .post(
                "/api/v1/products",
                Some(admin),
                json!({"products": {
                    "name": name,
                    "description": format!("{name} for testing"),
                    "price": price,
                    "category": "electronics",
                    "stock": stock
                }}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create product failed: {body}");
        body["data"][0]["id"].as_i64().unwrap()
    }

    /// Current stock of a product, read through the public endpoint.
    pub async fn stock(&self, product: i64) -> i64 {
        let (status, body) = self.get(&format!("/api/v1/products/{product}"), None).await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["stock"].as_i64().unwrap()
    }
}

/// A complete order body for the given `(product, quantity)` lines.
#[must_use]
pub fn order_body(lines: &[(i64, i64)]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(product, quantity)| json!({"product": product, "quantity": quantity}))
        .collect();
    json!({
        "items": items,
        "shippingAddress": {
            "street": "1 Main St",
            "city": "Springfield",
            "state": "IL",
            "zipCode": "62701",
            "country": "USA"
        },
        "paymentMethod": "creditCard"
    })
}
