//! Product management and ratings through the HTTP surface.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use bazaar_integration_tests::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_only_admins_create_products() {
    let app = TestApp::new();
    let (user, _) = app.register("Alice Doe", "alice@example.com").await;

    let (status, body) = app
        .post(
            "/api/v1/products",
            Some(&user),
            json!({"products": {"name": "Laptop"}}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        "Access denied. Your role (user) is not authorized to access this resource."
    );
}

#[tokio::test]
async fn test_create_list_update_delete() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let laptop = app.create_product(&admin, "Laptop", 999.99, 10).await;
    app.create_product(&admin, "Mouse", 19.5, 100).await;

    let (status, body) = app.get("/api/v1/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .put(
            &format!("/api/v1/products/{laptop}"),
            Some(&admin),
            json!({"stock": 3}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stock"], 3);
    assert_eq!(body["data"]["name"], "Laptop");

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/v1/products/{laptop}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/v1/products/{laptop}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_names_rejected() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    app.create_product(&admin, "Laptop", 999.99, 10).await;

    let (status, body) = app
        .post(
            "/api/v1/products",
            Some(&admin),
            json!({"products": [{
                "name": "Laptop",
                "description": "Same name again",
                "price": 10,
                "category": "electronics",
                "stock": 1
            }]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Duplicate product names found in the database: Laptop")
    );
}

#[tokio::test]
async fn test_rate_once() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let laptop = app.create_product(&admin, "Laptop", 999.99, 10).await;
    let (alice, _) = app.register("Alice Doe", "alice@example.com").await;
    let (bob, _) = app.register("Bob Roe", "bob@example.com").await;
    let path = format!("/api/v1/products/{laptop}/ratings");

    let (status, _) = app
        .post(&path, Some(&alice), json!({"rating": 5, "review": "Great value"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.post(&path, Some(&bob), json!({"rating": 2})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["averageRating"], 3.5);
    assert_eq!(body["data"]["ratings"].as_array().unwrap().len(), 2);

    let (status, body) = app.post(&path, Some(&alice), json!({"rating": 1})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You have already rated this product");
}
