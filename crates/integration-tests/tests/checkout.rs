//! Checkout and order history.

use reqwest::{Method, StatusCode};
use soko_integration_tests::{TestApp, location};

#[tokio::test]
async fn test_empty_cart_checkout_makes_no_backend_call() {
    let app = TestApp::spawn().await;
    app.login().await;

    let response = app.get("/checkout").await;
    assert!(
        response
            .text()
            .await
            .expect("body")
            .contains("Your cart is empty. Please add items before checking out.")
    );

    let response = app.post_form("/checkout", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .text()
            .await
            .expect("body")
            .contains("Your cart is empty.")
    );
    assert!(!app.backend.called(&Method::POST, "/api/checkout/"));
}

#[tokio::test]
async fn test_checkout_places_order() {
    let app = TestApp::spawn().await;
    app.backend.seed_cart_line(1, 1);
    app.backend.seed_cart_line(2, 2);
    app.login().await;

    let body = app.get("/checkout").await.text().await.expect("body");
    assert!(body.contains("Order Summary"));
    assert!(body.contains("Kshs. 1900.50"));

    let response = app.post_form("/checkout", &[]).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/orders?placed=1"));
    assert!(app.backend.called(&Method::POST, "/api/checkout/"));

    let body = app
        .get("/orders?placed=1")
        .await
        .text()
        .await
        .expect("body");
    assert!(body.contains("Order Placed Successfully!"));
    assert!(body.contains("Order #1"));
    assert!(body.contains("Kshs. 1900.50"));

    // The snapshot was dropped, so the badge reflects the emptied cart
    let badge = app.get("/cart/count").await.text().await.expect("body");
    assert!(!badge.contains("badge"));
}

#[tokio::test]
async fn test_no_orders_message() {
    let app = TestApp::spawn().await;
    app.login().await;

    let body = app.get("/orders").await.text().await.expect("body");
    assert!(body.contains("You have no past orders."));
}

#[tokio::test]
async fn test_checkout_rejection_shows_backend_detail() {
    let app = TestApp::spawn().await;
    app.backend.seed_cart_line(1, 3);
    app.login().await;
    app.backend
        .reject_checkout(Some("Insufficient stock for product: Kiondo Basket."));

    let response = app.post_form("/checkout", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.backend.called(&Method::POST, "/api/checkout/"));
    let body = response.text().await.expect("body");
    assert!(body.contains("Insufficient stock for product: Kiondo Basket."));
    assert!(body.contains("Kshs. 3601.50"));

    let body = app.get("/orders").await.text().await.expect("body");
    assert!(body.contains("You have no past orders."));
}
