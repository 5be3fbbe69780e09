//! Cart editing through the storefront.

use reqwest::{Method, StatusCode};
use soko_integration_tests::{PASSWORD, TestApp, USERNAME, location};

#[tokio::test]
async fn test_guest_add_redirects_without_backend_call() {
    let app = TestApp::spawn().await;

    let response = app
        .post_form("/cart/add", &[("product_id", "1"), ("quantity", "1")])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/login"));
    assert!(!app.backend.called(&Method::POST, "/api/orders/cart-items/"));
}

#[tokio::test]
async fn test_guest_add_returns_to_product_after_login() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/cart/add"))
        .header(reqwest::header::REFERER, app.url("/products/1"))
        .form(&[("product_id", "1"), ("quantity", "1")])
        .send()
        .await
        .expect("storefront request failed");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let login_path = location(&response).unwrap_or_default();
    assert_eq!(login_path, "/login?next=%2Fproducts%2F1");

    let body = app.get(&login_path).await.text().await.expect("body");
    assert!(body.contains(r#"value="/products/1""#));

    let response = app
        .post_form(
            "/login",
            &[
                ("username", USERNAME),
                ("password", PASSWORD),
                ("next", "/products/1"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let landing = location(&response).unwrap_or_default();
    assert_eq!(landing, "/products/1");

    let response = app.get(&landing).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.expect("body").contains("Kiondo Basket"));
}

#[tokio::test]
async fn test_login_drops_previous_cart_snapshot() {
    let app = TestApp::spawn().await;
    app.backend.seed_cart_line(1, 2);
    app.login().await;

    let body = app.get("/cart").await.text().await.expect("body");
    assert!(body.contains("Kiondo Basket"));

    app.backend.seed_cart_line(2, 3);
    app.login().await;

    let badge = app.get("/cart/count").await.text().await.expect("body");
    assert!(badge.contains(">5<"));
}

#[tokio::test]
async fn test_add_then_view_cart() {
    let app = TestApp::spawn().await;
    app.login().await;

    let response = app
        .post_form("/cart/add", &[("product_id", "1"), ("quantity", "2")])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/cart"));

    let body = app.get("/cart").await.text().await.expect("body");
    assert!(body.contains("Kiondo Basket"));
    assert!(body.contains("Kshs. 2401.00"));
}

#[tokio::test]
async fn test_htmx_add_returns_badge_and_trigger() {
    let app = TestApp::spawn().await;
    app.login().await;

    let response = app
        .htmx_post("/cart/add", &[("product_id", "2"), ("quantity", "3")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("HX-Trigger")
            .and_then(|v| v.to_str().ok()),
        Some("cart-updated")
    );
    assert!(response.text().await.expect("body").contains(">3<"));
}

#[tokio::test]
async fn test_total_is_sum_of_line_totals() {
    let app = TestApp::spawn().await;
    app.backend.seed_cart_line(1, 2);
    app.backend.seed_cart_line(2, 3);
    app.login().await;

    let body = app.get("/cart").await.text().await.expect("body");
    assert!(body.contains("Kshs. 2401.00"));
    assert!(body.contains("Kshs. 1050.00"));
    assert!(body.contains("Kshs. 3451.00"));

    let badge = app.get("/cart/count").await.text().await.expect("body");
    assert!(badge.contains(">5<"));
}

#[tokio::test]
async fn test_increment_updates_backend() {
    let app = TestApp::spawn().await;
    let line = app.backend.seed_cart_line(2, 1);
    app.login().await;

    let item_id = line.to_string();
    let response = app
        .htmx_post("/cart/increment", &[("item_id", item_id.as_str())])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        app.backend
            .called(&Method::PATCH, &format!("/api/orders/cart-items/{line}/"))
    );
    assert_eq!(app.backend.line_quantity(line), Some(2));
    assert!(response.text().await.expect("body").contains("Kshs. 700.00"));
}

#[tokio::test]
async fn test_decrement_at_one_is_a_no_op() {
    let app = TestApp::spawn().await;
    let line = app.backend.seed_cart_line(2, 1);
    app.login().await;

    let item_id = line.to_string();
    let response = app
        .htmx_post("/cart/decrement", &[("item_id", item_id.as_str())])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        !app.backend
            .called(&Method::PATCH, &format!("/api/orders/cart-items/{line}/"))
    );
    assert_eq!(app.backend.line_quantity(line), Some(1));
}

#[tokio::test]
async fn test_remove_requires_confirmation() {
    let app = TestApp::spawn().await;
    let line = app.backend.seed_cart_line(2, 2);
    app.login().await;
    let item_id = line.to_string();
    let delete_path = format!("/api/orders/cart-items/{line}/");

    let response = app
        .htmx_post("/cart/remove", &[("item_id", item_id.as_str())])
        .await;
    let body = response.text().await.expect("body");
    assert!(body.contains("Remove Kenyan Tea from your cart?"));
    assert!(!app.backend.called(&Method::DELETE, &delete_path));
    assert_eq!(app.backend.line_quantity(line), Some(2));

    let response = app
        .htmx_post(
            "/cart/remove",
            &[("item_id", item_id.as_str()), ("confirmed", "true")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.backend.called(&Method::DELETE, &delete_path));
    assert_eq!(app.backend.line_quantity(line), None);
    assert!(
        response
            .text()
            .await
            .expect("body")
            .contains("Your cart is empty.")
    );
}

#[tokio::test]
async fn test_rejected_edit_rolls_back() {
    let app = TestApp::spawn().await;
    let line = app.backend.seed_cart_line(1, 1);
    app.login().await;
    app.backend.reject_cart_edits(true);

    let item_id = line.to_string();
    let response = app
        .htmx_post("/cart/increment", &[("item_id", item_id.as_str())])
        .await;
    let body = response.text().await.expect("body");
    assert!(body.contains("Failed to update item quantity."));
    assert!(body.contains(r#"name="quantity" value="1""#));
    assert!(body.contains("Kshs. 1200.50"));
    assert_eq!(app.backend.line_quantity(line), Some(1));

    let response = app
        .htmx_post(
            "/cart/remove",
            &[("item_id", item_id.as_str()), ("confirmed", "true")],
        )
        .await;
    let body = response.text().await.expect("body");
    assert!(body.contains("Failed to remove"));
    assert!(body.contains("Kiondo Basket"));
    assert_eq!(app.backend.line_quantity(line), Some(1));
}

#[tokio::test]
async fn test_zero_quantity_is_rejected_locally() {
    let app = TestApp::spawn().await;
    let line = app.backend.seed_cart_line(1, 2);
    app.login().await;

    let item_id = line.to_string();
    let response = app
        .htmx_post(
            "/cart/update",
            &[("item_id", item_id.as_str()), ("quantity", "0")],
        )
        .await;
    assert!(
        response
            .text()
            .await
            .expect("body")
            .contains("Quantity must be at least 1.")
    );
    assert_eq!(app.backend.line_quantity(line), Some(2));
}

#[tokio::test]
async fn test_step_on_line_added_elsewhere_refetches() {
    let app = TestApp::spawn().await;
    app.login().await;

    let body = app.get("/cart").await.text().await.expect("body");
    assert!(body.contains("Your cart is empty."));

    // Added from another tab; the session copy still shows an empty cart
    let line = app.backend.seed_cart_line(2, 1);
    let item_id = line.to_string();
    let response = app
        .htmx_post("/cart/increment", &[("item_id", item_id.as_str())])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        app.backend
            .called(&Method::PATCH, &format!("/api/orders/cart-items/{line}/"))
    );
    assert_eq!(app.backend.line_quantity(line), Some(2));
    let body = response.text().await.expect("body");
    assert!(body.contains("Kenyan Tea"));
    assert!(body.contains(r#"name="quantity" value="2""#));
}

#[tokio::test]
async fn test_step_on_vanished_line_reports_it() {
    let app = TestApp::spawn().await;
    app.backend.seed_cart_line(1, 1);
    app.login().await;

    let response = app
        .htmx_post("/cart/increment", &[("item_id", "999")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.expect("body");
    assert!(body.contains("That item is no longer in your cart."));
    assert!(body.contains("Kiondo Basket"));
    assert!(
        !app.backend
            .calls()
            .iter()
            .any(|call| call.method == Method::PATCH)
    );
}

#[tokio::test]
async fn test_blank_quantity_adds_one() {
    let app = TestApp::spawn().await;
    app.login().await;

    let response = app
        .post_form("/cart/add", &[("product_id", "2"), ("quantity", "")])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let badge = app.get("/cart/count").await.text().await.expect("body");
    assert!(badge.contains(">1<"));
}

#[tokio::test]
async fn test_htmx_add_failure_is_swappable() {
    let app = TestApp::spawn().await;
    app.login().await;

    let response = app
        .htmx_post("/cart/add", &[("product_id", "42"), ("quantity", "1")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .text()
            .await
            .expect("body")
            .contains("Error adding to cart")
    );
}

#[tokio::test]
async fn test_failed_refetch_drops_snapshot_until_backend_recovers() {
    let app = TestApp::spawn().await;
    let line = app.backend.seed_cart_line(1, 1);
    app.login().await;
    let body = app.get("/cart").await.text().await.expect("body");
    assert!(body.contains("Kiondo Basket"));

    app.backend.reject_cart_edits(true);
    app.backend.fail_cart_fetch(true);

    let item_id = line.to_string();
    let response = app
        .htmx_post("/cart/increment", &[("item_id", item_id.as_str())])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.expect("body");
    assert!(body.contains("load your cart. Please check your connection and try again."));
    assert!(!body.contains("Kiondo Basket"));

    let badge = app.get("/cart/count").await.text().await.expect("body");
    assert!(!badge.contains("badge"));

    app.backend.fail_cart_fetch(false);
    let badge = app.get("/cart/count").await.text().await.expect("body");
    assert!(badge.contains(">1<"));
}
