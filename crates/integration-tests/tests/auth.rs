//! Login, registration and route guard flows.

use reqwest::{Method, StatusCode};
use soko_integration_tests::{PASSWORD, TestApp, USERNAME, location};

#[tokio::test]
async fn test_login_stores_session_and_redirects_home() {
    let app = TestApp::spawn().await;

    let response = app
        .post_form("/login", &[("username", USERNAME), ("password", PASSWORD)])
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/"));
    assert!(app.backend.called(&Method::POST, "/api/login/"));
    assert!(app.backend.called(&Method::GET, "/api/profile/"));

    let response = app.get("/profile").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.expect("body");
    assert!(body.contains("wanjiru@example.com"));
    assert!(body.contains("Wanjiru Kamau"));
}

#[tokio::test]
async fn test_invalid_credentials_show_error() {
    let app = TestApp::spawn().await;

    let response = app
        .post_form("/login", &[("username", USERNAME), ("password", "wrong")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.expect("body");
    assert!(body.contains("Invalid username or password. Please try again."));
    assert!(!app.backend.called(&Method::GET, "/api/profile/"));

    // Still signed out
    let response = app.get("/orders").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_blank_login_never_reaches_backend() {
    let app = TestApp::spawn().await;

    let response = app
        .post_form("/login", &[("username", "  "), ("password", "")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .text()
            .await
            .expect("body")
            .contains("All fields are required.")
    );
    assert!(!app.backend.called(&Method::POST, "/api/login/"));
}

#[tokio::test]
async fn test_guard_redirect_round_trips_next() {
    let app = TestApp::spawn().await;

    let response = app.get("/orders").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/login?next=%2Forders"));

    let response = app
        .post_form(
            "/login",
            &[
                ("username", USERNAME),
                ("password", PASSWORD),
                ("next", "/orders"),
            ],
        )
        .await;
    assert_eq!(location(&response).as_deref(), Some("/orders"));
}

#[tokio::test]
async fn test_offsite_next_is_ignored() {
    let app = TestApp::spawn().await;

    let response = app
        .post_form(
            "/login",
            &[
                ("username", USERNAME),
                ("password", PASSWORD),
                ("next", "//evil.example.com/"),
            ],
        )
        .await;
    assert_eq!(location(&response).as_deref(), Some("/"));
}

#[tokio::test]
async fn test_logout_clears_session() {
    let app = TestApp::spawn().await;
    app.login().await;
    assert_eq!(app.get("/profile").await.status(), StatusCode::OK);

    let response = app.post_form("/logout", &[]).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/"));

    let response = app.get("/profile").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_register_signs_in() {
    let app = TestApp::spawn().await;

    let response = app
        .post_form(
            "/register",
            &[
                ("username", "achieng"),
                ("email", "achieng@example.com"),
                ("password", "pass-1234"),
                ("password2", "pass-1234"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/"));
    assert!(app.backend.called(&Method::POST, "/api/register/"));
    assert_eq!(app.get("/orders").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_validates_locally() {
    let app = TestApp::spawn().await;

    let response = app
        .post_form(
            "/register",
            &[
                ("username", "achieng"),
                ("email", "achieng@example.com"),
                ("password", "pass-1234"),
                ("password2", "pass-9999"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.expect("body");
    assert!(body.contains("Passwords don"));
    assert!(body.contains(r#"value="achieng@example.com""#));
    assert!(!app.backend.called(&Method::POST, "/api/register/"));
}

#[tokio::test]
async fn test_register_rejected_by_backend() {
    let app = TestApp::spawn().await;

    let response = app
        .post_form(
            "/register",
            &[
                ("username", USERNAME),
                ("email", "other@example.com"),
                ("password", "pass-1234"),
                ("password2", "pass-1234"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .text()
            .await
            .expect("body")
            .contains("Registration failed. Please check your details and try again.")
    );
}

#[tokio::test]
async fn test_login_posts_are_rate_limited() {
    let app = TestApp::spawn().await;

    for _ in 0..5 {
        let response = app
            .post_form("/login", &[("username", USERNAME), ("password", "wrong")])
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .post_form("/login", &[("username", USERNAME), ("password", "wrong")])
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Viewing the page is never limited
    assert_eq!(app.get("/login").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_revoked_token_signs_out_on_next_request() {
    let app = TestApp::spawn_with(&[("SOKO_SESSION_REVALIDATE_SECS", "0")]).await;
    app.login().await;

    let response = app.get("/orders").await;
    assert_eq!(response.status(), StatusCode::OK);

    app.backend.revoke_token();

    let response = app.get("/orders").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let login_path = location(&response).unwrap_or_default();
    assert_eq!(login_path, "/login?next=%2Forders");

    let body = app.get(&login_path).await.text().await.expect("body");
    assert!(body.contains("Your session has expired. Please sign in again."));

    // The notice is shown once
    let body = app.get("/login").await.text().await.expect("body");
    assert!(!body.contains("Your session has expired."));
}
