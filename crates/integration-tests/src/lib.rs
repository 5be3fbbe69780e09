//! End-to-end tests for the Soko storefront.
//!
//! Each test spawns two servers on ephemeral ports: an in-process fake of the
//! Soko REST backend, and the real storefront application pointed at it. The
//! fake records every request so tests can assert which backend calls a
//! storefront action made (or did not make).
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p soko-integration-tests
//! ```

#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

use soko_storefront::config::StorefrontConfig;
use soko_storefront::state::AppState;

/// Username the fake backend accepts.
pub const USERNAME: &str = "wanjiru";
/// Password the fake backend accepts.
pub const PASSWORD: &str = "correct-horse";

const TOKEN: &str = "tok-wanjiru";

// =============================================================================
// Fake Backend
// =============================================================================

/// A request the fake backend received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: Method,
    pub path: String,
}

#[derive(Debug, Clone)]
struct Line {
    id: i64,
    product_id: i64,
    quantity: u32,
}

#[derive(Debug, Default)]
struct BackendData {
    calls: Vec<Call>,
    products: Vec<Value>,
    lines: Vec<Line>,
    orders: Vec<Value>,
    next_line_id: i64,
    reject_cart_edits: bool,
    token_revoked: bool,
    cart_fetch_fails: bool,
    checkout_rejection: Option<String>,
}

impl BackendData {
    fn product(&self, id: i64) -> Option<&Value> {
        self.products.iter().find(|p| p["id"] == id)
    }

    fn line_json(&self, line: &Line) -> Value {
        let product = self.product(line.product_id).cloned().unwrap_or(Value::Null);
        json!({"id": line.id, "product": product, "quantity": line.quantity})
    }

    fn cart_json(&self) -> Value {
        let items: Vec<Value> = self.lines.iter().map(|l| self.line_json(l)).collect();
        json!([{"id": 1, "items": items}])
    }
}

/// In-process fake of the Soko REST backend.
#[derive(Clone)]
pub struct FakeBackend {
    data: Arc<Mutex<BackendData>>,
}

impl FakeBackend {
    fn new() -> Self {
        let products = vec![
            json!({"id": 1, "name": "Kiondo Basket", "description": "Hand-woven sisal basket",
                   "price": "1200.50", "stock": 10, "image_url": "https://cdn.example.com/kiondo.jpg",
                   "category": {"id": 1, "name": "Crafts"}}),
            json!({"id": 2, "name": "Kenyan Tea", "description": "Black tea from Kericho",
                   "price": 350, "stock": 40, "category": {"id": 2, "name": "Groceries"}}),
            json!({"id": 3, "name": "Maasai Shuka", "description": "Red checked blanket",
                   "price": "899.99", "stock": 0, "category": {"id": 1, "name": "Crafts"}}),
        ];
        Self {
            data: Arc::new(Mutex::new(BackendData {
                products,
                next_line_id: 100,
                ..BackendData::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendData> {
        self.data.lock().expect("fake backend lock poisoned")
    }

    /// Every request received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Whether a request with this method and path was received.
    #[must_use]
    pub fn called(&self, method: &Method, path: &str) -> bool {
        self.lock()
            .calls
            .iter()
            .any(|c| c.method == method && c.path == path)
    }

    /// Put a line in the cart directly.
    pub fn seed_cart_line(&self, product_id: i64, quantity: u32) -> i64 {
        let mut data = self.lock();
        let id = data.next_line_id;
        data.next_line_id += 1;
        data.lines.push(Line {
            id,
            product_id,
            quantity,
        });
        id
    }

    /// Make quantity changes and removals fail with a 400.
    pub fn reject_cart_edits(&self, reject: bool) {
        self.lock().reject_cart_edits = reject;
    }

    /// Make the signed-in user's token invalid, as after a password change.
    pub fn revoke_token(&self) {
        self.lock().token_revoked = true;
    }

    /// Make `GET orders/carts/` fail with a 500.
    pub fn fail_cart_fetch(&self, fail: bool) {
        self.lock().cart_fetch_fails = fail;
    }

    /// Make checkout fail with a 400 carrying `detail`.
    pub fn reject_checkout(&self, detail: Option<&str>) {
        self.lock().checkout_rejection = detail.map(str::to_string);
    }

    /// Quantity of a cart line as the backend sees it.
    #[must_use]
    pub fn line_quantity(&self, line_id: i64) -> Option<u32> {
        self.lock()
            .lines
            .iter()
            .find(|l| l.id == line_id)
            .map(|l| l.quantity)
    }

    fn router(&self) -> Router {
        let api = Router::new()
            .route("/login/", post(login))
            .route("/register/", post(register))
            .route("/profile/", get(profile).put(update_profile))
            .route("/categories/", get(categories))
            .route("/products/", get(products))
            .route("/products/{id}/", get(product))
            .route("/products/{id}/reviews/", get(reviews).post(create_review))
            .route("/orders/carts/", get(carts))
            .route("/orders/cart-items/", post(add_item))
            .route(
                "/orders/cart-items/{id}/",
                patch(update_item).delete(delete_item),
            )
            .route("/orders/history/", get(history))
            .route("/checkout/", post(checkout));

        Router::new()
            .nest("/api", api)
            .layer(axum::middleware::from_fn_with_state(self.clone(), record))
            .with_state(self.clone())
    }
}

async fn record(
    State(backend): State<FakeBackend>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let path = request.uri().path().to_string();
    backend.lock().calls.push(Call {
        method: request.method().clone(),
        path,
    });
    next.run(request).await
}

/// Email address the fake backend treats as belonging to another account.
pub const TAKEN_EMAIL: &str = "taken@example.com";

fn authorized(backend: &FakeBackend, headers: &HeaderMap) -> Result<(), Response> {
    let expected = format!("Token {TOKEN}");
    let presented = headers.get("authorization").and_then(|v| v.to_str().ok());
    if presented == Some(expected.as_str()) && !backend.lock().token_revoked {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid token."})),
        )
            .into_response())
    }
}

fn profile_json() -> Value {
    json!({"id": 7, "username": USERNAME, "email": "wanjiru@example.com",
           "first_name": "Wanjiru", "last_name": "Kamau"})
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

async fn login(Json(body): Json<Credentials>) -> Response {
    if body.username == USERNAME && body.password == PASSWORD {
        Json(json!({"token": TOKEN})).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"non_field_errors": ["Unable to log in with provided credentials."]})),
        )
            .into_response()
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["username"] == USERNAME {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"username": ["A user with that username already exists."]})),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({"username": body["username"], "token": TOKEN})),
    )
        .into_response()
}

async fn profile(State(backend): State<FakeBackend>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorized(&backend, &headers) {
        return rejection;
    }
    Json(profile_json()).into_response()
}

async fn update_profile(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorized(&backend, &headers) {
        return rejection;
    }
    if body["email"] == TAKEN_EMAIL {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"email": ["This email is already in use."]})),
        )
            .into_response();
    }
    let mut profile = profile_json();
    for field in ["email", "first_name", "last_name"] {
        profile[field] = body[field].clone();
    }
    Json(profile).into_response()
}

async fn categories() -> Json<Value> {
    Json(json!({
        "count": 2,
        "next": null,
        "results": [{"id": 1, "name": "Crafts"}, {"id": 2, "name": "Groceries"}]
    }))
}

async fn products(State(backend): State<FakeBackend>, uri: Uri) -> Json<Value> {
    let category = uri.query().and_then(|q| {
        q.split('&')
            .find_map(|pair| pair.strip_prefix("category="))
            .and_then(|v| v.parse::<i64>().ok())
    });
    let data = backend.lock();
    let list: Vec<Value> = data
        .products
        .iter()
        .filter(|p| category.is_none_or(|c| p["category"]["id"] == c))
        .cloned()
        .collect();
    Json(Value::Array(list))
}

async fn product(State(backend): State<FakeBackend>, Path(id): Path<i64>) -> Response {
    match backend.lock().product(id) {
        Some(product) => Json(product.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

async fn reviews(Path(_id): Path<i64>) -> Json<Value> {
    Json(json!([
        {"id": 1, "username": "otieno", "rating": 4, "comment": "Sturdy and beautiful",
         "created_at": "2025-03-01T10:00:00Z", "is_visible": true},
        {"id": 2, "username": "spammer", "rating": 1, "comment": "Hidden review",
         "created_at": "2025-03-02T10:00:00Z", "is_visible": false}
    ]))
}

async fn create_review(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorized(&backend, &headers) {
        return rejection;
    }
    (
        StatusCode::CREATED,
        Json(json!({"id": 3, "product": id, "username": USERNAME, "rating": body["rating"],
                    "comment": body["comment"], "created_at": "2025-03-03T10:00:00Z"})),
    )
        .into_response()
}

async fn carts(State(backend): State<FakeBackend>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorized(&backend, &headers) {
        return rejection;
    }
    let data = backend.lock();
    if data.cart_fetch_fails {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    Json(data.cart_json()).into_response()
}

#[derive(Deserialize)]
struct AddItem {
    product_id: i64,
    quantity: u32,
}

async fn add_item(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<AddItem>,
) -> Response {
    if let Err(rejection) = authorized(&backend, &headers) {
        return rejection;
    }
    let mut data = backend.lock();
    if data.product(body.product_id).is_none() {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "Unknown product."})))
            .into_response();
    }
    let index = match data.lines.iter().position(|l| l.product_id == body.product_id) {
        Some(index) => {
            data.lines[index].quantity += body.quantity;
            index
        }
        None => {
            let id = data.next_line_id;
            data.next_line_id += 1;
            data.lines.push(Line {
                id,
                product_id: body.product_id,
                quantity: body.quantity,
            });
            data.lines.len() - 1
        }
    };
    let line = data.lines[index].clone();
    (StatusCode::CREATED, Json(data.line_json(&line))).into_response()
}

#[derive(Deserialize)]
struct UpdateItem {
    quantity: u32,
}

async fn update_item(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<UpdateItem>,
) -> Response {
    if let Err(rejection) = authorized(&backend, &headers) {
        return rejection;
    }
    let mut data = backend.lock();
    if data.reject_cart_edits {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "Not enough stock."})))
            .into_response();
    }
    let Some(line) = data.lines.iter_mut().find(|l| l.id == id) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    };
    line.quantity = body.quantity;
    let line = line.clone();
    Json(data.line_json(&line)).into_response()
}

async fn delete_item(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if let Err(rejection) = authorized(&backend, &headers) {
        return rejection;
    }
    let mut data = backend.lock();
    if data.reject_cart_edits {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    data.lines.retain(|l| l.id != id);
    StatusCode::NO_CONTENT.into_response()
}

async fn history(State(backend): State<FakeBackend>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorized(&backend, &headers) {
        return rejection;
    }
    Json(Value::Array(backend.lock().orders.clone())).into_response()
}

async fn checkout(State(backend): State<FakeBackend>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorized(&backend, &headers) {
        return rejection;
    }
    let mut data = backend.lock();
    if let Some(detail) = data.checkout_rejection.clone() {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": detail}))).into_response();
    }
    if data.lines.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "Cart is empty."})))
            .into_response();
    }

    let order_id = i64::try_from(data.orders.len()).unwrap_or(0) + 1;
    let lines = std::mem::take(&mut data.lines);
    let items: Vec<Value> = lines
        .iter()
        .map(|l| {
            let product = data.product(l.product_id).cloned().unwrap_or(Value::Null);
            json!({"id": l.id, "product": product, "quantity": l.quantity, "price": product["price"]})
        })
        .collect();
    data.orders.push(json!({
        "id": order_id,
        "items": items,
        "status": "Pending",
        "created_at": "2025-04-01T12:00:00Z"
    }));

    (
        StatusCode::CREATED,
        Json(json!({"detail": "Order placed successfully.", "order_id": order_id})),
    )
        .into_response()
}

// =============================================================================
// Test Application
// =============================================================================

/// A running storefront wired to a fake backend.
pub struct TestApp {
    pub backend: FakeBackend,
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Start the fake backend and the storefront.
    pub async fn spawn() -> Self {
        Self::spawn_with(&[]).await
    }

    /// Start with extra storefront environment variables.
    pub async fn spawn_with(env: &[(&str, &str)]) -> Self {
        let backend = FakeBackend::new();
        let backend_addr = serve(backend.router()).await;

        let api_url = format!("http://{backend_addr}/api/");
        let config = StorefrontConfig::from_lookup(|key| match key {
            "SOKO_API_URL" => Some(api_url.clone()),
            _ => env
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value).to_string()),
        })
        .expect("test configuration is valid");
        let state = AppState::new(config).expect("backend client builds");
        let storefront_addr = serve(soko_storefront::app(state)).await;

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            backend,
            base_url: format!("http://{storefront_addr}"),
            client,
        }
    }

    /// Absolute storefront URL for a path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET a storefront path.
    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("storefront request failed")
    }

    /// POST a form to a storefront path.
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("storefront request failed")
    }

    /// POST a form the way HTMX does.
    pub async fn htmx_post(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("HX-Request", "true")
            .form(form)
            .send()
            .await
            .expect("storefront request failed")
    }

    /// Sign in with the credentials the fake backend accepts.
    pub async fn login(&self) {
        let response = self
            .post_form("/login", &[("username", USERNAME), ("password", PASSWORD)])
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
    }
}

/// `Location` header of a redirect.
#[must_use]
pub fn location(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("listener has an address");
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("test server failed");
    });
    addr
}
