//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with `request_id` and `user_id` fields)
//! 3. Security headers (CSP, frame and sniffing protection)
//! 4. Request ID (honor or generate `x-request-id`)
//! 5. Session layer (tower-sessions, in-memory store)
//! 6. Session restore (revalidate the stored token when due)
//! 7. Per-router: auth guard, rate limiting (governor)

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;
pub mod session_restore;

pub use auth::{
    OptionalAuth, RequireAuth, clear_current_user, is_htmx, require_auth, safe_next,
    set_current_user,
};
pub use rate_limit::auth_rate_limiter;
pub use request_id::{RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
pub use session_restore::session_restore;
