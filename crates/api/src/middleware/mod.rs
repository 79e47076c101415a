//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions) - binary only
//! 2. Rate limiting on `/api` (governor) - binary only
//! 3. `TraceLayer` (one `http_request` span per request)
//! 4. Request ID (add unique ID to each request)
//! 5. Security headers
//! 6. CORS
//!
//! Authentication is per handler via the [`RequireAuth`] and
//! [`RequireAdmin`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{CurrentUser, RequireAdmin, RequireAuth};
pub use rate_limit::api_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
