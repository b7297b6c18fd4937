//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (propagated or generated, echoed in the response)
//! 4. CORS (only when `CORS_ALLOWED_ORIGIN` is set)
//! 5. Login rate limit (per client IP, `/api/auth/login` only)
//!
//! Authentication is an extractor ([`CurrentUser`]) rather than a layer so
//! each handler states the permission it needs.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::CurrentUser;
pub use rate_limit::login_rate_limiter;
pub use request_id::request_id_middleware;
