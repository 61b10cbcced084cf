//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, request transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//! 5. Rate limiting on checkout routes (governor)
//!
//! Customer identity and the admin token are checked by extractors in
//! [`auth`] rather than by layers.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{OptionalCustomer, RequireAdmin, set_current_customer};
pub use rate_limit::{api_rate_limiter, order_rate_limiter};
pub use request_id::request_id_middleware;
pub use session::{create_session_layer, create_session_store};
