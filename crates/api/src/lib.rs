//! HTTP API layer for oddhay-push.
//!
//! This crate provides the REST API:
//!
//! - **Endpoints**: push subscription management, sends, and reporting
//! - **Extractors**: bearer-token authentication, admin gating
//! - **Middleware**: token resolution, request state
//!
//! Built on Axum 0.8 with Tower middleware stack. Endpoints return
//! their documented body shapes directly; errors map to
//! `{error: {code, message}}` via `AppError`.

pub mod endpoints;
pub mod extractors;
pub mod middleware;

pub use endpoints::router;
pub use middleware::AppState;
