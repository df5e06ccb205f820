//! HTTP server module
//!
//! A thin JSON control API over the stream registry:
//! - Axum router with all endpoints
//! - Stream management (launch, list, start, stop, delete, probe)
//! - Optional basic auth and CORS middleware

pub mod handlers;
pub mod routes;
pub mod streams;

pub use routes::create_router;
