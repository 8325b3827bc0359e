//! # Actix Middleware Library
//!
//! Middleware shared by the Actix services
//!
//! ## Modules
//! - `jwt_auth`: bearer token resolution into a [`Principal`]
//! - `correlation_id`: `x-correlation-id` propagation
//! - `logging`: request/response logging
//! - `metrics`: Prometheus HTTP metrics, held (long-poll) routes kept apart

pub mod correlation_id;
pub mod jwt_auth;
pub mod logging;
pub mod metrics;

pub use correlation_id::{get_correlation_id, CorrelationId, CorrelationIdMiddleware};
pub use jwt_auth::{AuthError, JwtAuthMiddleware, Principal, PrincipalResolver};
pub use logging::Logging;
pub use metrics::HttpMetrics;
