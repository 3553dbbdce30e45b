//! HTTP surface of loglens: dashboard data endpoints plus health and metrics.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{ApiServer, ApiState, build_api_router};
