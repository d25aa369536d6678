//! HTTP request handlers.

pub mod headers;
pub mod health;
pub mod me;
pub mod metrics;

pub use headers::{get_headers, HEADERS_PERMISSION};
pub use health::{health_check, readiness_check};
pub use me::get_me;
pub use metrics::metrics_handler;
