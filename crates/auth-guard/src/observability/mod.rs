//! Observability module for Auth Guard.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
