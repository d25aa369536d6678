//! Common utilities shared across Auth Guard crates.

#![warn(clippy::pedantic)]

/// Module for JWT structure utilities (size limits, unverified header, algorithms)
pub mod jwt;
