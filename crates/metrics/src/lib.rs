//! Metric names and tracing setup for quiver.
//!
//! Metrics go through the `metrics` crate facade, so nothing is recorded until
//! the embedding host installs a recorder.
//!
//! ```rust,ignore
//! use quiver_metrics::{counter, skills};
//!
//! counter!(skills::TURNS_TOTAL).increment(1);
//! ```
//!
//! # Features
//!
//! - `tracing`: propagate span fields to metric labels

mod definitions;
pub mod tracing_integration;

pub use definitions::*;

pub use metrics::{counter, gauge, histogram};
