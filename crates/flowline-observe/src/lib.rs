//! Tracing and telemetry setup for Flowline.

pub mod tracing_setup;

pub use tracing_setup::{ObserveConfig, init_tracing, shutdown_tracing};
