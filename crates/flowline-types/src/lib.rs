//! Shared domain types for Flowline.
//!
//! This crate contains the core domain types used across the Flowline engine:
//! workflows with their triggers and actions, external events, execution
//! records, users, capabilities, and the associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod execution;
pub mod user;
pub mod validation;
pub mod workflow;
