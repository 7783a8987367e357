//! Storage and collaborator port traits.
//!
//! The infrastructure layer (flowline-infra) implements the storage traits
//! with SQLite; transport/AI integrations implement the collaborator traits.
//! All traits use native async fn in traits (Rust 2024 edition, no
//! async_trait macro).

pub mod dedup;
pub mod execution;
pub mod schedule;
pub mod source;
pub mod user;
pub mod workflow;
