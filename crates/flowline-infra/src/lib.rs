//! Infrastructure implementations for Flowline.
//!
//! SQLite-backed implementations of the flowline-core storage ports (sqlx,
//! WAL mode, split reader/writer pools) plus engine-config loading from
//! `{data_dir}/config.toml`.

pub mod config;
pub mod sqlite;
