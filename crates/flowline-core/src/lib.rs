//! Trigger detection and execution engine for Flowline.
//!
//! This crate defines the "ports" (storage and collaborator traits) that the
//! infrastructure layer implements, and the engine components built on top
//! of them:
//!
//! - **[`engine::matcher`]** -- pure trigger predicate evaluation.
//! - **[`engine::poller`]** -- per-source polling loops with at-most-once
//!   event claiming through the deduplication ledger.
//! - **[`engine::executor`]** -- permission-gated, strictly ordered action
//!   chain execution against a per-run variable context.
//! - **[`engine::permission`]** -- the capability model.
//! - **[`engine::validator`]** -- structural workflow validation.
//! - **[`service`]** -- permission-gated CRUD over the storage ports.
//!
//! It depends only on `flowline-types` -- never on a database or transport
//! crate. Every component takes its collaborators by injection; there is no
//! ambient global state.

pub mod engine;
pub mod repository;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;
