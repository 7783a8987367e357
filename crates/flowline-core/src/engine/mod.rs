//! The trigger-detection-and-execution engine.
//!
//! Leaf-first: [`context`] (variable context + templating), [`matcher`]
//! (pure trigger predicates), [`permission`] (capability checks),
//! [`expression`] (conditional-action evaluation), [`schedule`] (cron
//! math), [`validator`] (structural checks), then [`action`] (handler
//! dispatch), [`executor`] (the orchestrator) and [`poller`] (the trigger
//! manager).

pub mod action;
pub mod context;
pub mod executor;
pub mod expression;
pub mod matcher;
pub mod permission;
pub mod poller;
pub mod schedule;
pub mod validator;
