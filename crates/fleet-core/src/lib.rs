//! Core types and trait definitions for the fleet reconciliation engine.
//!
//! This crate is deliberately free of HTTP, database, and async-runtime
//! dependencies. It holds the pure membership diff, the command factory, the
//! per-pass planners, and the store / notifier seams that other crates
//! implement.

pub mod command;
pub mod diff;
pub mod entity;
pub mod error;
pub mod factory;
pub mod ids;
pub mod memory;
pub mod notify;
pub mod pass;
pub mod queue;
pub mod store;
pub mod subject;

pub use error::{Error, MissingEntity, Result};
