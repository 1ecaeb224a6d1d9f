//! Reconciliation engine for fleet group memberships.
//!
//! Wraps the synchronous passes of [`fleet_core::pass`] in one store
//! transaction each, then wakes the affected devices once the transaction
//! has committed.

pub mod batch;
pub mod config;
pub mod engine;

pub use batch::NotificationBatcher;
pub use config::EngineConfig;
pub use engine::{Reconciliation, ReconciliationEngine};
