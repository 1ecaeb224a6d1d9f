//! SQLite backend for the fleet store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Each reconciliation pass runs
//! as one SQLite transaction on that thread, which also serializes passes.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
