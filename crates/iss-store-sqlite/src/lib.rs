//! SQLite backend for the ISS caseload engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutating operation is a single
//! `BEGIN IMMEDIATE` transaction, which serialises concurrent read-then-write
//! sequences on the same child at the database writer lock.

mod encode;
mod engine;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
