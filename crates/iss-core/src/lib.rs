//! Core types and trait definitions for the ISS caseload engine.
//!
//! This crate has no database or I/O dependencies. It owns
//! the status vocabulary, the pure consistency rules, discharge validation
//! and the [`store::CaseloadStore`] trait that backends implement.

pub mod assignment;
pub mod audit;
pub mod child;
pub mod discharge;
pub mod error;
pub mod rules;
pub mod staff;
pub mod store;

pub use error::{Error, Result};
