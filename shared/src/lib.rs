//! Shared types and models for the Inventory Management backend
//!
//! This crate holds the domain model and the pure stock-ledger rules so they
//! can be exercised without a database.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
