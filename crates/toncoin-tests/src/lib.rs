//! # toncoin-tests
//!
//! Integration tests for the toncoin wallet core.
//!
//! This crate provides:
//! - A scripted in-memory node for driving wallet accounts end to end
//! - Generators for seeds, addresses and raw history records
//! - Scenario tests for native and token transfers
//! - Pagination and history classification tests
//! - Property-based tests for address, fee and amount invariants

pub mod generators;
pub mod harness;





pub use generators::*;
pub use harness::*;
