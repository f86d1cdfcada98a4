//! Domain model for watch cycles and the links routed into them.
//!
//! # Responsibility
//! - Define the canonical records shared by allocation and lifecycle logic.
//! - Own the closed status sets and their wire/storage spellings.
//!
//! # Invariants
//! - Every record is identified by a stable UUID assigned at creation.
//! - Status values outside the closed sets are unrepresentable.

pub mod cycle;
pub mod link;
