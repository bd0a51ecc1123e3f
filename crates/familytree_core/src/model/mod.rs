//! Business-facing domain model for the family graph.
//!
//! # Responsibility
//! - Define person and relationship records manipulated by callers.
//! - Compute derived attributes (names, age, duration, activity) on read.
//!
//! # Invariants
//! - Domain records are translated to/from storage entities only at the
//!   repository boundary.
//! - Relationships reference persons by id; no embedding, no shared state.

pub mod person;
pub mod relationship;
