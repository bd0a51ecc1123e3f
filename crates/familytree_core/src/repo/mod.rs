//! Repository layer over the family tree store.
//!
//! # Responsibility
//! - Define the generic, person and relationship data access contracts.
//! - Keep SQL inside the persistence boundary.
//!
//! # Invariants
//! - Repositories created by one unit of work share one session; staged
//!   writes from either are flushed together.
//! - Not-found is `None`/`false`, never an error.

pub mod base_repo;
pub mod error;
pub mod person_repo;
pub mod relationship_repo;
pub(crate) mod session;
