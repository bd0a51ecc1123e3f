//! Core storage for the family relationship graph.
//! Persons are nodes, typed directed relationships are edges; kinship that is
//! not stored (siblings) is derived from the edge list.

pub mod db;
pub mod entity;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod unit_of_work;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::person::{Gender, Person, PersonId, PersonValidationError, UNSAVED_ID};
pub use model::relationship::{
    Relationship, RelationshipId, RelationshipStatus, RelationshipType,
    RelationshipValidationError,
};
pub use query::{
    CompareOp, FieldValue, PersonField, Predicate, QueryField, RelationshipField, ValueKind,
};
pub use repo::base_repo::{Repository, SqliteRepository};
pub use repo::error::{
    Constraint, PersistenceError, PersistenceErrorKind, RepoError, RepoResult,
};
pub use repo::person_repo::{PersonRepository, PersonWithRelationships, SqlitePersonRepository};
pub use repo::relationship_repo::{
    RelationshipRepository, RelationshipWithPersons, SqliteRelationshipRepository,
};
pub use unit_of_work::{SqliteUnitOfWork, UnitOfWork};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
