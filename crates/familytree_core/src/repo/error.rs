//! Repository error taxonomy.
//!
//! # Responsibility
//! - Separate invalid input, consistency-rule rejections, storage failures
//!   and transaction protocol misuse.
//! - Classify SQLite constraint failures into named consistency rules.
//!
//! # Invariants
//! - "Not found" is never an error; lookups return `Option`/`bool`.
//! - Storage constraint violations are surfaced, never swallowed.

use crate::db::DbError;
use crate::model::person::PersonValidationError;
use crate::model::relationship::RelationshipValidationError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Consistency rule enforced by the domain layer and/or storage tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// `CK_Relationships_SelfReference`.
    SelfReference,
    /// `CK_Relationships_ValidDates`.
    ValidDates,
    /// `IX_Relationships_Unique_Relationship`.
    UniqueRelationship,
    /// `FK_Relationships_PrimaryPerson` / `FK_Relationships_RelatedPerson`.
    ForeignKey,
    /// Column-level NOT NULL / length checks.
    FieldCheck,
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SelfReference => "CK_Relationships_SelfReference",
            Self::ValidDates => "CK_Relationships_ValidDates",
            Self::UniqueRelationship => "IX_Relationships_Unique_Relationship",
            Self::ForeignKey => "FK_Relationships_Person",
            Self::FieldCheck => "field_check",
        };
        f.write_str(name)
    }
}

/// Category of a storage-tier failure.
#[derive(Debug)]
pub enum PersistenceErrorKind {
    /// Storage refused a write because of a consistency rule.
    Constraint(Constraint),
    /// An update/delete targeted a row that does not exist.
    MissingRow { table: &'static str, id: i64 },
    /// Persisted data cannot be converted into a domain model.
    InvalidData(String),
    Db(DbError),
}

/// Storage-tier failure with the operation context it happened in.
#[derive(Debug)]
pub struct PersistenceError {
    pub context: &'static str,
    pub kind: PersistenceErrorKind,
}

impl PersistenceError {
    pub fn new(context: &'static str, kind: PersistenceErrorKind) -> Self {
        Self { context, kind }
    }

    /// Wraps a SQLite failure, classifying constraint violations.
    pub fn from_sqlite(context: &'static str, err: rusqlite::Error) -> Self {
        let kind = match classify_constraint(&err) {
            Some(constraint) => PersistenceErrorKind::Constraint(constraint),
            None => PersistenceErrorKind::Db(DbError::Sqlite(err)),
        };
        Self { context, kind }
    }
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            PersistenceErrorKind::Constraint(constraint) => {
                write!(f, "{}: constraint `{constraint}` violated", self.context)
            }
            PersistenceErrorKind::MissingRow { table, id } => {
                write!(f, "{}: no row with id {id} in {table}", self.context)
            }
            PersistenceErrorKind::InvalidData(message) => {
                write!(f, "{}: invalid persisted data: {message}", self.context)
            }
            PersistenceErrorKind::Db(err) => write!(f, "{}: {err}", self.context),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            PersistenceErrorKind::Db(err) => Some(err),
            _ => None,
        }
    }
}

/// Error returned by repositories and the unit of work.
#[derive(Debug)]
pub enum RepoError {
    /// Caller input is unusable (blank names, unsaved ids, oversized fields).
    InvalidArgument(String),
    /// Domain layer rejected a write before it reached storage.
    ConstraintViolation(Constraint),
    /// Storage tier failed or rejected the operation.
    Persistence(PersistenceError),
    /// Transaction protocol misuse.
    InvalidState(&'static str),
}

impl RepoError {
    pub(crate) fn sqlite(context: &'static str, err: rusqlite::Error) -> Self {
        Self::Persistence(PersistenceError::from_sqlite(context, err))
    }

    pub(crate) fn invalid_data(context: &'static str, message: impl Into<String>) -> Self {
        Self::Persistence(PersistenceError::new(
            context,
            PersistenceErrorKind::InvalidData(message.into()),
        ))
    }

    /// Returns the violated consistency rule, whichever layer detected it.
    pub fn violated_constraint(&self) -> Option<Constraint> {
        match self {
            Self::ConstraintViolation(constraint) => Some(*constraint),
            Self::Persistence(PersistenceError {
                kind: PersistenceErrorKind::Constraint(constraint),
                ..
            }) => Some(*constraint),
            _ => None,
        }
    }

    /// Re-labels a storage failure with an outer operation context.
    pub(crate) fn with_context(self, context: &'static str) -> Self {
        match self {
            Self::Persistence(err) => Self::Persistence(PersistenceError {
                context,
                kind: err.kind,
            }),
            other => other,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::ConstraintViolation(constraint) => {
                write!(f, "constraint `{constraint}` violated")
            }
            Self::Persistence(err) => write!(f, "{err}"),
            Self::InvalidState(message) => write!(f, "invalid state: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            Self::InvalidArgument(_) => None,
            Self::ConstraintViolation(_) => None,
            Self::InvalidState(_) => None,
        }
    }
}

impl From<PersistenceError> for RepoError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

impl From<PersonValidationError> for RepoError {
    fn from(value: PersonValidationError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}

impl From<RelationshipValidationError> for RepoError {
    fn from(value: RelationshipValidationError) -> Self {
        match value {
            RelationshipValidationError::SelfReference(_) => {
                Self::ConstraintViolation(Constraint::SelfReference)
            }
            RelationshipValidationError::EndedBeforeFormed { .. } => {
                Self::ConstraintViolation(Constraint::ValidDates)
            }
            other => Self::InvalidArgument(other.to_string()),
        }
    }
}

fn classify_constraint(err: &rusqlite::Error) -> Option<Constraint> {
    let rusqlite::Error::SqliteFailure(failure, message) = err else {
        return None;
    };
    if failure.code != ErrorCode::ConstraintViolation {
        return None;
    }

    let message = message.as_deref().unwrap_or_default();
    let constraint = match failure.extended_code {
        rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Constraint::ForeignKey,
        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            if message.contains("Relationships.PrimaryPersonId") =>
        {
            Constraint::UniqueRelationship
        }
        rusqlite::ffi::SQLITE_CONSTRAINT_CHECK
            if message.contains("CK_Relationships_SelfReference") =>
        {
            Constraint::SelfReference
        }
        rusqlite::ffi::SQLITE_CONSTRAINT_CHECK
            if message.contains("CK_Relationships_ValidDates") =>
        {
            Constraint::ValidDates
        }
        _ => Constraint::FieldCheck,
    };
    Some(constraint)
}

#[cfg(test)]
mod tests {
    use super::{classify_constraint, Constraint, RepoError};
    use crate::model::relationship::RelationshipValidationError;
    use rusqlite::ffi;

    fn constraint_failure(extended_code: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(ffi::Error::new(extended_code), Some(message.to_string()))
    }

    #[test]
    fn classifies_named_check_constraints() {
        let err = constraint_failure(
            ffi::SQLITE_CONSTRAINT_CHECK,
            "CHECK constraint failed: CK_Relationships_SelfReference",
        );
        assert_eq!(classify_constraint(&err), Some(Constraint::SelfReference));

        let err = constraint_failure(
            ffi::SQLITE_CONSTRAINT_CHECK,
            "CHECK constraint failed: CK_Relationships_ValidDates",
        );
        assert_eq!(classify_constraint(&err), Some(Constraint::ValidDates));
    }

    #[test]
    fn classifies_unique_and_foreign_key_failures() {
        let err = constraint_failure(
            ffi::SQLITE_CONSTRAINT_UNIQUE,
            "UNIQUE constraint failed: Relationships.PrimaryPersonId, Relationships.RelatedPersonId, Relationships.RelationshipType",
        );
        assert_eq!(
            classify_constraint(&err),
            Some(Constraint::UniqueRelationship)
        );

        let err = constraint_failure(
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
            "FOREIGN KEY constraint failed",
        );
        assert_eq!(classify_constraint(&err), Some(Constraint::ForeignKey));
    }

    #[test]
    fn non_constraint_errors_are_not_classified() {
        assert_eq!(
            classify_constraint(&rusqlite::Error::QueryReturnedNoRows),
            None
        );
    }

    #[test]
    fn domain_rejections_map_to_constraints() {
        let err: RepoError = RelationshipValidationError::SelfReference(3).into();
        assert_eq!(err.violated_constraint(), Some(Constraint::SelfReference));

        let err: RepoError =
            RelationshipValidationError::UnsavedEndpoint("primary_person_id").into();
        assert!(matches!(err, RepoError::InvalidArgument(_)));
        assert_eq!(err.violated_constraint(), None);
    }
}
