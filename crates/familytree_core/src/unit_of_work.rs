//! Unit of work: repository acquisition and transaction boundaries.
//!
//! # Responsibility
//! - Hand out memoized person/relationship repositories over one session.
//! - Flush staged writes from both repositories as one storage operation.
//! - Control the single explicit transaction slot.
//!
//! # Invariants
//! - One instance is one conversation with storage; it is `!Send`/`!Sync`.
//! - A failed commit rolls back and releases the slot before returning.
//! - Dropping an instance with an open transaction rolls it back.

use crate::db::{open_db, open_db_in_memory, DbError};
use crate::repo::error::RepoResult;
use crate::repo::person_repo::SqlitePersonRepository;
use crate::repo::relationship_repo::SqliteRelationshipRepository;
use crate::repo::session::Session;
use log::{debug, error, info};
use once_cell::unsync::OnceCell;
use rusqlite::Connection;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

/// Transaction boundary over the person and relationship repositories.
pub trait UnitOfWork {
    type Persons: crate::repo::person_repo::PersonRepository;
    type Relationships: crate::repo::relationship_repo::RelationshipRepository;

    fn persons(&self) -> &Self::Persons;
    fn relationships(&self) -> &Self::Relationships;

    /// Flushes every staged write and returns affected rows.
    fn complete(&self) -> RepoResult<usize>;

    /// Fails with `InvalidState` while another transaction is open.
    fn begin_transaction(&self) -> RepoResult<()>;
    /// Flushes and commits; rolls back on failure. Returns flushed rows.
    fn commit_transaction(&self) -> RepoResult<usize>;
    /// Discards staged writes and rolls back.
    fn rollback_transaction(&self) -> RepoResult<()>;
}

/// SQLite-backed unit of work.
pub struct SqliteUnitOfWork {
    session: Rc<Session>,
    persons: OnceCell<SqlitePersonRepository>,
    relationships: OnceCell<SqliteRelationshipRepository>,
}

impl SqliteUnitOfWork {
    /// Wraps a connection already prepared by `open_db`/`open_db_in_memory`.
    pub fn new(conn: Connection) -> Self {
        let session = Rc::new(Session::new(conn));
        debug!(
            "event=uow_open module=unit_of_work status=ok session={}",
            session.id()
        );
        Self {
            session,
            persons: OnceCell::new(),
            relationships: OnceCell::new(),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Session id attached to this instance's log events.
    pub fn session_id(&self) -> uuid::Uuid {
        self.session.id()
    }

    /// Number of writes staged and not yet flushed.
    pub fn pending_changes(&self) -> usize {
        self.session.staged_count()
    }

    pub fn in_transaction(&self) -> bool {
        self.session.transaction_open()
    }
}

impl UnitOfWork for SqliteUnitOfWork {
    type Persons = SqlitePersonRepository;
    type Relationships = SqliteRelationshipRepository;

    fn persons(&self) -> &SqlitePersonRepository {
        self.persons
            .get_or_init(|| SqlitePersonRepository::new(Rc::clone(&self.session)))
    }

    fn relationships(&self) -> &SqliteRelationshipRepository {
        self.relationships
            .get_or_init(|| SqliteRelationshipRepository::new(Rc::clone(&self.session)))
    }

    fn complete(&self) -> RepoResult<usize> {
        let started_at = Instant::now();
        let staged = self.session.staged_count();
        match self.session.flush("failed while saving changes") {
            Ok(affected) => {
                info!(
                    "event=uow_complete module=unit_of_work status=ok session={} staged={} affected={} duration_ms={}",
                    self.session.id(),
                    staged,
                    affected,
                    started_at.elapsed().as_millis()
                );
                Ok(affected)
            }
            Err(err) => {
                error!(
                    "event=uow_complete module=unit_of_work status=error session={} staged={} error={}",
                    self.session.id(),
                    staged,
                    err
                );
                Err(err)
            }
        }
    }

    fn begin_transaction(&self) -> RepoResult<()> {
        self.session.begin_transaction()?;
        info!(
            "event=uow_begin module=unit_of_work status=ok session={}",
            self.session.id()
        );
        Ok(())
    }

    fn commit_transaction(&self) -> RepoResult<usize> {
        let started_at = Instant::now();
        match self.session.commit_transaction() {
            Ok(affected) => {
                info!(
                    "event=uow_commit module=unit_of_work status=ok session={} affected={} duration_ms={}",
                    self.session.id(),
                    affected,
                    started_at.elapsed().as_millis()
                );
                Ok(affected)
            }
            Err(err) => {
                error!(
                    "event=uow_commit module=unit_of_work status=error session={} error={}",
                    self.session.id(),
                    err
                );
                Err(err)
            }
        }
    }

    fn rollback_transaction(&self) -> RepoResult<()> {
        self.session.rollback_transaction()?;
        info!(
            "event=uow_rollback module=unit_of_work status=ok session={}",
            self.session.id()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{SqliteUnitOfWork, UnitOfWork};
    use crate::model::person::Person;
    use crate::repo::base_repo::Repository;
    use crate::repo::error::RepoError;

    #[test]
    fn repositories_are_memoized() {
        let uow = SqliteUnitOfWork::open_in_memory().unwrap();
        assert!(std::ptr::eq(uow.persons(), uow.persons()));
        assert!(std::ptr::eq(uow.relationships(), uow.relationships()));
    }

    #[test]
    fn transaction_protocol_misuse_is_invalid_state() {
        let uow = SqliteUnitOfWork::open_in_memory().unwrap();
        assert!(matches!(
            uow.commit_transaction(),
            Err(RepoError::InvalidState(_))
        ));
        assert!(matches!(
            uow.rollback_transaction(),
            Err(RepoError::InvalidState(_))
        ));

        uow.begin_transaction().unwrap();
        assert!(matches!(
            uow.begin_transaction(),
            Err(RepoError::InvalidState(_))
        ));
        uow.rollback_transaction().unwrap();
        assert!(!uow.in_transaction());
    }

    #[test]
    fn rollback_discards_staged_writes() {
        let uow = SqliteUnitOfWork::open_in_memory().unwrap();
        uow.begin_transaction().unwrap();
        uow.persons().add(&Person::new("Anna", "Smith")).unwrap();
        assert_eq!(uow.pending_changes(), 1);

        uow.rollback_transaction().unwrap();
        assert_eq!(uow.pending_changes(), 0);
        assert_eq!(uow.complete().unwrap(), 0);
        assert_eq!(uow.persons().count().unwrap(), 0);
    }
}
