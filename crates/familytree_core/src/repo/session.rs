//! Storage session shared by one unit of work and its repositories.
//!
//! # Responsibility
//! - Own the SQLite connection for one logical conversation with storage.
//! - Hold staged writes until they are flushed as one atomic batch.
//! - Track the single explicit transaction slot.
//!
//! # Invariants
//! - A flush either applies every staged write or none of them
//!   (savepoint-wrapped, also inside an explicit transaction).
//! - A failed batch is discarded; later flushes start from an empty stage.
//! - At most one update or delete is staged per saved row; a later one
//!   replaces the earlier in place.
//! - At most one explicit transaction is open; dropping the session while
//!   one is open rolls it back.

use crate::entity::Entity;
use crate::repo::error::{PersistenceError, PersistenceErrorKind, RepoError, RepoResult};
use log::{debug, error, warn};
use rusqlite::Connection;
use std::cell::{Cell, RefCell};
use uuid::Uuid;

const FLUSH_SAVEPOINT: &str = "familytree_flush";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOp {
    Insert,
    Update,
    Delete,
}

/// One staged mutation, type-erased so both repositories share one queue.
trait StagedWrite {
    /// `(table, id)` of the saved row this write targets; `None` for inserts.
    fn row_key(&self) -> Option<(&'static str, i64)>;

    fn apply(&self, conn: &Connection) -> RepoResult<usize>;
}

struct Staged<M: Entity> {
    op: WriteOp,
    model: M,
}

impl<M: Entity> StagedWrite for Staged<M> {
    fn row_key(&self) -> Option<(&'static str, i64)> {
        match self.op {
            WriteOp::Insert => None,
            WriteOp::Update | WriteOp::Delete => Some((M::TABLE, self.model.id())),
        }
    }

    fn apply(&self, conn: &Connection) -> RepoResult<usize> {
        let context = match self.op {
            WriteOp::Insert => "insert staged row",
            WriteOp::Update => "update staged row",
            WriteOp::Delete => "delete staged row",
        };
        let changed = match self.op {
            WriteOp::Insert => self.model.insert(conn).map(|_| 1),
            WriteOp::Update => self.model.update(conn),
            WriteOp::Delete => conn.execute(
                &format!("DELETE FROM {} WHERE Id = ?1;", M::TABLE),
                [self.model.id()],
            ),
        }
        .map_err(|err| RepoError::sqlite(context, err))?;

        if changed == 0 {
            return Err(RepoError::Persistence(PersistenceError::new(
                context,
                PersistenceErrorKind::MissingRow {
                    table: M::TABLE,
                    id: self.model.id(),
                },
            )));
        }
        Ok(changed)
    }
}

pub(crate) struct Session {
    id: Uuid,
    conn: Connection,
    staged: RefCell<Vec<Box<dyn StagedWrite>>>,
    transaction_open: Cell<bool>,
}

impl Session {
    pub(crate) fn new(conn: Connection) -> Self {
        Self {
            id: Uuid::new_v4(),
            conn,
            staged: RefCell::new(Vec::new()),
            transaction_open: Cell::new(false),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn stage_insert<M: Entity>(&self, model: M) {
        self.stage(WriteOp::Insert, model);
    }

    pub(crate) fn stage_update<M: Entity>(&self, model: M) {
        self.stage(WriteOp::Update, model);
    }

    pub(crate) fn stage_delete<M: Entity>(&self, model: M) {
        self.stage(WriteOp::Delete, model);
    }

    fn stage<M: Entity>(&self, op: WriteOp, model: M) {
        let write: Box<dyn StagedWrite> = Box::new(Staged { op, model });
        let mut staged = self.staged.borrow_mut();
        let earlier = write.row_key().and_then(|key| {
            staged
                .iter()
                .position(|other| other.row_key() == Some(key))
                .map(|index| (index, key))
        });
        match earlier {
            Some((index, (table, id))) => {
                debug!(
                    "event=stage_merge module=session status=ok session={} op={:?} table={} id={}",
                    self.id, op, table, id
                );
                staged[index] = write;
            }
            None => staged.push(write),
        }
    }

    pub(crate) fn staged_count(&self) -> usize {
        self.staged.borrow().len()
    }

    pub(crate) fn discard_staged(&self) {
        self.staged.borrow_mut().clear();
    }

    /// Applies all staged writes as one batch and returns affected rows.
    ///
    /// Outside an explicit transaction the batch is auto-committed.
    pub(crate) fn flush(&self, context: &'static str) -> RepoResult<usize> {
        let staged = std::mem::take(&mut *self.staged.borrow_mut());
        if staged.is_empty() {
            return Ok(0);
        }

        self.run_atomic(context, || {
            let mut affected = 0;
            for write in &staged {
                affected += write.apply(&self.conn)?;
            }
            Ok(affected)
        })
        .map_err(|err| err.with_context(context))
    }

    /// Runs `body` inside a savepoint: released on success, rolled back on error.
    pub(crate) fn run_atomic<T>(
        &self,
        context: &'static str,
        body: impl FnOnce() -> RepoResult<T>,
    ) -> RepoResult<T> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {FLUSH_SAVEPOINT};"))
            .map_err(|err| RepoError::sqlite(context, err))?;

        match body() {
            Ok(value) => {
                self.conn
                    .execute_batch(&format!("RELEASE SAVEPOINT {FLUSH_SAVEPOINT};"))
                    .map_err(|err| RepoError::sqlite(context, err))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.conn.execute_batch(&format!(
                    "ROLLBACK TO SAVEPOINT {FLUSH_SAVEPOINT}; RELEASE SAVEPOINT {FLUSH_SAVEPOINT};"
                )) {
                    error!(
                        "event=flush_rollback module=session status=error session={} error={}",
                        self.id, rollback_err
                    );
                }
                Err(err)
            }
        }
    }

    pub(crate) fn transaction_open(&self) -> bool {
        self.transaction_open.get()
    }

    pub(crate) fn begin_transaction(&self) -> RepoResult<()> {
        if self.transaction_open.get() {
            return Err(RepoError::InvalidState("a transaction is already open"));
        }
        self.conn
            .execute_batch("BEGIN IMMEDIATE;")
            .map_err(|err| RepoError::sqlite("begin transaction", err))?;
        self.transaction_open.set(true);
        Ok(())
    }

    /// Flushes staged writes and commits; rolls back on any failure.
    ///
    /// The transaction slot is released whatever the outcome.
    pub(crate) fn commit_transaction(&self) -> RepoResult<usize> {
        if !self.transaction_open.get() {
            return Err(RepoError::InvalidState("no open transaction to commit"));
        }

        let result = self.flush("commit transaction").and_then(|affected| {
            self.conn
                .execute_batch("COMMIT;")
                .map(|()| affected)
                .map_err(|err| RepoError::sqlite("commit transaction", err))
        });

        if result.is_err() {
            self.rollback_quietly("commit_failed");
        }
        self.transaction_open.set(false);
        result
    }

    pub(crate) fn rollback_transaction(&self) -> RepoResult<()> {
        if !self.transaction_open.get() {
            return Err(RepoError::InvalidState("no open transaction to roll back"));
        }
        self.discard_staged();
        let result = self
            .conn
            .execute_batch("ROLLBACK;")
            .map_err(|err| RepoError::sqlite("rollback transaction", err));
        self.transaction_open.set(false);
        result
    }

    fn rollback_quietly(&self, reason: &'static str) {
        self.discard_staged();
        if self.conn.is_autocommit() {
            return;
        }
        match self.conn.execute_batch("ROLLBACK;") {
            Ok(()) => debug!(
                "event=uow_rollback module=session status=ok session={} reason={}",
                self.id, reason
            ),
            Err(err) => error!(
                "event=uow_rollback module=session status=error session={} reason={} error={}",
                self.id, reason, err
            ),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.transaction_open.get() {
            warn!(
                "event=uow_dispose_rollback module=session status=ok session={} staged={}",
                self.id,
                self.staged.borrow().len()
            );
            self.rollback_quietly("dispose");
            self.transaction_open.set(false);
        }
    }
}
