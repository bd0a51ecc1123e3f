//! Generic repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and filter queries over one persisted domain model.
//! - Stage writes in the shared session; `save_changes` flushes them.
//!
//! # Invariants
//! - Write paths run `Entity::validate_for_write` before anything is staged.
//! - `add` requires an unsaved model; `update`/`remove` require a saved one.
//! - Read paths reject invalid persisted rows instead of masking them.

use crate::entity::Entity;
use crate::model::person::UNSAVED_ID;
use crate::query::sql::{translate, SqlFilter};
use crate::query::Predicate;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::session::Session;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::marker::PhantomData;
use std::rc::Rc;

/// CRUD and filter operations shared by every repository.
pub trait Repository<M: Entity> {
    fn get_by_id(&self, id: i64) -> RepoResult<Option<M>>;
    fn get_all(&self) -> RepoResult<Vec<M>>;
    fn find(&self, filter: &Predicate<M::Field>) -> RepoResult<Vec<M>>;
    fn first_or_default(&self, filter: &Predicate<M::Field>) -> RepoResult<Option<M>>;

    /// Stages an insert; nothing is written until `save_changes`.
    fn add(&self, model: &M) -> RepoResult<()>;
    /// Stages inserts for all models, or none if any model is invalid.
    fn add_range(&self, models: &[M]) -> RepoResult<()>;
    fn update(&self, model: &M) -> RepoResult<()>;
    fn remove(&self, model: &M) -> RepoResult<()>;
    fn remove_range(&self, models: &[M]) -> RepoResult<()>;

    fn exists(&self, filter: &Predicate<M::Field>) -> RepoResult<bool>;
    fn exists_by_id(&self, id: i64) -> RepoResult<bool>;
    fn count(&self) -> RepoResult<usize>;
    fn count_where(&self, filter: &Predicate<M::Field>) -> RepoResult<usize>;

    /// Flushes every staged write of the session and returns affected rows.
    fn save_changes(&self) -> RepoResult<usize>;
}

/// SQLite-backed repository for one model type.
///
/// Repositories created by the same unit of work share one session, so
/// `save_changes` on either flushes the writes staged through both.
pub struct SqliteRepository<M> {
    session: Rc<Session>,
    _model: PhantomData<M>,
}

impl<M: Entity> SqliteRepository<M> {
    pub(crate) fn new(session: Rc<Session>) -> Self {
        Self {
            session,
            _model: PhantomData,
        }
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn conn(&self) -> &Connection {
        self.session.conn()
    }

    /// Loads models matching a raw `WHERE` clause in the given order.
    pub(crate) fn load_where(
        &self,
        clause: &str,
        params: Vec<Value>,
        order_by: &str,
    ) -> RepoResult<Vec<M>> {
        let sql = format!("{} WHERE {clause} ORDER BY {order_by};", M::SELECT_SQL);
        load_models(self.conn(), &sql, params)
    }

    fn check_unsaved(model: &M) -> RepoResult<()> {
        if model.id() != UNSAVED_ID {
            return Err(RepoError::InvalidArgument(format!(
                "{} row to add must be unsaved, got id {}",
                M::TABLE,
                model.id()
            )));
        }
        Ok(())
    }

    fn check_saved(model: &M) -> RepoResult<()> {
        if model.id() <= UNSAVED_ID {
            return Err(RepoError::InvalidArgument(format!(
                "{} row must be saved before it can be changed",
                M::TABLE
            )));
        }
        Ok(())
    }

    fn filter_sql(filter: &Predicate<M::Field>) -> RepoResult<SqlFilter> {
        filter.check_kinds().map_err(RepoError::InvalidArgument)?;
        Ok(translate(filter))
    }

    fn scalar_count(&self, clause: &str, params: Vec<Value>) -> RepoResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {clause};", M::TABLE);
        let count: i64 = self
            .conn()
            .query_row(&sql, params_from_iter(params), |row| row.get(0))
            .map_err(|err| RepoError::sqlite("count rows", err))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

impl<M: Entity> Repository<M> for SqliteRepository<M> {
    fn get_by_id(&self, id: i64) -> RepoResult<Option<M>> {
        let mut found = self.load_where("Id = ?", vec![Value::Integer(id)], M::ORDER_BY)?;
        Ok(found.pop())
    }

    fn get_all(&self) -> RepoResult<Vec<M>> {
        self.load_where("1", Vec::new(), M::ORDER_BY)
    }

    fn find(&self, filter: &Predicate<M::Field>) -> RepoResult<Vec<M>> {
        let filter = Self::filter_sql(filter)?;
        self.load_where(&filter.clause, filter.params, M::ORDER_BY)
    }

    fn first_or_default(&self, filter: &Predicate<M::Field>) -> RepoResult<Option<M>> {
        let filter = Self::filter_sql(filter)?;
        let order_by = format!("{} LIMIT 1", M::ORDER_BY);
        let mut found = self.load_where(&filter.clause, filter.params, &order_by)?;
        Ok(found.pop())
    }

    fn add(&self, model: &M) -> RepoResult<()> {
        Self::check_unsaved(model)?;
        model.validate_for_write()?;
        self.session.stage_insert(model.clone());
        Ok(())
    }

    fn add_range(&self, models: &[M]) -> RepoResult<()> {
        for model in models {
            Self::check_unsaved(model)?;
            model.validate_for_write()?;
        }
        for model in models {
            self.session.stage_insert(model.clone());
        }
        Ok(())
    }

    fn update(&self, model: &M) -> RepoResult<()> {
        Self::check_saved(model)?;
        model.validate_for_write()?;
        self.session.stage_update(model.clone());
        Ok(())
    }

    fn remove(&self, model: &M) -> RepoResult<()> {
        Self::check_saved(model)?;
        self.session.stage_delete(model.clone());
        Ok(())
    }

    fn remove_range(&self, models: &[M]) -> RepoResult<()> {
        for model in models {
            Self::check_saved(model)?;
        }
        for model in models {
            self.session.stage_delete(model.clone());
        }
        Ok(())
    }

    fn exists(&self, filter: &Predicate<M::Field>) -> RepoResult<bool> {
        Ok(self.count_where(filter)? > 0)
    }

    fn exists_by_id(&self, id: i64) -> RepoResult<bool> {
        Ok(self.scalar_count("Id = ?", vec![Value::Integer(id)])? > 0)
    }

    fn count(&self) -> RepoResult<usize> {
        self.scalar_count("1", Vec::new())
    }

    fn count_where(&self, filter: &Predicate<M::Field>) -> RepoResult<usize> {
        let filter = Self::filter_sql(filter)?;
        self.scalar_count(&filter.clause, filter.params)
    }

    fn save_changes(&self) -> RepoResult<usize> {
        self.session.flush("save changes")
    }
}

/// Runs a full `SELECT` of model rows and maps every row.
pub(crate) fn load_models<T: Entity>(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
) -> RepoResult<Vec<T>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|err| RepoError::sqlite("prepare query", err))?;
    let mut rows = stmt
        .query(params_from_iter(params))
        .map_err(|err| RepoError::sqlite("run query", err))?;

    let mut models = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|err| RepoError::sqlite("read query row", err))?
    {
        models.push(T::from_row(row)?);
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::{Repository, SqliteRepository};
    use crate::db::open_db_in_memory;
    use crate::model::person::{Person, UNSAVED_ID};
    use crate::query::{PersonField, Predicate};
    use crate::repo::error::RepoError;
    use crate::repo::session::Session;
    use std::rc::Rc;

    fn repo() -> SqliteRepository<Person> {
        let conn = open_db_in_memory().unwrap();
        SqliteRepository::new(Rc::new(Session::new(conn)))
    }

    #[test]
    fn staged_inserts_are_invisible_until_saved() {
        let persons = repo();
        persons
            .add_range(&[Person::new("Anna", "Smith"), Person::new("Ben", "Smith")])
            .unwrap();
        assert_eq!(persons.count().unwrap(), 0);

        assert_eq!(persons.save_changes().unwrap(), 2);
        assert_eq!(persons.count().unwrap(), 2);
        assert_eq!(persons.save_changes().unwrap(), 0);
    }

    #[test]
    fn add_range_stages_nothing_when_one_model_is_invalid() {
        let persons = repo();
        let err = persons
            .add_range(&[Person::new("Anna", "Smith"), Person::new(" ", "Smith")])
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidArgument(_)));
        assert_eq!(persons.session().staged_count(), 0);
    }

    #[test]
    fn write_paths_check_persisted_state() {
        let persons = repo();
        let mut saved = Person::new("Anna", "Smith");
        saved.id = 5;
        assert!(matches!(
            persons.add(&saved),
            Err(RepoError::InvalidArgument(_))
        ));

        let unsaved = Person::new("Anna", "Smith");
        assert_eq!(unsaved.id, UNSAVED_ID);
        assert!(matches!(
            persons.update(&unsaved),
            Err(RepoError::InvalidArgument(_))
        ));
        assert!(matches!(
            persons.remove(&unsaved),
            Err(RepoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn filters_count_and_first_or_default() {
        let persons = repo();
        persons
            .add_range(&[
                Person::new("Anna", "Smith"),
                Person::new("Ben", "Smith"),
                Person::new("Carl", "Jones"),
            ])
            .unwrap();
        persons.save_changes().unwrap();

        let smiths = Predicate::eq(PersonField::LastName, "Smith");
        assert_eq!(persons.count_where(&smiths).unwrap(), 2);
        assert!(persons.exists(&smiths).unwrap());
        assert_eq!(
            persons.first_or_default(&smiths).unwrap().unwrap().first_name,
            "Anna"
        );
        assert!(persons
            .first_or_default(&Predicate::eq(PersonField::LastName, "Nobody"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn updating_a_missing_row_fails_and_clears_the_batch() {
        let persons = repo();
        let mut ghost = Person::new("Ghost", "Row");
        ghost.id = 404;
        persons.update(&ghost).unwrap();

        let err = persons.save_changes().unwrap_err();
        assert!(matches!(err, RepoError::Persistence(_)));
        assert_eq!(persons.session().staged_count(), 0);
        assert!(!persons.exists_by_id(404).unwrap());
    }

    #[test]
    fn repeated_writes_to_one_row_are_merged_before_saving() {
        let persons = repo();
        persons
            .add_range(&[Person::new("Anna", "Smith"), Person::new("Ben", "Smith")])
            .unwrap();
        persons.save_changes().unwrap();
        let anna = persons
            .first_or_default(&Predicate::eq(PersonField::FirstName, "Anna"))
            .unwrap()
            .unwrap();
        let mut ben = persons
            .first_or_default(&Predicate::eq(PersonField::FirstName, "Ben"))
            .unwrap()
            .unwrap();

        persons.remove_range(&[anna.clone(), anna.clone()]).unwrap();
        persons.add(&Person::new("Carl", "Jones")).unwrap();
        assert_eq!(persons.session().staged_count(), 2);
        assert_eq!(persons.save_changes().unwrap(), 2);
        assert!(!persons.exists_by_id(anna.id).unwrap());
        assert_eq!(persons.count().unwrap(), 2);

        ben.middle_name = Some("Lee".to_string());
        persons.update(&ben).unwrap();
        persons.remove(&ben).unwrap();
        assert_eq!(persons.session().staged_count(), 1);
        assert_eq!(persons.save_changes().unwrap(), 1);
        assert!(!persons.exists_by_id(ben.id).unwrap());
    }

    #[test]
    fn a_later_update_replaces_an_earlier_remove_of_the_same_row() {
        let persons = repo();
        persons.add(&Person::new("Anna", "Smith")).unwrap();
        persons.save_changes().unwrap();
        let mut anna = persons.get_all().unwrap().pop().unwrap();

        persons.remove(&anna).unwrap();
        anna.biography = Some("Moved abroad".to_string());
        persons.update(&anna).unwrap();
        assert_eq!(persons.session().staged_count(), 1);

        assert_eq!(persons.save_changes().unwrap(), 1);
        let stored = persons.get_by_id(anna.id).unwrap().unwrap();
        assert_eq!(stored.biography.as_deref(), Some("Moved abroad"));
    }
}
