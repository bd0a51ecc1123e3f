//! Relationship repository: edge lookups and guarded edge deletion.
//!
//! # Responsibility
//! - Query edges by endpoint, pair, type, activity and confirmation.
//! - Resolve the "other side" person of matching edges.
//! - Delete edges directly or through the orphan guard.
//!
//! # Invariants
//! - Pair queries ignore direction; `relationship_exists` does not.
//! - `safe_remove` never leaves a child with zero Parent edges.
//! - Removal operations commit immediately; everything else stages.

use crate::entity::{relationship_type_param, Entity};
use crate::model::person::{Person, PersonId};
use crate::model::relationship::{Relationship, RelationshipId, RelationshipType};
use crate::query::{Predicate, RelationshipField};
use crate::repo::base_repo::{load_models, Repository, SqliteRepository};
use crate::repo::error::{RepoError, RepoResult};
use log::info;
use rusqlite::types::Value;
use serde::Serialize;

const EDGE_ORDER: &str = "RelationshipType ASC, DateFormed ASC, Id ASC";

/// An edge with both endpoint persons loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipWithPersons {
    pub relationship: Relationship,
    pub primary_person: Person,
    pub related_person: Person,
}

/// Relationship-specific queries on top of the generic repository.
pub trait RelationshipRepository: Repository<Relationship> {
    /// Validates and inserts immediately; returns the edge with its id.
    fn create(&self, relationship: &Relationship) -> RepoResult<Relationship>;

    /// Edges where the person is either endpoint, by type then formed date.
    fn get_for_person(&self, person_id: PersonId) -> RepoResult<Vec<Relationship>>;
    /// Edges connecting the unordered pair, in either direction.
    fn get_between(&self, person_a: PersonId, person_b: PersonId) -> RepoResult<Vec<Relationship>>;
    /// Exact directed check on the (primary, related, type) triple.
    fn relationship_exists(
        &self,
        primary_person_id: PersonId,
        related_person_id: PersonId,
        relationship_type: RelationshipType,
    ) -> RepoResult<bool>;
    /// Any edge between the pair, ignoring type and direction.
    fn any_exists(&self, person_a: PersonId, person_b: PersonId) -> RepoResult<bool>;
    /// Other-side persons of matching edges; `None` means every type.
    fn get_related_persons(
        &self,
        person_id: PersonId,
        relationship_type: Option<RelationshipType>,
    ) -> RepoResult<Vec<Person>>;

    fn get_by_type(&self, relationship_type: RelationshipType) -> RepoResult<Vec<Relationship>>;
    fn get_active(&self) -> RepoResult<Vec<Relationship>>;
    fn get_confirmed(&self) -> RepoResult<Vec<Relationship>>;
    fn get_by_type_for_person(
        &self,
        person_id: PersonId,
        relationship_type: RelationshipType,
    ) -> RepoResult<Vec<Relationship>>;
    fn get_with_persons(&self, id: RelationshipId)
        -> RepoResult<Option<RelationshipWithPersons>>;

    /// Deletes and commits the exact edge; `false` when it does not exist.
    fn remove_relationship(
        &self,
        primary_person_id: PersonId,
        related_person_id: PersonId,
        relationship_type: RelationshipType,
    ) -> RepoResult<bool>;

    /// Deletes and commits unless the edge is the child's last Parent edge.
    fn safe_remove(&self, id: RelationshipId) -> RepoResult<bool>;
}

pub type SqliteRelationshipRepository = SqliteRepository<Relationship>;

impl SqliteRepository<Relationship> {
    fn load_persons(&self, clause: &str, params: Vec<Value>) -> RepoResult<Vec<Person>> {
        let sql = format!(
            "{} WHERE {clause} ORDER BY LastName ASC, FirstName ASC, Id ASC;",
            Person::SELECT_SQL
        );
        load_models(self.conn(), &sql, params)
    }

    fn find_triple(
        &self,
        primary_person_id: PersonId,
        related_person_id: PersonId,
        relationship_type: RelationshipType,
    ) -> RepoResult<Option<Relationship>> {
        let mut found = self.load_where(
            "PrimaryPersonId = ?1 AND RelatedPersonId = ?2 AND RelationshipType = ?3",
            vec![
                Value::Integer(primary_person_id),
                Value::Integer(related_person_id),
                relationship_type_param(relationship_type),
            ],
            "Id ASC LIMIT 1",
        )?;
        Ok(found.pop())
    }

    fn child_has_other_parent(&self, edge: &Relationship) -> RepoResult<bool> {
        self.conn()
            .query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM Relationships
                    WHERE RelatedPersonId = ?1 AND RelationshipType = ?2 AND Id != ?3
                 );",
                rusqlite::params_from_iter([
                    Value::Integer(edge.related_person_id),
                    relationship_type_param(RelationshipType::Parent),
                    Value::Integer(edge.id),
                ]),
                |row| row.get::<_, i64>(0),
            )
            .map(|found| found == 1)
            .map_err(|err| RepoError::sqlite("check remaining parents", err))
    }

    fn delete_now(&self, edge: &Relationship, context: &'static str) -> RepoResult<usize> {
        self.remove(edge)?;
        self.session().flush(context)
    }
}

impl RelationshipRepository for SqliteRepository<Relationship> {
    fn create(&self, relationship: &Relationship) -> RepoResult<Relationship> {
        if relationship.is_persisted() {
            return Err(RepoError::InvalidArgument(format!(
                "relationship to create must be unsaved, got id {}",
                relationship.id
            )));
        }
        relationship.validate_for_write()?;

        let id = self.session().run_atomic("create relationship", || {
            relationship
                .insert(self.conn())
                .map_err(|err| RepoError::sqlite("create relationship", err))
        })?;

        let mut created = relationship.clone();
        created.id = id;
        Ok(created)
    }

    fn get_for_person(&self, person_id: PersonId) -> RepoResult<Vec<Relationship>> {
        self.load_where(
            "PrimaryPersonId = ?1 OR RelatedPersonId = ?1",
            vec![Value::Integer(person_id)],
            EDGE_ORDER,
        )
    }

    fn get_between(&self, person_a: PersonId, person_b: PersonId) -> RepoResult<Vec<Relationship>> {
        self.load_where(
            "(PrimaryPersonId = ?1 AND RelatedPersonId = ?2)
             OR (PrimaryPersonId = ?2 AND RelatedPersonId = ?1)",
            vec![Value::Integer(person_a), Value::Integer(person_b)],
            EDGE_ORDER,
        )
    }

    fn relationship_exists(
        &self,
        primary_person_id: PersonId,
        related_person_id: PersonId,
        relationship_type: RelationshipType,
    ) -> RepoResult<bool> {
        self.exists(
            &Predicate::eq(RelationshipField::PrimaryPersonId, primary_person_id)
                .and(Predicate::eq(
                    RelationshipField::RelatedPersonId,
                    related_person_id,
                ))
                .and(Predicate::eq(
                    RelationshipField::RelationshipType,
                    relationship_type,
                )),
        )
    }

    fn any_exists(&self, person_a: PersonId, person_b: PersonId) -> RepoResult<bool> {
        let forward = Predicate::eq(RelationshipField::PrimaryPersonId, person_a)
            .and(Predicate::eq(RelationshipField::RelatedPersonId, person_b));
        let backward = Predicate::eq(RelationshipField::PrimaryPersonId, person_b)
            .and(Predicate::eq(RelationshipField::RelatedPersonId, person_a));
        self.exists(&forward.or(backward))
    }

    fn get_related_persons(
        &self,
        person_id: PersonId,
        relationship_type: Option<RelationshipType>,
    ) -> RepoResult<Vec<Person>> {
        let mut params = vec![Value::Integer(person_id)];
        let type_filter = match relationship_type {
            Some(kind) => {
                params.push(relationship_type_param(kind));
                "AND RelationshipType = ?2"
            }
            None => "",
        };
        let clause = format!(
            "Id IN (
                SELECT CASE WHEN PrimaryPersonId = ?1 THEN RelatedPersonId ELSE PrimaryPersonId END
                FROM Relationships
                WHERE (PrimaryPersonId = ?1 OR RelatedPersonId = ?1) {type_filter}
             )"
        );
        self.load_persons(&clause, params)
    }

    fn get_by_type(&self, relationship_type: RelationshipType) -> RepoResult<Vec<Relationship>> {
        self.find(&Predicate::eq(
            RelationshipField::RelationshipType,
            relationship_type,
        ))
    }

    fn get_active(&self) -> RepoResult<Vec<Relationship>> {
        self.find(&Predicate::eq(RelationshipField::IsActive, true))
    }

    fn get_confirmed(&self) -> RepoResult<Vec<Relationship>> {
        self.find(&Predicate::eq(RelationshipField::IsConfirmed, true))
    }

    fn get_by_type_for_person(
        &self,
        person_id: PersonId,
        relationship_type: RelationshipType,
    ) -> RepoResult<Vec<Relationship>> {
        self.load_where(
            "(PrimaryPersonId = ?1 OR RelatedPersonId = ?1) AND RelationshipType = ?2",
            vec![Value::Integer(person_id), relationship_type_param(relationship_type)],
            EDGE_ORDER,
        )
    }

    fn get_with_persons(
        &self,
        id: RelationshipId,
    ) -> RepoResult<Option<RelationshipWithPersons>> {
        let Some(relationship) = self.get_by_id(id)? else {
            return Ok(None);
        };
        let mut endpoints = self.load_persons(
            "Id IN (?1, ?2)",
            vec![
                Value::Integer(relationship.primary_person_id),
                Value::Integer(relationship.related_person_id),
            ],
        )?;

        let take = |endpoints: &mut Vec<Person>, person_id: PersonId| {
            endpoints
                .iter()
                .position(|person| person.id == person_id)
                .map(|index| endpoints.swap_remove(index))
                .ok_or_else(|| {
                    RepoError::invalid_data(
                        "load relationship endpoints",
                        format!("relationship {id} references missing person {person_id}"),
                    )
                })
        };
        let primary_person = take(&mut endpoints, relationship.primary_person_id)?;
        let related_person = take(&mut endpoints, relationship.related_person_id)?;

        Ok(Some(RelationshipWithPersons {
            relationship,
            primary_person,
            related_person,
        }))
    }

    fn remove_relationship(
        &self,
        primary_person_id: PersonId,
        related_person_id: PersonId,
        relationship_type: RelationshipType,
    ) -> RepoResult<bool> {
        let Some(edge) =
            self.find_triple(primary_person_id, related_person_id, relationship_type)?
        else {
            info!(
                "event=relationship_remove module=repo status=refused primary_id={} related_id={} reason=missing",
                primary_person_id, related_person_id
            );
            return Ok(false);
        };

        let affected = self.delete_now(&edge, "remove relationship")?;
        info!(
            "event=relationship_remove module=repo status=ok relationship_id={} affected={}",
            edge.id, affected
        );
        Ok(true)
    }

    fn safe_remove(&self, id: RelationshipId) -> RepoResult<bool> {
        let Some(edge) = self.get_by_id(id)? else {
            info!(
                "event=relationship_safe_remove module=repo status=refused relationship_id={} reason=missing",
                id
            );
            return Ok(false);
        };

        // Child edges are not checked; only Parent edges can orphan a child.
        if edge.relationship_type == RelationshipType::Parent && !self.child_has_other_parent(&edge)? {
            info!(
                "event=relationship_safe_remove module=repo status=refused relationship_id={} child_id={} reason=last_parent",
                id, edge.related_person_id
            );
            return Ok(false);
        }

        let affected = self.delete_now(&edge, "safe remove relationship")?;
        info!(
            "event=relationship_safe_remove module=repo status=ok relationship_id={} affected={}",
            id, affected
        );
        Ok(true)
    }
}
