//! Person repository: lookups and kinship derivations over the edge list.
//!
//! # Responsibility
//! - Name/attribute lookups and paging over `Persons`.
//! - Derive parents, children, spouses and siblings from `Relationships`.
//! - Guarded deletion that refuses while any edge references the person.
//!
//! # Invariants
//! - Derivations are read-only and return each person at most once.
//! - Blank search input yields an empty result, never "everyone".
//! - `safe_remove` and `create` are the only operations that write
//!   immediately; everything else stages.

use crate::entity::{relationship_type_param, Entity};
use crate::model::person::{Gender, Person, PersonId};
use crate::model::relationship::{Relationship, RelationshipType};
use crate::query::{PersonField, Predicate};
use crate::repo::base_repo::{load_models, Repository, SqliteRepository};
use crate::repo::error::{RepoError, RepoResult};
use log::info;
use rusqlite::types::Value;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

const NAME_ORDER: &str = "LastName ASC, FirstName ASC, Id ASC";
const DEFAULT_PAGE_SIZE: i64 = 10;

/// A person together with every edge touching it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonWithRelationships {
    pub person: Person,
    /// Edges where the person is the primary endpoint.
    pub as_primary: Vec<Relationship>,
    /// Edges where the person is the related endpoint.
    pub as_related: Vec<Relationship>,
}

impl PersonWithRelationships {
    /// Iterates both edge lists.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.as_primary.iter().chain(self.as_related.iter())
    }
}

/// Person-specific queries on top of the generic repository.
pub trait PersonRepository: Repository<Person> {
    /// Validates and inserts immediately; returns the person with its id.
    fn create(&self, person: &Person) -> RepoResult<Person>;

    /// Case-sensitive substring match on first, last or middle name.
    fn search_by_name(&self, term: &str) -> RepoResult<Vec<Person>>;
    fn get_alive(&self) -> RepoResult<Vec<Person>>;
    fn get_by_last_name(&self, last_name: &str) -> RepoResult<Vec<Person>>;
    fn get_by_full_name(&self, first_name: &str, last_name: &str) -> RepoResult<Vec<Person>>;
    fn get_by_birth_year(&self, year: i32) -> RepoResult<Vec<Person>>;
    fn get_by_gender(&self, gender: Gender) -> RepoResult<Vec<Person>>;

    fn get_parents(&self, person_id: PersonId) -> RepoResult<Vec<Person>>;
    fn get_children(&self, person_id: PersonId) -> RepoResult<Vec<Person>>;
    fn get_spouses(&self, person_id: PersonId) -> RepoResult<Vec<Person>>;
    fn get_siblings(&self, person_id: PersonId) -> RepoResult<Vec<Person>>;

    fn get_person_with_relationships(
        &self,
        person_id: PersonId,
    ) -> RepoResult<Option<PersonWithRelationships>>;
    fn get_all_with_relationships(&self) -> RepoResult<Vec<PersonWithRelationships>>;

    /// One page ordered by last then first name. Pages start at 1.
    fn get_paged(&self, page: i64, page_size: i64) -> RepoResult<Vec<Person>>;

    /// Deletes and commits unless any edge references the person.
    ///
    /// Returns `false` when the person is missing or still referenced.
    fn safe_remove(&self, person_id: PersonId) -> RepoResult<bool>;
}

pub type SqlitePersonRepository = SqliteRepository<Person>;

impl SqliteRepository<Person> {
    fn load_edges(&self, clause: &str, params: Vec<Value>) -> RepoResult<Vec<Relationship>> {
        let sql = format!(
            "{} WHERE {clause} ORDER BY RelationshipType ASC, DateFormed ASC, Id ASC;",
            Relationship::SELECT_SQL
        );
        load_models(self.conn(), &sql, params)
    }

    fn has_any_edge(&self, person_id: PersonId) -> RepoResult<bool> {
        self.conn()
            .query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM Relationships
                    WHERE PrimaryPersonId = ?1 OR RelatedPersonId = ?1
                 );",
                [person_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|found| found == 1)
            .map_err(|err| RepoError::sqlite("check person references", err))
    }
}

impl PersonRepository for SqliteRepository<Person> {
    fn create(&self, person: &Person) -> RepoResult<Person> {
        if person.is_persisted() {
            return Err(RepoError::InvalidArgument(format!(
                "person to create must be unsaved, got id {}",
                person.id
            )));
        }
        person.validate_for_write()?;

        let id = self.session().run_atomic("create person", || {
            person
                .insert(self.conn())
                .map_err(|err| RepoError::sqlite("create person", err))
        })?;

        let mut created = person.clone();
        created.id = id;
        Ok(created)
    }

    fn search_by_name(&self, term: &str) -> RepoResult<Vec<Person>> {
        if term.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.find(
            &Predicate::contains(PersonField::FirstName, term)
                .or(Predicate::contains(PersonField::LastName, term))
                .or(Predicate::contains(PersonField::MiddleName, term)),
        )
    }

    fn get_alive(&self) -> RepoResult<Vec<Person>> {
        self.find(&Predicate::eq(PersonField::IsAlive, true))
    }

    fn get_by_last_name(&self, last_name: &str) -> RepoResult<Vec<Person>> {
        if last_name.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.find(&Predicate::eq(PersonField::LastName, last_name))
    }

    fn get_by_full_name(&self, first_name: &str, last_name: &str) -> RepoResult<Vec<Person>> {
        if first_name.trim().is_empty() || last_name.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.find(
            &Predicate::eq(PersonField::FirstName, first_name)
                .and(Predicate::eq(PersonField::LastName, last_name)),
        )
    }

    fn get_by_birth_year(&self, year: i32) -> RepoResult<Vec<Person>> {
        self.find(&Predicate::eq(PersonField::BirthYear, year))
    }

    fn get_by_gender(&self, gender: Gender) -> RepoResult<Vec<Person>> {
        self.find(&Predicate::eq(PersonField::Gender, gender))
    }

    fn get_parents(&self, person_id: PersonId) -> RepoResult<Vec<Person>> {
        self.load_where(
            "Id IN (
                SELECT PrimaryPersonId FROM Relationships
                WHERE RelatedPersonId = ?1 AND RelationshipType = ?2
             )",
            vec![
                Value::Integer(person_id),
                relationship_type_param(RelationshipType::Parent),
            ],
            NAME_ORDER,
        )
    }

    // A parent's children are recorded either as Parent edges from the parent
    // or as Child edges stored with the parent as primary.
    fn get_children(&self, person_id: PersonId) -> RepoResult<Vec<Person>> {
        self.load_where(
            "Id IN (
                SELECT RelatedPersonId FROM Relationships
                WHERE PrimaryPersonId = ?1 AND RelationshipType IN (?2, ?3)
             )",
            vec![
                Value::Integer(person_id),
                relationship_type_param(RelationshipType::Parent),
                relationship_type_param(RelationshipType::Child),
            ],
            NAME_ORDER,
        )
    }

    fn get_spouses(&self, person_id: PersonId) -> RepoResult<Vec<Person>> {
        let mut params = vec![Value::Integer(person_id)];
        params.extend(
            RelationshipType::ALL
                .iter()
                .copied()
                .filter(|kind| kind.is_spousal())
                .map(relationship_type_param),
        );
        let placeholders = (2..=params.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let clause = format!(
            "Id IN (
                SELECT CASE WHEN PrimaryPersonId = ?1 THEN RelatedPersonId ELSE PrimaryPersonId END
                FROM Relationships
                WHERE (PrimaryPersonId = ?1 OR RelatedPersonId = ?1)
                  AND RelationshipType IN ({placeholders})
             )"
        );
        self.load_where(&clause, params, NAME_ORDER)
    }

    fn get_siblings(&self, person_id: PersonId) -> RepoResult<Vec<Person>> {
        let parents = self.get_parents(person_id)?;
        if parents.is_empty() {
            return Ok(Vec::new());
        }

        let mut children_per_parent = Vec::with_capacity(parents.len());
        for parent in &parents {
            children_per_parent.push(self.get_children(parent.id)?);
        }

        let mut seen = HashSet::new();
        let mut siblings: Vec<Person> = children_per_parent
            .into_iter()
            .flatten()
            .filter(|child| child.id != person_id && seen.insert(child.id))
            .collect();
        siblings.sort_by(|left, right| {
            (&left.last_name, &left.first_name, left.id)
                .cmp(&(&right.last_name, &right.first_name, right.id))
        });
        Ok(siblings)
    }

    fn get_person_with_relationships(
        &self,
        person_id: PersonId,
    ) -> RepoResult<Option<PersonWithRelationships>> {
        let Some(person) = self.get_by_id(person_id)? else {
            return Ok(None);
        };
        let as_primary = self.load_edges("PrimaryPersonId = ?1", vec![Value::Integer(person_id)])?;
        let as_related = self.load_edges("RelatedPersonId = ?1", vec![Value::Integer(person_id)])?;
        Ok(Some(PersonWithRelationships {
            person,
            as_primary,
            as_related,
        }))
    }

    fn get_all_with_relationships(&self) -> RepoResult<Vec<PersonWithRelationships>> {
        let persons = self.load_where("1", Vec::new(), NAME_ORDER)?;
        let edges = self.load_edges("1", Vec::new())?;

        let mut as_primary: HashMap<PersonId, Vec<Relationship>> = HashMap::new();
        let mut as_related: HashMap<PersonId, Vec<Relationship>> = HashMap::new();
        for edge in edges {
            as_related
                .entry(edge.related_person_id)
                .or_default()
                .push(edge.clone());
            as_primary
                .entry(edge.primary_person_id)
                .or_default()
                .push(edge);
        }

        Ok(persons
            .into_iter()
            .map(|person| PersonWithRelationships {
                as_primary: as_primary.remove(&person.id).unwrap_or_default(),
                as_related: as_related.remove(&person.id).unwrap_or_default(),
                person,
            })
            .collect())
    }

    fn get_paged(&self, page: i64, page_size: i64) -> RepoResult<Vec<Person>> {
        let page = page.max(1);
        let page_size = if page_size < 1 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        let order_by = format!("{NAME_ORDER} LIMIT ?1 OFFSET ?2");
        self.load_where(
            "1",
            vec![
                Value::Integer(page_size),
                Value::Integer((page - 1).saturating_mul(page_size)),
            ],
            &order_by,
        )
    }

    fn safe_remove(&self, person_id: PersonId) -> RepoResult<bool> {
        let Some(person) = self.get_by_id(person_id)? else {
            info!(
                "event=person_safe_remove module=repo status=refused person_id={} reason=missing",
                person_id
            );
            return Ok(false);
        };

        if self.has_any_edge(person_id)? {
            info!(
                "event=person_safe_remove module=repo status=refused person_id={} reason=referenced",
                person_id
            );
            return Ok(false);
        }

        self.remove(&person)?;
        let affected = self.session().flush("safe remove person")?;
        info!(
            "event=person_safe_remove module=repo status=ok person_id={} affected={}",
            person_id, affected
        );
        Ok(true)
    }
}
