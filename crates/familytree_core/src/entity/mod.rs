//! Storage entity layer.
//!
//! # Responsibility
//! - Define row-shaped entities (enums as raw integers, audit columns) and
//!   their translation to/from domain models.
//! - Own the explicit enum↔integer mapping tables.
//!
//! # Invariants
//! - Unknown integers read from storage are rejected, never defaulted.
//! - Mapping tables are bidirectional and checked by `verify_enum_mappings`
//!   before a connection is handed out.

mod person_entity;
mod relationship_entity;

pub use person_entity::PersonEntity;
pub use relationship_entity::RelationshipEntity;

use crate::model::person::Gender;
use crate::model::relationship::RelationshipType;
use crate::query::QueryField;
use crate::repo::error::RepoResult;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::collections::HashSet;
use std::fmt::Debug;

/// Domain model persisted in one table.
///
/// Implemented by `Person` and `Relationship`; the generic repository is
/// written against this trait only.
pub trait Entity: Clone + Debug + 'static {
    type Field: QueryField<Model = Self>;

    const TABLE: &'static str;
    /// Column list `SELECT ... FROM <table>` without filters.
    const SELECT_SQL: &'static str;
    /// Default listing order.
    const ORDER_BY: &'static str;

    fn id(&self) -> i64;

    /// Domain-layer write checks, run before anything is staged.
    fn validate_for_write(&self) -> RepoResult<()>;

    fn from_row(row: &Row<'_>) -> RepoResult<Self>;

    /// Inserts the model and returns the storage-assigned id.
    fn insert(&self, conn: &Connection) -> rusqlite::Result<i64>;

    /// Rewrites every stored column; returns affected row count.
    fn update(&self, conn: &Connection) -> rusqlite::Result<usize>;
}

pub fn gender_to_db(gender: Gender) -> i64 {
    match gender {
        Gender::Unknown => 0,
        Gender::Male => 1,
        Gender::Female => 2,
        Gender::Other => 3,
    }
}

pub fn parse_gender(value: i64) -> Option<Gender> {
    match value {
        0 => Some(Gender::Unknown),
        1 => Some(Gender::Male),
        2 => Some(Gender::Female),
        3 => Some(Gender::Other),
        _ => None,
    }
}

pub fn relationship_type_to_db(kind: RelationshipType) -> i64 {
    match kind {
        RelationshipType::Parent => 1,
        RelationshipType::Child => 2,
        RelationshipType::Spouse => 3,
        RelationshipType::Partner => 4,
        RelationshipType::Sibling => 5,
        RelationshipType::Grandparent => 6,
        RelationshipType::Grandchild => 7,
        RelationshipType::UncleAunt => 8,
        RelationshipType::NephewNiece => 9,
        RelationshipType::Cousin => 10,
        RelationshipType::Godparent => 11,
        RelationshipType::StepParent => 12,
        RelationshipType::StepChild => 13,
        RelationshipType::AdoptiveParent => 14,
        RelationshipType::AdoptedChild => 15,
        RelationshipType::Unknown => 99,
    }
}

pub fn parse_relationship_type(value: i64) -> Option<RelationshipType> {
    match value {
        1 => Some(RelationshipType::Parent),
        2 => Some(RelationshipType::Child),
        3 => Some(RelationshipType::Spouse),
        4 => Some(RelationshipType::Partner),
        5 => Some(RelationshipType::Sibling),
        6 => Some(RelationshipType::Grandparent),
        7 => Some(RelationshipType::Grandchild),
        8 => Some(RelationshipType::UncleAunt),
        9 => Some(RelationshipType::NephewNiece),
        10 => Some(RelationshipType::Cousin),
        11 => Some(RelationshipType::Godparent),
        12 => Some(RelationshipType::StepParent),
        13 => Some(RelationshipType::StepChild),
        14 => Some(RelationshipType::AdoptiveParent),
        15 => Some(RelationshipType::AdoptedChild),
        99 => Some(RelationshipType::Unknown),
        _ => None,
    }
}

/// Relationship type as a bound query parameter.
pub(crate) fn relationship_type_param(kind: RelationshipType) -> Value {
    Value::Integer(relationship_type_to_db(kind))
}

/// Checks that every enum variant round-trips through a distinct integer.
pub fn verify_enum_mappings() -> Result<(), String> {
    verify_table("Gender", &Gender::ALL, gender_to_db, parse_gender)?;
    verify_table(
        "RelationshipType",
        &RelationshipType::ALL,
        relationship_type_to_db,
        parse_relationship_type,
    )
}

fn verify_table<T: Copy + PartialEq + Debug>(
    name: &str,
    variants: &[T],
    to_db: fn(T) -> i64,
    parse: fn(i64) -> Option<T>,
) -> Result<(), String> {
    let mut seen = HashSet::new();
    for variant in variants {
        let code = to_db(*variant);
        if !seen.insert(code) {
            return Err(format!("{name} code {code} is assigned twice"));
        }
        if parse(code) != Some(*variant) {
            return Err(format!("{name} code {code} does not map back to {variant:?}"));
        }
    }
    Ok(())
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
