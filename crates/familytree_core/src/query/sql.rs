//! Predicate → SQL `WHERE` clause translation.
//!
//! Every leaf is wrapped so it evaluates to 0/1, never NULL, which keeps
//! `NOT`/`OR` aligned with `Predicate::matches`. Repositories run
//! `Predicate::check_kinds` first; SQLite would otherwise coerce mismatched
//! values that `matches` treats as unequal.

use super::{FieldValue, Predicate, QueryField};
use crate::entity::{gender_to_db, relationship_type_param};
use rusqlite::types::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Translated filter: clause text with positional `?` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SqlFilter {
    pub clause: String,
    pub params: Vec<Value>,
}

pub(crate) fn translate<F: QueryField>(predicate: &Predicate<F>) -> SqlFilter {
    let mut params = Vec::new();
    let clause = write_clause(predicate, &mut params);
    SqlFilter { clause, params }
}

fn write_clause<F: QueryField>(predicate: &Predicate<F>, params: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::All => "1".to_string(),
        Predicate::Compare { field, op, value } => {
            params.push(to_sql_value(value));
            format!(
                "COALESCE(({}) {} ?, 0)",
                field.storage_expr(),
                op.sql()
            )
        }
        Predicate::IsNull(field) => format!("(({}) IS NULL)", field.storage_expr()),
        Predicate::Contains { field, needle } => {
            params.push(Value::Text(needle.clone()));
            format!("COALESCE(instr(({}), ?) > 0, 0)", field.storage_expr())
        }
        Predicate::And(left, right) => {
            let left = write_clause(left, params);
            let right = write_clause(right, params);
            format!("({left} AND {right})")
        }
        Predicate::Or(left, right) => {
            let left = write_clause(left, params);
            let right = write_clause(right, params);
            format!("({left} OR {right})")
        }
        Predicate::Not(inner) => format!("(NOT {})", write_clause(inner, params)),
    }
}

pub(crate) fn to_sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Integer(value) => Value::Integer(*value),
        FieldValue::Text(value) => Value::Text(value.clone()),
        FieldValue::Date(value) => Value::Text(value.format(DATE_FORMAT).to_string()),
        FieldValue::Bool(value) => Value::Integer(i64::from(*value)),
        FieldValue::Gender(value) => Value::Integer(gender_to_db(*value)),
        FieldValue::RelationshipType(value) => relationship_type_param(*value),
    }
}
