//! Typed query filters over domain models.
//!
//! # Responsibility
//! - Let callers express filters against domain fields (including computed
//!   ones like `IsAlive`) with domain-typed values.
//! - Translate the same filter into a storage expression (`sql`) or evaluate
//!   it in memory (`Predicate::matches`) with identical boolean semantics.
//!
//! # Invariants
//! - Comparisons and `contains` against an absent value are `false`.
//! - `not` is exact two-valued negation.
//! - A filter whose value kind differs from its field's kind is rejected by
//!   `check_kinds` before it reaches storage.

mod fields;
pub(crate) mod sql;

pub use fields::{PersonField, RelationshipField};

use crate::model::person::Gender;
use crate::model::relationship::RelationshipType;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt::Debug;

/// Value type carried by a field or a filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Text,
    Date,
    Bool,
    Gender,
    RelationshipType,
}

/// Domain-typed value compared against a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
    Date(NaiveDate),
    Bool(bool),
    Gender(Gender),
    RelationshipType(RelationshipType),
}

impl FieldValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Integer(_) => ValueKind::Integer,
            Self::Text(_) => ValueKind::Text,
            Self::Date(_) => ValueKind::Date,
            Self::Bool(_) => ValueKind::Bool,
            Self::Gender(_) => ValueKind::Gender,
            Self::RelationshipType(_) => ValueKind::RelationshipType,
        }
    }

    fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Gender(a), Self::Gender(b)) => Some(
                crate::entity::gender_to_db(*a).cmp(&crate::entity::gender_to_db(*b)),
            ),
            (Self::RelationshipType(a), Self::RelationshipType(b)) => Some(
                crate::entity::relationship_type_to_db(*a)
                    .cmp(&crate::entity::relationship_type_to_db(*b)),
            ),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Gender> for FieldValue {
    fn from(value: Gender) -> Self {
        Self::Gender(value)
    }
}

impl From<RelationshipType> for FieldValue {
    fn from(value: RelationshipType) -> Self {
        Self::RelationshipType(value)
    }
}

/// A filterable field of one domain model.
pub trait QueryField: Copy + Debug {
    type Model;

    /// Storage expression the field translates to.
    fn storage_expr(self) -> &'static str;

    /// Kind of the values `read` returns for this field.
    fn value_kind(self) -> ValueKind;

    /// Reads the field from a domain model; `None` when absent.
    fn read(self, model: &Self::Model) -> Option<FieldValue>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Boolean filter over the fields `F` of one domain model.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<F> {
    All,
    Compare {
        field: F,
        op: CompareOp,
        value: FieldValue,
    },
    IsNull(F),
    /// Case-sensitive substring match.
    Contains {
        field: F,
        needle: String,
    },
    And(Box<Predicate<F>>, Box<Predicate<F>>),
    Or(Box<Predicate<F>>, Box<Predicate<F>>),
    Not(Box<Predicate<F>>),
}

impl<F: QueryField> Predicate<F> {
    pub fn all() -> Self {
        Self::All
    }

    pub fn compare(field: F, op: CompareOp, value: impl Into<FieldValue>) -> Self {
        Self::Compare {
            field,
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: F, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: F, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn lt(field: F, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn le(field: F, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    pub fn gt(field: F, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn ge(field: F, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    pub fn is_null(field: F) -> Self {
        Self::IsNull(field)
    }

    pub fn is_not_null(field: F) -> Self {
        Self::IsNull(field).not()
    }

    pub fn contains(field: F, needle: impl Into<String>) -> Self {
        Self::Contains {
            field,
            needle: needle.into(),
        }
    }

    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Rejects comparisons whose value kind differs from the field's kind and
    /// `contains` on non-text fields.
    pub fn check_kinds(&self) -> Result<(), String> {
        match self {
            Self::All | Self::IsNull(_) => Ok(()),
            Self::Compare { field, value, .. } => {
                let expected = field.value_kind();
                if value.kind() == expected {
                    Ok(())
                } else {
                    Err(format!(
                        "field {field:?} holds {expected:?} values but was compared with {:?}",
                        value.kind()
                    ))
                }
            }
            Self::Contains { field, .. } => match field.value_kind() {
                ValueKind::Text => Ok(()),
                other => Err(format!(
                    "contains needs a text field but {field:?} holds {other:?} values"
                )),
            },
            Self::And(left, right) | Self::Or(left, right) => {
                left.check_kinds()?;
                right.check_kinds()
            }
            Self::Not(inner) => inner.check_kinds(),
        }
    }

    /// Evaluates the predicate against an in-memory domain model.
    pub fn matches(&self, model: &F::Model) -> bool {
        match self {
            Self::All => true,
            Self::Compare { field, op, value } => field
                .read(model)
                .and_then(|current| current.compare(value))
                .is_some_and(|ordering| op.holds(ordering)),
            Self::IsNull(field) => field.read(model).is_none(),
            Self::Contains { field, needle } => match field.read(model) {
                Some(FieldValue::Text(text)) => text.contains(needle.as_str()),
                _ => false,
            },
            Self::And(left, right) => left.matches(model) && right.matches(model),
            Self::Or(left, right) => left.matches(model) || right.matches(model),
            Self::Not(inner) => !inner.matches(model),
        }
    }
}
