use super::{FieldValue, QueryField, ValueKind};
use crate::model::person::Person;
use crate::model::relationship::Relationship;
use chrono::{Datelike, Utc};

/// Filterable person fields. `IsAlive` and `BirthYear` are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonField {
    Id,
    FirstName,
    LastName,
    MiddleName,
    BirthDate,
    DeathDate,
    Gender,
    Biography,
    PhotoPath,
    IsAlive,
    BirthYear,
}

impl QueryField for PersonField {
    type Model = Person;

    fn storage_expr(self) -> &'static str {
        match self {
            Self::Id => "Id",
            Self::FirstName => "FirstName",
            Self::LastName => "LastName",
            Self::MiddleName => "MiddleName",
            Self::BirthDate => "BirthDate",
            Self::DeathDate => "DeathDate",
            Self::Gender => "Gender",
            Self::Biography => "Biography",
            Self::PhotoPath => "PhotoPath",
            Self::IsAlive => "(DeathDate IS NULL)",
            Self::BirthYear => "CAST(strftime('%Y', BirthDate) AS INTEGER)",
        }
    }

    fn value_kind(self) -> ValueKind {
        match self {
            Self::Id | Self::BirthYear => ValueKind::Integer,
            Self::FirstName
            | Self::LastName
            | Self::MiddleName
            | Self::Biography
            | Self::PhotoPath => ValueKind::Text,
            Self::BirthDate | Self::DeathDate => ValueKind::Date,
            Self::Gender => ValueKind::Gender,
            Self::IsAlive => ValueKind::Bool,
        }
    }

    fn read(self, person: &Person) -> Option<FieldValue> {
        match self {
            Self::Id => Some(FieldValue::Integer(person.id)),
            Self::FirstName => Some(FieldValue::Text(person.first_name.clone())),
            Self::LastName => Some(FieldValue::Text(person.last_name.clone())),
            Self::MiddleName => person.middle_name.clone().map(FieldValue::Text),
            Self::BirthDate => person.birth_date.map(FieldValue::Date),
            Self::DeathDate => person.death_date.map(FieldValue::Date),
            Self::Gender => Some(FieldValue::Gender(person.gender)),
            Self::Biography => person.biography.clone().map(FieldValue::Text),
            Self::PhotoPath => person.photo_path.clone().map(FieldValue::Text),
            Self::IsAlive => Some(FieldValue::Bool(person.is_alive())),
            Self::BirthYear => person
                .birth_date
                .map(|date| FieldValue::Integer(i64::from(date.year()))),
        }
    }
}

/// Filterable relationship fields. `IsActive` is computed against today (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipField {
    Id,
    RelationshipType,
    DateFormed,
    DateEnded,
    Notes,
    PrimaryPersonId,
    RelatedPersonId,
    IsConfirmed,
    ConfirmationReason,
    IsActive,
}

impl QueryField for RelationshipField {
    type Model = Relationship;

    fn storage_expr(self) -> &'static str {
        match self {
            Self::Id => "Id",
            Self::RelationshipType => "RelationshipType",
            Self::DateFormed => "DateFormed",
            Self::DateEnded => "DateEnded",
            Self::Notes => "Notes",
            Self::PrimaryPersonId => "PrimaryPersonId",
            Self::RelatedPersonId => "RelatedPersonId",
            Self::IsConfirmed => "IsConfirmed",
            Self::ConfirmationReason => "ConfirmationReason",
            Self::IsActive => "(DateEnded IS NULL OR DateEnded > date('now'))",
        }
    }

    fn value_kind(self) -> ValueKind {
        match self {
            Self::Id | Self::PrimaryPersonId | Self::RelatedPersonId => ValueKind::Integer,
            Self::RelationshipType => ValueKind::RelationshipType,
            Self::DateFormed | Self::DateEnded => ValueKind::Date,
            Self::Notes | Self::ConfirmationReason => ValueKind::Text,
            Self::IsConfirmed | Self::IsActive => ValueKind::Bool,
        }
    }

    fn read(self, edge: &Relationship) -> Option<FieldValue> {
        match self {
            Self::Id => Some(FieldValue::Integer(edge.id)),
            Self::RelationshipType => Some(FieldValue::RelationshipType(edge.relationship_type)),
            Self::DateFormed => edge.date_formed.map(FieldValue::Date),
            Self::DateEnded => edge.date_ended.map(FieldValue::Date),
            Self::Notes => edge.notes.clone().map(FieldValue::Text),
            Self::PrimaryPersonId => Some(FieldValue::Integer(edge.primary_person_id)),
            Self::RelatedPersonId => Some(FieldValue::Integer(edge.related_person_id)),
            Self::IsConfirmed => Some(FieldValue::Bool(edge.is_confirmed)),
            Self::ConfirmationReason => edge.confirmation_reason.clone().map(FieldValue::Text),
            Self::IsActive => Some(FieldValue::Bool(
                edge.is_active_on(Utc::now().date_naive()),
            )),
        }
    }
}
