//! Relationship (directed edge) domain model.
//!
//! # Responsibility
//! - Define the typed, directed edge between two persons.
//! - Provide confirmation/ending lifecycle helpers and derived attributes.
//!
//! # Invariants
//! - `primary_person_id != related_person_id`.
//! - `date_ended >= date_formed` when both are set.
//! - Parent edges are stored with the parent as primary person.
//! - A relationship references persons by id only; it is owned by neither.

use crate::model::person::{PersonId, UNSAVED_ID};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned relationship identifier.
pub type RelationshipId = i64;

pub const NOTES_MAX_CHARS: usize = 2000;
pub const CONFIRMATION_REASON_MAX_CHARS: usize = 500;

const DAYS_PER_YEAR: f64 = 365.25;

/// Closed kinship taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Parent,
    Child,
    Spouse,
    Partner,
    Sibling,
    Grandparent,
    Grandchild,
    UncleAunt,
    NephewNiece,
    Cousin,
    Godparent,
    StepParent,
    StepChild,
    AdoptiveParent,
    AdoptedChild,
    Unknown,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 16] = [
        RelationshipType::Parent,
        RelationshipType::Child,
        RelationshipType::Spouse,
        RelationshipType::Partner,
        RelationshipType::Sibling,
        RelationshipType::Grandparent,
        RelationshipType::Grandchild,
        RelationshipType::UncleAunt,
        RelationshipType::NephewNiece,
        RelationshipType::Cousin,
        RelationshipType::Godparent,
        RelationshipType::StepParent,
        RelationshipType::StepChild,
        RelationshipType::AdoptiveParent,
        RelationshipType::AdoptedChild,
        RelationshipType::Unknown,
    ];

    /// Spouse-like types resolved direction-agnostically.
    pub fn is_spousal(self) -> bool {
        matches!(self, Self::Spouse | Self::Partner)
    }
}

/// Lifecycle state derived from confirmation and end-date attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipStatus {
    /// Not confirmed yet and no rejection reason recorded.
    Proposed,
    Confirmed,
    /// Unconfirmed with a rejection reason.
    Rejected,
    /// End date is set.
    Ended,
}

/// Directed, typed edge between two persons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RelationshipId,
    pub relationship_type: RelationshipType,
    /// Date the kinship was formed (wedding, birth, adoption...).
    pub date_formed: Option<NaiveDate>,
    /// Date the kinship ended (divorce, death...).
    pub date_ended: Option<NaiveDate>,
    pub notes: Option<String>,
    pub primary_person_id: PersonId,
    pub related_person_id: PersonId,
    pub is_confirmed: bool,
    /// Meaningful only when `is_confirmed == false`.
    pub confirmation_reason: Option<String>,
}

/// Validation failures for relationship write paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipValidationError {
    UnsavedEndpoint(&'static str),
    SelfReference(PersonId),
    EndedBeforeFormed {
        date_formed: NaiveDate,
        date_ended: NaiveDate,
    },
    FieldTooLong {
        field: &'static str,
        max_chars: usize,
    },
}

impl Display for RelationshipValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsavedEndpoint(side) => {
                write!(f, "relationship {side} must reference a persisted person")
            }
            Self::SelfReference(id) => {
                write!(f, "person {id} cannot be related to itself")
            }
            Self::EndedBeforeFormed {
                date_formed,
                date_ended,
            } => write!(
                f,
                "relationship end date {date_ended} is earlier than formed date {date_formed}"
            ),
            Self::FieldTooLong { field, max_chars } => {
                write!(f, "relationship {field} exceeds {max_chars} characters")
            }
        }
    }
}

impl Error for RelationshipValidationError {}

impl Relationship {
    /// Creates an unsaved, confirmed edge with no dates or notes.
    pub fn new(
        primary_person_id: PersonId,
        related_person_id: PersonId,
        relationship_type: RelationshipType,
    ) -> Self {
        Self {
            id: UNSAVED_ID,
            relationship_type,
            date_formed: None,
            date_ended: None,
            notes: None,
            primary_person_id,
            related_person_id,
            is_confirmed: true,
            confirmation_reason: None,
        }
    }

    pub fn with_date_formed(mut self, date_formed: NaiveDate) -> Self {
        self.date_formed = Some(date_formed);
        self
    }

    pub fn with_date_ended(mut self, date_ended: NaiveDate) -> Self {
        self.date_ended = Some(date_ended);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id != UNSAVED_ID
    }

    /// Returns the endpoint opposite to `person_id`, if it is an endpoint.
    pub fn other_person(&self, person_id: PersonId) -> Option<PersonId> {
        if self.primary_person_id == person_id {
            Some(self.related_person_id)
        } else if self.related_person_id == person_id {
            Some(self.primary_person_id)
        } else {
            None
        }
    }

    /// Duration in years, formed to ended-or-today, one decimal place.
    pub fn duration_years(&self) -> Option<f64> {
        self.duration_years_on(Utc::now().date_naive())
    }

    /// Duration in years, formed to ended-or-`today`, one decimal place.
    ///
    /// `None` when the edge has no formed date or the span is negative.
    pub fn duration_years_on(&self, today: NaiveDate) -> Option<f64> {
        let formed = self.date_formed?;
        let end = self.date_ended.unwrap_or(today);
        let days = (end - formed).num_days() as f64;
        let years = days / DAYS_PER_YEAR;
        if years < 0.0 {
            return None;
        }
        Some((years * 10.0).round() / 10.0)
    }

    pub fn is_active(&self) -> bool {
        self.is_active_on(Utc::now().date_naive())
    }

    /// No end date, or an end date after `today`.
    pub fn is_active_on(&self, today: NaiveDate) -> bool {
        match self.date_ended {
            None => true,
            Some(ended) => ended > today,
        }
    }

    pub fn status(&self) -> RelationshipStatus {
        if self.date_ended.is_some() {
            RelationshipStatus::Ended
        } else if self.is_confirmed {
            RelationshipStatus::Confirmed
        } else if self.confirmation_reason.is_some() {
            RelationshipStatus::Rejected
        } else {
            RelationshipStatus::Proposed
        }
    }

    /// Marks the edge as awaiting confirmation.
    pub fn propose(&mut self) {
        self.is_confirmed = false;
        self.confirmation_reason = None;
    }

    pub fn confirm(&mut self) {
        self.is_confirmed = true;
        self.confirmation_reason = None;
    }

    pub fn reject(&mut self, reason: impl Into<String>) {
        self.is_confirmed = false;
        self.confirmation_reason = Some(reason.into());
    }

    /// Sets the end date. This is an attribute change, not a deletion.
    pub fn end(&mut self, date_ended: NaiveDate) {
        self.date_ended = Some(date_ended);
    }

    /// Validates write-path invariants.
    pub fn validate(&self) -> Result<(), RelationshipValidationError> {
        if self.primary_person_id <= UNSAVED_ID {
            return Err(RelationshipValidationError::UnsavedEndpoint(
                "primary_person_id",
            ));
        }
        if self.related_person_id <= UNSAVED_ID {
            return Err(RelationshipValidationError::UnsavedEndpoint(
                "related_person_id",
            ));
        }
        if self.primary_person_id == self.related_person_id {
            return Err(RelationshipValidationError::SelfReference(
                self.primary_person_id,
            ));
        }
        if let (Some(date_formed), Some(date_ended)) = (self.date_formed, self.date_ended) {
            if date_ended < date_formed {
                return Err(RelationshipValidationError::EndedBeforeFormed {
                    date_formed,
                    date_ended,
                });
            }
        }
        if let Some(notes) = self.notes.as_ref() {
            if notes.chars().count() > NOTES_MAX_CHARS {
                return Err(RelationshipValidationError::FieldTooLong {
                    field: "notes",
                    max_chars: NOTES_MAX_CHARS,
                });
            }
        }
        if let Some(reason) = self.confirmation_reason.as_ref() {
            if reason.chars().count() > CONFIRMATION_REASON_MAX_CHARS {
                return Err(RelationshipValidationError::FieldTooLong {
                    field: "confirmation_reason",
                    max_chars: CONFIRMATION_REASON_MAX_CHARS,
                });
            }
        }
        Ok(())
    }
}
