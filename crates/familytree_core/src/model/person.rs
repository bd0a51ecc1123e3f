//! Person domain model.
//!
//! # Responsibility
//! - Define the business-facing person record used by repositories/callers.
//! - Compute derived attributes (names, age, alive flag) on read.
//!
//! # Invariants
//! - `id` is assigned by storage; `UNSAVED_ID` marks a not-yet-persisted person.
//! - First and last names are required and at most 100 chars.
//! - Derived attributes are never stored.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned person identifier.
pub type PersonId = i64;

/// Id carried by models that have not been persisted yet.
pub const UNSAVED_ID: i64 = 0;

pub const NAME_MAX_CHARS: usize = 100;
pub const BIOGRAPHY_MAX_CHARS: usize = 2000;
pub const PHOTO_PATH_MAX_CHARS: usize = 500;

/// Closed gender taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Unknown,
    Male,
    Female,
    Other,
}

impl Gender {
    pub const ALL: [Gender; 4] = [Gender::Unknown, Gender::Male, Gender::Female, Gender::Other];
}

/// Person domain record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub gender: Gender,
    pub biography: Option<String>,
    pub photo_path: Option<String>,
}

/// Validation failures for person write paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonValidationError {
    MissingFirstName,
    MissingLastName,
    FieldTooLong {
        field: &'static str,
        max_chars: usize,
    },
    DeathBeforeBirth {
        birth_date: NaiveDate,
        death_date: NaiveDate,
    },
}

impl Display for PersonValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFirstName => write!(f, "person first name is required"),
            Self::MissingLastName => write!(f, "person last name is required"),
            Self::FieldTooLong { field, max_chars } => {
                write!(f, "person {field} exceeds {max_chars} characters")
            }
            Self::DeathBeforeBirth {
                birth_date,
                death_date,
            } => write!(
                f,
                "person death date {death_date} is earlier than birth date {birth_date}"
            ),
        }
    }
}

impl Error for PersonValidationError {}

impl Person {
    /// Creates an unsaved person with required names and no optional data.
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: UNSAVED_ID,
            first_name: first_name.into(),
            last_name: last_name.into(),
            middle_name: None,
            birth_date: None,
            death_date: None,
            gender: Gender::Unknown,
            biography: None,
            photo_path: None,
        }
    }

    pub fn with_middle_name(mut self, middle_name: impl Into<String>) -> Self {
        self.middle_name = Some(middle_name.into());
        self
    }

    pub fn with_birth_date(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }

    pub fn with_death_date(mut self, death_date: NaiveDate) -> Self {
        self.death_date = Some(death_date);
        self
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = gender;
        self
    }

    /// Returns whether storage has assigned an id to this person.
    pub fn is_persisted(&self) -> bool {
        self.id != UNSAVED_ID
    }

    /// `Last First Middle` when a middle name is present, else `First Last`.
    pub fn full_name(&self) -> String {
        match self.middle_name.as_deref().filter(|value| !value.is_empty()) {
            Some(middle) => format!("{} {} {}", self.last_name, self.first_name, middle),
            None => self.short_name(),
        }
    }

    /// `First Last`.
    pub fn short_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_alive(&self) -> bool {
        self.death_date.is_none()
    }

    /// Age in whole years at death, or today when alive.
    pub fn age(&self) -> Option<i32> {
        self.age_on(Utc::now().date_naive())
    }

    /// Age in whole years at death, or at `today` when alive.
    ///
    /// The year difference is decremented when the birthday has not yet
    /// occurred in the final year.
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        let birth = self.birth_date?;
        let end = self.death_date.unwrap_or(today);
        let mut age = end.year() - birth.year();
        if (end.month(), end.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        Some(age)
    }

    /// Validates write-path invariants.
    pub fn validate(&self) -> Result<(), PersonValidationError> {
        if self.first_name.trim().is_empty() {
            return Err(PersonValidationError::MissingFirstName);
        }
        if self.last_name.trim().is_empty() {
            return Err(PersonValidationError::MissingLastName);
        }

        check_length("first_name", Some(&self.first_name), NAME_MAX_CHARS)?;
        check_length("last_name", Some(&self.last_name), NAME_MAX_CHARS)?;
        check_length("middle_name", self.middle_name.as_ref(), NAME_MAX_CHARS)?;
        check_length("biography", self.biography.as_ref(), BIOGRAPHY_MAX_CHARS)?;
        check_length("photo_path", self.photo_path.as_ref(), PHOTO_PATH_MAX_CHARS)?;

        if let (Some(birth_date), Some(death_date)) = (self.birth_date, self.death_date) {
            if death_date < birth_date {
                return Err(PersonValidationError::DeathBeforeBirth {
                    birth_date,
                    death_date,
                });
            }
        }

        Ok(())
    }
}

fn check_length(
    field: &'static str,
    value: Option<&String>,
    max_chars: usize,
) -> Result<(), PersonValidationError> {
    match value {
        Some(value) if value.chars().count() > max_chars => {
            Err(PersonValidationError::FieldTooLong { field, max_chars })
        }
        _ => Ok(()),
    }
}
