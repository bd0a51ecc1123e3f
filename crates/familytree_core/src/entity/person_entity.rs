use super::{gender_to_db, parse_gender, Entity};
use crate::model::person::Person;
use crate::query::PersonField;
use crate::repo::error::{RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

const PERSON_SELECT_SQL: &str = "SELECT
    Id,
    FirstName,
    LastName,
    MiddleName,
    BirthDate,
    DeathDate,
    Gender,
    Biography,
    PhotoPath,
    CreatedAt,
    UpdatedAt
FROM Persons";

/// Row shape of the `Persons` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonEntity {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    /// Raw `Gender` code.
    pub gender: i64,
    pub biography: Option<String>,
    pub photo_path: Option<String>,
    /// Storage-managed; `None` until read back from storage.
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl PersonEntity {
    pub fn from_model(person: &Person) -> Self {
        Self {
            id: person.id,
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            middle_name: person.middle_name.clone(),
            birth_date: person.birth_date,
            death_date: person.death_date,
            gender: gender_to_db(person.gender),
            biography: person.biography.clone(),
            photo_path: person.photo_path.clone(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Converts to the domain model, rejecting unknown gender codes.
    pub fn into_model(self) -> Result<Person, String> {
        let gender = parse_gender(self.gender)
            .ok_or_else(|| format!("invalid gender `{}` in Persons.Gender", self.gender))?;
        Ok(Person {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            middle_name: self.middle_name,
            birth_date: self.birth_date,
            death_date: self.death_date,
            gender,
            biography: self.biography,
            photo_path: self.photo_path,
        })
    }

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("Id")?,
            first_name: row.get("FirstName")?,
            last_name: row.get("LastName")?,
            middle_name: row.get("MiddleName")?,
            birth_date: row.get("BirthDate")?,
            death_date: row.get("DeathDate")?,
            gender: row.get("Gender")?,
            biography: row.get("Biography")?,
            photo_path: row.get("PhotoPath")?,
            created_at: row.get("CreatedAt")?,
            updated_at: row.get("UpdatedAt")?,
        })
    }
}

impl Entity for Person {
    type Field = PersonField;

    const TABLE: &'static str = "Persons";
    const SELECT_SQL: &'static str = PERSON_SELECT_SQL;
    const ORDER_BY: &'static str = "Id ASC";

    fn id(&self) -> i64 {
        self.id
    }

    fn validate_for_write(&self) -> RepoResult<()> {
        self.validate()?;
        Ok(())
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let entity =
            PersonEntity::from_row(row).map_err(|err| RepoError::sqlite("read Persons row", err))?;
        entity
            .into_model()
            .map_err(|message| RepoError::invalid_data("read Persons row", message))
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        let entity = PersonEntity::from_model(self);
        conn.execute(
            "INSERT INTO Persons (
                FirstName,
                LastName,
                MiddleName,
                BirthDate,
                DeathDate,
                Gender,
                Biography,
                PhotoPath
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                entity.first_name,
                entity.last_name,
                entity.middle_name,
                entity.birth_date,
                entity.death_date,
                entity.gender,
                entity.biography,
                entity.photo_path,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, conn: &Connection) -> rusqlite::Result<usize> {
        let entity = PersonEntity::from_model(self);
        conn.execute(
            "UPDATE Persons
             SET
                FirstName = ?2,
                LastName = ?3,
                MiddleName = ?4,
                BirthDate = ?5,
                DeathDate = ?6,
                Gender = ?7,
                Biography = ?8,
                PhotoPath = ?9,
                UpdatedAt = DATETIME('now')
             WHERE Id = ?1;",
            params![
                entity.id,
                entity.first_name,
                entity.last_name,
                entity.middle_name,
                entity.birth_date,
                entity.death_date,
                entity.gender,
                entity.biography,
                entity.photo_path,
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::PersonEntity;
    use crate::model::person::{Gender, Person};
    use chrono::NaiveDate;

    #[test]
    fn model_entity_roundtrip_preserves_scalars_and_derived_values() {
        let mut person = Person::new("Ivan", "Petrov")
            .with_middle_name("Sergeevich")
            .with_birth_date(NaiveDate::from_ymd_opt(1950, 3, 10).unwrap())
            .with_death_date(NaiveDate::from_ymd_opt(2010, 3, 9).unwrap())
            .with_gender(Gender::Male);
        person.id = 7;
        person.biography = Some("engineer".to_string());
        person.photo_path = Some("photos/ivan.png".to_string());

        let entity = PersonEntity::from_model(&person);
        assert_eq!(entity.gender, 1);

        let back = entity.into_model().unwrap();
        assert_eq!(back, person);
        assert_eq!(back.full_name(), person.full_name());
        assert_eq!(back.age(), person.age());
        assert_eq!(back.age(), Some(59));
    }

    #[test]
    fn unknown_gender_code_is_rejected() {
        let mut entity = PersonEntity::from_model(&Person::new("A", "B"));
        entity.gender = 17;
        let err = entity.into_model().unwrap_err();
        assert!(err.contains("Persons.Gender"));
    }
}
