use super::{bool_to_int, parse_relationship_type, relationship_type_to_db, Entity};
use crate::model::relationship::Relationship;
use crate::query::RelationshipField;
use crate::repo::error::{RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

const RELATIONSHIP_SELECT_SQL: &str = "SELECT
    Id,
    RelationshipType,
    DateFormed,
    DateEnded,
    Notes,
    PrimaryPersonId,
    RelatedPersonId,
    IsConfirmed,
    ConfirmationReason,
    CreatedAt,
    UpdatedAt
FROM Relationships";

/// Row shape of the `Relationships` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipEntity {
    pub id: i64,
    /// Raw `RelationshipType` code.
    pub relationship_type: i64,
    pub date_formed: Option<NaiveDate>,
    pub date_ended: Option<NaiveDate>,
    pub notes: Option<String>,
    pub primary_person_id: i64,
    pub related_person_id: i64,
    pub is_confirmed: i64,
    pub confirmation_reason: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl RelationshipEntity {
    pub fn from_model(edge: &Relationship) -> Self {
        Self {
            id: edge.id,
            relationship_type: relationship_type_to_db(edge.relationship_type),
            date_formed: edge.date_formed,
            date_ended: edge.date_ended,
            notes: edge.notes.clone(),
            primary_person_id: edge.primary_person_id,
            related_person_id: edge.related_person_id,
            is_confirmed: bool_to_int(edge.is_confirmed),
            confirmation_reason: edge.confirmation_reason.clone(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Converts to the domain model, rejecting unknown codes.
    pub fn into_model(self) -> Result<Relationship, String> {
        let relationship_type = parse_relationship_type(self.relationship_type).ok_or_else(|| {
            format!(
                "invalid relationship type `{}` in Relationships.RelationshipType",
                self.relationship_type
            )
        })?;
        let is_confirmed = match self.is_confirmed {
            0 => false,
            1 => true,
            other => {
                return Err(format!(
                    "invalid IsConfirmed value `{other}` in Relationships.IsConfirmed"
                ));
            }
        };
        Ok(Relationship {
            id: self.id,
            relationship_type,
            date_formed: self.date_formed,
            date_ended: self.date_ended,
            notes: self.notes,
            primary_person_id: self.primary_person_id,
            related_person_id: self.related_person_id,
            is_confirmed,
            confirmation_reason: self.confirmation_reason,
        })
    }

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("Id")?,
            relationship_type: row.get("RelationshipType")?,
            date_formed: row.get("DateFormed")?,
            date_ended: row.get("DateEnded")?,
            notes: row.get("Notes")?,
            primary_person_id: row.get("PrimaryPersonId")?,
            related_person_id: row.get("RelatedPersonId")?,
            is_confirmed: row.get("IsConfirmed")?,
            confirmation_reason: row.get("ConfirmationReason")?,
            created_at: row.get("CreatedAt")?,
            updated_at: row.get("UpdatedAt")?,
        })
    }
}

impl Entity for Relationship {
    type Field = RelationshipField;

    const TABLE: &'static str = "Relationships";
    const SELECT_SQL: &'static str = RELATIONSHIP_SELECT_SQL;
    const ORDER_BY: &'static str = "Id ASC";

    fn id(&self) -> i64 {
        self.id
    }

    fn validate_for_write(&self) -> RepoResult<()> {
        self.validate()?;
        Ok(())
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let entity = RelationshipEntity::from_row(row)
            .map_err(|err| RepoError::sqlite("read Relationships row", err))?;
        entity
            .into_model()
            .map_err(|message| RepoError::invalid_data("read Relationships row", message))
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<i64> {
        let entity = RelationshipEntity::from_model(self);
        conn.execute(
            "INSERT INTO Relationships (
                RelationshipType,
                DateFormed,
                DateEnded,
                Notes,
                PrimaryPersonId,
                RelatedPersonId,
                IsConfirmed,
                ConfirmationReason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                entity.relationship_type,
                entity.date_formed,
                entity.date_ended,
                entity.notes,
                entity.primary_person_id,
                entity.related_person_id,
                entity.is_confirmed,
                entity.confirmation_reason,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, conn: &Connection) -> rusqlite::Result<usize> {
        let entity = RelationshipEntity::from_model(self);
        conn.execute(
            "UPDATE Relationships
             SET
                RelationshipType = ?2,
                DateFormed = ?3,
                DateEnded = ?4,
                Notes = ?5,
                PrimaryPersonId = ?6,
                RelatedPersonId = ?7,
                IsConfirmed = ?8,
                ConfirmationReason = ?9,
                UpdatedAt = DATETIME('now')
             WHERE Id = ?1;",
            params![
                entity.id,
                entity.relationship_type,
                entity.date_formed,
                entity.date_ended,
                entity.notes,
                entity.primary_person_id,
                entity.related_person_id,
                entity.is_confirmed,
                entity.confirmation_reason,
            ],
        )
    }
}
