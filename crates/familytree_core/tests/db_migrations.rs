use familytree_core::db::migrations::latest_version;
use familytree_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::{params, Connection};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_object_exists(&conn, "table", "Persons");
    assert_object_exists(&conn, "table", "Relationships");
    assert_object_exists(&conn, "index", "IX_Relationships_Unique_Relationship");
    assert_object_exists(&conn, "index", "IX_Persons_LastName");
}

#[test]
fn returned_connections_enforce_foreign_keys() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("familytree.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute(
            "INSERT INTO Persons (FirstName, LastName, Gender) VALUES ('Anna', 'Smith', 2);",
            [],
        )
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let persons: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM Persons;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(persons, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn storage_enforces_named_relationship_constraints() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO Persons (FirstName, LastName, Gender) VALUES ('Anna', 'Smith', 2);
         INSERT INTO Persons (FirstName, LastName, Gender) VALUES ('Ben', 'Smith', 1);",
    )
    .unwrap();

    let self_ref = insert_edge(&conn, 1, 1, None, None).unwrap_err();
    assert!(self_ref.to_string().contains("CK_Relationships_SelfReference"));

    let bad_dates = insert_edge(&conn, 1, 2, Some("2020-01-01"), Some("2019-01-01")).unwrap_err();
    assert!(bad_dates.to_string().contains("CK_Relationships_ValidDates"));

    insert_edge(&conn, 1, 2, None, None).unwrap();
    let duplicate = insert_edge(&conn, 1, 2, None, None).unwrap_err();
    assert!(duplicate.to_string().contains("UNIQUE"));

    let dangling = insert_edge(&conn, 1, 42, None, None).unwrap_err();
    assert!(dangling.to_string().contains("FOREIGN KEY"));

    let restricted = conn
        .execute("DELETE FROM Persons WHERE Id = 2;", [])
        .unwrap_err();
    assert!(restricted.to_string().contains("FOREIGN KEY"));
}

fn insert_edge(
    conn: &Connection,
    primary: i64,
    related: i64,
    formed: Option<&str>,
    ended: Option<&str>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO Relationships (RelationshipType, PrimaryPersonId, RelatedPersonId, DateFormed, DateEnded)
         VALUES (1, ?1, ?2, ?3, ?4);",
        params![primary, related, formed, ended],
    )
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_object_exists(conn: &Connection, kind: &str, name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = ?1 AND name = ?2
            );",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "{kind} {name} does not exist");
}
