use familytree_core::{
    open_db, Constraint, Person, PersonRepository, Relationship, RelationshipRepository,
    RelationshipType, RepoError, Repository, SqliteUnitOfWork, UnitOfWork,
};

fn snapshot(uow: &SqliteUnitOfWork) -> (Vec<Person>, Vec<Relationship>) {
    (
        uow.persons().get_all().unwrap(),
        uow.relationships().get_all().unwrap(),
    )
}

#[test]
fn complete_flushes_both_repositories_in_one_batch() {
    let uow = SqliteUnitOfWork::open_in_memory().unwrap();
    let anna = uow.persons().create(&Person::new("Anna", "Smith")).unwrap();
    let ben = uow.persons().create(&Person::new("Ben", "Smith")).unwrap();

    uow.persons()
        .add_range(&[Person::new("Carl", "Smith"), Person::new("Dina", "Smith")])
        .unwrap();
    uow.relationships()
        .add(&Relationship::new(anna.id, ben.id, RelationshipType::Parent))
        .unwrap();
    assert_eq!(uow.pending_changes(), 3);

    assert_eq!(uow.complete().unwrap(), 3);
    assert_eq!(uow.pending_changes(), 0);
    assert_eq!(uow.persons().count().unwrap(), 4);
    assert_eq!(uow.relationships().count().unwrap(), 1);
}

#[test]
fn failed_complete_leaves_storage_unchanged() {
    let uow = SqliteUnitOfWork::open_in_memory().unwrap();
    let anna = uow.persons().create(&Person::new("Anna", "Smith")).unwrap();
    let ben = uow.persons().create(&Person::new("Ben", "Smith")).unwrap();
    uow.relationships()
        .create(&Relationship::new(anna.id, ben.id, RelationshipType::Parent))
        .unwrap();
    let before = snapshot(&uow);

    uow.persons().add(&Person::new("Carl", "Smith")).unwrap();
    uow.relationships()
        .add(&Relationship::new(anna.id, ben.id, RelationshipType::Parent))
        .unwrap();

    let err = uow.complete().unwrap_err();
    match &err {
        RepoError::Persistence(persistence) => {
            assert_eq!(persistence.context, "failed while saving changes");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        err.violated_constraint(),
        Some(Constraint::UniqueRelationship)
    );
    assert_eq!(snapshot(&uow), before);
    assert_eq!(uow.pending_changes(), 0);
}

#[test]
fn failing_commit_rolls_back_everything_and_releases_the_slot() {
    let uow = SqliteUnitOfWork::open_in_memory().unwrap();
    let anna = uow.persons().create(&Person::new("Anna", "Smith")).unwrap();
    let ben = uow.persons().create(&Person::new("Ben", "Smith")).unwrap();
    let before = snapshot(&uow);

    uow.begin_transaction().unwrap();
    uow.persons().create(&Person::new("Carl", "Smith")).unwrap();
    uow.relationships()
        .add(&Relationship::new(anna.id, ben.id, RelationshipType::Spouse))
        .unwrap();
    uow.relationships()
        .add(&Relationship::new(anna.id, 404, RelationshipType::Spouse))
        .unwrap();

    let err = uow.commit_transaction().unwrap_err();
    assert_eq!(err.violated_constraint(), Some(Constraint::ForeignKey));
    assert!(!uow.in_transaction());
    assert_eq!(snapshot(&uow), before);

    uow.begin_transaction().unwrap();
    uow.persons().add(&Person::new("Dina", "Smith")).unwrap();
    assert_eq!(uow.commit_transaction().unwrap(), 1);
    assert_eq!(uow.persons().count().unwrap(), 3);
}

#[test]
fn committed_transaction_spans_multiple_completes() {
    let uow = SqliteUnitOfWork::open_in_memory().unwrap();
    uow.begin_transaction().unwrap();
    uow.persons().add(&Person::new("Anna", "Smith")).unwrap();
    assert_eq!(uow.complete().unwrap(), 1);
    uow.persons().add(&Person::new("Ben", "Smith")).unwrap();
    assert_eq!(uow.commit_transaction().unwrap(), 1);
    assert_eq!(uow.persons().count().unwrap(), 2);
}

#[test]
fn rollback_reverts_completed_writes_inside_the_transaction() {
    let uow = SqliteUnitOfWork::open_in_memory().unwrap();
    uow.begin_transaction().unwrap();
    uow.persons().add(&Person::new("Anna", "Smith")).unwrap();
    uow.complete().unwrap();
    assert_eq!(uow.persons().count().unwrap(), 1);

    uow.rollback_transaction().unwrap();
    assert_eq!(uow.persons().count().unwrap(), 0);
    assert!(matches!(
        uow.rollback_transaction(),
        Err(RepoError::InvalidState(_))
    ));
}

#[test]
fn dropping_with_open_transaction_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("familytree.db");

    {
        let uow = SqliteUnitOfWork::open(&path).unwrap();
        uow.persons().create(&Person::new("Kept", "Row")).unwrap();
        uow.begin_transaction().unwrap();
        uow.persons().create(&Person::new("Lost", "Row")).unwrap();
    }

    let uow = SqliteUnitOfWork::new(open_db(&path).unwrap());
    let names: Vec<String> = uow
        .persons()
        .get_all()
        .unwrap()
        .into_iter()
        .map(|person| person.first_name)
        .collect();
    assert_eq!(names, vec!["Kept".to_string()]);
}

#[test]
fn separate_units_of_work_see_committed_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    let writer = SqliteUnitOfWork::open(&path).unwrap();
    let reader = SqliteUnitOfWork::open(&path).unwrap();
    assert_ne!(writer.session_id(), reader.session_id());

    writer.persons().add(&Person::new("Anna", "Smith")).unwrap();
    assert_eq!(reader.persons().count().unwrap(), 0);
    writer.complete().unwrap();
    assert_eq!(reader.persons().count().unwrap(), 1);
}
