use chrono::{Duration, NaiveDate, Utc};
use familytree_core::{
    Gender, Person, PersonField, PersonRepository, Predicate, Relationship, RelationshipField,
    RelationshipRepository, RelationshipType, RepoError, Repository, SqliteUnitOfWork,
    UnitOfWork,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn seed_persons(uow: &SqliteUnitOfWork) -> Vec<Person> {
    let drafts = vec![
        Person::new("Anna", "Smith")
            .with_birth_date(date(1990, 1, 1))
            .with_gender(Gender::Female),
        Person::new("Ben", "Smith")
            .with_middle_name("Lee")
            .with_birth_date(date(2015, 6, 1))
            .with_gender(Gender::Male),
        Person::new("Carl", "Jones")
            .with_birth_date(date(1930, 2, 2))
            .with_death_date(date(1999, 9, 9))
            .with_gender(Gender::Male),
        Person::new("Dina", "Smithson"),
    ];
    drafts
        .iter()
        .map(|draft| uow.persons().create(draft).unwrap())
        .collect()
}

fn assert_same_as_in_memory(
    uow: &SqliteUnitOfWork,
    all: &[Person],
    filter: Predicate<PersonField>,
) {
    let expected: Vec<i64> = all
        .iter()
        .filter(|person| filter.matches(person))
        .map(|person| person.id)
        .collect();
    let stored: Vec<i64> = uow
        .persons()
        .find(&filter)
        .unwrap()
        .iter()
        .map(|person| person.id)
        .collect();
    assert_eq!(stored, expected, "filter {filter:?}");
    assert_eq!(uow.persons().count_where(&filter).unwrap(), expected.len());
}

#[test]
fn person_filters_agree_between_storage_and_memory() {
    let uow = SqliteUnitOfWork::open_in_memory().unwrap();
    let all = seed_persons(&uow);

    let filters = vec![
        Predicate::all(),
        Predicate::eq(PersonField::IsAlive, true),
        Predicate::eq(PersonField::IsAlive, false),
        Predicate::eq(PersonField::BirthYear, 1990),
        Predicate::lt(PersonField::BirthDate, date(2000, 1, 1)),
        Predicate::eq(PersonField::MiddleName, "Lee").not(),
        Predicate::ne(PersonField::MiddleName, "Lee"),
        Predicate::is_null(PersonField::BirthDate),
        Predicate::is_not_null(PersonField::DeathDate),
        Predicate::contains(PersonField::LastName, "Smith")
            .and(Predicate::eq(PersonField::Gender, Gender::Male).not()),
        Predicate::eq(PersonField::Gender, Gender::Male)
            .or(Predicate::ge(PersonField::BirthYear, 2000)),
        Predicate::contains(PersonField::MiddleName, "e")
            .or(Predicate::gt(PersonField::Id, all[2].id)),
    ];
    for filter in filters {
        assert_same_as_in_memory(&uow, &all, filter);
    }
}

#[test]
fn relationship_filters_agree_between_storage_and_memory() {
    let uow = SqliteUnitOfWork::open_in_memory().unwrap();
    let people = seed_persons(&uow);
    let today = Utc::now().date_naive();

    let mut rejected = Relationship::new(people[0].id, people[1].id, RelationshipType::Godparent);
    rejected.reject("unverified");
    let drafts = vec![
        Relationship::new(people[0].id, people[1].id, RelationshipType::Parent)
            .with_date_formed(date(2015, 6, 1)),
        Relationship::new(people[2].id, people[3].id, RelationshipType::Spouse)
            .with_date_formed(date(1950, 1, 1))
            .with_date_ended(date(1999, 9, 9))
            .with_notes("widowed"),
        Relationship::new(people[3].id, people[0].id, RelationshipType::Cousin)
            .with_date_ended(today + Duration::days(3)),
        rejected,
    ];
    let all: Vec<Relationship> = drafts
        .iter()
        .map(|draft| uow.relationships().create(draft).unwrap())
        .collect();

    let filters = vec![
        Predicate::eq(RelationshipField::IsActive, true),
        Predicate::eq(RelationshipField::IsConfirmed, false),
        Predicate::eq(RelationshipField::RelationshipType, RelationshipType::Spouse)
            .or(Predicate::contains(RelationshipField::ConfirmationReason, "verified")),
        Predicate::lt(RelationshipField::DateFormed, date(2000, 1, 1)).not(),
        Predicate::is_null(RelationshipField::Notes)
            .and(Predicate::eq(RelationshipField::PrimaryPersonId, people[0].id)),
    ];
    for filter in filters {
        let expected: Vec<i64> = all
            .iter()
            .filter(|edge| filter.matches(edge))
            .map(|edge| edge.id)
            .collect();
        let stored: Vec<i64> = uow
            .relationships()
            .find(&filter)
            .unwrap()
            .iter()
            .map(|edge| edge.id)
            .collect();
        assert_eq!(stored, expected, "filter {filter:?}");
    }
}

#[test]
fn filters_with_mismatched_value_kinds_are_rejected_before_storage() {
    let uow = SqliteUnitOfWork::open_in_memory().unwrap();
    let all = seed_persons(&uow);
    let anna = &all[0];

    let mismatched = vec![
        Predicate::eq(PersonField::Gender, 2),
        Predicate::eq(PersonField::BirthDate, "1990-01-01"),
        Predicate::eq(PersonField::IsAlive, 1),
        Predicate::contains(PersonField::BirthDate, "1990"),
    ];
    for filter in mismatched {
        assert!(!filter.matches(anna), "filter {filter:?}");
        assert!(
            matches!(uow.persons().find(&filter), Err(RepoError::InvalidArgument(_))),
            "filter {filter:?}"
        );
        assert!(matches!(
            uow.persons().count_where(&filter),
            Err(RepoError::InvalidArgument(_))
        ));
        assert!(matches!(
            uow.persons().exists(&filter),
            Err(RepoError::InvalidArgument(_))
        ));
        assert!(matches!(
            uow.persons().first_or_default(&filter),
            Err(RepoError::InvalidArgument(_))
        ));
    }

    let matching_kinds = vec![
        Predicate::eq(PersonField::Gender, Gender::Female),
        Predicate::eq(PersonField::BirthDate, date(1990, 1, 1)),
        Predicate::eq(PersonField::IsAlive, true),
        Predicate::eq(PersonField::BirthYear, 1990),
    ];
    for filter in matching_kinds {
        assert!(filter.matches(anna), "filter {filter:?}");
        assert_same_as_in_memory(&uow, &all, filter);
    }
}
