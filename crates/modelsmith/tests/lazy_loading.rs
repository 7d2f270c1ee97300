//! Lazy relationship resolution through a session.

use std::sync::Arc;

use modelsmith::{
    EntityType, FieldValues, Instance, PlainField, RelationField, RowHandle, ScalarType,
    SchemaRegistry, Session, Store, Value,
};
use modelsmith_memory::MemoryStore;

fn registry() -> Arc<SchemaRegistry> {
    let registry = SchemaRegistry::new();
    registry
        .register(
            EntityType::builder("Author")
                .plain(PlainField::new("id", ScalarType::Integer).primary_key(true))
                .plain(PlainField::new("name", ScalarType::Text))
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            EntityType::builder("Book")
                .plain(PlainField::new("id", ScalarType::Integer).primary_key(true))
                .plain(PlainField::new("title", ScalarType::Text))
                .relation(RelationField::new("author", "Author").required(false))
                .build()
                .unwrap(),
        )
        .unwrap();
    Arc::new(registry)
}

fn seeded_session(registry: &Arc<SchemaRegistry>) -> Session<MemoryStore> {
    let mut session = Session::new(MemoryStore::new(), Arc::clone(registry));
    let ursula = Arc::new(
        Instance::build(
            registry.expect("Author").unwrap(),
            FieldValues::new().value("id", 1).value("name", "Ursula"),
        )
        .unwrap(),
    );
    let book = Instance::build(
        registry.expect("Book").unwrap(),
        FieldValues::new()
            .value("id", 10)
            .value("title", "The Dispossessed")
            .related("author", &ursula),
    )
    .unwrap();
    session.save(&ursula).unwrap();
    session.save(&book).unwrap();
    session
}

#[test]
fn relationship_resolves_on_first_read() {
    let registry = registry();
    let mut session = seeded_session(&registry);

    let book = session.find_by_id("Book", 10).unwrap().unwrap();
    // A freshly fetched instance has nothing resolved yet.
    assert!(book.related_cached("author").is_none());

    let author = session.related(&book, "author").unwrap().unwrap();
    assert_eq!(author.get("name"), Some(Value::from("Ursula")));
    assert!(author.is_saved());
}

#[test]
fn repeated_reads_return_the_same_instance() {
    let registry = registry();
    let mut session = seeded_session(&registry);

    let book = session.find_by_id("Book", 10).unwrap().unwrap();
    let first = session.related(&book, "author").unwrap().unwrap();
    let second = session.related(&book, "author").unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &book.related_cached("author").unwrap()));
}

#[test]
fn resolution_does_not_go_back_to_the_store() {
    let registry = registry();
    let mut session = seeded_session(&registry);

    let book = session.find_by_id("Book", 10).unwrap().unwrap();
    let first = session.related(&book, "author").unwrap().unwrap();

    // Remove the author's row out from under the cache. A second read must
    // not notice: the cell already holds its answer.
    let handle = RowHandle {
        table: "author".to_string(),
        primary_key: Value::Int(1),
    };
    session.store_mut().delete_row(&handle).unwrap();
    session.store_mut().commit().unwrap();

    let second = session.related(&book, "author").unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn null_foreign_key_short_circuits_to_none() {
    let registry = registry();
    let mut session = Session::new(MemoryStore::new(), Arc::clone(&registry));

    let orphan = Instance::build(
        registry.expect("Book").unwrap(),
        FieldValues::new().value("id", 11).value("title", "Orphaned"),
    )
    .unwrap();
    session.save(&orphan).unwrap();

    let book = session.find_by_id("Book", 11).unwrap().unwrap();
    assert_eq!(book.foreign_key("author"), Some(Value::Null));
    // No author row was ever written; a store lookup would find nothing,
    // but the null key resolves without one.
    assert!(session.related(&book, "author").unwrap().is_none());
}

#[test]
fn dangling_foreign_key_resolves_to_none_and_stays_resolved() {
    let registry = registry();
    let mut session = seeded_session(&registry);

    let handle = RowHandle {
        table: "author".to_string(),
        primary_key: Value::Int(1),
    };
    session.store_mut().delete_row(&handle).unwrap();
    session.store_mut().commit().unwrap();

    let book = session.find_by_id("Book", 10).unwrap().unwrap();
    assert!(session.related(&book, "author").unwrap().is_none());
    // The miss is a definitive answer, cached like a hit.
    assert!(session.related(&book, "author").unwrap().is_none());
}

#[test]
fn instances_from_find_all_resolve_independently() {
    let registry = registry();
    let mut session = seeded_session(&registry);

    let margaret = Arc::new(
        Instance::build(
            registry.expect("Author").unwrap(),
            FieldValues::new().value("id", 2).value("name", "Margaret"),
        )
        .unwrap(),
    );
    let second = Instance::build(
        registry.expect("Book").unwrap(),
        FieldValues::new()
            .value("id", 11)
            .value("title", "Oryx and Crake")
            .related("author", &margaret),
    )
    .unwrap();
    session.save(&margaret).unwrap();
    session.save(&second).unwrap();

    let books = session.find_all("Book").unwrap();
    assert_eq!(books.len(), 2);
    let names: Vec<Value> = books
        .iter()
        .map(|b| {
            let author = session.related(b, "author").unwrap().unwrap();
            author.get("name").unwrap()
        })
        .collect();
    assert_eq!(names, [Value::from("Ursula"), Value::from("Margaret")]);
}

#[test]
fn non_relationship_fields_are_rejected() {
    let registry = registry();
    let mut session = seeded_session(&registry);
    let book = session.find_by_id("Book", 10).unwrap().unwrap();
    assert!(session.related(&book, "title").is_err());
    assert!(session.related(&book, "nope").is_err());
}
