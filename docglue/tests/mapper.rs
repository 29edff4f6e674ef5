//! End-to-end mapper behavior over the in-memory backend.

use std::time::Duration;

use bson::doc;
use docglue::{memory::MemoryConnection, prelude::*};

fn fast() -> RetryPolicy {
    RetryPolicy::new(18, Duration::ZERO)
}

fn user_schema() -> Schema {
    Schema::builder("users")
        .required("first_name")
        .required("last_name")
        .build()
}

fn bound_users(conn: &MemoryConnection) -> Namespace<ResilientCollection<docglue::memory::MemoryCollection>> {
    let proxied = ResilientConnection::new(conn.clone(), fast());
    let db = proxied.database("app");
    bind(&db, [user_schema()])
}

#[test]
fn create_assigns_identity_and_roundtrips_through_find() {
    let conn = MemoryConnection::new();
    let ns = bound_users(&conn);
    let users = ns.get("users").unwrap();

    let record = users
        .create(doc! { "first_name": "Daniel", "last_name": "Hengeveld" })
        .unwrap();
    let id = record.id().unwrap();

    let found = users.find(None).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), Some(id));
    assert_eq!(found[0].get("first_name"), record.get("first_name"));
}

#[test]
fn missing_required_field_fails_validation_and_persists_nothing() {
    let conn = MemoryConnection::new();
    let ns = bound_users(&conn);
    let users = ns.get("users").unwrap();

    let err = users.create(doc! { "first_name": "Daniel" }).unwrap_err();
    assert!(matches!(err, MapperError::Validation(_)));
    assert!(users.find(None).unwrap().is_empty());
}

#[test]
fn strict_schema_rejects_undeclared_fields_without_persisting() {
    let conn = MemoryConnection::new();
    let schema = Schema::builder("users")
        .required("first_name")
        .strict()
        .build();
    let proxied = ResilientConnection::new(conn.clone(), fast());
    let ns = bind(&proxied.database("app"), [schema]);
    let users = ns.get("users").unwrap();

    let err = users
        .create(doc! { "first_name": "Daniel", "shoe_size": 44 })
        .unwrap_err();
    assert!(matches!(
        err,
        MapperError::Validation(ValidationError::UnknownFields(_))
    ));
    assert!(users.find(None).unwrap().is_empty());
}

#[test]
fn set_updates_only_the_named_fields() {
    let conn = MemoryConnection::new();
    let ns = bound_users(&conn);
    let users = ns.get("users").unwrap();

    let mut record = users
        .create(doc! { "first_name": "Daniel", "last_name": "Hengeveld" })
        .unwrap();
    users.set(&mut record, doc! { "last_name": "H." }).unwrap();

    assert_eq!(record.get("last_name"), Some(&bson::Bson::String("H.".into())));

    let stored = users
        .find_one(Some(doc! { "_id": record.id().unwrap() }))
        .unwrap()
        .unwrap();
    assert_eq!(stored.get("first_name"), Some(&bson::Bson::String("Daniel".into())));
    assert_eq!(stored.get("last_name"), Some(&bson::Bson::String("H.".into())));
}

#[test]
fn failed_set_leaves_record_and_store_untouched() {
    let conn = MemoryConnection::new();
    let schema = Schema::builder("users").required("first_name").strict().build();
    let proxied = ResilientConnection::new(conn.clone(), fast());
    let ns = bind(&proxied.database("app"), [schema]);
    let users = ns.get("users").unwrap();

    let mut record = users.create(doc! { "first_name": "Daniel" }).unwrap();
    let err = users
        .set(&mut record, doc! { "shoe_size": 44 })
        .unwrap_err();
    assert!(matches!(err, MapperError::Validation(_)));
    assert!(record.get("shoe_size").is_none());

    let stored = users.find_one(None).unwrap().unwrap();
    assert!(stored.get("shoe_size").is_none());
}

#[test]
fn add_to_set_guarantees_membership_not_duplicates() {
    let conn = MemoryConnection::new();
    let schema = Schema::builder("users")
        .required("first_name")
        .optional("permissions")
        .build();
    let proxied = ResilientConnection::new(conn.clone(), fast());
    let ns = bind(&proxied.database("app"), [schema]);
    let users = ns.get("users").unwrap();

    let mut record = users.create(doc! { "first_name": "Daniel" }).unwrap();
    users
        .add_to_set(&mut record, doc! { "permissions": "read" })
        .unwrap();
    users
        .add_to_set(&mut record, doc! { "permissions": "read" })
        .unwrap();
    users
        .add_to_set(&mut record, doc! { "permissions": "write" })
        .unwrap();

    let members = record.get("permissions").unwrap().as_array().unwrap();
    assert_eq!(members.len(), 2);

    let stored = users.find_one(None).unwrap().unwrap();
    let stored_members = stored.get("permissions").unwrap().as_array().unwrap();
    assert_eq!(stored_members.len(), 2);
}

#[test]
fn add_to_set_on_a_non_array_field_is_misuse() {
    let conn = MemoryConnection::new();
    let ns = bound_users(&conn);
    let users = ns.get("users").unwrap();

    let mut record = users
        .create(doc! { "first_name": "Daniel", "last_name": "Hengeveld" })
        .unwrap();
    let err = users
        .add_to_set(&mut record, doc! { "last_name": "H." })
        .unwrap_err();
    assert!(matches!(err, MapperError::Misuse(_)));
}

#[test]
fn remove_invalidates_identity_and_later_mutation_is_misuse() {
    let conn = MemoryConnection::new();
    let ns = bound_users(&conn);
    let users = ns.get("users").unwrap();

    let mut record = users
        .create(doc! { "first_name": "Daniel", "last_name": "Hengeveld" })
        .unwrap();
    users.remove(&mut record).unwrap();

    assert!(record.id().is_none());
    assert!(users.find(None).unwrap().is_empty());

    let err = users
        .set(&mut record, doc! { "last_name": "H." })
        .unwrap_err();
    assert!(matches!(err, MapperError::Misuse(_)));
    let err = users.remove(&mut record).unwrap_err();
    assert!(matches!(err, MapperError::Misuse(_)));
}

#[test]
fn drop_empties_the_whole_collection() {
    let conn = MemoryConnection::new();
    let ns = bound_users(&conn);
    let users = ns.get("users").unwrap();

    users
        .create(doc! { "first_name": "a", "last_name": "a" })
        .unwrap();
    users
        .create(doc! { "first_name": "b", "last_name": "b" })
        .unwrap();

    users.drop().unwrap();
    assert!(users.find(None).unwrap().is_empty());
}

#[test]
fn declared_indexes_apply_lazily_on_first_use() {
    let conn = MemoryConnection::new();
    let schema = Schema::builder("users")
        .required("first_name")
        .required("last_name")
        .index(
            IndexKeys::new().desc("last_name").asc("first_name"),
            IndexOptions {
                unique: false,
                sparse: true,
            },
        )
        .build();
    let proxied = ResilientConnection::new(conn.clone(), fast());
    let ns = bind(&proxied.database("app"), [schema]);
    let users = ns.get("users").unwrap();

    // Nothing materialized yet, so nothing is declared on the store.
    let raw = conn.database("app").collection("users");
    assert!(raw.index_information().unwrap().is_empty());

    users
        .create(doc! { "first_name": "Daniel", "last_name": "Hengeveld" })
        .unwrap();

    let info = users.index_information().unwrap();
    let declared = &info["last_name_-1_first_name_1"];
    assert!(declared.options.sparse);
    assert!(!declared.options.unique);
}

#[test]
fn unique_violations_surface_as_driver_errors() {
    let conn = MemoryConnection::new();
    let schema = Schema::builder("users")
        .required("email")
        .index(
            IndexKeys::new().asc("email"),
            IndexOptions {
                unique: true,
                sparse: false,
            },
        )
        .build();
    let proxied = ResilientConnection::new(conn.clone(), fast());
    let ns = bind(&proxied.database("app"), [schema]);
    let users = ns.get("users").unwrap();

    users.create(doc! { "email": "a@example.com" }).unwrap();
    let err = users.create(doc! { "email": "a@example.com" }).unwrap_err();
    match err {
        MapperError::Driver(driver_err) => assert!(driver_err.is_duplicate_key()),
        other => panic!("expected a driver error, got {other:?}"),
    }
    assert_eq!(users.find(None).unwrap().len(), 1);
}

#[test]
fn binding_addresses_each_schema_by_collection_name() {
    let conn = MemoryConnection::new();
    let proxied = ResilientConnection::new(conn.clone(), fast());
    let groups = Schema::builder("groups").required("name").build();
    let ns = bind(&proxied.database("app"), [user_schema(), groups]);

    assert_eq!(ns.len(), 2);
    assert!(ns.get("users").is_some());
    assert!(ns.get("groups").is_some());
    assert!(ns.get("missing").is_none());
}

#[test]
fn find_one_returns_none_on_an_empty_collection() {
    let conn = MemoryConnection::new();
    let ns = bound_users(&conn);
    let users = ns.get("users").unwrap();
    assert!(users.find_one(None).unwrap().is_none());
}

#[test]
fn records_serialize_to_json_without_identity() {
    let conn = MemoryConnection::new();
    let ns = bound_users(&conn);
    let users = ns.get("users").unwrap();

    let record = users
        .create(doc! { "first_name": "Daniel", "last_name": "Hengeveld" })
        .unwrap();
    let json = record.to_json().unwrap();
    assert_eq!(json["first_name"], "Daniel");
    assert!(json.get("_id").is_none());
}
