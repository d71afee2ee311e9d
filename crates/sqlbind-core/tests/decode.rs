//! Tests for decoding result rows into destinations.

mod common;
use common::*;

use sqlbind_core::{HostType, PrimedQuery, SqlValue, ValueMap};

fn primed_select_person() -> PrimedQuery {
    bind_ok(
        "SELECT &Person.* FROM person",
        &[&Person::default() as &dyn HostType],
    )
    .bind_inputs(&[])
    .unwrap()
}

#[test]
fn decode_into_record() {
    let primed = primed_select_person();
    // Sorted tag order: address_id, id, name.
    let row = TestRow::new(&[
        ("_sqlair_0", SqlValue::Int(1000)),
        ("_sqlair_1", SqlValue::Int(30)),
        ("_sqlair_2", SqlValue::Text(String::from("Fred"))),
    ]);
    let mut person = Person::default();
    primed
        .decode(&row, &mut [&mut person as &mut dyn HostType])
        .unwrap();
    assert_eq!(
        person,
        Person {
            id: 30,
            name: String::from("Fred"),
            address_id: 1000,
        }
    );
}

#[test]
fn decode_ignores_column_order_in_the_row() {
    let primed = primed_select_person();
    let row = TestRow::new(&[
        ("_sqlair_2", SqlValue::Text(String::from("Fred"))),
        ("_sqlair_0", SqlValue::Int(1000)),
        ("_sqlair_1", SqlValue::Int(30)),
    ]);
    let mut person = Person::default();
    primed
        .decode(&row, &mut [&mut person as &mut dyn HostType])
        .unwrap();
    assert_eq!(person.id, 30);
    assert_eq!(person.address_id, 1000);
}

#[test]
fn decode_into_two_destinations() {
    let primed = bind_ok(
        "SELECT &Person.name, &Address.street FROM person, address",
        &[&Person::default() as &dyn HostType, &Address::default()],
    )
    .bind_inputs(&[])
    .unwrap();
    let row = TestRow::new(&[
        ("_sqlair_0", SqlValue::Text(String::from("Fred"))),
        ("_sqlair_1", SqlValue::Text(String::from("Wallaby Way"))),
    ]);
    let mut person = Person::default();
    let mut address = Address::default();
    primed
        .decode(
            &row,
            &mut [&mut person as &mut dyn HostType, &mut address],
        )
        .unwrap();
    assert_eq!(person.name, "Fred");
    assert_eq!(address.street, "Wallaby Way");
}

#[test]
fn decode_into_map_inserts_member_entries() {
    let primed = bind_ok(
        "SELECT (name, id) AS &ValueMap.* FROM person",
        &[&ValueMap::new() as &dyn HostType],
    )
    .bind_inputs(&[])
    .unwrap();
    let row = TestRow::new(&[
        ("_sqlair_0", SqlValue::Text(String::from("Fred"))),
        ("_sqlair_1", SqlValue::Int(30)),
    ]);
    let mut map = ValueMap::new();
    primed
        .decode(&row, &mut [&mut map as &mut dyn HostType])
        .unwrap();
    assert_eq!(map.get("name"), Some(&SqlValue::Text(String::from("Fred"))));
    assert_eq!(map.get("id"), Some(&SqlValue::Int(30)));
}

#[test]
fn null_into_option_field() {
    #[derive(Debug, Default, Clone, PartialEq, sqlbind_derive::Record)]
    struct Note {
        #[db("body")]
        body: Option<String>,
    }

    let primed = bind_ok(
        "SELECT &Note.* FROM note",
        &[&Note::default() as &dyn HostType],
    )
    .bind_inputs(&[])
    .unwrap();
    let row = TestRow::new(&[("_sqlair_0", SqlValue::Null)]);
    let mut note = Note {
        body: Some(String::from("old")),
    };
    primed
        .decode(&row, &mut [&mut note as &mut dyn HostType])
        .unwrap();
    assert_eq!(note.body, None);
}

#[test]
fn kind_mismatch_names_the_human_label() {
    let primed = primed_select_person();
    let row = TestRow::new(&[
        ("_sqlair_0", SqlValue::Text(String::from("not an int"))),
        ("_sqlair_1", SqlValue::Int(30)),
        ("_sqlair_2", SqlValue::Text(String::from("Fred"))),
    ]);
    let mut person = Person::default();
    let err = primed
        .decode(&row, &mut [&mut person as &mut dyn HostType])
        .unwrap_err()
        .to_string();
    assert_eq!(
        err,
        "cannot decode result: cannot set value of column \"address_id\" into \
         \"Person.address_id\": expected integer value, got text"
    );
}

#[test]
fn missing_result_column_names_the_human_label() {
    let primed = primed_select_person();
    let row = TestRow::new(&[
        ("_sqlair_0", SqlValue::Int(1000)),
        ("_sqlair_1", SqlValue::Int(30)),
    ]);
    let mut person = Person::default();
    let err = primed
        .decode(&row, &mut [&mut person as &mut dyn HostType])
        .unwrap_err()
        .to_string();
    assert_eq!(
        err,
        r#"cannot decode result: result row has no column for output "name""#
    );
}

#[test]
fn missing_destination_is_an_error() {
    let primed = bind_ok(
        "SELECT &Person.name, &Address.street FROM person, address",
        &[&Person::default() as &dyn HostType, &Address::default()],
    )
    .bind_inputs(&[])
    .unwrap();
    let row = TestRow::new(&[
        ("_sqlair_0", SqlValue::Text(String::from("Fred"))),
        ("_sqlair_1", SqlValue::Text(String::from("Wallaby Way"))),
    ]);
    let mut person = Person::default();
    let err = primed
        .decode(&row, &mut [&mut person as &mut dyn HostType])
        .unwrap_err()
        .to_string();
    assert_eq!(
        err,
        "cannot decode result: parameter with type \"Address\" missing (have \"Person\")"
    );
}

#[test]
fn unreferenced_destination_is_an_error() {
    let primed = primed_select_person();
    let row = TestRow::new(&[
        ("_sqlair_0", SqlValue::Int(1000)),
        ("_sqlair_1", SqlValue::Int(30)),
        ("_sqlair_2", SqlValue::Text(String::from("Fred"))),
    ]);
    let mut person = Person::default();
    let mut address = Address::default();
    let err = primed
        .decode(
            &row,
            &mut [&mut person as &mut dyn HostType, &mut address],
        )
        .unwrap_err()
        .to_string();
    assert_eq!(
        err,
        r#"cannot decode result: type "Address" does not appear as an output in the query"#
    );
}

#[test]
fn duplicate_destination_is_an_error() {
    let primed = primed_select_person();
    let row = TestRow::new(&[]);
    let mut a = Person::default();
    let mut b = Person::default();
    let err = primed
        .decode(&row, &mut [&mut a as &mut dyn HostType, &mut b])
        .unwrap_err()
        .to_string();
    assert_eq!(
        err,
        r#"cannot decode result: type "Person" provided more than once"#
    );
}
