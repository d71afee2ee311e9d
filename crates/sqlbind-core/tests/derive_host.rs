//! Tests for host-type schemas: derive output, registry validation, and
//! the errors hand-written schemas can produce.

mod common;
use common::*;

use std::any::Any;

use sqlbind_core::typeinfo::{
    info_for, HostType, MapSchema, RawField, RecordSchema, Schema, TypeInfo,
};
use sqlbind_core::value::{SqlValue, ValueError, ValueKind};
use sqlbind_derive::{Record, Sequence};

#[derive(Debug, Default, Clone, Record)]
struct Sample {
    #[db("beta")]
    beta: i64,
    #[db("alpha,omitempty")]
    alpha: String,
    // Untagged: invisible to the binder.
    scratch: bool,
    #[db("payload")]
    payload: Vec<u8>,
    #[db("ratio")]
    ratio: f64,
    #[db("note")]
    note: Option<String>,
}

#[test]
fn derived_record_metadata() {
    let info = info_for(&Sample::default()).unwrap();
    let TypeInfo::Record(record) = &*info else {
        panic!("expected record info");
    };
    let tags: Vec<&str> = record.fields().iter().map(|f| f.tag()).collect();
    assert_eq!(tags, vec!["alpha", "beta", "note", "payload", "ratio"]);

    let alpha = record.field("alpha").unwrap();
    assert!(alpha.omit_empty());
    assert_eq!(alpha.kind(), ValueKind::Text);
    assert_eq!(alpha.path(), "Sample.alpha");

    assert!(!record.field("beta").unwrap().omit_empty());
    assert_eq!(record.field("payload").unwrap().kind(), ValueKind::Blob);
    assert_eq!(record.field("ratio").unwrap().kind(), ValueKind::Float);
    assert_eq!(record.field("note").unwrap().kind(), ValueKind::Text);

    // The untagged field does not exist as far as the binder is concerned.
    assert!(record.field("scratch").is_none());
}

#[test]
fn derived_sequence_metadata() {
    let info = info_for(&Ids::default()).unwrap();
    let TypeInfo::Slice(slice) = &*info else {
        panic!("expected slice info");
    };
    assert_eq!(info.type_name(), "Ids");
    assert_eq!(slice.elem_kind(), ValueKind::Int);
}

#[derive(Debug, Default, Clone, Sequence)]
struct Names(Vec<String>);

#[test]
fn sequence_of_text_elements() {
    let bound = bind_ok(
        "SELECT x FROM t WHERE name IN $Names[:]",
        &[&Names::default() as &dyn HostType],
    );
    let names = Names(vec![String::from("a"), String::from("b")]);
    let primed = bound.bind_inputs(&[&names as &dyn HostType]).unwrap();
    assert_eq!(
        primed.params()[1].value,
        SqlValue::Text(String::from("b"))
    );
}

// Hand-written schemas exercise the registry's runtime validation, which
// derived types cannot reach with well-formed tags.

fn get_stub(_value: &dyn Any) -> SqlValue {
    SqlValue::Null
}

fn set_stub(_value: &mut dyn Any, _v: SqlValue) -> Result<(), ValueError> {
    Ok(())
}

fn map_get_stub(_value: &dyn Any, _key: &str) -> Option<SqlValue> {
    None
}

fn map_insert_stub(_value: &mut dyn Any, _key: &str, _v: SqlValue) {}

macro_rules! record_host {
    ($name:ident, $type_name:expr, $($tag:expr),+) => {
        #[derive(Debug, Default)]
        struct $name;

        impl HostType for $name {
            fn schema(&self) -> &'static Schema {
                static SCHEMA: Schema = Schema::Record(RecordSchema {
                    type_name: $type_name,
                    module_path: module_path!(),
                    fields: &[
                        $(RawField {
                            tag: $tag,
                            path: concat!(stringify!($name), ".field"),
                            kind: ValueKind::Int,
                            get: get_stub,
                            set: set_stub,
                        }),+
                    ],
                });
                &SCHEMA
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }
    };
}

record_host!(BadIdentTag, "BadIdentTag", "5id");
record_host!(EmptyTag, "EmptyTag", "");
record_host!(TwoOptionsTag, "TwoOptionsTag", "id,omitempty,omitempty");
record_host!(UnknownOptionTag, "UnknownOptionTag", "id,primary");
record_host!(DuplicateTags, "DuplicateTags", "id", "id");
record_host!(Anonymous, "", "id");

#[test]
fn bad_identifier_tag_is_rejected() {
    let err = info_for(&BadIdentTag).unwrap_err().to_string();
    assert_eq!(
        err,
        r#"invalid "db" tag on field "BadIdentTag.field": tag name "5id" is not a valid identifier"#
    );
}

#[test]
fn empty_tag_is_rejected() {
    let err = info_for(&EmptyTag).unwrap_err().to_string();
    assert!(err.contains("tag name is empty"), "unexpected error: {err}");
    assert!(err.contains("EmptyTag.field"), "unexpected error: {err}");
}

#[test]
fn two_tag_options_are_rejected() {
    let err = info_for(&TwoOptionsTag).unwrap_err().to_string();
    assert!(
        err.contains("more than one tag option"),
        "unexpected error: {err}"
    );
}

#[test]
fn unknown_tag_option_is_rejected() {
    let err = info_for(&UnknownOptionTag).unwrap_err().to_string();
    assert!(
        err.contains(r#"unknown tag option "primary""#),
        "unexpected error: {err}"
    );
}

#[test]
fn duplicate_tags_are_rejected() {
    let err = info_for(&DuplicateTags).unwrap_err().to_string();
    assert_eq!(err, r#"duplicate tag "id" in type "DuplicateTags""#);
}

#[test]
fn schema_errors_surface_under_the_prepare_prefix() {
    let err = bind_err("SELECT &BadIdentTag.x FROM t", &[&BadIdentTag as &dyn HostType]);
    assert!(
        err.starts_with(r#"cannot prepare statement: invalid "db" tag"#),
        "unexpected error: {err}"
    );
}

#[test]
fn empty_type_name_is_rejected_at_bind() {
    let err = bind_err("SELECT x FROM t", &[&Anonymous as &dyn HostType]);
    assert_eq!(
        err,
        "cannot prepare statement: cannot use a type with an empty name as an exemplar"
    );
}

#[derive(Debug, Default)]
struct IntKeyedMap;

impl HostType for IntKeyedMap {
    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::Map(MapSchema {
            type_name: "IntKeyedMap",
            module_path: module_path!(),
            key_kind: ValueKind::Int,
            get: map_get_stub,
            insert: map_insert_stub,
        });
        &SCHEMA
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn non_text_map_keys_are_rejected() {
    let err = info_for(&IntKeyedMap).unwrap_err().to_string();
    assert_eq!(
        err,
        r#"map "IntKeyedMap": unsupported key type integer, keys must be text"#
    );
}
