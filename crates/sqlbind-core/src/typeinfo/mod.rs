//! Host-type schemas and the process-wide type-info registry.
//!
//! A host type is any value the binder can read parameters from or decode
//! result columns into: a record with `db`-tagged fields, a string-keyed
//! map, or a sequence. Host types describe themselves through the
//! [`HostType`] trait, normally implemented with `#[derive(Record)]` or
//! `#[derive(Sequence)]` from `sqlbind-derive`, or by using the built-in
//! [`ValueMap`].
//!
//! The trait hands the registry a raw [`Schema`]; [`info_for`] validates it
//! once per type and caches the resulting [`TypeInfo`] for the lifetime of
//! the process.

mod registry;
mod tag;

pub use registry::info_for;
pub use tag::TagError;

use std::any::{Any, TypeId};
use std::collections::HashMap;

use thiserror::Error;

use crate::value::{SqlValue, ToSqlValue, ValueError, ValueKind};

/// Reads one field out of a host value.
pub type GetFieldFn = fn(&dyn Any) -> SqlValue;

/// Writes one field of a host value.
pub type SetFieldFn = fn(&mut dyn Any, SqlValue) -> Result<(), ValueError>;

/// Looks up a key in a map host value.
pub type MapGetFn = fn(&dyn Any, &str) -> Option<SqlValue>;

/// Inserts a key into a map host value.
pub type MapInsertFn = fn(&mut dyn Any, &str, SqlValue);

/// Returns the elements of a sequence host value, in order.
pub type SliceElementsFn = fn(&dyn Any) -> Vec<SqlValue>;

/// A malformed host type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// A field carries a tag the registry cannot parse.
    #[error(r#"invalid "db" tag on field "{path}": {source}"#)]
    Tag {
        /// The field path, e.g. `Person.id`.
        path: String,
        /// What was wrong with the tag.
        source: TagError,
    },
    /// Two fields of one record share a tag name.
    #[error(r#"duplicate tag "{tag}" in type "{type_name}""#)]
    DuplicateTag {
        /// The record's type name.
        type_name: String,
        /// The repeated tag.
        tag: String,
    },
    /// A map host type declared a non-text key kind.
    #[error(r#"map "{type_name}": unsupported key type {kind}, keys must be text"#)]
    UnsupportedKeyType {
        /// The map's type name.
        type_name: String,
        /// The declared key kind.
        kind: ValueKind,
    },
}

/// A value that can be bound to statement markers.
///
/// Implementations are normally generated by `#[derive(Record)]` or
/// `#[derive(Sequence)]`; [`ValueMap`] is the built-in map host type.
pub trait HostType: Any {
    /// The raw schema describing this type to the registry.
    fn schema(&self) -> &'static Schema;

    /// Upcast for accessor dispatch.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for decode destinations.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Raw, unvalidated description of a host type.
#[derive(Debug, Clone, Copy)]
pub enum Schema {
    /// A record with tagged fields.
    Record(RecordSchema),
    /// A string-keyed map with dynamic values.
    Map(MapSchema),
    /// A sequence of a homogeneous element type.
    Slice(SliceSchema),
}

impl Schema {
    /// The simple type name used in markers.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Record(s) => s.type_name,
            Self::Map(s) => s.type_name,
            Self::Slice(s) => s.type_name,
        }
    }

    /// The module path the type was defined in.
    #[must_use]
    pub const fn module_path(&self) -> &'static str {
        match self {
            Self::Record(s) => s.module_path,
            Self::Map(s) => s.module_path,
            Self::Slice(s) => s.module_path,
        }
    }

    /// The module-qualified name, used to disambiguate same-named types.
    #[must_use]
    pub fn full_name(&self) -> String {
        full_name(self.module_path(), self.type_name())
    }
}

fn full_name(module_path: &str, type_name: &str) -> String {
    format!("{module_path}::{type_name}")
}

/// One tagged field of a record schema, with its raw tag string.
#[derive(Debug, Clone, Copy)]
pub struct RawField {
    /// The raw tag, e.g. `"street"` or `"street,omitempty"`.
    pub tag: &'static str,
    /// The field path for diagnostics, e.g. `Address.street`.
    pub path: &'static str,
    /// The field's value kind.
    pub kind: ValueKind,
    /// Field getter.
    pub get: GetFieldFn,
    /// Field setter.
    pub set: SetFieldFn,
}

/// Raw schema of a record host type.
#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    /// Simple type name.
    pub type_name: &'static str,
    /// Defining module path.
    pub module_path: &'static str,
    /// The tagged fields, in declaration order.
    pub fields: &'static [RawField],
}

/// Raw schema of a map host type.
#[derive(Debug, Clone, Copy)]
pub struct MapSchema {
    /// Simple type name.
    pub type_name: &'static str,
    /// Defining module path.
    pub module_path: &'static str,
    /// Key kind; must be [`ValueKind::Text`].
    pub key_kind: ValueKind,
    /// Key lookup.
    pub get: MapGetFn,
    /// Key insertion.
    pub insert: MapInsertFn,
}

/// Raw schema of a sequence host type.
#[derive(Debug, Clone, Copy)]
pub struct SliceSchema {
    /// Simple type name.
    pub type_name: &'static str,
    /// Defining module path.
    pub module_path: &'static str,
    /// Element kind.
    pub elem_kind: ValueKind,
    /// Element extraction.
    pub elements: SliceElementsFn,
}

/// Validated, cached schema of a host type.
#[derive(Debug)]
pub enum TypeInfo {
    /// A record with tagged fields.
    Record(RecordInfo),
    /// A string-keyed map.
    Map(MapInfo),
    /// A sequence.
    Slice(SliceInfo),
}

impl TypeInfo {
    /// The simple type name used in markers.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Record(i) => i.type_name,
            Self::Map(i) => i.type_name,
            Self::Slice(i) => i.type_name,
        }
    }

    /// The module-qualified type name.
    #[must_use]
    pub fn full_name(&self) -> String {
        match self {
            Self::Record(i) => full_name(i.module_path, i.type_name),
            Self::Map(i) => full_name(i.module_path, i.type_name),
            Self::Slice(i) => full_name(i.module_path, i.type_name),
        }
    }

    /// The identity of the described type.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        match self {
            Self::Record(i) => i.type_id,
            Self::Map(i) => i.type_id,
            Self::Slice(i) => i.type_id,
        }
    }

    /// The kind of host type, as a word for error messages.
    #[must_use]
    pub const fn kind_word(&self) -> &'static str {
        match self {
            Self::Record(_) => "record",
            Self::Map(_) => "map",
            Self::Slice(_) => "slice",
        }
    }
}

/// One validated field of a record.
#[derive(Debug)]
pub struct FieldInfo {
    pub(crate) tag: String,
    pub(crate) path: &'static str,
    pub(crate) kind: ValueKind,
    pub(crate) omit_empty: bool,
    pub(crate) get: GetFieldFn,
    pub(crate) set: SetFieldFn,
}

impl FieldInfo {
    /// The parsed tag name.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The field path, e.g. `Address.street`.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        self.path
    }

    /// The field's value kind.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Whether the tag carried the `omitempty` option.
    #[must_use]
    pub const fn omit_empty(&self) -> bool {
        self.omit_empty
    }
}

/// Validated schema of a record host type.
#[derive(Debug)]
pub struct RecordInfo {
    pub(crate) type_name: &'static str,
    pub(crate) module_path: &'static str,
    pub(crate) type_id: TypeId,
    // Sorted by tag name so star expansion is deterministic.
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) by_tag: HashMap<String, usize>,
}

impl RecordInfo {
    /// The fields, sorted by tag name.
    #[must_use]
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    /// Looks up a field by tag name.
    #[must_use]
    pub fn field(&self, tag: &str) -> Option<&FieldInfo> {
        self.by_tag.get(tag).map(|&i| &self.fields[i])
    }
}

/// Validated schema of a map host type.
#[derive(Debug)]
pub struct MapInfo {
    pub(crate) type_name: &'static str,
    pub(crate) module_path: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) get: MapGetFn,
    pub(crate) insert: MapInsertFn,
}

/// Validated schema of a sequence host type.
#[derive(Debug)]
pub struct SliceInfo {
    pub(crate) type_name: &'static str,
    pub(crate) module_path: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) elem_kind: ValueKind,
    pub(crate) elements: SliceElementsFn,
}

impl SliceInfo {
    /// The element kind.
    #[must_use]
    pub const fn elem_kind(&self) -> ValueKind {
        self.elem_kind
    }
}

/// The built-in string-keyed map host type.
///
/// Markers reference it by its type name: `$ValueMap.key` reads the entry
/// `"key"`, and output expressions with explicit columns can target
/// `&ValueMap.*` to collect columns as entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueMap {
    entries: HashMap<String, SqlValue>,
}

impl ValueMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, converting the value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToSqlValue) {
        self.entries.insert(key.into(), value.to_sql_value());
    }

    /// Looks up an entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SqlValue> {
        self.entries.get(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn value_map_get(value: &dyn Any, key: &str) -> Option<SqlValue> {
    let map = value
        .downcast_ref::<ValueMap>()
        .expect("internal error: host value type mismatch");
    map.entries.get(key).cloned()
}

fn value_map_insert(value: &mut dyn Any, key: &str, v: SqlValue) {
    let map = value
        .downcast_mut::<ValueMap>()
        .expect("internal error: host value type mismatch");
    map.entries.insert(key.to_string(), v);
}

impl HostType for ValueMap {
    fn schema(&self) -> &'static Schema {
        static SCHEMA: Schema = Schema::Map(MapSchema {
            type_name: "ValueMap",
            module_path: module_path!(),
            key_kind: ValueKind::Text,
            get: value_map_get,
            insert: value_map_insert,
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
