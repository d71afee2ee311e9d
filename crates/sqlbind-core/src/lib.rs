//! # sqlbind-core
//!
//! A SQL statement preprocessor and type-binding engine.
//!
//! sqlbind accepts SQL extended with two marker families, output markers
//! (`&Type.field`, `&Type.*`, `&(T.a, T.b)`) and input markers
//! (`$Type.field`, `$Type.*`, `$Type[:]`), and turns them into
//! driver-ready SQL with positional placeholders. At execution time it
//! pulls parameter values out of caller values and funnels result columns
//! back into caller destinations.
//!
//! The pipeline has three stages, each producing an immutable value:
//!
//! 1. [`parse`]: tokenize the statement into [`ParsedExpr`], a flat list
//!    of bypass chunks and typed marker parts. String literals and
//!    comments pass through verbatim.
//! 2. [`ParsedExpr::bind_types`]: resolve every marker against exemplar
//!    values of the referenced host types, expand `*` forms into explicit
//!    column lists (sorted by tag, so the layout is deterministic), and
//!    record accessors. Produces a cacheable [`TypeBoundExpr`].
//! 3. [`TypeBoundExpr::bind_inputs`]: extract concrete parameter values
//!    and emit the final SQL, one `@sqlair_N` placeholder per parameter.
//!    The resulting [`PrimedQuery`] decodes rows with
//!    [`PrimedQuery::decode`].
//!
//! ## Host types
//!
//! Markers name three kinds of host type:
//!
//! - **Records**: structs whose fields carry `#[db("column")]` tags,
//!   with `#[derive(Record)]` from `sqlbind-derive`. Untagged fields are
//!   invisible to the binder.
//! - **Maps**: the string-keyed [`ValueMap`]; `$ValueMap.key` reads an
//!   entry, output columns targeting it insert entries.
//! - **Sequences**: single-field tuple structs over `Vec<T>` with
//!   `#[derive(Sequence)]`, referenced with slice syntax `$Items[:]`.
//!
//! ## Example
//!
//! ```rust
//! use sqlbind_core::{parse, HostType, SqlValue};
//! use sqlbind_derive::Record;
//!
//! #[derive(Debug, Default, Clone, Record)]
//! struct Person {
//!     #[db("id")]
//!     id: i64,
//!     #[db("name")]
//!     name: String,
//!     #[db("address_id")]
//!     address_id: i64,
//! }
//!
//! #[derive(Debug, Default, Clone, Record)]
//! struct Address {
//!     #[db("id")]
//!     id: i64,
//!     #[db("district")]
//!     district: String,
//!     #[db("street")]
//!     street: String,
//! }
//!
//! fn main() -> Result<(), sqlbind_core::Error> {
//!     let parsed = parse("SELECT &Person.* FROM person WHERE name = $Address.street")?;
//!     let bound = parsed.bind_types(&[
//!         &Person::default() as &dyn HostType,
//!         &Address::default(),
//!     ])?;
//!
//!     let address = Address {
//!         street: String::from("Wallaby Way"),
//!         ..Address::default()
//!     };
//!     let primed = bound.bind_inputs(&[&address as &dyn HostType])?;
//!     assert_eq!(
//!         primed.sql(),
//!         "SELECT address_id AS _sqlair_0, id AS _sqlair_1, name AS _sqlair_2 \
//!          FROM person WHERE name = @sqlair_0"
//!     );
//!     assert_eq!(
//!         primed.params()[0].value,
//!         SqlValue::Text(String::from("Wallaby Way"))
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Escaping
//!
//! A bare `&` or `$` after whitespace or list punctuation always opens a
//! marker. To pass one through to the driver, escape it with a backslash:
//! `\&` and `\$` emit the metacharacter verbatim.
//!
//! ## Errors
//!
//! Every stage fails all-or-nothing with a stable prefix:
//! `cannot parse expression:` (with a column number),
//! `cannot prepare statement:` and `invalid input parameter:` (with the
//! offending marker text), and `cannot decode result:` (with the
//! human-readable column label).

pub mod bind;
pub mod error;
pub mod parse;
pub mod primed;
pub mod typeinfo;
pub mod value;

pub use bind::{
    BindError, InputAccessor, OutputAccessor, OutputColumn, SliceAccessor, TypeBoundExpr,
};
pub use error::{Error, Result};
pub use parse::{parse, ColumnRef, ParseError, ParsedExpr, Parser, QueryPart, TypeRef};
pub use primed::{
    marker_index, marker_name, DecodeError, InputError, NamedParam, PrimedQuery, Row,
};
pub use typeinfo::{info_for, HostType, Schema, TypeError, TypeInfo, ValueMap};
pub use value::{FromSqlValue, SqlValue, ToSqlValue, ValueError, ValueKind};
