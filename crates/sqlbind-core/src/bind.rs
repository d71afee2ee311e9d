//! Binding parsed statements to host types.
//!
//! [`ParsedExpr::bind_types`] checks every marker against the supplied
//! exemplars, expands star forms into explicit column lists, and produces
//! an immutable [`TypeBoundExpr`] that can be primed any number of times.

use std::any::TypeId;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::error::Error;
use crate::parse::{ColumnRef, ParsedExpr, QueryPart, TypeRef};
use crate::typeinfo::{
    self, GetFieldFn, HostType, MapGetFn, MapInsertFn, RecordInfo, SetFieldFn, SliceElementsFn,
    TypeError, TypeInfo,
};

/// Failure to bind a parsed statement to host types.
#[derive(Debug, Error)]
pub enum BindError {
    /// A supplied exemplar's schema is malformed.
    #[error(transparent)]
    Type(#[from] TypeError),
    /// Two exemplars from different modules share a simple name.
    #[error(r#"two types with name "{name}": "{first}" and "{second}""#)]
    NameClash {
        /// The clashing simple name.
        name: String,
        /// Module-qualified name of the first exemplar.
        first: String,
        /// Module-qualified name of the second exemplar.
        second: String,
    },
    /// The same exemplar was supplied twice.
    #[error(r#"multiple instances of type "{0}""#)]
    DuplicateExemplar(String),
    /// An exemplar declared an empty type name.
    #[error("cannot use a type with an empty name as an exemplar")]
    AnonymousType,
    /// An input marker failed validation.
    #[error("input expression: {message}: {raw}")]
    Input {
        /// What went wrong.
        message: String,
        /// The marker's source text.
        raw: String,
    },
    /// An output expression failed validation.
    #[error("output expression: {message}: {raw}")]
    Output {
        /// What went wrong.
        message: String,
        /// The expression's source text.
        raw: String,
    },
    /// A type member is the target of more than one output column.
    #[error(r#"member "{member}" of type "{type_name}" appears more than once in output expressions"#)]
    DuplicateOutput {
        /// The repeated member.
        member: String,
        /// The member's type.
        type_name: String,
    },
    /// A violated internal invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Extracts one parameter value from a host value at prime time.
#[derive(Debug, Clone)]
pub struct InputAccessor {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) full_name: String,
    pub(crate) access: InputAccess,
    pub(crate) raw: String,
}

impl InputAccessor {
    /// The referenced type's simple name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The marker's source text.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

#[derive(Debug, Clone)]
pub(crate) enum InputAccess {
    Field { get: GetFieldFn },
    Key { name: String, get: MapGetFn },
}

/// Extracts every element of a sequence host value at prime time.
#[derive(Debug, Clone)]
pub struct SliceAccessor {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) full_name: String,
    pub(crate) elements: SliceElementsFn,
    pub(crate) raw: String,
}

impl SliceAccessor {
    /// The referenced type's simple name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The marker's source text.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// The input markers of one statement position.
#[derive(Debug, Clone)]
pub(crate) enum InputGroup {
    /// A single placeholder, e.g. `$T.field`.
    Single(InputAccessor),
    /// A parenthesized group with a fixed arity, e.g. `$T.*`.
    Fixed(Vec<InputAccessor>),
    /// A parenthesized group whose arity is the sequence length, `$T[:]`.
    Variadic(SliceAccessor),
}

/// Writes one result column into a destination host value.
#[derive(Debug, Clone)]
pub struct OutputAccessor {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    /// The member the column binds to: a record tag or map key.
    pub(crate) member: String,
    /// The human-readable column label used in error messages.
    pub(crate) label: String,
    pub(crate) write: OutputWrite,
}

impl OutputAccessor {
    /// The destination type's simple name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The member the column binds to.
    #[must_use]
    pub fn member(&self) -> &str {
        &self.member
    }

    /// The human-readable column label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Debug, Clone)]
pub(crate) enum OutputWrite {
    Field { path: &'static str, set: SetFieldFn },
    Key { key: String, insert: MapInsertFn },
}

/// One projected column of an output expression.
#[derive(Debug, Clone)]
pub struct OutputColumn {
    /// The column expression emitted into the SQL, e.g. `a.district`.
    pub(crate) sql_expr: String,
    pub(crate) accessor: OutputAccessor,
}

impl OutputColumn {
    /// The column expression emitted into the SQL.
    #[must_use]
    pub fn sql_expr(&self) -> &str {
        &self.sql_expr
    }

    /// The accessor that receives the column's value.
    #[must_use]
    pub const fn accessor(&self) -> &OutputAccessor {
        &self.accessor
    }
}

#[derive(Debug, Clone)]
pub(crate) enum BoundPart {
    Bypass(String),
    Inputs(InputGroup),
    Outputs(Vec<OutputColumn>),
}

/// A statement bound to concrete host types.
///
/// Immutable and shareable; priming it with values produces a fresh
/// [`PrimedQuery`](crate::primed::PrimedQuery) per call.
#[derive(Debug, Clone)]
pub struct TypeBoundExpr {
    pub(crate) parts: Vec<BoundPart>,
}

impl TypeBoundExpr {
    /// Iterates over the expanded output columns in statement order.
    pub fn output_columns(&self) -> impl Iterator<Item = &OutputColumn> {
        self.parts.iter().flat_map(|part| match part {
            BoundPart::Outputs(columns) => columns.iter(),
            _ => [].iter(),
        })
    }
}

/// Renders the SQL template in a stable debug format. Variadic groups,
/// whose arity is only known once inputs are bound, render as
/// `(@sqlair_N, ...)`.
impl fmt::Display for TypeBoundExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut in_count = 0;
        let mut out_count = 0;
        for part in &self.parts {
            match part {
                BoundPart::Bypass(chunk) => f.write_str(chunk)?,
                BoundPart::Inputs(InputGroup::Single(_)) => {
                    write!(f, "@sqlair_{in_count}")?;
                    in_count += 1;
                }
                BoundPart::Inputs(InputGroup::Fixed(accessors)) => {
                    f.write_str("(")?;
                    for (i, _) in accessors.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "@sqlair_{in_count}")?;
                        in_count += 1;
                    }
                    f.write_str(")")?;
                }
                BoundPart::Inputs(InputGroup::Variadic(_)) => {
                    write!(f, "(@sqlair_{in_count}, ...)")?;
                    in_count += 1;
                }
                BoundPart::Outputs(columns) => {
                    for (i, column) in columns.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{} AS _sqlair_{out_count}", column.sql_expr)?;
                        out_count += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

impl ParsedExpr {
    /// Binds the statement's markers against one exemplar per referenced
    /// host type.
    ///
    /// # Errors
    ///
    /// Returns an error prefixed `cannot prepare statement:` when a marker
    /// references an unknown type or member, when star rules are violated,
    /// or when an output member is referenced twice.
    pub fn bind_types(&self, exemplars: &[&dyn HostType]) -> Result<TypeBoundExpr, Error> {
        self.bind_types_inner(exemplars).map_err(Error::from)
    }

    fn bind_types_inner(&self, exemplars: &[&dyn HostType]) -> Result<TypeBoundExpr, BindError> {
        let mut by_name: BTreeMap<String, Arc<TypeInfo>> = BTreeMap::new();
        for sample in exemplars {
            let info = typeinfo::info_for(*sample)?;
            if info.type_name().is_empty() {
                return Err(BindError::AnonymousType);
            }
            match by_name.get(info.type_name()) {
                Some(existing) if existing.type_id() == info.type_id() => {
                    return Err(BindError::DuplicateExemplar(info.type_name().to_string()));
                }
                Some(existing) => {
                    return Err(BindError::NameClash {
                        name: info.type_name().to_string(),
                        first: existing.full_name(),
                        second: info.full_name(),
                    });
                }
                None => {
                    by_name.insert(info.type_name().to_string(), info);
                }
            }
        }

        let mut parts = Vec::with_capacity(self.parts().len());
        let mut used_outputs: HashSet<(TypeId, String)> = HashSet::new();
        for part in self.parts() {
            match part {
                QueryPart::Bypass { chunk } => parts.push(BoundPart::Bypass(chunk.clone())),
                QueryPart::Input { target, slice, raw } => {
                    let group =
                        bind_input(&by_name, target, *slice, raw).map_err(|message| {
                            BindError::Input {
                                message,
                                raw: raw.clone(),
                            }
                        })?;
                    parts.push(BoundPart::Inputs(group));
                }
                QueryPart::Output {
                    sources,
                    targets,
                    raw,
                } => {
                    let columns =
                        bind_output(&by_name, sources, targets).map_err(|message| {
                            BindError::Output {
                                message,
                                raw: raw.clone(),
                            }
                        })?;
                    for column in &columns {
                        let key = (column.accessor.type_id, column.accessor.member.clone());
                        if !used_outputs.insert(key) {
                            return Err(BindError::DuplicateOutput {
                                member: column.accessor.member.clone(),
                                type_name: column.accessor.type_name.to_string(),
                            });
                        }
                    }
                    parts.push(BoundPart::Outputs(columns));
                }
            }
        }

        debug!(
            parts = parts.len(),
            outputs = used_outputs.len(),
            "bound statement types"
        );
        Ok(TypeBoundExpr { parts })
    }
}

fn type_missing_message<'a>(name: &str, have: impl Iterator<Item = &'a String>) -> String {
    let names: Vec<&str> = have.map(String::as_str).collect();
    if names.is_empty() {
        format!(r#"parameter with type "{name}" missing"#)
    } else {
        format!(
            r#"parameter with type "{name}" missing (have "{}")"#,
            names.join("\", \"")
        )
    }
}

fn resolve<'a>(
    by_name: &'a BTreeMap<String, Arc<TypeInfo>>,
    name: &str,
) -> Result<&'a Arc<TypeInfo>, String> {
    by_name
        .get(name)
        .ok_or_else(|| type_missing_message(name, by_name.keys()))
}

fn no_tag_message(record: &RecordInfo, member: &str) -> String {
    format!(r#"type "{}" has no tag "{member}""#, record.type_name)
}

fn map_star_message(type_name: &str) -> String {
    format!(r#"cannot use asterisk with map type "{type_name}": keys are unknown until execution"#)
}

fn slice_in_output_message(type_name: &str) -> String {
    format!(r#"cannot use slice type "{type_name}" in an output expression"#)
}

fn prefixed(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}.{name}"),
        None => name.to_string(),
    }
}

fn bind_input(
    by_name: &BTreeMap<String, Arc<TypeInfo>>,
    target: &TypeRef,
    slice: bool,
    raw: &str,
) -> Result<InputGroup, String> {
    let info = resolve(by_name, &target.type_name)?;
    if slice {
        return match &**info {
            TypeInfo::Slice(s) => Ok(InputGroup::Variadic(SliceAccessor {
                type_id: s.type_id,
                type_name: s.type_name,
                full_name: info.full_name(),
                elements: s.elements,
                raw: raw.to_string(),
            })),
            other => Err(format!(
                r#"cannot use slice syntax with {} type "{}""#,
                other.kind_word(),
                other.type_name()
            )),
        };
    }
    match &**info {
        TypeInfo::Record(r) => {
            if target.is_star() {
                let accessors = r
                    .fields()
                    .iter()
                    .map(|field| InputAccessor {
                        type_id: r.type_id,
                        type_name: r.type_name,
                        full_name: info.full_name(),
                        access: InputAccess::Field { get: field.get },
                        raw: raw.to_string(),
                    })
                    .collect();
                Ok(InputGroup::Fixed(accessors))
            } else {
                let field = r
                    .field(&target.member)
                    .ok_or_else(|| no_tag_message(r, &target.member))?;
                Ok(InputGroup::Single(InputAccessor {
                    type_id: r.type_id,
                    type_name: r.type_name,
                    full_name: info.full_name(),
                    access: InputAccess::Field { get: field.get },
                    raw: raw.to_string(),
                }))
            }
        }
        TypeInfo::Map(m) => {
            if target.is_star() {
                Err(map_star_message(m.type_name))
            } else {
                Ok(InputGroup::Single(InputAccessor {
                    type_id: m.type_id,
                    type_name: m.type_name,
                    full_name: info.full_name(),
                    access: InputAccess::Key {
                        name: target.member.clone(),
                        get: m.get,
                    },
                    raw: raw.to_string(),
                }))
            }
        }
        TypeInfo::Slice(s) => Err(format!(
            r#"slice type "{0}" must use slice syntax, e.g. "${0}[:]""#,
            s.type_name
        )),
    }
}

fn record_column(
    record: &RecordInfo,
    sql_expr: String,
    label: String,
    member: &str,
) -> Result<OutputColumn, String> {
    let field = record
        .field(member)
        .ok_or_else(|| no_tag_message(record, member))?;
    Ok(OutputColumn {
        sql_expr,
        accessor: OutputAccessor {
            type_id: record.type_id,
            type_name: record.type_name,
            member: field.tag().to_string(),
            label,
            write: OutputWrite::Field {
                path: field.path(),
                set: field.set,
            },
        },
    })
}

fn bind_output(
    by_name: &BTreeMap<String, Arc<TypeInfo>>,
    sources: &[ColumnRef],
    targets: &[TypeRef],
) -> Result<Vec<OutputColumn>, String> {
    let num_sources = sources.len();
    let source_stars = sources.iter().filter(|c| c.is_star()).count();
    let target_stars = targets.iter().filter(|t| t.is_star()).count();

    if target_stars > 1 {
        return Err("more than one asterisk in targets".to_string());
    }

    // Case A: generated columns, e.g. "&P.*", "t.* AS &P.*", "* AS (&P.*, &A.id)".
    if num_sources == 0 || (num_sources == 1 && source_stars == 1) {
        let prefix = sources.first().and_then(|c| c.table.as_deref());
        let mut columns = Vec::new();
        for target in targets {
            let info = resolve(by_name, &target.type_name)?;
            match &**info {
                TypeInfo::Record(r) => {
                    if target.is_star() {
                        for field in r.fields() {
                            let expr = prefixed(prefix, field.tag());
                            columns.push(OutputColumn {
                                sql_expr: expr.clone(),
                                accessor: OutputAccessor {
                                    type_id: r.type_id,
                                    type_name: r.type_name,
                                    member: field.tag().to_string(),
                                    label: expr,
                                    write: OutputWrite::Field {
                                        path: field.path(),
                                        set: field.set,
                                    },
                                },
                            });
                        }
                    } else {
                        let expr = prefixed(prefix, &target.member);
                        columns.push(record_column(r, expr.clone(), expr, &target.member)?);
                    }
                }
                TypeInfo::Map(m) => {
                    if target.is_star() {
                        return Err(map_star_message(m.type_name));
                    }
                    let expr = prefixed(prefix, &target.member);
                    columns.push(OutputColumn {
                        sql_expr: expr.clone(),
                        accessor: OutputAccessor {
                            type_id: m.type_id,
                            type_name: m.type_name,
                            member: target.member.clone(),
                            label: expr,
                            write: OutputWrite::Key {
                                key: target.member.clone(),
                                insert: m.insert,
                            },
                        },
                    });
                }
                TypeInfo::Slice(s) => return Err(slice_in_output_message(s.type_name)),
            }
        }
        return Ok(columns);
    }

    // Case B: explicit columns, single star target, e.g. "(c1, t.c2) AS &P.*".
    if target_stars == 1 && targets.len() == 1 {
        let info = resolve(by_name, &targets[0].type_name)?;
        let mut columns = Vec::new();
        for source in sources {
            match &**info {
                TypeInfo::Record(r) => {
                    columns.push(record_column(
                        r,
                        source.to_string(),
                        source.to_string(),
                        &source.column,
                    )?);
                }
                TypeInfo::Map(m) => columns.push(OutputColumn {
                    sql_expr: source.to_string(),
                    accessor: OutputAccessor {
                        type_id: m.type_id,
                        type_name: m.type_name,
                        member: source.column.clone(),
                        label: source.to_string(),
                        write: OutputWrite::Key {
                            key: source.column.clone(),
                            insert: m.insert,
                        },
                    },
                }),
                TypeInfo::Slice(s) => return Err(slice_in_output_message(s.type_name)),
            }
        }
        return Ok(columns);
    }
    if target_stars > 0 {
        return Err("invalid asterisk in targets".to_string());
    }

    // Case C: explicit columns and targets, pairwise.
    if num_sources != targets.len() {
        return Err(format!(
            "number of columns ({num_sources}) does not match number of targets ({})",
            targets.len()
        ));
    }
    let mut columns = Vec::new();
    for (source, target) in sources.iter().zip(targets) {
        let info = resolve(by_name, &target.type_name)?;
        match &**info {
            TypeInfo::Record(r) => {
                columns.push(record_column(
                    r,
                    source.to_string(),
                    source.to_string(),
                    &target.member,
                )?);
            }
            TypeInfo::Map(m) => columns.push(OutputColumn {
                sql_expr: source.to_string(),
                accessor: OutputAccessor {
                    type_id: m.type_id,
                    type_name: m.type_name,
                    member: target.member.clone(),
                    label: source.to_string(),
                    write: OutputWrite::Key {
                        key: target.member.clone(),
                        insert: m.insert,
                    },
                },
            }),
            TypeInfo::Slice(s) => return Err(slice_in_output_message(s.type_name)),
        }
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_expressions_are_shareable() {
        assert_send_sync::<ParsedExpr>();
        assert_send_sync::<TypeBoundExpr>();
    }
}
