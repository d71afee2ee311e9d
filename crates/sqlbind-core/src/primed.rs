//! Priming bound statements with caller values and decoding result rows.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::trace;

use crate::bind::{
    BoundPart, InputAccess, InputGroup, OutputAccessor, OutputWrite, TypeBoundExpr,
};
use crate::error::Error;
use crate::typeinfo::HostType;
use crate::value::{SqlValue, ValueError};

/// Prefix of the synthetic output column labels.
pub(crate) const MARKER_PREFIX: &str = "_sqlair_";

/// Returns the synthetic label of output column `n`.
#[must_use]
pub fn marker_name(n: usize) -> String {
    format!("{MARKER_PREFIX}{n}")
}

/// Returns `n` from a `_sqlair_n` label, if the label is one.
#[must_use]
pub fn marker_index(s: &str) -> Option<usize> {
    s.strip_prefix(MARKER_PREFIX)?.parse().ok()
}

/// A named positional parameter for the driver.
///
/// Parameter `i` is named `sqlair_i`, matching the `@sqlair_i` placeholder
/// the SQL references; the list order is the placeholders'
/// left-to-right order.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedParam {
    /// The parameter name, without the `@`.
    pub name: String,
    /// The parameter value.
    pub value: SqlValue,
}

/// One result row, as the driver abstraction hands it to [`decode`].
///
/// Row iteration and result-set lifecycle belong to the driver; this trait
/// only exposes the shape of a single row.
///
/// [`decode`]: PrimedQuery::decode
pub trait Row {
    /// The row's column labels, in result order.
    fn columns(&self) -> Vec<String>;

    /// The value of the column at `index`.
    fn value(&self, index: usize) -> Option<SqlValue>;
}

/// Failure to prime a bound statement with values.
#[derive(Debug, Error)]
pub enum InputError {
    /// Two arguments of the same type were supplied.
    #[error(r#"type "{0}" provided more than once"#)]
    DuplicateArgument(String),
    /// A referenced type was not supplied, and nothing was supplied.
    #[error(r#"parameter with type "{name}" missing"#)]
    MissingType {
        /// The missing type's simple name.
        name: String,
    },
    /// A referenced type was not supplied.
    #[error(r#"parameter with type "{name}" missing (have "{have}")"#)]
    MissingTypeHave {
        /// The missing type's simple name.
        name: String,
        /// The supplied type names, sorted and pre-joined.
        have: String,
    },
    /// A same-named type from another module was supplied instead.
    #[error(r#"parameter with type "{name}" missing, have type with same name: "{have}""#)]
    SameNameDifferentModule {
        /// Module-qualified name of the missing type.
        name: String,
        /// Module-qualified name of the supplied type.
        have: String,
    },
    /// A map value has no entry for a referenced key.
    #[error(r#"map "{map}" does not contain key "{key}""#)]
    MissingKey {
        /// The map's type name.
        map: String,
        /// The missing key.
        key: String,
    },
    /// A supplied argument is not referenced by any marker.
    #[error(r#"type "{0}" not referenced in query"#)]
    NotReferenced(String),
    /// A violated internal invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure to decode a result row into destinations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No destination was supplied for a referenced output type.
    #[error(r#"parameter with type "{name}" missing"#)]
    MissingDestination {
        /// The missing type's simple name.
        name: String,
    },
    /// No destination was supplied for a referenced output type.
    #[error(r#"parameter with type "{name}" missing (have "{have}")"#)]
    MissingDestinationHave {
        /// The missing type's simple name.
        name: String,
        /// The supplied destination type names, sorted and pre-joined.
        have: String,
    },
    /// Two destinations of the same type were supplied.
    #[error(r#"type "{0}" provided more than once"#)]
    DuplicateDestination(String),
    /// A supplied destination receives no output column.
    #[error(r#"type "{0}" does not appear as an output in the query"#)]
    NotReferenced(String),
    /// The row is missing one of the statement's output columns.
    #[error(r#"result row has no column for output "{label}""#)]
    MissingColumn {
        /// The human-readable column label.
        label: String,
    },
    /// A column value does not fit its destination field.
    #[error(r#"cannot set value of column "{label}" into "{path}": {source}"#)]
    Value {
        /// The human-readable column label.
        label: String,
        /// The destination field path.
        path: String,
        /// The conversion failure.
        source: ValueError,
    },
    /// A violated internal invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A statement primed for one execution: final SQL, concrete parameters,
/// and the output accessors for decoding its rows.
#[derive(Debug, Clone)]
pub struct PrimedQuery {
    sql: String,
    params: Vec<NamedParam>,
    outputs: Vec<OutputAccessor>,
}

impl TypeBoundExpr {
    /// Primes the statement with concrete values, one per referenced host
    /// type.
    ///
    /// # Errors
    ///
    /// Returns an error prefixed `invalid input parameter:` when a value is
    /// missing, duplicated, lacks a referenced key, or goes unreferenced.
    pub fn bind_inputs(&self, args: &[&dyn HostType]) -> Result<PrimedQuery, Error> {
        self.bind_inputs_inner(args).map_err(Error::from)
    }

    fn bind_inputs_inner(&self, args: &[&dyn HostType]) -> Result<PrimedQuery, InputError> {
        let mut values: HashMap<TypeId, &dyn HostType> = HashMap::with_capacity(args.len());
        for arg in args {
            let type_id = arg.as_any().type_id();
            if values.insert(type_id, *arg).is_some() {
                return Err(InputError::DuplicateArgument(
                    arg.schema().type_name().to_string(),
                ));
            }
        }

        let mut used: HashSet<TypeId> = HashSet::new();
        let mut sql = String::new();
        let mut params: Vec<NamedParam> = Vec::new();
        let mut outputs: Vec<OutputAccessor> = Vec::new();
        let mut out_count = 0;

        for part in &self.parts {
            match part {
                BoundPart::Bypass(chunk) => sql.push_str(chunk),
                BoundPart::Inputs(InputGroup::Single(accessor)) => {
                    let value = extract(&values, &mut used, accessor)?;
                    push_param(&mut sql, &mut params, value);
                }
                BoundPart::Inputs(InputGroup::Fixed(accessors)) => {
                    sql.push('(');
                    for (i, accessor) in accessors.iter().enumerate() {
                        if i > 0 {
                            sql.push_str(", ");
                        }
                        let value = extract(&values, &mut used, accessor)?;
                        push_param(&mut sql, &mut params, value);
                    }
                    sql.push(')');
                }
                BoundPart::Inputs(InputGroup::Variadic(accessor)) => {
                    let host = lookup(
                        &values,
                        &mut used,
                        accessor.type_id,
                        accessor.type_name,
                        &accessor.full_name,
                    )?;
                    let elements = (accessor.elements)(host.as_any());
                    sql.push('(');
                    for (i, element) in elements.into_iter().enumerate() {
                        if i > 0 {
                            sql.push_str(", ");
                        }
                        push_param(&mut sql, &mut params, element);
                    }
                    sql.push(')');
                }
                BoundPart::Outputs(columns) => {
                    for (i, column) in columns.iter().enumerate() {
                        if i > 0 {
                            sql.push_str(", ");
                        }
                        sql.push_str(column.sql_expr());
                        sql.push_str(" AS ");
                        sql.push_str(&marker_name(out_count));
                        out_count += 1;
                        outputs.push(column.accessor().clone());
                    }
                }
            }
        }

        for arg in args {
            if !used.contains(&arg.as_any().type_id()) {
                return Err(InputError::NotReferenced(
                    arg.schema().type_name().to_string(),
                ));
            }
        }

        trace!(params = params.len(), outputs = outputs.len(), "primed query");
        Ok(PrimedQuery {
            sql,
            params,
            outputs,
        })
    }
}

fn push_param(sql: &mut String, params: &mut Vec<NamedParam>, value: SqlValue) {
    let n = params.len();
    sql.push_str("@sqlair_");
    sql.push_str(&n.to_string());
    params.push(NamedParam {
        name: format!("sqlair_{n}"),
        value,
    });
}

fn lookup<'v>(
    values: &HashMap<TypeId, &'v dyn HostType>,
    used: &mut HashSet<TypeId>,
    type_id: TypeId,
    type_name: &str,
    full_name: &str,
) -> Result<&'v dyn HostType, InputError> {
    match values.get(&type_id) {
        Some(host) => {
            used.insert(type_id);
            Ok(*host)
        }
        None => Err(missing_input_type(values, type_name, full_name)),
    }
}

fn missing_input_type(
    values: &HashMap<TypeId, &dyn HostType>,
    type_name: &str,
    full_name: &str,
) -> InputError {
    let mut names: Vec<String> = Vec::with_capacity(values.len());
    for host in values.values() {
        let schema = host.schema();
        if schema.type_name() == type_name {
            return InputError::SameNameDifferentModule {
                name: full_name.to_string(),
                have: schema.full_name(),
            };
        }
        names.push(schema.type_name().to_string());
    }
    if names.is_empty() {
        return InputError::MissingType {
            name: type_name.to_string(),
        };
    }
    names.sort();
    InputError::MissingTypeHave {
        name: type_name.to_string(),
        have: names.join("\", \""),
    }
}

fn extract(
    values: &HashMap<TypeId, &dyn HostType>,
    used: &mut HashSet<TypeId>,
    accessor: &crate::bind::InputAccessor,
) -> Result<SqlValue, InputError> {
    let host = lookup(
        values,
        used,
        accessor.type_id,
        accessor.type_name,
        &accessor.full_name,
    )?;
    match &accessor.access {
        InputAccess::Field { get } => Ok(get(host.as_any())),
        InputAccess::Key { name, get } => {
            get(host.as_any(), name).ok_or_else(|| InputError::MissingKey {
                map: accessor.type_name.to_string(),
                key: name.clone(),
            })
        }
    }
}

impl PrimedQuery {
    /// The final SQL string, with every placeholder group expanded.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The driver parameters, in placeholder order.
    #[must_use]
    pub fn params(&self) -> &[NamedParam] {
        &self.params
    }

    /// The output accessors, in `_sqlair_N` order.
    #[must_use]
    pub fn outputs(&self) -> &[OutputAccessor] {
        &self.outputs
    }

    /// Decodes one result row into the destinations, one per referenced
    /// output type. Record destinations are written field by field; map
    /// destinations receive one `(member, value)` entry per owned column.
    ///
    /// # Errors
    ///
    /// Returns an error prefixed `cannot decode result:` when a destination
    /// is missing, duplicated or unreferenced, when the row is missing an
    /// output column, or when a value does not fit its field.
    pub fn decode(&self, row: &dyn Row, dests: &mut [&mut dyn HostType]) -> Result<(), Error> {
        self.decode_inner(row, dests).map_err(Error::from)
    }

    fn decode_inner(
        &self,
        row: &dyn Row,
        dests: &mut [&mut dyn HostType],
    ) -> Result<(), DecodeError> {
        let mut by_type: HashMap<TypeId, usize> = HashMap::with_capacity(dests.len());
        for (i, dest) in dests.iter().enumerate() {
            let type_id = dest.as_any().type_id();
            if by_type.insert(type_id, i).is_some() {
                return Err(DecodeError::DuplicateDestination(
                    dest.schema().type_name().to_string(),
                ));
            }
        }

        let columns = row.columns();
        let column_index: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut used: HashSet<TypeId> = HashSet::new();
        for (n, output) in self.outputs.iter().enumerate() {
            let marker = marker_name(n);
            let Some(&column) = column_index.get(marker.as_str()) else {
                return Err(DecodeError::MissingColumn {
                    label: output.label().to_string(),
                });
            };
            let value = row.value(column).ok_or_else(|| {
                DecodeError::Internal(format!("row has no value at column {column}"))
            })?;
            let Some(&dest_index) = by_type.get(&output.type_id) else {
                return Err(missing_destination(dests, output));
            };
            used.insert(output.type_id);
            match &output.write {
                OutputWrite::Field { path, set } => {
                    set(dests[dest_index].as_any_mut(), value).map_err(|source| {
                        DecodeError::Value {
                            label: output.label().to_string(),
                            path: (*path).to_string(),
                            source,
                        }
                    })?;
                }
                OutputWrite::Key { key, insert } => {
                    insert(dests[dest_index].as_any_mut(), key, value);
                }
            }
        }

        for dest in dests.iter() {
            if !used.contains(&dest.as_any().type_id()) {
                return Err(DecodeError::NotReferenced(
                    dest.schema().type_name().to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn missing_destination(dests: &[&mut dyn HostType], output: &OutputAccessor) -> DecodeError {
    let mut names: Vec<String> = dests
        .iter()
        .map(|d| d.schema().type_name().to_string())
        .collect();
    if names.is_empty() {
        return DecodeError::MissingDestination {
            name: output.type_name().to_string(),
        };
    }
    names.sort();
    DecodeError::MissingDestinationHave {
        name: output.type_name().to_string(),
        have: names.join("\", \""),
    }
}
