//! Parsing marker-extended SQL into its ordered parts.

mod ast;
mod error;
mod parser;

pub use ast::{ColumnRef, ParsedExpr, QueryPart, TypeRef};
pub use error::{ParseError, ParseErrorKind};
pub use parser::Parser;

use tracing::trace;

use crate::error::Error;

/// Parses a statement into its ordered [`QueryPart`]s.
///
/// # Errors
///
/// Returns an error prefixed `cannot parse expression:` carrying the
/// 1-based column of the offending character.
pub fn parse(input: &str) -> Result<ParsedExpr, Error> {
    let parsed = Parser::new(input).parse()?;
    trace!(parts = parsed.parts().len(), "parsed statement");
    Ok(parsed)
}
