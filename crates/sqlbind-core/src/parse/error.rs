//! Parser error types.

use thiserror::Error;

/// A parse error, positioned at a 1-based column of the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("column {column}: {kind}")]
pub struct ParseError {
    /// 1-based byte column of the offending character.
    pub column: usize,
    /// What went wrong.
    pub kind: ParseErrorKind,
}

/// The kinds of parse error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// A string literal was opened but never closed.
    #[error("missing closing quote in string literal")]
    UnterminatedString,
    /// A marker was not followed by a valid identifier.
    #[error("invalid identifier")]
    InvalidIdentifier,
    /// A marker referenced a type without a member, e.g. `$Person`.
    #[error(r#"type "{0}" not qualified"#)]
    TypeNotQualified(String),
    /// An `AS` list bound differing numbers of columns and targets.
    #[error("number of columns ({columns}) does not match number of targets ({targets})")]
    ColumnTargetMismatch {
        /// Number of source columns.
        columns: usize,
        /// Number of target members.
        targets: usize,
    },
    /// More than one `*` in an output target list.
    #[error("more than one asterisk in targets")]
    MultipleTargetStars,
    /// A source column list mixed `*` with explicit columns.
    #[error("cannot mix asterisk and explicit columns")]
    MixedColumnStars,
    /// A parenthesized list was not closed.
    #[error("expected closing parenthesis")]
    MissingCloseParen,
}
