//! Parsing and validation of `db` field tags.
//!
//! A tag is the string inside `#[db("...")]`: a column name, optionally
//! followed by `,omitempty`. Validation happens at registry time so that
//! hand-written [`HostType`](super::HostType) impls get the same checks as
//! derived ones.

use thiserror::Error;

/// A malformed `db` tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    /// The tag has no name part.
    #[error("tag name is empty")]
    EmptyName,
    /// The name is not a valid identifier.
    #[error(r#"tag name "{0}" is not a valid identifier"#)]
    BadIdentifier(String),
    /// More than one option follows the name.
    #[error("more than one tag option")]
    TooManyOptions,
    /// An option other than `omitempty` follows the name.
    #[error(r#"unknown tag option "{0}""#)]
    UnknownOption(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedTag {
    pub(crate) name: String,
    pub(crate) omit_empty: bool,
}

/// Returns true for `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Splits a raw tag into its name and the `omitempty` option.
pub(crate) fn parse_tag(raw: &str) -> Result<ParsedTag, TagError> {
    let mut parts = raw.split(',');
    let name = parts.next().unwrap_or("");
    if name.is_empty() {
        return Err(TagError::EmptyName);
    }
    if !is_identifier(name) {
        return Err(TagError::BadIdentifier(name.to_string()));
    }
    let options: Vec<&str> = parts.collect();
    if options.len() > 1 {
        return Err(TagError::TooManyOptions);
    }
    let omit_empty = match options.first() {
        None => false,
        Some(&"omitempty") => true,
        Some(other) => return Err(TagError::UnknownOption((*other).to_string())),
    };
    Ok(ParsedTag {
        name: name.to_string(),
        omit_empty,
    })
}
