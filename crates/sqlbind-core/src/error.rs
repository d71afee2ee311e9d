//! The crate's unified error type.
//!
//! Every pipeline stage has its own error enum; this module folds them into
//! one [`Error`] whose `Display` applies the stable, stage-identifying
//! prefixes callers can match on.

use thiserror::Error;

use crate::bind::BindError;
use crate::parse::ParseError;
use crate::primed::{DecodeError, InputError};
use crate::typeinfo::TypeError;

/// Any failure from the parse, bind, prime or decode stages.
#[derive(Debug, Error)]
pub enum Error {
    /// The statement is malformed.
    #[error("cannot parse expression: {0}")]
    Parse(#[from] ParseError),
    /// A marker could not be bound to the supplied host types.
    #[error("cannot prepare statement: {0}")]
    Bind(#[from] BindError),
    /// The supplied input values do not match the statement.
    #[error("invalid input parameter: {0}")]
    Input(#[from] InputError),
    /// A result row could not be decoded into the destinations.
    #[error("cannot decode result: {0}")]
    Decode(#[from] DecodeError),
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Self::Bind(BindError::Type(err))
    }
}

/// Result type alias for sqlbind operations.
pub type Result<T> = std::result::Result<T, Error>;
