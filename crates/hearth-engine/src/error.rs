//! Error types for hearth-engine operations.
//!
//! The calendar algorithms themselves never fail: malformed rules become "no
//! recurrence", broken VEVENTs are dropped, runaway expansions are truncated.
//! These errors belong to the helpers at the edges (zone resolution, payload
//! decoding) where a caller really does need to know what went wrong.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HearthError {
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),

    #[error("Invalid RRULE: {0}")]
    InvalidRule(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Failure to turn an untyped payload into a typed record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, HearthError>;
