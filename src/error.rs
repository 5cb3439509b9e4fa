use std::path::PathBuf;

use thiserror::Error;

use crate::io::BodyError;

/// Failures surfaced by relation operations.
///
/// Sequencing mistakes (using a relation before it is opened, setting its
/// name twice, ...) are bugs in the caller and panic instead.
#[derive(Debug, Error)]
pub enum RelationError {
    #[error("relation {relation}: value {value} is not in domain {domain} (slot {slot})")]
    ValueNotInDomain {
        relation: String,
        domain: String,
        slot: usize,
        value: String,
    },
    #[error("relation {relation}: index {index} is out of range for domain {domain} of size {size} (slot {slot})")]
    IndexOutOfRange {
        relation: String,
        domain: String,
        slot: usize,
        index: usize,
        size: usize,
    },
    #[error("relation {relation}: domain {domain} (slot {slot}) does not hold values of type {expected}")]
    TypeMismatch {
        relation: String,
        domain: String,
        slot: usize,
        expected: &'static str,
    },
    #[error("relation {relation}: expected a tuple of arity {expected}, got {found}")]
    ArityMismatch {
        relation: String,
        expected: usize,
        found: usize,
    },
    #[error("relation {relation}: cannot combine with {other}: {reason}")]
    Incompatible {
        relation: String,
        other: String,
        reason: String,
    },
    #[error("relation {relation}: cannot access '{}': {source}", .path.display())]
    Io {
        relation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("relation {relation}: malformed file '{}': {message}", .path.display())]
    Format {
        relation: String,
        path: PathBuf,
        message: String,
    },
    #[error("relation {relation}: malformed body in '{}': {source}", .path.display())]
    Body {
        relation: String,
        path: PathBuf,
        #[source]
        source: BodyError,
    },
}
