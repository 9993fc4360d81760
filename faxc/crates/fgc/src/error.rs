//! Error types for GC/object-model operations, surfaced by `faxc-vm` as
//! runtime diagnostic kinds: constraint violations, frozen/closed writes,
//! missing keys, and stack discipline violations.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FgcError {
    #[error("key '{0}' not found")]
    KeyNotFound(String),

    #[error("cannot add key '{0}': object is closed")]
    ObjectClosed(String),

    #[error("cannot overwrite key '{0}': object is frozen")]
    ObjectFrozen(String),

    #[error("value does not satisfy constraint on key '{0}'")]
    ConstraintViolation(String),

    #[error("constraint already set on key '{0}'")]
    ConstraintAlreadySet(String),

    #[error("set_constraint requires a constraint argument")]
    NoConstraintGiven,

    #[error("object may not be used as a prototype (NOINHERIT)")]
    NoInherit,

    #[error("VM stack overflow")]
    StackOverflow,

    #[error("stack allocation freed out of order")]
    StackOrderViolation,
}

pub type Result<T> = std::result::Result<T, FgcError>;
