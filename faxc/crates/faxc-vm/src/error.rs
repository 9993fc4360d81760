//! Runtime diagnostic kinds. There is no typed exception hierarchy the
//! language itself can catch — every one of these becomes a formatted
//! string message on [`crate::state::VMState`], per spec's error model.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("arity violation in call: expected {expected}, got {got}")]
    ArityViolation { expected: usize, got: usize },

    #[error("object is neither function nor closure")]
    NotCallable,

    #[error("assignment to null object")]
    AssignToNull,

    #[error("access on null")]
    AccessOnNull,

    #[error("property not found: '{0}'")]
    PropertyNotFound(String),

    #[error("property not found")]
    PropertyNotFoundAnonymous,

    #[error("key is not a string and no '{0}' overload is set")]
    NonStringKeyNoOverload(String),

    #[error("'in' key is not a string")]
    InKeyNotString,

    #[error("constraint key must be a string")]
    ConstraintKeyNotString,

    #[error("cannot inherit from object marked no-inherit")]
    NoInherit,

    #[error("{0}")]
    Fgc(#[from] fgc::FgcError),

    #[error("VM stack overflow")]
    StackOverflow,

    #[error("invalid function: no instructions")]
    EmptyFunction,

    #[error("{0} overload failed: {1}")]
    OverloadFailed(&'static str, String),

    #[error("native call failed: {0}")]
    Native(String),

    #[error("ffi error: {0}")]
    Ffi(String),

    #[error("bad assignment target")]
    BadAssignTarget,

    #[error("internal slot error")]
    SlotError,
}

pub type Result<T> = std::result::Result<T, VmError>;
