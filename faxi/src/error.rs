//! Error handling for the REPL binary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaxiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, FaxiError>;
