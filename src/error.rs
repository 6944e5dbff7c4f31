//! Error types for marginalia
//!
//! Conditions the reading session recovers from on its own (blank selections,
//! duplicate annotations, locations missing from the current view) are not
//! errors and never show up here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReaderError>;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}
