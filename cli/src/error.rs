#![deny(missing_docs)]

//! # CLI Errors
//!
//! Error types for the CLI crate.

use derive_more::{Display, From};
use odata_core::AppError;

/// Main error enum for CLI operations.
#[derive(Debug, Display, From)]
pub enum CliError {
    /// IO Error wrapper.
    #[display("IO Error: {}", _0)]
    Io(std::io::Error),

    /// Payload or output JSON could not be read or written.
    #[display("JSON Error: {}", _0)]
    Json(serde_json::Error),

    /// Metadata or codec failure from the core library.
    #[display("{}", _0)]
    App(AppError),

    /// General failure message.
    #[display("Operation failed: {}", _0)]
    General(String),
}

impl From<odata_core::ParseError> for CliError {
    fn from(err: odata_core::ParseError) -> Self {
        CliError::App(err.into())
    }
}

impl From<odata_core::CodecError> for CliError {
    fn from(err: odata_core::CodecError) -> Self {
        CliError::App(err.into())
    }
}

impl std::error::Error for CliError {}

/// Result type alias.
pub type CliResult<T> = Result<T, CliError>;
