//! Error types for the analysis pipeline.

use thiserror::Error;

/// Errors from the structured generation boundary.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Transport failure talking to the generation service
    #[error("generation transport error: {0}")]
    Transport(String),

    /// Response was not valid JSON for the expected shape
    #[error("malformed generation response: {0}")]
    Malformed(String),

    /// Response parsed but violates the stage's response contract
    #[error("generation response violates contract: {0}")]
    Contract(String),

    /// The stage's own schema definition is invalid
    #[error("invalid response schema: {0}")]
    Schema(String),
}

/// Errors from the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Referenced legislative item does not exist
    #[error("item {0} not found")]
    ItemNotFound(i64),

    /// Referenced version record does not exist
    #[error("version {0} not found")]
    VersionNotFound(i64),

    /// Version record already reached a terminal status
    #[error("version {0} is already terminal")]
    VersionTerminal(i64),

    /// Backend write or read failure
    #[error("storage failure: {0}")]
    Backend(String),
}

/// Errors that can fail an analysis run.
#[derive(Error, Debug)]
pub enum Error {
    /// Structured generation call failed
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Persistence call failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// No completed source reports with non-empty opinions exist
    #[error("no completed reports with opinions for item {0}")]
    EmptyInput(i64),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
