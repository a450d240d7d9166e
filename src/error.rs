//! Error types for floorproof
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::llm::LlmError;

/// All error types that can occur while proofing a drawing
#[derive(Debug, Error)]
pub enum ProofError {
    /// Drawing host could not be reached
    #[error("Drawing host unreachable: {0}")]
    ConnectionFailure(String),

    /// Plan document could not be decoded
    #[error("Malformed plan: {0}")]
    MalformedPlan(String),

    /// A drawing host operation failed
    #[error("Drawing host error: {0}")]
    Host(String),

    /// Reserved-namespace command with missing or invalid arguments
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Layer mapping persistence error
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Language-model service error
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for floorproof operations
pub type Result<T> = std::result::Result<T, ProofError>;
