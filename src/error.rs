//! Error kinds for the flowgraph engine.
//!
//! Every kind named in the design (structural, validation, block,
//! cancelled, empty) is a variant here rather than a distinct type: a
//! caller matches on `FlowError` the same way the executor does
//! internally.

use thiserror::Error;

pub type FlowResult<T> = Result<T, FlowError>;

#[derive(Error, Debug)]
pub enum FlowError {
    /// Invalid connect/disconnect: cycle, duplicate name, disconnected
    /// dag, duplicate edge, bad field prefix. Raised synchronously by
    /// the builder; no state change happens before this is returned.
    #[error("structural error: {0}")]
    Structural(String),

    /// A parameter assignment failed a type/constraint check, or a
    /// block's `prepare`/`execute` raised a user-visible validation
    /// fault. Does not set the dag's cancellation flag.
    #[error("validation error in block '{block}': {message}")]
    Validation { block: String, message: String },

    /// Any other fault during `prepare`/`execute`. Sets the
    /// cancellation flag and wraps the original cause.
    #[error("block '{block}' failed: {source}")]
    Block {
        block: String,
        #[source]
        source: Box<FlowError>,
    },

    /// `execute` observed the cancellation flag.
    #[error("dag execution was cancelled")]
    Cancelled,

    /// `execute` was called with nothing queued to run.
    #[error("dag has nothing to execute")]
    Empty,

    /// Failure parsing a YAML dag description.
    #[error("failed to parse dag description: {0}")]
    Parse(String),

    /// A library/registry lookup failed (unknown key, duplicate key).
    #[error("registry error: {0}")]
    Registry(String),

    /// Serialization/deserialization of a dag dump failed.
    #[error("serialization error: {0}")]
    Serde(String),
}

impl FlowError {
    pub fn structural(msg: impl Into<String>) -> Self {
        FlowError::Structural(msg.into())
    }

    pub fn validation(block: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::Validation {
            block: block.into(),
            message: message.into(),
        }
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        FlowError::Registry(msg.into())
    }

    /// True for validation faults, which must not poison the dag.
    pub fn is_validation(&self) -> bool {
        matches!(self, FlowError::Validation { .. })
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(e: serde_json::Error) -> Self {
        FlowError::Serde(e.to_string())
    }
}
