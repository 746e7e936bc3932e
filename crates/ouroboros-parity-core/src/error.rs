//! Error types for the validation core.

use thiserror::Error;

/// Result type alias for parity operations.
pub type Result<T> = std::result::Result<T, ParityError>;

/// Unified error type for the validation engine.
#[derive(Error, Debug, Clone)]
pub enum ParityError {
    /// A configuration record referenced an unknown aggregate/calculated
    /// kind, an unresolved calculated-field input, a random-row request
    /// with no primary keys, or a pushdown request across heterogeneous
    /// engines.
    #[error("config error: {0}")]
    Config(String),

    /// An engine handle's `execute` failed. Surfaced unchanged.
    #[error("engine error: {0}")]
    Engine(String),
}

impl ParityError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}
