//! Error types for the foundation layer

use thiserror::Error;

/// Result type for foundation-layer operations
pub type Result<T> = std::result::Result<T, TypesError>;

/// Errors raised while constructing amounts or loading configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// Amount overflow during arithmetic
    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    /// Amounts are unsigned
    #[error("Amount must not be negative: {value}")]
    NegativeAmount { value: String },

    /// An environment override could not be parsed
    #[error("Invalid value {value:?} for {name}")]
    InvalidEnvVar { name: String, value: String },
}
