//! Configuration error types.

use thiserror::Error;

/// Errors produced while validating a [`ConfigRecord`](super::ConfigRecord).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The record contains a key the owner does not recognize.
    #[error("unknown option '{key}' for {owner}")]
    UnknownOption {
        /// Name of the component being configured (usually a pass type).
        owner: String,
        /// The unrecognized key.
        key: String,
    },

    /// A recognized key carries a value of the wrong kind or out of range.
    #[error("invalid value for option '{key}' of {owner}: {reason}")]
    InvalidOptionValue {
        /// Name of the component being configured.
        owner: String,
        /// The offending key.
        key: String,
        /// Human readable explanation.
        reason: String,
    },
}

impl ConfigError {
    /// Key the error refers to.
    pub fn key(&self) -> &str {
        match self {
            Self::UnknownOption { key, .. } | Self::InvalidOptionValue { key, .. } => key,
        }
    }
}
