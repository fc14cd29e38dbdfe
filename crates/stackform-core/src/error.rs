//! Error taxonomy for the composition pipeline
//!
//! All variants are declaration/resolution-time failures. None of them is
//! recoverable within a single run: the caller fixes the declaration and
//! reruns. Emission is all-or-nothing, so no error here can leave a partial
//! template behind.

use thiserror::Error;

/// Main error type for graph construction, resolution, and emission
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("duplicate resource id '{0}' in declaration graph")]
    DuplicateId(String),

    #[error("'{referrer}' references unknown resource '{target}'")]
    UnknownResource { referrer: String, target: String },

    #[error("cyclic dependency detected:\n{explanation}")]
    CyclicDependency { explanation: String },

    #[error("invalid config for '{id}': {reason}")]
    InvalidConfig { id: String, reason: String },
}

impl ComposeError {
    pub fn unknown(referrer: impl Into<String>, target: impl Into<String>) -> Self {
        ComposeError::UnknownResource {
            referrer: referrer.into(),
            target: target.into(),
        }
    }

    pub fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        ComposeError::InvalidConfig {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
