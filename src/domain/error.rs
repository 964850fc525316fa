use thiserror::Error;

use super::path::PathKind;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("path `{path}` does not name a {expected}")]
    PathShape { path: String, expected: PathKind },
    #[error("path `{path}` has no segments")]
    EmptyPath { path: String },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("domain invariant violated: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn path_shape(path: impl Into<String>, expected: PathKind) -> Self {
        Self::PathShape {
            path: path.into(),
            expected,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}
