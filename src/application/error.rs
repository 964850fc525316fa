use thiserror::Error;

use crate::domain::error::DomainError;

use super::remote::RemoteError;

/// Crate-level error: a thin wrapper over the layer errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
