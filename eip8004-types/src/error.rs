//! Registry error taxonomy.
//!
//! Every failed precondition aborts the whole operation with exactly one of
//! these errors and none of the operation's effects applied.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Caller lacks the required owner / operator / delegate / validator relation.
    #[error("authorization error: {0}")]
    Authorization(String),
    /// Unknown agent, feedback index or validation request.
    #[error("not found: {0}")]
    NotFound(String),
    /// Argument out of range, required argument empty, or invalid repeated transition.
    #[error("validation error: {0}")]
    Validation(String),
    /// Expired deadline, malformed credential, signer mismatch or failed callback.
    #[error("signature error: {0}")]
    Signature(String),
}

/// Discriminant of a [`RegistryError`], for callers that branch on the class only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authorization,
    NotFound,
    Validation,
    Signature,
}

impl RegistryError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        RegistryError::Authorization(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        RegistryError::NotFound(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        RegistryError::Validation(message.into())
    }

    pub fn signature(message: impl Into<String>) -> Self {
        RegistryError::Signature(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Authorization(_) => ErrorKind::Authorization,
            RegistryError::NotFound(_) => ErrorKind::NotFound,
            RegistryError::Validation(_) => ErrorKind::Validation,
            RegistryError::Signature(_) => ErrorKind::Signature,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RegistryError::Authorization(m)
            | RegistryError::NotFound(m)
            | RegistryError::Validation(m)
            | RegistryError::Signature(m) => m,
        }
    }
}
