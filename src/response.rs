use crate::error::{ErrorKind, VaultError};
use serde::Serialize;

/// Result envelope returned by every facade operation
///
/// Serializes as `{"status": "ok" | "unchanged" | "error", "data": ...}`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Response<T> {
    Ok(T),
    /// Already in the requested state (installed, or already absent)
    Unchanged { message: String },
    Error { kind: ErrorKind, message: String },
}

impl<T> Response<T> {
    #[must_use]
    pub fn unchanged(message: impl Into<String>) -> Self {
        Self::Unchanged {
            message: message.into(),
        }
    }

    /// `true` unless the operation failed
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Payload of an `Ok` response
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Ok(data) => Some(data),
            _ => None,
        }
    }
}

impl<T> From<VaultError> for Response<T> {
    fn from(err: VaultError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl<T> From<crate::error::Result<T>> for Response<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(data) => Self::Ok(data),
            Err(e) => e.into(),
        }
    }
}
