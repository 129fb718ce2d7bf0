//! Error status: how a caller should treat an error

use std::fmt;

use crate::ErrorKind;

/// Whether an operation that failed with this error may succeed if repeated.
///
/// Nothing in the stateless client retries on its own; the status is advice
/// for whoever drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorStatus {
    #[default]
    Permanent,
    Temporary,
}

impl ErrorStatus {
    /// Default status for an error of `kind`
    pub fn from_kind(kind: ErrorKind) -> Self {
        if kind.is_retryable() {
            ErrorStatus::Temporary
        } else {
            ErrorStatus::Permanent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStatus::Permanent => "permanent",
            ErrorStatus::Temporary => "temporary",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorStatus::Temporary)
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
