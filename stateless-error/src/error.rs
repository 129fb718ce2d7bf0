//! The main Error type for the stateless client

use crate::{ErrorKind, ErrorStatus};
use std::fmt;

/// Error returned by proof building, bundle verification and everything
/// that drives them.
///
/// Besides its [`ErrorKind`] an error records the operation that raised it,
/// the operations it passed through on the way up (as `called` context),
/// free-form key/value context and an optional source.
///
/// ```rust
/// use stateless_error::{Error, ErrorKind, ErrorStatus};
///
/// let err = Error::node_missing("0x1234")
///     .with_operation("state::account")
///     .with_context("root", "0xabcd");
///
/// assert_eq!(err.kind(), ErrorKind::NodeMissing);
/// assert_eq!(err.status(), ErrorStatus::Permanent);
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: ErrorStatus::from_kind(kind),
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    pub fn source_ref(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }

    /// Record the operation raising this error. A previously recorded
    /// operation is kept in context under `called`.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        if !self.operation.is_empty() {
            self.context.push(("called", self.operation.to_string()));
        }
        self.operation = operation;
        self
    }

    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Attach the underlying error. Only one source may be set.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// A key that was expected to be present is absent
    pub fn not_found(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(ErrorKind::NotFound, format!("key {} not found", key)).with_context("key", key)
    }

    pub fn node_missing(node: impl Into<String>) -> Self {
        let node = node.into();
        Self::new(ErrorKind::NodeMissing, format!("trie node {} not in store", node))
            .with_context("node", node)
    }

    /// The branch step at `position` cannot be used
    pub fn corrupted_branch(position: usize, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::CorruptedBranch, reason)
            .with_context("position", position.to_string())
    }

    pub fn invalid_bundle(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidBundle, message)
    }

    pub fn execution_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExecutionFailure, message)
    }

    pub fn invalid_encoding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidEncoding, message)
    }

    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailed, message)
    }

    pub fn serialization_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationFailed, message)
    }
}

/// Single line, for logs: `Kind (status) at op [k: v, ...] => message`
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.status)?;
        if !self.operation.is_empty() {
            write!(f, " at {}", self.operation)?;
        }

        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(key, value)| format!("{}: {}", key, value))
                .collect();
            write!(f, " [{}]", pairs.join(", "))?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({}) at {}", self.kind, self.status, self.operation)?;
        if !self.message.is_empty() {
            writeln!(f, "    message: {}", self.message)?;
        }
        for (key, value) in &self.context {
            writeln!(f, "    {}: {}", key, value)?;
        }
        if let Some(source) = &self.source {
            writeln!(f, "    source: {:?}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// The one blanket conversion: file access from the CLI and config loading.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            _ => ErrorKind::IoFailed,
        };
        Error::new(kind, err.to_string())
            .with_operation("io")
            .set_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::invalid_bundle("claimed root mismatch");
        assert_eq!(err.kind(), ErrorKind::InvalidBundle);
        assert_eq!(err.message(), "claimed root mismatch");
        assert_eq!(err.status(), ErrorStatus::Permanent);
        assert!(err.operation().is_empty());
    }

    #[test]
    fn test_operation_chaining() {
        let err = Error::new(ErrorKind::NodeMissing, "missing")
            .with_operation("state::account")
            .with_operation("verifier::replay");

        assert_eq!(err.operation(), "verifier::replay");
        assert_eq!(err.context(), &[("called", "state::account".to_string())]);
    }

    #[test]
    fn test_retryable_follows_kind() {
        assert!(Error::new(ErrorKind::StorageFailed, "store busy").is_retryable());
        assert!(!Error::corrupted_branch(0, "bad marker").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = Error::new(ErrorKind::StorageFailed, "write rejected")
            .with_operation("state::commit")
            .with_context("root", "0xabc")
            .with_context("accounts", "3");

        assert_eq!(
            err.to_string(),
            "StorageFailed (temporary) at state::commit [root: 0xabc, accounts: 3] => write rejected"
        );
        assert_eq!(
            Error::invalid_bundle("bad").to_string(),
            "InvalidBundle (permanent) => bad"
        );
    }

    #[test]
    fn test_convenience_constructors() {
        let err = Error::not_found("0xdead");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.message().contains("0xdead"));

        let err = Error::corrupted_branch(2, "unknown marker 0x07");
        assert_eq!(err.kind(), ErrorKind::CorruptedBranch);
        assert_eq!(err.context()[0], ("position", "2".to_string()));
        assert!(err.kind().is_rejection());
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: Error = io_err.into();

        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert_eq!(err.operation(), "io");
        assert!(err.source_ref().is_some());

        let err: Error = std::io::Error::other("boom").into();
        assert_eq!(err.kind(), ErrorKind::IoFailed);
    }
}
