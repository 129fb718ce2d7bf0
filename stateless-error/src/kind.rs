//! Error kinds for stateless client operations

use std::fmt;

/// What went wrong.
///
/// Kinds split into two families. Rejections say a bundle or branch handed
/// to us is unacceptable; everything else is a local fault or a bad input
/// file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Invalid argument passed to function
    InvalidArgument,

    // Trie and proofs
    /// A key was absent where its presence was assumed
    NotFound,
    /// A trie node referenced by hash is not in the store
    NodeMissing,
    /// A merkle branch step carries an unknown or misplaced discriminant
    CorruptedBranch,
    /// A trie node, account or transaction could not be decoded
    InvalidEncoding,

    // Bundles
    /// A bundle's claimed root or one of its proofs failed verification
    InvalidBundle,
    /// A transaction failed in the execution engine
    ExecutionFailure,

    // Storage and files
    StorageFailed,
    SerializationFailed,
    FileNotFound,
    IoFailed,
    /// Input file or JSON document could not be parsed
    ParseFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::NodeMissing => "NodeMissing",
            ErrorKind::CorruptedBranch => "CorruptedBranch",
            ErrorKind::InvalidEncoding => "InvalidEncoding",
            ErrorKind::InvalidBundle => "InvalidBundle",
            ErrorKind::ExecutionFailure => "ExecutionFailure",
            ErrorKind::StorageFailed => "StorageFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::ParseFailed => "ParseFailed",
        }
    }

    /// Kinds that may clear up if the operation is repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::StorageFailed | ErrorKind::IoFailed)
    }

    /// Kinds that mean "the input is not acceptable" rather than
    /// "something is wrong locally"
    pub fn is_rejection(&self) -> bool {
        matches!(self, ErrorKind::InvalidBundle | ErrorKind::CorruptedBranch)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
