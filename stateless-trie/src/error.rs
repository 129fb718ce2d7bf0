//! # Error types for the binary trie

use thiserror::Error;

/// Trie error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrieError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid node encoding: {0}")]
    InvalidEncoding(&'static str),

    #[error("Invalid packed path")]
    InvalidPath,

    #[error("Corrupted branch step at position {position}: {reason}")]
    CorruptedBranch {
        position: usize,
        reason: String,
    },

    #[error("Key is a prefix of, or prefixed by, an existing key")]
    KeyPrefixCollision,
}

/// Result type for trie operations
pub type Result<T> = std::result::Result<T, TrieError>;
