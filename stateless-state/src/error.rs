//! State error types
//!
//! Re-exports stateless-error and provides conversions from the trie and RLP
//! layers.

pub use stateless_error::{Error, ErrorKind, ErrorStatus, Result};
use stateless_trie::TrieError;

/// Convert a trie error, keeping it as the source
pub fn from_trie(err: TrieError) -> Error {
    let error = match &err {
        TrieError::NodeNotFound(node) => Error::node_missing(node.clone()),
        TrieError::InvalidEncoding(reason) => Error::invalid_encoding(*reason),
        TrieError::InvalidPath => Error::invalid_encoding("invalid packed path"),
        TrieError::CorruptedBranch { position, reason } => {
            Error::corrupted_branch(*position, reason.clone())
        }
        TrieError::KeyPrefixCollision => {
            Error::invalid_argument("key collides with the prefix of another key")
        }
    };
    error.with_operation("trie").set_source(err)
}

/// Convert an RLP decoding error for the named item
pub fn from_rlp(err: alloy_rlp::Error, what: &'static str) -> Error {
    Error::invalid_encoding(format!("malformed {} rlp: {}", what, err))
        .with_operation("rlp::decode")
        .set_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_trie_maps_kinds() {
        let err = from_trie(TrieError::NodeNotFound("abcd".to_string()));
        assert_eq!(err.kind(), ErrorKind::NodeMissing);
        assert_eq!(err.operation(), "trie");
        assert!(err.source_ref().is_some());

        let err = from_trie(TrieError::CorruptedBranch {
            position: 3,
            reason: "unknown marker 0x09".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::CorruptedBranch);
        assert!(err.kind().is_rejection());

        assert_eq!(
            from_trie(TrieError::InvalidPath).kind(),
            ErrorKind::InvalidEncoding
        );
    }

    #[test]
    fn test_from_rlp() {
        let err = from_rlp(alloy_rlp::Error::InputTooShort, "account");
        assert_eq!(err.kind(), ErrorKind::InvalidEncoding);
        assert!(err.message().contains("account"));
    }
}
