//! # Binary Trie Node Types
//!
//! The binary trie has three stored node types plus the blank node:
//! 1. Leaf - stores the value at a full key
//! 2. Kv - a compressed path fragment leading to a single child
//! 3. Branch - two children, left for bit 0 and right for bit 1
//!
//! Encodings are a one byte type tag followed by the payload; children are
//! always referenced by hash.

use crate::bits::BitPath;
use crate::error::{Result, TrieError};
use alloy_primitives::{keccak256, B256};

/// Type tag of a Kv node
pub const KV_TYPE: u8 = 0;
/// Type tag of a Branch node
pub const BRANCH_TYPE: u8 = 1;
/// Type tag of a Leaf node
pub const LEAF_TYPE: u8 = 2;

/// Binary trie node types
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Node {
    /// Empty node, encoded as zero bytes
    #[default]
    Blank,

    /// Leaf node: [LEAF_TYPE, value..]
    Leaf { value: Vec<u8> },

    /// Kv node: [KV_TYPE, packed_path.., child_hash]
    Kv { path: BitPath, child: B256 },

    /// Branch node: [BRANCH_TYPE, left_hash, right_hash]
    Branch { left: B256, right: B256 },
}

impl Node {
    /// Create leaf node
    pub fn leaf(value: Vec<u8>) -> Self {
        Node::Leaf { value }
    }

    /// Create kv node
    pub fn kv(path: BitPath, child: B256) -> Self {
        debug_assert!(!path.is_empty(), "kv node with empty path");
        Node::Kv { path, child }
    }

    /// Create branch node
    pub fn branch(left: B256, right: B256) -> Self {
        Node::Branch { left, right }
    }

    /// Check if node is blank
    pub fn is_blank(&self) -> bool {
        matches!(self, Node::Blank)
    }

    /// Encode this node
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Node::Blank => Vec::new(),

            Node::Leaf { value } => {
                let mut out = Vec::with_capacity(1 + value.len());
                out.push(LEAF_TYPE);
                out.extend_from_slice(value);
                out
            }

            Node::Kv { path, child } => {
                let packed = path.to_packed();
                let mut out = Vec::with_capacity(1 + packed.len() + 32);
                out.push(KV_TYPE);
                out.extend_from_slice(&packed);
                out.extend_from_slice(child.as_slice());
                out
            }

            Node::Branch { left, right } => {
                let mut out = Vec::with_capacity(65);
                out.push(BRANCH_TYPE);
                out.extend_from_slice(left.as_slice());
                out.extend_from_slice(right.as_slice());
                out
            }
        }
    }

    /// Decode a node from its stored encoding
    pub fn decode(data: &[u8]) -> Result<Self> {
        let Some((&tag, payload)) = data.split_first() else {
            return Ok(Node::Blank);
        };

        match tag {
            KV_TYPE => {
                // pad byte + at least one path byte + child hash
                if payload.len() < 2 + 32 {
                    return Err(TrieError::InvalidEncoding("kv node too short"));
                }
                let (packed, child) = payload.split_at(payload.len() - 32);
                let path = BitPath::from_packed(packed)?;
                if path.is_empty() {
                    return Err(TrieError::InvalidEncoding("kv node with empty path"));
                }
                Ok(Node::Kv {
                    path,
                    child: B256::from_slice(child),
                })
            }

            BRANCH_TYPE => {
                if payload.len() != 64 {
                    return Err(TrieError::InvalidEncoding("branch node must hold two hashes"));
                }
                Ok(Node::Branch {
                    left: B256::from_slice(&payload[..32]),
                    right: B256::from_slice(&payload[32..]),
                })
            }

            LEAF_TYPE => {
                if payload.is_empty() {
                    return Err(TrieError::InvalidEncoding("leaf node without value"));
                }
                Ok(Node::Leaf {
                    value: payload.to_vec(),
                })
            }

            _ => Err(TrieError::InvalidEncoding("unknown node type")),
        }
    }

    /// Get hash of this node
    pub fn hash(&self) -> B256 {
        keccak256(self.encode())
    }
}
