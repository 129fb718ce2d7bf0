//! # Binary Merkle Trie
//!
//! A binary (radix-2) Merkle trie used as the account state commitment.
//!
//! Keys are expanded into bit paths; nodes are one of:
//! - Leaf - the value stored at a full key
//! - Kv - a compressed run of path bits pointing at one child
//! - Branch - a left (0) / right (1) fork
//!
//! Every node is stored under the keccak256 of its encoding, so a compact
//! [`MerkleBranch`] (path fragments plus sibling hashes) is enough to rebuild
//! every node on the path from the root to a key.

pub mod bits;
pub mod node;
pub mod trie;
pub mod proof;
pub mod error;

pub use bits::BitPath;
pub use node::Node;
pub use trie::{
    encode_key, get, get_branch, hash_and_save, update, BinaryTrie, MemoryDB, TrieDB, BLANK_ROOT,
};
pub use proof::{verify_branch, BranchStep, MerkleBranch};
pub use error::{Result, TrieError};
