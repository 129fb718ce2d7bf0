//! # Merkle Branches
//!
//! A compact proof for one key: the path fragments and sibling hashes met on
//! the way from the root down, followed by the raw terminal node. Each step
//! travels as `marker || payload` so unknown markers survive transport and
//! are rejected when the branch is used.

use alloy_primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::bits::BitPath;
use crate::error::{Result, TrieError};
use crate::node::Node;
use crate::trie::{get, hash_and_save, MemoryDB};

/// Marker of the terminal step
pub const LEAF_MARKER: u8 = 0x00;
/// Marker of a kv path fragment step
pub const KV_MARKER: u8 = 0x01;
/// Marker of a step where the path goes left (right sibling given)
pub const LEFT_MARKER: u8 = 0x02;
/// Marker of a step where the path goes right (left sibling given)
pub const RIGHT_MARKER: u8 = 0x03;

/// One decoded step of a [`MerkleBranch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchStep {
    /// Raw bytes of the terminal node
    Leaf(Bytes),
    /// Packed path fragment of a kv node
    KvExtension(Bytes),
    /// Path continues into the left child; payload is the right sibling
    BranchLeft(B256),
    /// Path continues into the right child; payload is the left sibling
    BranchRight(B256),
}

impl BranchStep {
    /// Wire marker of this step
    pub fn marker(&self) -> u8 {
        match self {
            BranchStep::Leaf(_) => LEAF_MARKER,
            BranchStep::KvExtension(_) => KV_MARKER,
            BranchStep::BranchLeft(_) => LEFT_MARKER,
            BranchStep::BranchRight(_) => RIGHT_MARKER,
        }
    }

    /// Encode as `marker || payload`
    pub fn encode(&self) -> Bytes {
        let payload: &[u8] = match self {
            BranchStep::Leaf(node) => node,
            BranchStep::KvExtension(path) => path,
            BranchStep::BranchLeft(sibling) | BranchStep::BranchRight(sibling) => {
                sibling.as_slice()
            }
        };

        let mut out = Vec::with_capacity(1 + payload.len());
        out.push(self.marker());
        out.extend_from_slice(payload);
        out.into()
    }

    /// Decode the step found at `position` of a branch
    pub fn decode(raw: &[u8], position: usize) -> Result<Self> {
        let corrupted = |reason: String| TrieError::CorruptedBranch { position, reason };

        let (&marker, payload) = raw
            .split_first()
            .ok_or_else(|| corrupted("empty step".to_string()))?;

        match marker {
            LEAF_MARKER => Ok(BranchStep::Leaf(Bytes::copy_from_slice(payload))),
            KV_MARKER => Ok(BranchStep::KvExtension(Bytes::copy_from_slice(payload))),
            LEFT_MARKER | RIGHT_MARKER => {
                if payload.len() != 32 {
                    return Err(corrupted(format!(
                        "sibling hash has {} bytes",
                        payload.len()
                    )));
                }
                let sibling = B256::from_slice(payload);
                Ok(if marker == LEFT_MARKER {
                    BranchStep::BranchLeft(sibling)
                } else {
                    BranchStep::BranchRight(sibling)
                })
            }
            other => Err(corrupted(format!("unknown marker {:#04x}", other))),
        }
    }
}

/// Ordered branch steps, root side first, terminal node last
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerkleBranch {
    steps: Vec<Bytes>,
}

impl MerkleBranch {
    /// Build from decoded steps
    pub fn from_steps(steps: &[BranchStep]) -> Self {
        MerkleBranch {
            steps: steps.iter().map(BranchStep::encode).collect(),
        }
    }

    /// Build from wire steps, without validating them
    pub fn from_raw(steps: Vec<Bytes>) -> Self {
        MerkleBranch { steps }
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the branch has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Wire steps
    pub fn raw_steps(&self) -> &[Bytes] {
        &self.steps
    }

    /// Mutable wire steps
    pub fn raw_steps_mut(&mut self) -> &mut Vec<Bytes> {
        &mut self.steps
    }

    /// Decode the step at `position`
    pub fn step(&self, position: usize) -> Result<BranchStep> {
        let raw = self.steps.get(position).ok_or_else(|| TrieError::CorruptedBranch {
            position,
            reason: "no such step".to_string(),
        })?;
        BranchStep::decode(raw, position)
    }
}

/// Check that `branch` proves `key` holds `value` under `root`.
///
/// An empty `value` asks for an exclusion proof. The branch is rebuilt into a
/// scratch store, its top hash must equal `root`, and walking `key` through
/// the rebuilt nodes must yield exactly `value`.
pub fn verify_branch(branch: &MerkleBranch, root: B256, key: &BitPath, value: &[u8]) -> bool {
    let Some((terminal, path)) = branch.raw_steps().split_last() else {
        return false;
    };

    let mut db = MemoryDB::new();

    let Ok(BranchStep::Leaf(node)) = BranchStep::decode(terminal, path.len()) else {
        return false;
    };
    let mut cursor = hash_and_save(&mut db, node.to_vec());

    for (position, raw) in path.iter().enumerate().rev() {
        let parent = match BranchStep::decode(raw, position) {
            Ok(BranchStep::KvExtension(packed)) => match BitPath::from_packed(&packed) {
                Ok(fragment) => Node::kv(fragment, cursor),
                Err(_) => return false,
            },
            Ok(BranchStep::BranchLeft(sibling)) => Node::branch(cursor, sibling),
            Ok(BranchStep::BranchRight(sibling)) => Node::branch(sibling, cursor),
            Ok(BranchStep::Leaf(_)) | Err(_) => return false,
        };
        cursor = hash_and_save(&mut db, parent.encode());
    }

    if cursor != root {
        return false;
    }

    matches!(get(&db, root, key), Ok(found) if found == value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::{encode_key, BinaryTrie, BLANK_ROOT};
    use alloy_primitives::keccak256;

    fn key(n: u8) -> B256 {
        keccak256([n])
    }

    fn populated() -> BinaryTrie<MemoryDB> {
        let mut trie = BinaryTrie::new_memory();
        for n in 0..32u8 {
            trie.insert(key(n).as_slice(), format!("value{}", n).into_bytes())
                .unwrap();
        }
        trie
    }

    #[test]
    fn test_step_roundtrip_keeps_marker() {
        let steps = [
            BranchStep::KvExtension(BitPath::from_raw(vec![1, 0]).to_packed().into()),
            BranchStep::BranchLeft(keccak256(b"r")),
            BranchStep::BranchRight(keccak256(b"l")),
            BranchStep::Leaf(Bytes::from_static(b"\x02leaf")),
        ];

        let branch = MerkleBranch::from_steps(&steps);
        for (position, step) in steps.iter().enumerate() {
            assert_eq!(&branch.step(position).unwrap(), step);
        }
        assert_eq!(branch.raw_steps()[1][0], LEFT_MARKER);
    }

    #[test]
    fn test_unknown_marker_is_corrupted() {
        let err = BranchStep::decode(&[0x07, 1, 2], 4).unwrap_err();
        assert!(matches!(err, TrieError::CorruptedBranch { position: 4, .. }));

        assert!(BranchStep::decode(&[], 0).is_err());
        assert!(BranchStep::decode(&[LEFT_MARKER, 1, 2, 3], 0).is_err());
    }

    #[test]
    fn test_inclusion_proofs_verify() {
        let trie = populated();
        let root = trie.root_hash();

        for n in [0u8, 5, 17, 31] {
            let branch = trie.proof(key(n).as_slice()).unwrap();
            let value = format!("value{}", n).into_bytes();

            assert!(branch.len() > 1, "populated trie should give multi-step branches");
            assert!(verify_branch(&branch, root, &encode_key(key(n).as_slice()), &value));
        }
    }

    #[test]
    fn test_exclusion_proof_verifies_empty_value() {
        let trie = populated();
        let root = trie.root_hash();
        let absent = key(200);

        let branch = trie.proof(absent.as_slice()).unwrap();
        assert!(verify_branch(&branch, root, &encode_key(absent.as_slice()), &[]));
        assert!(!verify_branch(&branch, root, &encode_key(absent.as_slice()), b"value0"));
    }

    #[test]
    fn test_empty_trie_exclusion() {
        let trie = BinaryTrie::new_memory();
        let branch = trie.proof(key(1).as_slice()).unwrap();

        assert_eq!(branch.len(), 1);
        assert!(verify_branch(&branch, BLANK_ROOT, &encode_key(key(1).as_slice()), &[]));
    }

    #[test]
    fn test_tampered_value_fails() {
        let trie = populated();
        let root = trie.root_hash();
        let branch = trie.proof(key(3).as_slice()).unwrap();

        assert!(!verify_branch(&branch, root, &encode_key(key(3).as_slice()), b"value4"));
        assert!(!verify_branch(&branch, root, &encode_key(key(3).as_slice()), &[]));
    }

    #[test]
    fn test_wrong_key_or_root_fails() {
        let trie = populated();
        let root = trie.root_hash();
        let branch = trie.proof(key(3).as_slice()).unwrap();

        assert!(!verify_branch(&branch, root, &encode_key(key(4).as_slice()), b"value3"));
        assert!(!verify_branch(&branch, keccak256(b"other"), &encode_key(key(3).as_slice()), b"value3"));
    }

    #[test]
    fn test_tampered_sibling_fails() {
        let trie = populated();
        let root = trie.root_hash();
        let mut branch = trie.proof(key(9).as_slice()).unwrap();

        let position = (0..branch.len())
            .find(|i| matches!(branch.step(*i), Ok(BranchStep::BranchLeft(_) | BranchStep::BranchRight(_))))
            .unwrap();
        let mut raw = branch.raw_steps()[position].to_vec();
        raw[5] ^= 0xff;
        branch.raw_steps_mut()[position] = raw.into();

        assert!(!verify_branch(&branch, root, &encode_key(key(9).as_slice()), b"value9"));
    }

    #[test]
    fn test_proof_after_update() {
        let mut trie = populated();
        let root1 = trie.root_hash();
        let proof1 = trie.proof(key(1).as_slice()).unwrap();

        trie.insert(key(1).as_slice(), b"changed".to_vec()).unwrap();
        let root2 = trie.root_hash();
        let path = encode_key(key(1).as_slice());

        assert!(verify_branch(&proof1, root1, &path, b"value1"));
        assert!(!verify_branch(&proof1, root2, &path, b"value1"));
        assert!(verify_branch(&trie.proof(key(1).as_slice()).unwrap(), root2, &path, b"changed"));
    }

    #[test]
    fn test_branch_serde_is_hex_array() {
        let trie = populated();
        let branch = trie.proof(key(2).as_slice()).unwrap();

        let json = serde_json::to_string(&branch).unwrap();
        assert!(json.starts_with("[\"0x"));

        let back: MerkleBranch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, branch);
    }
}
