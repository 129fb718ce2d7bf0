//! # Branch Codec
//!
//! Fetches compact branches from a node store and rebuilds trie nodes from
//! them. Rebuilding persists every node on the path, not only the leaf, so
//! trie reads against the rebuilt store resolve the same way they would
//! against the full state.

use alloy_primitives::B256;
use stateless_error::{Error, Result};
use stateless_state::error::from_trie;
use stateless_trie::{self as trie, encode_key, hash_and_save, BitPath, BranchStep, MerkleBranch, Node, TrieDB};
use tracing::trace;

/// Branch proving the value stored at `key` under `root`.
///
/// Fails with `NotFound` when the key is absent; use
/// [`get_exclusion_branch`] to prove absence.
pub fn get_branch<DB: TrieDB + ?Sized>(db: &DB, root: B256, key: &B256) -> Result<MerkleBranch> {
    let path = encode_key(key.as_slice());
    let value = trie::get(db, root, &path)
        .map_err(|e| from_trie(e).with_operation("codec::get_branch"))?;
    if value.is_empty() {
        return Err(Error::not_found(key.to_string())
            .with_operation("codec::get_branch")
            .with_context("root", root.to_string()));
    }

    trie::get_branch(db, root, &path).map_err(|e| from_trie(e).with_operation("codec::get_branch"))
}

/// Branch proving that nothing is stored at `key` under `root`.
///
/// The branch ends where the key leaves the trie. Fails with
/// `InvalidArgument` when the key is present.
pub fn get_exclusion_branch<DB: TrieDB + ?Sized>(
    db: &DB,
    root: B256,
    key: &B256,
) -> Result<MerkleBranch> {
    let path = encode_key(key.as_slice());
    let value = trie::get(db, root, &path)
        .map_err(|e| from_trie(e).with_operation("codec::get_exclusion_branch"))?;
    if !value.is_empty() {
        return Err(Error::invalid_argument("cannot prove absence of a present key")
            .with_operation("codec::get_exclusion_branch")
            .with_context("key", key.to_string()));
    }

    trie::get_branch(db, root, &path)
        .map_err(|e| from_trie(e).with_operation("codec::get_exclusion_branch"))
}

/// Rebuild every node of `branch` into `db`, returning the top hash.
///
/// The last step must be the terminal node; every earlier step must be a kv
/// fragment or a branch fork. Anything else is a `CorruptedBranch` error
/// raised before the offending step is stored. Whether the returned hash is
/// the expected root is for the caller to check.
pub fn reconstruct_and_store<DB: TrieDB + ?Sized>(db: &mut DB, branch: &MerkleBranch) -> Result<B256> {
    let (terminal, path) = branch
        .raw_steps()
        .split_last()
        .ok_or_else(|| Error::corrupted_branch(0, "empty branch"))?;

    let terminal_position = path.len();
    let mut cursor = match decode_step(terminal, terminal_position)? {
        BranchStep::Leaf(node) => hash_and_save(db, node.to_vec()),
        other => {
            return Err(Error::corrupted_branch(
                terminal_position,
                format!("branch ends with marker {:#04x} instead of a leaf", other.marker()),
            ))
        }
    };

    for (position, raw) in path.iter().enumerate().rev() {
        let node = match decode_step(raw, position)? {
            BranchStep::KvExtension(packed) => {
                let fragment = BitPath::from_packed(&packed)
                    .map_err(|_| Error::corrupted_branch(position, "invalid packed path"))?;
                Node::kv(fragment, cursor)
            }
            BranchStep::BranchLeft(sibling) => Node::branch(cursor, sibling),
            BranchStep::BranchRight(sibling) => Node::branch(sibling, cursor),
            BranchStep::Leaf(_) => {
                return Err(Error::corrupted_branch(position, "leaf step before the end of the branch"))
            }
        };
        cursor = hash_and_save(db, node.encode());
        trace!(position, node = %cursor, "stored branch node");
    }

    Ok(cursor)
}

/// Check that `branch` proves `value` (empty for absence) at `key` under
/// `root`. Pure: nothing is stored.
pub fn verify_branch(branch: &MerkleBranch, root: B256, key: &B256, value: &[u8]) -> bool {
    trie::verify_branch(branch, root, &encode_key(key.as_slice()), value)
}

fn decode_step(raw: &[u8], position: usize) -> Result<BranchStep> {
    BranchStep::decode(raw, position)
        .map_err(|e| from_trie(e).with_operation("codec::reconstruct_and_store"))
}
