//! # Block Bundle Attacher
//!
//! Applies a block's transactions group by group and attaches a confirmed
//! bundle to each one. Every bundle of a group is anchored at the root the
//! group started from and proves its outcome at the root the group ended at.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use stateless_error::{Error, Result};
use stateless_state::{Env, State, Transaction};
use stateless_trie::TrieDB;
use tracing::{debug, info};

use crate::bundle::{build_confirmed_bundle, TransactionBundle};
use crate::grouper::group_transactions;
use crate::wrapper::Anchor;

/// Bundles attached to one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockBundles {
    pub parent_root: B256,
    pub parent_number: u64,
    pub post_root: B256,
    /// Number of bundles in each group, in order
    pub groups: Vec<usize>,
    pub bundles: Vec<TransactionBundle>,
}

impl BlockBundles {
    /// Number of the block the bundles belong to; `None` past `u64::MAX`
    pub fn block_number(&self) -> Option<u64> {
        self.parent_number.checked_add(1)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::serialization_failed(e.to_string())
                .with_operation("block_bundles::to_json")
                .set_source(e)
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::parse_failed(e.to_string())
                .with_operation("block_bundles::from_json")
                .set_source(e)
        })
    }
}

/// Execute `txs` on top of `parent_root` and attach a confirmed bundle to
/// each transaction.
///
/// Groups are applied strictly in order and committed one at a time. The
/// first group is tagged with `parent_number`, later groups with the
/// intermediate marker, and the final post root with the new block number.
/// Any transaction that does not succeed makes the block invalid.
pub fn attach_bundles<DB: TrieDB>(
    db: &mut DB,
    env: &Env,
    parent_root: B256,
    parent_number: u64,
    txs: &[Transaction],
) -> Result<BlockBundles> {
    let (first_tag, last_tag) = block_tags(parent_number)?;
    let groups = group_transactions(txs);
    let last = groups.len() - 1;

    let mut root = parent_root;
    let mut sizes = Vec::with_capacity(groups.len());
    let mut bundles = Vec::with_capacity(txs.len());

    for (index, group) in groups.iter().enumerate() {
        let pre = if index == 0 {
            Anchor::new(root, first_tag)
        } else {
            Anchor::intermediate(root)
        };

        let mut state = State::new(&mut *db, root, env.clone());
        for tx in group.transactions() {
            let (success, receipt) = state.apply_transaction(tx)?;
            if !success {
                let reason = receipt
                    .failure
                    .map(|failure| failure.to_string())
                    .unwrap_or_default();
                return Err(Error::execution_failure("block contains a failing transaction")
                    .with_operation("attacher::attach_bundles")
                    .with_context("tx", tx.hash().to_string())
                    .with_context("group", index.to_string())
                    .with_context("reason", reason));
            }
        }
        let post_root = state.commit()?;

        let post = if index == last {
            Anchor::new(post_root, last_tag)
        } else {
            Anchor::intermediate(post_root)
        };

        for tx in group.transactions() {
            bundles.push(build_confirmed_bundle(&*db, pre, post, tx, env.coinbase)?);
        }

        debug!(group = index, size = group.len(), root = %post_root, "attached group");
        sizes.push(group.len());
        root = post_root;
    }

    info!(
        block = last_tag,
        transactions = txs.len(),
        groups = sizes.len(),
        root = %root,
        "attached block bundles"
    );

    Ok(BlockBundles {
        parent_root,
        parent_number,
        post_root: root,
        groups: sizes,
        bundles,
    })
}

/// Tags for the first pre-state and the final post-state proofs
fn block_tags(parent_number: u64) -> Result<(i64, i64)> {
    i64::try_from(parent_number)
        .ok()
        .and_then(|first| Some((first, first.checked_add(1)?)))
        .ok_or_else(|| {
            Error::invalid_argument("parent block number out of range")
                .with_operation("attacher::attach_bundles")
                .with_context("parent_number", parent_number.to_string())
        })
}
