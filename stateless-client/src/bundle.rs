//! # Transaction Bundles
//!
//! Everything a stateless client needs to check one transaction: the
//! transaction itself and a proof for each account it touches.
//!
//! A pending bundle proves the read and write sets at the latest root. A
//! confirmed bundle additionally proves the coinbase, and carries proofs of
//! every touched account at the root after execution.

use std::collections::BTreeMap;

use alloy_primitives::{keccak256, Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use stateless_error::{Error, Result};
use stateless_state::Transaction;
use stateless_trie::TrieDB;
use tracing::info;

use crate::wrapper::{build_account_proof, AccountProofWrapper, Anchor};

/// Proof package for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBundle {
    /// RLP encoded transaction
    pub tx: Bytes,
    /// Root every read / write proof is anchored at
    pub state_root: B256,
    pub blk_number: i64,
    pub read_list_proofs: BTreeMap<Address, AccountProofWrapper>,
    pub write_list_proofs: BTreeMap<Address, AccountProofWrapper>,
    /// Post-execution proofs, confirmed bundles only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_acct_proofs: Option<BTreeMap<Address, AccountProofWrapper>>,
    /// Contract code of every proven account, by code hash
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub code_list: BTreeMap<B256, Bytes>,
}

impl TransactionBundle {
    pub fn is_confirmed(&self) -> bool {
        self.updated_acct_proofs.is_some()
    }

    /// Decode the carried transaction
    pub fn transaction(&self) -> Result<Transaction> {
        Transaction::decode_bytes(&self.tx)
    }

    /// Root the updated proofs claim, if any
    pub fn post_root(&self) -> Option<B256> {
        self.updated_acct_proofs
            .as_ref()?
            .values()
            .next()
            .map(|wrapper| wrapper.state_root)
    }

    /// Read proofs then write proofs
    pub fn proofs(&self) -> impl Iterator<Item = (&Address, &AccountProofWrapper)> {
        self.read_list_proofs
            .iter()
            .chain(self.write_list_proofs.iter())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::serialization_failed(e.to_string())
                .with_operation("bundle::to_json")
                .set_source(e)
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::parse_failed(e.to_string())
                .with_operation("bundle::from_json")
                .set_source(e)
        })
    }
}

/// Bundle for a transaction not yet in a block, anchored at `anchor`
pub fn build_pending_bundle<DB: TrieDB + ?Sized>(
    db: &DB,
    anchor: Anchor,
    tx: &Transaction,
) -> Result<TransactionBundle> {
    let mut code_list = BTreeMap::new();
    let read_list_proofs = prove_accounts(db, anchor, tx.read_list.iter().copied(), &mut code_list)?;
    let write_list_proofs = prove_accounts(db, anchor, tx.write_list.iter().copied(), &mut code_list)?;

    info!(
        tx = %tx.hash(),
        root = %anchor.state_root,
        reads = read_list_proofs.len(),
        writes = write_list_proofs.len(),
        "built pending bundle"
    );

    Ok(TransactionBundle {
        tx: tx.encode(),
        state_root: anchor.state_root,
        blk_number: anchor.block_number,
        read_list_proofs,
        write_list_proofs,
        updated_acct_proofs: None,
        code_list,
    })
}

/// Bundle for a transaction included in a block.
///
/// Read and write proofs (plus the coinbase) are anchored at `pre`; proofs
/// of every touched account and the coinbase are anchored at `post`.
pub fn build_confirmed_bundle<DB: TrieDB + ?Sized>(
    db: &DB,
    pre: Anchor,
    post: Anchor,
    tx: &Transaction,
    coinbase: Address,
) -> Result<TransactionBundle> {
    let mut code_list = BTreeMap::new();

    let reads = tx.read_list.iter().copied().chain([coinbase]);
    let read_list_proofs = prove_accounts(db, pre, reads, &mut code_list)?;

    let writes = tx.write_list.iter().copied().chain([coinbase]);
    let write_list_proofs = prove_accounts(db, pre, writes, &mut code_list)?;

    let updated = tx.touched_accounts().into_iter().chain([coinbase]);
    let updated_acct_proofs = prove_accounts(db, post, updated, &mut code_list)?;

    info!(
        tx = %tx.hash(),
        pre = %pre.state_root,
        post = %post.state_root,
        updated = updated_acct_proofs.len(),
        "built confirmed bundle"
    );

    Ok(TransactionBundle {
        tx: tx.encode(),
        state_root: pre.state_root,
        blk_number: pre.block_number,
        read_list_proofs,
        write_list_proofs,
        updated_acct_proofs: Some(updated_acct_proofs),
        code_list,
    })
}

/// Prove each account once, moving code into the shared code list
fn prove_accounts<DB: TrieDB + ?Sized>(
    db: &DB,
    anchor: Anchor,
    accounts: impl IntoIterator<Item = Address>,
    code_list: &mut BTreeMap<B256, Bytes>,
) -> Result<BTreeMap<Address, AccountProofWrapper>> {
    let mut proofs = BTreeMap::new();

    for account in accounts {
        if proofs.contains_key(&account) {
            continue;
        }

        let mut wrapper = build_account_proof(db, anchor, account)?;
        if !wrapper.code.is_empty() {
            let code = std::mem::take(&mut wrapper.code);
            code_list.insert(keccak256(&code), code);
        }
        proofs.insert(account, wrapper);
    }

    Ok(proofs)
}
