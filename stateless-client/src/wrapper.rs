//! # Account Proof Wrappers
//!
//! A self-contained proof of one account at one state root: the raw account
//! bytes (empty when the account does not exist), its code, and the branch
//! proving either.

use alloy_primitives::{keccak256, Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use stateless_error::Result;
use stateless_state::{get_account_rlp, get_code, Account};
use stateless_trie::{MerkleBranch, TrieDB};
use tracing::debug;

use crate::codec::{get_branch, get_exclusion_branch, verify_branch};

/// Block number carried by proofs anchored at a root between two groups of
/// a block rather than at a block boundary
pub const INTERMEDIATE_BLOCK: i64 = -1;

/// A state root plus the block number proofs against it are tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub state_root: B256,
    pub block_number: i64,
}

impl Anchor {
    pub fn new(state_root: B256, block_number: i64) -> Self {
        Self {
            state_root,
            block_number,
        }
    }

    /// Anchor at a root inside a block
    pub fn intermediate(state_root: B256) -> Self {
        Self::new(state_root, INTERMEDIATE_BLOCK)
    }
}

/// Inclusion or exclusion proof of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProofWrapper {
    pub account: Address,
    pub blk_number: i64,
    pub state_root: B256,
    /// Raw trie value; empty when the account does not exist
    pub rlp_data: Bytes,
    #[serde(default, skip_serializing_if = "<[u8]>::is_empty")]
    pub code: Bytes,
    pub merkle_proof: MerkleBranch,
}

impl AccountProofWrapper {
    pub fn exists(&self) -> bool {
        !self.rlp_data.is_empty()
    }

    /// Trie key of the account
    pub fn key(&self) -> B256 {
        keccak256(self.account)
    }

    pub fn decode_account(&self) -> Result<Account> {
        Account::decode_raw(&self.rlp_data)
    }

    /// Check the branch against `root`
    pub fn verify(&self, root: B256) -> bool {
        verify_branch(&self.merkle_proof, root, &self.key(), &self.rlp_data)
    }
}

/// Prove `account` at `anchor`.
///
/// Present accounts get an inclusion branch plus their code; absent ones get
/// empty bytes and a branch proving absence.
pub fn build_account_proof<DB: TrieDB + ?Sized>(
    db: &DB,
    anchor: Anchor,
    account: Address,
) -> Result<AccountProofWrapper> {
    let root = anchor.state_root;
    let key = keccak256(account);
    let rlp_data = get_account_rlp(db, root, &account)?;

    let (merkle_proof, code) = if rlp_data.is_empty() {
        (get_exclusion_branch(db, root, &key)?, Bytes::new())
    } else {
        let decoded = Account::decode_raw(&rlp_data)?;
        (get_branch(db, root, &key)?, get_code(db, decoded.code_hash)?)
    };

    debug!(
        %account,
        %root,
        exists = !rlp_data.is_empty(),
        steps = merkle_proof.len(),
        "built account proof"
    );

    Ok(AccountProofWrapper {
        account,
        blk_number: anchor.block_number,
        state_root: root,
        rlp_data: rlp_data.into(),
        code,
        merkle_proof,
    })
}
