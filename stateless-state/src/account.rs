//! Account records stored in the state trie

use alloy_primitives::{b256, keccak256, Address, B256, U256};
use alloy_rlp::{Decodable, RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};
use stateless_trie::{encode_key, BitPath, BLANK_ROOT};

use crate::error::{self, Result};

/// keccak256 of the empty string: code hash of accounts without code
pub const EMPTY_HASH: B256 =
    b256!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");

/// Trie key of an account
pub fn account_key(address: &Address) -> BitPath {
    encode_key(keccak256(address).as_slice())
}

/// An account as stored in the state trie
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize, Deserialize)]
pub struct Account {
    pub nonce: u64,
    pub balance: U256,
    pub storage_root: B256,
    pub code_hash: B256,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::ZERO,
            storage_root: BLANK_ROOT,
            code_hash: EMPTY_HASH,
        }
    }
}

impl Account {
    /// Account holding only a balance
    pub fn with_balance(balance: U256) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }

    /// Check whether the account references contract code
    pub fn has_code(&self) -> bool {
        self.code_hash != EMPTY_HASH
    }

    /// Empty accounts are not stored
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && !self.has_code()
    }

    /// Raw trie value: the RLP encoding, or nothing for an empty account
    pub fn encode_raw(&self) -> Vec<u8> {
        if self.is_empty() {
            Vec::new()
        } else {
            alloy_rlp::encode(self)
        }
    }

    /// Decode a raw trie value; empty bytes mean an empty account
    pub fn decode_raw(raw: &[u8]) -> Result<Self> {
        if raw.is_empty() {
            return Ok(Self::default());
        }

        let mut buf = raw;
        let account = Self::decode(&mut buf).map_err(|e| error::from_rlp(e, "account"))?;
        if !buf.is_empty() {
            return Err(error::Error::invalid_encoding("trailing bytes after account")
                .with_operation("account::decode_raw"));
        }
        Ok(account)
    }
}
