//! Transactions with declared access lists

use std::collections::BTreeSet;

use alloy_primitives::{keccak256, Address, Bytes, TxKind, B256, U256};
use alloy_rlp::{Decodable, RlpDecodable, RlpEncodable};
use serde::{Deserialize, Serialize};

use crate::config::ChainConfig;
use crate::error::{self, Result};

/// A transaction that declares every account it reads or writes.
///
/// `to` is `TxKind::Create` for contract creation; the deployed code is the
/// transaction data.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable, Serialize, Deserialize)]
pub struct Transaction {
    pub nonce: u64,
    #[serde(default)]
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: TxKind,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
    pub sender: Address,
    #[serde(default)]
    pub read_list: Vec<Address>,
    #[serde(default)]
    pub write_list: Vec<Address>,
}

impl Transaction {
    /// Read set plus write set
    pub fn touched_accounts(&self) -> BTreeSet<Address> {
        self.read_list
            .iter()
            .chain(self.write_list.iter())
            .copied()
            .collect()
    }

    pub fn is_create(&self) -> bool {
        self.to.is_create()
    }

    /// Address a creation transaction deploys to
    pub fn created_address(&self) -> Option<Address> {
        self.is_create()
            .then(|| self.sender.create(self.nonce))
    }

    /// Gas charged before execution starts
    pub fn intrinsic_gas(&self, config: &ChainConfig) -> u64 {
        let data_gas = self.data.iter().fold(0u64, |acc, byte| {
            acc.saturating_add(if *byte == 0 {
                config.data_zero_gas
            } else {
                config.data_nonzero_gas
            })
        });
        config.tx_base_gas.saturating_add(data_gas)
    }

    /// Most the sender can be charged: value plus the full gas allowance
    pub fn max_cost(&self) -> Option<U256> {
        self.gas_price
            .checked_mul(U256::from(self.gas_limit))?
            .checked_add(self.value)
    }

    /// RLP encoding
    pub fn encode(&self) -> Bytes {
        alloy_rlp::encode(self).into()
    }

    /// Decode from RLP, rejecting trailing bytes
    pub fn decode_bytes(raw: &[u8]) -> Result<Self> {
        let mut buf = raw;
        let tx = Self::decode(&mut buf).map_err(|e| error::from_rlp(e, "transaction"))?;
        if !buf.is_empty() {
            return Err(error::Error::invalid_encoding("trailing bytes after transaction")
                .with_operation("transaction::decode_bytes"));
        }
        Ok(tx)
    }

    pub fn hash(&self) -> B256 {
        keccak256(self.encode())
    }
}
