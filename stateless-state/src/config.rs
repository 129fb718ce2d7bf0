//! Chain constants and block context

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Gas constants used to price transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainConfig {
    /// Flat cost of every transaction
    pub tx_base_gas: u64,
    /// Cost of each zero byte of calldata
    pub data_zero_gas: u64,
    /// Cost of each non-zero byte of calldata
    pub data_nonzero_gas: u64,
    /// Cost per byte of deployed code
    pub create_byte_gas: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            tx_base_gas: 21_000,
            data_zero_gas: 4,
            data_nonzero_gas: 68,
            create_byte_gas: 200,
        }
    }
}

/// Execution environment: chain constants plus the block being built or
/// verified
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    #[serde(default)]
    pub config: ChainConfig,
    pub coinbase: Address,
    pub block_number: u64,
}

impl Env {
    pub fn new(config: ChainConfig, coinbase: Address, block_number: u64) -> Self {
        Self {
            config,
            coinbase,
            block_number,
        }
    }

    /// Same environment with another coinbase
    pub fn with_coinbase(mut self, coinbase: Address) -> Self {
        self.coinbase = coinbase;
        self
    }
}
