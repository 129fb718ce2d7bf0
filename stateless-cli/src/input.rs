//! JSON inputs: genesis allocations, blocks and chain configuration

use std::collections::BTreeMap;
use std::path::Path;

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stateless_error::{Error, Result};
use stateless_state::{Account, ChainConfig, Env, State, Transaction};
use stateless_trie::{hash_and_save, MemoryDB, BLANK_ROOT};

/// Genesis state: chain constants plus the initial accounts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Genesis {
    /// Chain constants; mutually exclusive with `--config`
    #[serde(default)]
    pub config: Option<ChainConfig>,
    pub alloc: BTreeMap<Address, GenesisAccount>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenesisAccount {
    pub balance: U256,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub code: Bytes,
}

impl Genesis {
    /// Write the allocations into a fresh store, returning it and the root
    pub fn build(&self) -> Result<(MemoryDB, B256)> {
        let mut db = MemoryDB::new();
        hash_and_save(&mut db, Vec::new());

        let mut state = State::new(&mut db, BLANK_ROOT, Env::new(self.config.unwrap_or_default(), Address::ZERO, 0));
        for (address, alloc) in &self.alloc {
            state.put_account(
                *address,
                Account {
                    nonce: alloc.nonce,
                    balance: alloc.balance,
                    ..Default::default()
                },
            );
            if !alloc.code.is_empty() {
                state.deploy_code(*address, alloc.code.clone())?;
            }
        }
        let root = state.commit()?;
        Ok((db, root))
    }
}

/// A block to attach bundles to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockFile {
    #[serde(default)]
    pub parent_number: u64,
    pub coinbase: Address,
    pub transactions: Vec<Transaction>,
}

/// Read and parse a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::from(e).with_context("path", path.display().to_string()))?;

    serde_json::from_str(&content).map_err(|e| {
        Error::parse_failed(e.to_string())
            .with_operation("input::read_json")
            .with_context("path", path.display().to_string())
            .set_source(e)
    })
}

/// Chain constants from `path`, or the defaults
pub fn load_config(path: Option<&Path>) -> Result<ChainConfig> {
    match path {
        Some(path) => read_json(path),
        None => Ok(ChainConfig::default()),
    }
}
