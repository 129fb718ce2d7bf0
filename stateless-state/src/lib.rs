//! # Account State
//!
//! The execution engine the proof layer replays transactions through.
//!
//! ## Core Concepts
//! - **Account**: nonce, balance, storage root and code hash, RLP encoded
//!   under `keccak256(address)` in the binary trie
//! - **Transaction**: a value transfer or contract creation that declares the
//!   accounts it reads and writes
//! - **State**: a root bound to a node store, with an account cache that is
//!   written back on `commit`
//! - **Env**: chain constants plus the block context (coinbase, number)

pub mod account;
pub mod config;
pub mod error;
pub mod state;
pub mod transaction;

pub use account::{account_key, Account, EMPTY_HASH};
pub use config::{ChainConfig, Env};
pub use error::{Error, ErrorKind, Result};
pub use state::{get_account_rlp, get_code, Receipt, State, TxFailure};
pub use transaction::Transaction;
