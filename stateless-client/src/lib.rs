//! # Stateless Client
//!
//! Proof bundles for validating transactions without the global state.
//!
//! A full node (the producer) packs, for every transaction, merkle proofs of
//! each account the transaction touches. A stateless client (the consumer)
//! checks those proofs against a state root it trusts, rebuilds the touched
//! part of the trie in a throwaway store and replays the transaction there.
//!
//! ## Components
//! - **codec**: compact branches, node reconstruction
//! - **wrapper**: per-account inclusion / exclusion proofs
//! - **bundle**: pending and confirmed transaction bundles
//! - **verifier**: bundle and block verification against a trusted root
//! - **grouper**: conflict-free runs of transactions
//! - **attacher**: bundles for a whole block, anchored at group boundaries

pub mod attacher;
pub mod bundle;
pub mod codec;
pub mod grouper;
pub mod verifier;
pub mod wrapper;

#[cfg(test)]
pub(crate) mod test_utils;

pub use attacher::{attach_bundles, BlockBundles};
pub use bundle::{build_confirmed_bundle, build_pending_bundle, TransactionBundle};
pub use codec::{get_branch, get_exclusion_branch, reconstruct_and_store, verify_branch};
pub use grouper::{group_transactions, ConflictGroup};
pub use verifier::{verify_block_bundles, verify_bundle, verify_confirmed_bundle, EphemeralStore};
pub use wrapper::{build_account_proof, AccountProofWrapper, Anchor, INTERMEDIATE_BLOCK};

pub use stateless_error::{Error, ErrorKind, Result};
