//! # Bundle Verifier
//!
//! Checks bundles against a trusted state root without access to the state.
//! Each verification builds a fresh [`EphemeralStore`] from the bundle's
//! proofs alone, replays the transaction on it and drops it.
//!
//! A bundle that is structurally unacceptable (wrong root, a proof that does
//! not verify, missing coverage, corrupted branch) verifies to `false`. A
//! bundle that is acceptable but whose transaction fails also verifies to
//! `false`. Only local failures are errors.

use std::collections::BTreeMap;

use alloy_primitives::{keccak256, Address, B256, U256};
use stateless_error::{Error, Result};
use stateless_state::{Account, Env, Receipt, State, Transaction};
use stateless_trie::{hash_and_save, MemoryDB, TrieDB};
use tracing::{debug, info, warn};

use crate::attacher::BlockBundles;
use crate::bundle::TransactionBundle;
use crate::codec::{reconstruct_and_store, verify_branch};
use crate::grouper::{group_transactions, ConflictGroup};
use crate::wrapper::{AccountProofWrapper, INTERMEDIATE_BLOCK};

/// Node store holding only what proofs supplied
#[derive(Debug)]
pub struct EphemeralStore {
    db: MemoryDB,
}

impl EphemeralStore {
    /// Fresh store holding only the blank node
    pub fn new() -> Self {
        let mut db = MemoryDB::new();
        hash_and_save(&mut db, Vec::new());
        Self { db }
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    pub fn contains(&self, hash: &B256) -> bool {
        self.db.contains(hash)
    }
}

impl Default for EphemeralStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrieDB for EphemeralStore {
    fn get(&self, hash: &B256) -> Option<Vec<u8>> {
        self.db.get(hash)
    }

    fn insert(&mut self, data: Vec<u8>) -> B256 {
        self.db.insert(data)
    }
}

/// Verify a bundle anchored at `expected_root`, replaying its transaction
/// with `coinbase` as the block's beneficiary.
pub fn verify_bundle(
    env: &Env,
    expected_root: B256,
    coinbase: Address,
    bundle: &TransactionBundle,
) -> Result<bool> {
    let env = env.clone().with_coinbase(coinbase);
    let replayed = settle(replay_bundle(env, expected_root, bundle, |_, _, _| Ok(())))?;
    Ok(replayed.is_some())
}

/// Verify a confirmed bundle: everything [`verify_bundle`] checks, plus the
/// post-execution proofs.
///
/// Updated proofs must all verify against one post root, the replay must
/// succeed, and every touched account other than the coinbase must end up
/// exactly as its updated proof claims. The coinbase also collects fees from
/// the rest of its group, so only [`verify_block_bundles`] can check it.
pub fn verify_confirmed_bundle(
    env: &Env,
    expected_root: B256,
    coinbase: Address,
    bundle: &TransactionBundle,
) -> Result<bool> {
    let env = env.clone().with_coinbase(coinbase);
    let replayed = settle(check_confirmed(env, expected_root, coinbase, bundle))?;
    Ok(replayed.is_some())
}

/// Verify every bundle of a block, starting at `parent_root`.
///
/// The bundles must be grouped exactly as [`group_transactions`] groups
/// their transactions. The anchor root moves to a group's post root only
/// once the whole group is verified, including the fees its coinbase
/// collected, and the last post root must be the block's post root.
pub fn verify_block_bundles(
    env: &Env,
    parent_root: B256,
    coinbase: Address,
    block: &BlockBundles,
) -> Result<bool> {
    if block.parent_root != parent_root {
        warn!(claimed = %block.parent_root, expected = %parent_root, "block bundles rejected: parent root");
        return Ok(false);
    }
    let Ok(first_tag) = i64::try_from(block.parent_number) else {
        warn!(parent = block.parent_number, "block bundles rejected: parent number out of range");
        return Ok(false);
    };

    let txs = match block
        .bundles
        .iter()
        .map(TransactionBundle::transaction)
        .collect::<Result<Vec<_>>>()
    {
        Ok(txs) => txs,
        Err(err) => {
            warn!(%err, "block bundles rejected: undecodable transaction");
            return Ok(false);
        }
    };
    let sizes: Vec<usize> = group_transactions(&txs).iter().map(ConflictGroup::len).collect();
    if sizes != block.groups {
        warn!(claimed = ?block.groups, expected = ?sizes, "block bundles rejected: grouping");
        return Ok(false);
    }

    let env = env.clone().with_coinbase(coinbase);
    let mut anchor = parent_root;
    let mut bundles = block.bundles.iter();

    for (index, size) in block.groups.iter().enumerate() {
        let tag = if index == 0 { first_tag } else { INTERMEDIATE_BLOCK };
        let group: Vec<&TransactionBundle> = bundles.by_ref().take(*size).collect();

        match verify_group(&env, anchor, tag, &group)? {
            Some(post) => anchor = post,
            None => {
                warn!(group = index, root = %anchor, "block bundles rejected: group");
                return Ok(false);
            }
        }
        debug!(group = index, size, root = %anchor, "verified group");
    }

    let ok = anchor == block.post_root;
    info!(parent = %parent_root, post = %block.post_root, ok, "verified block bundles");
    Ok(ok)
}

/// What a successful confirmed replay leaves for the group-level checks
struct Replayed {
    /// Gas fee the transaction owes the coinbase
    fee: U256,
    /// Coinbase after the transaction, fees not yet settled
    coinbase: Account,
    touches_coinbase: bool,
}

/// Verify one group anchored at `anchor`, returning the root it ends at, or
/// `None` if the group is rejected
fn verify_group(
    env: &Env,
    anchor: B256,
    tag: i64,
    group: &[&TransactionBundle],
) -> Result<Option<B256>> {
    let Some(first) = group.first() else {
        return Ok(Some(anchor));
    };
    let Some(post_root) = first.post_root() else {
        return Ok(None);
    };
    let coinbase = env.coinbase;

    let mut fees = U256::ZERO;
    let mut settled: Option<Account> = None;

    for bundle in group {
        if bundle.blk_number != tag {
            warn!(claimed = bundle.blk_number, expected = tag, "bundle rejected: block tag");
            return Ok(None);
        }
        if bundle.post_root() != Some(post_root) {
            warn!(root = %post_root, "bundle rejected: group post roots differ");
            return Ok(None);
        }
        let Some(replayed) = settle(check_confirmed(env.clone(), anchor, coinbase, bundle))? else {
            return Ok(None);
        };

        fees = fees.saturating_add(replayed.fee);
        // Members are disjoint, so at most one of them changes the coinbase
        if settled.is_none() || replayed.touches_coinbase {
            settled = Some(replayed.coinbase);
        }
    }

    let mut expected = settled.unwrap_or_default();
    expected.balance = expected.balance.saturating_add(fees);

    let claimed = first
        .updated_acct_proofs
        .as_ref()
        .and_then(|updated| updated.get(&coinbase));
    match claimed {
        Some(wrapper) if wrapper.rlp_data.as_ref() == expected.encode_raw().as_slice() => {
            Ok(Some(post_root))
        }
        _ => {
            warn!(coinbase = %coinbase, fees = %fees, "bundle rejected: coinbase does not match collected fees");
            Ok(None)
        }
    }
}

/// Turn rejections into `None`; pass local errors through
fn settle<T>(result: Result<Option<T>>) -> Result<Option<T>> {
    match result {
        Err(err) if err.kind().is_rejection() => {
            warn!(%err, "bundle rejected");
            Ok(None)
        }
        other => other,
    }
}

fn check_confirmed(
    env: Env,
    expected_root: B256,
    coinbase: Address,
    bundle: &TransactionBundle,
) -> Result<Option<Replayed>> {
    let updated = bundle.updated_acct_proofs.as_ref().ok_or_else(|| {
        Error::invalid_bundle("bundle carries no post-execution proofs")
            .with_operation("verifier::verify_confirmed_bundle")
    })?;
    let post_root = bundle.post_root().ok_or_else(|| {
        Error::invalid_bundle("bundle has an empty post-execution proof set")
            .with_operation("verifier::verify_confirmed_bundle")
    })?;
    if !updated.contains_key(&coinbase) || !bundle.proofs().any(|(address, _)| *address == coinbase) {
        return Err(Error::invalid_bundle("coinbase is not proven")
            .with_operation("verifier::verify_confirmed_bundle")
            .with_context("coinbase", coinbase.to_string()));
    }

    for (address, wrapper) in updated {
        check_wrapper(post_root, address, wrapper)?;
    }

    let replayed = replay_bundle(env, expected_root, bundle, |state, tx, receipt| {
        let touched = tx.touched_accounts();
        for address in &touched {
            if *address == coinbase {
                continue;
            }
            let claimed = updated.get(address).ok_or_else(|| {
                Error::invalid_bundle("touched account has no post-execution proof")
                    .with_context("account", address.to_string())
            })?;
            if state.account_rlp(*address)? != claimed.rlp_data.as_ref() {
                return Err(Error::invalid_bundle("replayed account differs from post-execution proof")
                    .with_context("account", address.to_string()));
            }
        }

        Ok(Replayed {
            fee: tx.gas_price.saturating_mul(U256::from(receipt.gas_used)),
            coinbase: state.account(coinbase)?,
            touches_coinbase: touched.contains(&coinbase),
        })
    })?;

    if replayed.is_none() {
        warn!(tx = %keccak256(&bundle.tx), "confirmed bundle replay failed");
    }
    Ok(replayed)
}

/// Check the bundle against `expected_root`, hydrate a fresh store from its
/// proofs and replay the transaction. `check` runs on the result if the
/// replay succeeded; a failed transaction gives `None`.
fn replay_bundle<T, F>(
    env: Env,
    expected_root: B256,
    bundle: &TransactionBundle,
    check: F,
) -> Result<Option<T>>
where
    F: FnOnce(&mut State<'_, EphemeralStore>, &Transaction, &Receipt) -> Result<T>,
{
    if bundle.state_root != expected_root {
        return Err(Error::invalid_bundle("claimed state root does not match")
            .with_operation("verifier::replay_bundle")
            .with_context("expected", expected_root.to_string())
            .with_context("claimed", bundle.state_root.to_string()));
    }

    let mut store = EphemeralStore::new();

    for (address, wrapper) in bundle.proofs() {
        check_wrapper(bundle.state_root, address, wrapper)?;
        if !wrapper.code.is_empty() {
            store.insert(wrapper.code.to_vec());
        }
        reconstruct_and_store(&mut store, &wrapper.merkle_proof)
            .map_err(|e| e.with_context("account", address.to_string()))?;
    }

    for (code_hash, code) in &bundle.code_list {
        if keccak256(code) != *code_hash {
            return Err(Error::invalid_bundle("code does not match its hash")
                .with_operation("verifier::replay_bundle")
                .with_context("code_hash", code_hash.to_string()));
        }
        store.insert(code.to_vec());
    }

    let tx = bundle.transaction().map_err(|e| {
        Error::invalid_bundle("transaction does not decode")
            .with_operation("verifier::replay_bundle")
            .set_source(e)
    })?;
    check_coverage(&tx, &bundle.read_list_proofs, &bundle.write_list_proofs)?;

    debug!(tx = %tx.hash(), nodes = store.len(), "hydrated ephemeral store");

    let mut state = State::new(&mut store, bundle.state_root, env);
    let (success, receipt) = state.apply_transaction(&tx)?;
    let checked = if success {
        Some(check(&mut state, &tx, &receipt)?)
    } else {
        None
    };

    info!(
        tx = %tx.hash(),
        root = %bundle.state_root,
        success,
        gas_used = receipt.gas_used,
        "replayed bundle"
    );
    Ok(checked)
}

fn check_wrapper(root: B256, address: &Address, wrapper: &AccountProofWrapper) -> Result<()> {
    if wrapper.account != *address {
        return Err(Error::invalid_bundle("proof is filed under another account")
            .with_context("key", address.to_string())
            .with_context("account", wrapper.account.to_string()));
    }
    if wrapper.state_root != root {
        return Err(Error::invalid_bundle("proof is anchored at another root")
            .with_context("account", address.to_string())
            .with_context("root", wrapper.state_root.to_string()));
    }
    if !verify_branch(&wrapper.merkle_proof, root, &keccak256(address), &wrapper.rlp_data) {
        return Err(Error::invalid_bundle("account proof does not verify")
            .with_context("account", address.to_string())
            .with_context("root", root.to_string()));
    }

    debug!(account = %address, exists = wrapper.exists(), "verified account proof");
    Ok(())
}

fn check_coverage(
    tx: &Transaction,
    reads: &BTreeMap<Address, AccountProofWrapper>,
    writes: &BTreeMap<Address, AccountProofWrapper>,
) -> Result<()> {
    match tx
        .touched_accounts()
        .into_iter()
        .find(|address| !reads.contains_key(address) && !writes.contains_key(address))
    {
        Some(address) => Err(Error::invalid_bundle("touched account has no proof")
            .with_operation("verifier::check_coverage")
            .with_context("account", address.to_string())),
        None => Ok(()),
    }
}
