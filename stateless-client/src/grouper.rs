//! # Conflict Grouper
//!
//! Splits an ordered list of transactions into consecutive runs whose
//! touched accounts do not overlap. Each run ends at a state root checkpoint
//! that the next run's proofs are anchored to.

use std::collections::BTreeSet;

use alloy_primitives::Address;
use stateless_state::Transaction;
use tracing::debug;

/// A run of transactions with pairwise disjoint touched accounts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictGroup {
    transactions: Vec<Transaction>,
    accounts: BTreeSet<Address>,
}

impl ConflictGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Union of every member's touched accounts
    pub fn accounts(&self) -> &BTreeSet<Address> {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    fn conflicts_with(&self, accounts: &BTreeSet<Address>) -> bool {
        !self.accounts.is_disjoint(accounts)
    }

    fn push(&mut self, tx: Transaction, accounts: BTreeSet<Address>) {
        self.accounts.extend(accounts);
        self.transactions.push(tx);
    }
}

/// Greedy left-to-right partition of `txs`.
///
/// A transaction joins the open group unless it touches an account the group
/// already touches, in which case the group is closed and a new one starts
/// with it. Order is preserved; an empty input gives one empty group.
pub fn group_transactions(txs: &[Transaction]) -> Vec<ConflictGroup> {
    let mut groups = Vec::new();
    let mut current = ConflictGroup::new();

    for tx in txs {
        let accounts = tx.touched_accounts();
        if current.conflicts_with(&accounts) {
            groups.push(std::mem::take(&mut current));
        }
        current.push(tx.clone(), accounts);
    }
    groups.push(current);

    debug!(
        transactions = txs.len(),
        groups = groups.len(),
        "grouped transactions"
    );
    groups
}
