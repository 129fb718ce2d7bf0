//! # State
//!
//! A state root bound to a node store. Accounts are read through a cache,
//! transactions mutate the cache, and `commit` writes every dirty account
//! (plus newly deployed code) back into the trie.
//!
//! Fees are not credited to the coinbase while applying; they accumulate and
//! are settled on `commit`. Replaying a single transaction therefore never
//! reads the coinbase account.

use std::collections::{BTreeSet, HashMap};

use alloy_primitives::{keccak256, Address, Bytes, TxKind, B256, U256};
use serde::{Deserialize, Serialize};
use stateless_trie::{get, hash_and_save, update, TrieDB};
use thiserror::Error;
use tracing::debug;

use crate::account::{account_key, Account, EMPTY_HASH};
use crate::config::Env;
use crate::error::{self, Error, Result};
use crate::transaction::Transaction;

/// Why a transaction did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TxFailure {
    #[error("nonce {got} does not match account nonce {expected}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("gas limit {limit} below intrinsic gas {required}")]
    InsufficientStartGas { required: u64, limit: u64 },

    #[error("balance {balance} cannot cover {required}")]
    InsufficientBalance { balance: U256, required: U256 },

    #[error("account {0} is written but not declared in the write list")]
    UndeclaredAccess(Address),

    #[error("account {0} already exists")]
    AddressCollision(Address),

    #[error("out of gas depositing {size} bytes of code")]
    OutOfGas { size: usize },
}

impl TxFailure {
    /// Invalid transactions leave the state untouched; other failures still
    /// charge the sender
    pub fn is_invalid(&self) -> bool {
        !matches!(self, TxFailure::OutOfGas { .. })
    }
}

/// Outcome of applying one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub success: bool,
    pub gas_used: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<TxFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Address>,
}

impl Receipt {
    fn succeeded(gas_used: u64, created: Option<Address>) -> Self {
        Self {
            success: true,
            gas_used,
            failure: None,
            created,
        }
    }

    fn failed(gas_used: u64, failure: TxFailure) -> Self {
        Self {
            success: false,
            gas_used,
            failure: Some(failure),
            created: None,
        }
    }
}

/// Raw trie value of `address` under `root`; empty if the account is absent
pub fn get_account_rlp<DB: TrieDB + ?Sized>(
    db: &DB,
    root: B256,
    address: &Address,
) -> Result<Vec<u8>> {
    get(db, root, &account_key(address)).map_err(|e| {
        error::from_trie(e)
            .with_operation("state::get_account_rlp")
            .with_context("address", address.to_string())
    })
}

/// Contract code stored under `code_hash`
pub fn get_code<DB: TrieDB + ?Sized>(db: &DB, code_hash: B256) -> Result<Bytes> {
    if code_hash == EMPTY_HASH {
        return Ok(Bytes::new());
    }
    db.get(&code_hash)
        .map(Bytes::from)
        .ok_or_else(|| Error::node_missing(code_hash.to_string()).with_operation("state::get_code"))
}

/// Account state at a root, with pending changes
pub struct State<'a, DB: TrieDB> {
    db: &'a mut DB,
    root: B256,
    env: Env,
    cache: HashMap<Address, Account>,
    dirty: BTreeSet<Address>,
    new_code: HashMap<B256, Bytes>,
    pending_fees: U256,
}

impl<'a, DB: TrieDB> State<'a, DB> {
    pub fn new(db: &'a mut DB, root: B256, env: Env) -> Self {
        Self {
            db,
            root,
            env,
            cache: HashMap::new(),
            dirty: BTreeSet::new(),
            new_code: HashMap::new(),
            pending_fees: U256::ZERO,
        }
    }

    /// Root as of the last commit
    pub fn root(&self) -> B256 {
        self.root
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Current account, including uncommitted changes
    pub fn account(&mut self, address: Address) -> Result<Account> {
        if let Some(account) = self.cache.get(&address) {
            return Ok(account.clone());
        }

        let raw = get_account_rlp(&*self.db, self.root, &address)?;
        let account = Account::decode_raw(&raw)
            .map_err(|e| e.with_context("address", address.to_string()))?;
        self.cache.insert(address, account.clone());
        Ok(account)
    }

    /// Raw trie value the account would be committed as
    pub fn account_rlp(&mut self, address: Address) -> Result<Vec<u8>> {
        Ok(self.account(address)?.encode_raw())
    }

    /// Code of the account at `address`
    pub fn code(&mut self, address: Address) -> Result<Bytes> {
        let code_hash = self.account(address)?.code_hash;
        match self.new_code.get(&code_hash) {
            Some(code) => Ok(code.clone()),
            None => get_code(&*self.db, code_hash),
        }
    }

    /// Overwrite an account
    pub fn put_account(&mut self, address: Address, account: Account) {
        self.cache.insert(address, account);
        self.dirty.insert(address);
    }

    /// Install `code` at `address`
    pub fn deploy_code(&mut self, address: Address, code: Bytes) -> Result<()> {
        let mut account = self.account(address)?;
        let code_hash = keccak256(&code);
        account.code_hash = code_hash;
        if !code.is_empty() {
            self.new_code.insert(code_hash, code);
        }
        self.put_account(address, account);
        Ok(())
    }

    /// Apply `tx`, returning whether it succeeded.
    ///
    /// Invalid transactions return `false` without touching the state. Only
    /// store failures are errors.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<(bool, Receipt)> {
        let config = self.env.config;
        let target = match tx.to {
            TxKind::Call(to) => to,
            TxKind::Create => tx.sender.create(tx.nonce),
        };

        for address in [tx.sender, target] {
            if !tx.write_list.contains(&address) {
                return Ok(reject(TxFailure::UndeclaredAccess(address)));
            }
        }

        let mut sender = self.account(tx.sender)?;
        if tx.nonce != sender.nonce {
            return Ok(reject(TxFailure::InvalidNonce {
                expected: sender.nonce,
                got: tx.nonce,
            }));
        }

        let intrinsic = tx.intrinsic_gas(&config);
        if intrinsic > tx.gas_limit {
            return Ok(reject(TxFailure::InsufficientStartGas {
                required: intrinsic,
                limit: tx.gas_limit,
            }));
        }

        let max_cost = tx.max_cost();
        if max_cost.map_or(true, |cost| sender.balance < cost) {
            return Ok(reject(TxFailure::InsufficientBalance {
                balance: sender.balance,
                required: max_cost.unwrap_or(U256::MAX),
            }));
        }

        if tx.is_create() {
            let existing = self.account(target)?;
            if existing.nonce != 0 || existing.has_code() {
                return Ok(reject(TxFailure::AddressCollision(target)));
            }
        }

        sender.nonce += 1;

        let mut gas_used = intrinsic;
        if tx.is_create() {
            let deposit = config.create_byte_gas.saturating_mul(tx.data.len() as u64);
            gas_used = intrinsic.saturating_add(deposit);

            if gas_used > tx.gas_limit {
                let fee = tx.gas_price * U256::from(tx.gas_limit);
                sender.balance -= fee;
                self.put_account(tx.sender, sender);
                self.pending_fees += fee;

                debug!(sender = %tx.sender, gas = tx.gas_limit, "creation ran out of gas");
                return Ok((
                    false,
                    Receipt::failed(tx.gas_limit, TxFailure::OutOfGas { size: tx.data.len() }),
                ));
            }
        }

        let fee = tx.gas_price * U256::from(gas_used);
        sender.balance -= fee + tx.value;
        self.put_account(tx.sender, sender);

        let mut recipient = self.account(target)?;
        recipient.balance = recipient.balance.saturating_add(tx.value);
        self.put_account(target, recipient);

        let created = if tx.is_create() {
            let mut contract = self.account(target)?;
            contract.nonce = 1;
            self.put_account(target, contract);
            self.deploy_code(target, tx.data.clone())?;
            Some(target)
        } else {
            None
        };

        self.pending_fees += fee;

        debug!(
            sender = %tx.sender,
            target = %target,
            value = %tx.value,
            gas_used,
            "applied transaction"
        );
        Ok((true, Receipt::succeeded(gas_used, created)))
    }

    /// Settle fees to the coinbase and write every dirty account, returning
    /// the new root
    pub fn commit(&mut self) -> Result<B256> {
        if !self.pending_fees.is_zero() {
            let coinbase = self.env.coinbase;
            let mut account = self.account(coinbase)?;
            account.balance = account.balance.saturating_add(self.pending_fees);
            self.put_account(coinbase, account);
            self.pending_fees = U256::ZERO;
        }

        for (_, code) in self.new_code.drain() {
            hash_and_save(&mut *self.db, code.to_vec());
        }

        let dirty = std::mem::take(&mut self.dirty);
        for address in &dirty {
            let raw = self
                .cache
                .get(address)
                .map(Account::encode_raw)
                .unwrap_or_default();
            self.root = update(&mut *self.db, self.root, &account_key(address), &raw)
                .map_err(|e| error::from_trie(e).with_operation("state::commit"))?;
        }

        debug!(root = %self.root, accounts = dirty.len(), "committed state");
        Ok(self.root)
    }
}

fn reject(failure: TxFailure) -> (bool, Receipt) {
    debug!(%failure, "rejected transaction");
    (false, Receipt::failed(0, failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainConfig;
    use stateless_trie::{MemoryDB, BLANK_ROOT};

    use alloy_primitives::address;

    const A: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const B: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
    const C: Address = address!("cccccccccccccccccccccccccccccccccccccccc");

    fn env() -> Env {
        Env::new(ChainConfig::default(), C, 1)
    }

    fn genesis(db: &mut MemoryDB, balance: u64) -> B256 {
        hash_and_save(db, Vec::new());
        let mut state = State::new(db, BLANK_ROOT, env());
        state.put_account(A, Account::with_balance(U256::from(balance)));
        state.commit().unwrap()
    }

    fn transfer(value: u64) -> Transaction {
        Transaction {
            nonce: 0,
            gas_price: U256::from(1),
            gas_limit: 21_000,
            to: TxKind::Call(B),
            value: U256::from(value),
            data: Bytes::new(),
            sender: A,
            read_list: vec![],
            write_list: vec![A, B],
        }
    }

    #[test]
    fn test_transfer_and_fee_settlement() {
        let mut db = MemoryDB::new();
        let root = genesis(&mut db, 100_000);

        let mut state = State::new(&mut db, root, env());
        let (ok, receipt) = state.apply_transaction(&transfer(10)).unwrap();
        assert!(ok);
        assert_eq!(receipt.gas_used, 21_000);

        // Coinbase untouched until commit
        assert!(state.account(C).unwrap().is_empty());
        let new_root = state.commit().unwrap();
        assert_ne!(new_root, root);

        let sender = Account::decode_raw(&get_account_rlp(&db, new_root, &A).unwrap()).unwrap();
        assert_eq!(sender.nonce, 1);
        assert_eq!(sender.balance, U256::from(100_000 - 21_000 - 10));

        let recipient = Account::decode_raw(&get_account_rlp(&db, new_root, &B).unwrap()).unwrap();
        assert_eq!(recipient.balance, U256::from(10));

        let coinbase = Account::decode_raw(&get_account_rlp(&db, new_root, &C).unwrap()).unwrap();
        assert_eq!(coinbase.balance, U256::from(21_000));
    }

    #[test]
    fn test_insufficient_balance_leaves_state() {
        let mut db = MemoryDB::new();
        let root = genesis(&mut db, 100);

        let mut state = State::new(&mut db, root, env());
        let (ok, receipt) = state.apply_transaction(&transfer(10)).unwrap();
        assert!(!ok);
        assert!(matches!(
            receipt.failure,
            Some(TxFailure::InsufficientBalance { .. })
        ));
        assert_eq!(state.commit().unwrap(), root);
    }

    #[test]
    fn test_bad_nonce() {
        let mut db = MemoryDB::new();
        let root = genesis(&mut db, 100_000);

        let mut tx = transfer(1);
        tx.nonce = 5;
        let mut state = State::new(&mut db, root, env());
        let (ok, receipt) = state.apply_transaction(&tx).unwrap();
        assert!(!ok);
        assert_eq!(
            receipt.failure,
            Some(TxFailure::InvalidNonce { expected: 0, got: 5 })
        );
    }

    #[test]
    fn test_intrinsic_gas_above_limit() {
        let mut db = MemoryDB::new();
        let root = genesis(&mut db, 100_000);

        let mut tx = transfer(1);
        tx.gas_limit = 20_000;
        let mut state = State::new(&mut db, root, env());
        let (ok, receipt) = state.apply_transaction(&tx).unwrap();
        assert!(!ok);
        assert!(receipt.failure.unwrap().is_invalid());
    }

    #[test]
    fn test_undeclared_recipient() {
        let mut db = MemoryDB::new();
        let root = genesis(&mut db, 100_000);

        let mut tx = transfer(1);
        tx.write_list = vec![A];
        tx.read_list = vec![B];
        let mut state = State::new(&mut db, root, env());
        let (ok, receipt) = state.apply_transaction(&tx).unwrap();
        assert!(!ok);
        assert_eq!(receipt.failure, Some(TxFailure::UndeclaredAccess(B)));
    }

    #[test]
    fn test_self_transfer() {
        let mut db = MemoryDB::new();
        let root = genesis(&mut db, 100_000);

        let mut tx = transfer(50);
        tx.to = TxKind::Call(A);
        let mut state = State::new(&mut db, root, env());
        assert!(state.apply_transaction(&tx).unwrap().0);

        let sender = state.account(A).unwrap();
        assert_eq!(sender.balance, U256::from(100_000 - 21_000));
        assert_eq!(sender.nonce, 1);
    }

    #[test]
    fn test_contract_creation() {
        let mut db = MemoryDB::new();
        let root = genesis(&mut db, 1_000_000);
        let code = Bytes::from_static(&[0x60, 0x00, 0x60, 0x00]);
        let created = A.create(0);

        let tx = Transaction {
            to: TxKind::Create,
            data: code.clone(),
            gas_limit: 100_000,
            value: U256::from(7),
            write_list: vec![A, created],
            ..transfer(0)
        };

        let mut state = State::new(&mut db, root, env());
        let (ok, receipt) = state.apply_transaction(&tx).unwrap();
        assert!(ok);
        assert_eq!(receipt.created, Some(created));
        assert_eq!(state.code(created).unwrap(), code);

        let new_root = state.commit().unwrap();
        let contract =
            Account::decode_raw(&get_account_rlp(&db, new_root, &created).unwrap()).unwrap();
        assert_eq!(contract.balance, U256::from(7));
        assert_eq!(contract.nonce, 1);
        assert_eq!(get_code(&db, contract.code_hash).unwrap(), code);
    }

    #[test]
    fn test_creation_out_of_gas_charges_full_limit() {
        let mut db = MemoryDB::new();
        let root = genesis(&mut db, 1_000_000);
        let created = A.create(0);

        let tx = Transaction {
            to: TxKind::Create,
            data: Bytes::from(vec![1u8; 100]),
            gas_limit: 30_000,
            value: U256::from(7),
            write_list: vec![A, created],
            ..transfer(0)
        };

        let mut state = State::new(&mut db, root, env());
        let (ok, receipt) = state.apply_transaction(&tx).unwrap();
        assert!(!ok);
        assert_eq!(receipt.gas_used, 30_000);

        let sender = state.account(A).unwrap();
        assert_eq!(sender.nonce, 1);
        assert_eq!(sender.balance, U256::from(1_000_000 - 30_000));
        assert!(state.account(created).unwrap().is_empty());
    }

    #[test]
    fn test_creation_collision() {
        let mut db = MemoryDB::new();
        let root = genesis(&mut db, 1_000_000);
        let created = A.create(0);

        let mut state = State::new(&mut db, root, env());
        state.put_account(created, Account { nonce: 1, ..Default::default() });
        let root = state.commit().unwrap();

        let tx = Transaction {
            to: TxKind::Create,
            gas_limit: 100_000,
            write_list: vec![A, created],
            ..transfer(0)
        };
        let mut state = State::new(&mut db, root, env());
        let (ok, receipt) = state.apply_transaction(&tx).unwrap();
        assert!(!ok);
        assert_eq!(receipt.failure, Some(TxFailure::AddressCollision(created)));
    }

    #[test]
    fn test_empty_account_is_deleted() {
        let mut db = MemoryDB::new();
        let root = genesis(&mut db, 5);

        let mut state = State::new(&mut db, root, env());
        state.put_account(A, Account::default());
        assert_eq!(state.commit().unwrap(), BLANK_ROOT);
    }

    #[test]
    fn test_missing_node_is_error() {
        let mut db = MemoryDB::new();
        let root = genesis(&mut db, 5);

        let mut empty = MemoryDB::new();
        let mut state = State::new(&mut empty, root, env());
        let err = state.account(A).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NodeMissing);
    }

    #[test]
    fn test_receipt_json_skips_empty_fields() {
        let receipt = Receipt::succeeded(21_000, None);
        let json = serde_json::to_string(&receipt).unwrap();
        assert_eq!(json, r#"{"success":true,"gas_used":21000}"#);
    }
}
