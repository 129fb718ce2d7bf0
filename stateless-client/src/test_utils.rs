//! Shared fixtures for the client tests

use alloy_primitives::{address, Address, Bytes, TxKind, B256, U256};
use stateless_state::{Account, ChainConfig, Env, State, Transaction};
use stateless_trie::{hash_and_save, MemoryDB, BLANK_ROOT};

pub const A: Address = address!("000000000000000000000000000000000000000a");
pub const B: Address = address!("000000000000000000000000000000000000000b");
pub const C: Address = address!("000000000000000000000000000000000000000c");
pub const D: Address = address!("000000000000000000000000000000000000000d");
pub const E: Address = address!("000000000000000000000000000000000000000e");
pub const COINBASE: Address = address!("00000000000000000000000000000000000000cb");

pub fn env() -> Env {
    Env::new(ChainConfig::default(), COINBASE, 1)
}

/// Store seeded with the blank node and the given balances, plus the root
pub fn genesis(balances: &[(Address, u64)]) -> (MemoryDB, B256) {
    let mut db = MemoryDB::new();
    hash_and_save(&mut db, Vec::new());

    let mut state = State::new(&mut db, BLANK_ROOT, env());
    for (address, balance) in balances {
        state.put_account(*address, Account::with_balance(U256::from(*balance)));
    }
    let root = state.commit().expect("genesis commit");
    (db, root)
}

/// Plain value transfer reading `from` and writing both sides
pub fn transfer(from: Address, to: Address, nonce: u64, value: u64) -> Transaction {
    Transaction {
        nonce,
        gas_price: U256::from(1),
        gas_limit: 21_000,
        to: TxKind::Call(to),
        value: U256::from(value),
        data: Bytes::new(),
        sender: from,
        read_list: vec![from],
        write_list: vec![from, to],
    }
}

/// Transfer that costs no gas, so small balances can pay for it
pub fn free_transfer(from: Address, to: Address, nonce: u64, value: u64) -> Transaction {
    Transaction {
        gas_price: U256::ZERO,
        ..transfer(from, to, nonce, value)
    }
}
