//! # Binary Trie
//!
//! Node store abstraction plus the get / update / branch primitives. All
//! primitives take the root hash explicitly, so the same store can serve any
//! number of historical roots.

use std::collections::HashMap;

use alloy_primitives::{b256, keccak256, B256};

use crate::bits::BitPath;
use crate::error::{Result, TrieError};
use crate::node::Node;
use crate::proof::{BranchStep, MerkleBranch};

/// Hash of the blank node (keccak256 of the empty string).
///
/// Stores must hold the empty value under this hash for a blank root to
/// resolve.
pub const BLANK_ROOT: B256 =
    b256!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");

/// Database interface for storing nodes by content hash
pub trait TrieDB {
    /// Get node by hash
    fn get(&self, hash: &B256) -> Option<Vec<u8>>;

    /// Store node, returns hash
    fn insert(&mut self, data: Vec<u8>) -> B256;
}

impl<T: TrieDB + ?Sized> TrieDB for &mut T {
    fn get(&self, hash: &B256) -> Option<Vec<u8>> {
        (**self).get(hash)
    }

    fn insert(&mut self, data: Vec<u8>) -> B256 {
        (**self).insert(data)
    }
}

/// In-memory trie database
#[derive(Debug, Clone, Default)]
pub struct MemoryDB {
    nodes: HashMap<B256, Vec<u8>>,
}

impl MemoryDB {
    pub fn new() -> Self {
        MemoryDB {
            nodes: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, hash: &B256) -> bool {
        self.nodes.contains_key(hash)
    }
}

impl TrieDB for MemoryDB {
    fn get(&self, hash: &B256) -> Option<Vec<u8>> {
        self.nodes.get(hash).cloned()
    }

    fn insert(&mut self, data: Vec<u8>) -> B256 {
        let hash = keccak256(&data);
        self.nodes.insert(hash, data);
        hash
    }
}

/// Encode a raw key into the bit path used to walk the trie
pub fn encode_key(raw: &[u8]) -> BitPath {
    BitPath::from_bytes(raw)
}

/// Persist an encoded node under its content hash
pub fn hash_and_save<DB: TrieDB + ?Sized>(db: &mut DB, node: Vec<u8>) -> B256 {
    db.insert(node)
}

fn save<DB: TrieDB + ?Sized>(db: &mut DB, node: Node) -> B256 {
    hash_and_save(db, node.encode())
}

fn load_raw<DB: TrieDB + ?Sized>(db: &DB, hash: &B256) -> Result<Vec<u8>> {
    db.get(hash)
        .ok_or_else(|| TrieError::NodeNotFound(hex::encode(hash)))
}

fn load<DB: TrieDB + ?Sized>(db: &DB, hash: &B256) -> Result<Node> {
    Node::decode(&load_raw(db, hash)?)
}

/// Get the value stored at `key` under `root`; empty if absent
pub fn get<DB: TrieDB + ?Sized>(db: &DB, root: B256, key: &BitPath) -> Result<Vec<u8>> {
    let mut node_hash = root;
    let mut key = key.clone();

    loop {
        match load(db, &node_hash)? {
            Node::Blank => return Ok(Vec::new()),

            Node::Leaf { value } => {
                return Ok(if key.is_empty() { value } else { Vec::new() });
            }

            Node::Kv { path, child } => {
                if !key.starts_with(&path) {
                    return Ok(Vec::new());
                }
                key = key.slice(path.len());
                node_hash = child;
            }

            Node::Branch { left, right } => {
                let Some(bit) = key.first() else {
                    return Ok(Vec::new());
                };
                key = key.slice(1);
                node_hash = if bit == 0 { left } else { right };
            }
        }
    }
}

/// Set `key` to `value` under `root`, returning the new root.
///
/// An empty value deletes the key. Nodes of the old root are left in place.
pub fn update<DB: TrieDB + ?Sized>(
    db: &mut DB,
    root: B256,
    key: &BitPath,
    value: &[u8],
) -> Result<B256> {
    update_node(db, root, key, value)
}

fn update_node<DB: TrieDB + ?Sized>(
    db: &mut DB,
    node_hash: B256,
    key: &BitPath,
    value: &[u8],
) -> Result<B256> {
    match load(db, &node_hash)? {
        Node::Blank => {
            if value.is_empty() {
                Ok(save(db, Node::Blank))
            } else {
                Ok(leaf_at(db, key, value))
            }
        }

        Node::Leaf { .. } => {
            if !key.is_empty() {
                return Err(TrieError::KeyPrefixCollision);
            }
            if value.is_empty() {
                Ok(save(db, Node::Blank))
            } else {
                Ok(save(db, Node::leaf(value.to_vec())))
            }
        }

        Node::Kv { path, child } => {
            if key.is_empty() {
                return Err(TrieError::KeyPrefixCollision);
            }

            let common = key.common_prefix_len(&path);

            if common == path.len() {
                // Full match - descend into child
                let new_child = update_node(db, child, &key.slice(common), value)?;
                if new_child == BLANK_ROOT {
                    return Ok(save(db, Node::Blank));
                }

                // Merge consecutive kv nodes
                match load(db, &new_child)? {
                    Node::Kv { path: sub_path, child: sub_child } => {
                        let mut merged = path;
                        merged.extend(&sub_path);
                        Ok(save(db, Node::kv(merged, sub_child)))
                    }
                    _ => Ok(save(db, Node::kv(path, new_child))),
                }
            } else {
                if value.is_empty() {
                    // Deleting a key that is not there
                    return Ok(node_hash);
                }
                if common == key.len() {
                    return Err(TrieError::KeyPrefixCollision);
                }

                // Split at the first diverging bit
                let new_side = leaf_at(db, &key.slice(common + 1), value);
                let old_side = if path.len() > common + 1 {
                    save(db, Node::kv(path.slice(common + 1), child))
                } else {
                    child
                };

                let fork = if key.get(common) == Some(0) {
                    save(db, Node::branch(new_side, old_side))
                } else {
                    save(db, Node::branch(old_side, new_side))
                };

                if common > 0 {
                    Ok(save(db, Node::kv(path.slice_range(0, common), fork)))
                } else {
                    Ok(fork)
                }
            }
        }

        Node::Branch { left, right } => {
            let bit = key.first().ok_or(TrieError::KeyPrefixCollision)?;
            let rest = key.slice(1);

            let (left, right) = if bit == 0 {
                (update_node(db, left, &rest, value)?, right)
            } else {
                (left, update_node(db, right, &rest, value)?)
            };

            if left == BLANK_ROOT {
                collapse(db, 1, right)
            } else if right == BLANK_ROOT {
                collapse(db, 0, left)
            } else {
                Ok(save(db, Node::branch(left, right)))
            }
        }
    }
}

/// Store `value` at the end of `path`: a bare leaf, or a kv node over it
fn leaf_at<DB: TrieDB + ?Sized>(db: &mut DB, path: &BitPath, value: &[u8]) -> B256 {
    let leaf = save(db, Node::leaf(value.to_vec()));
    if path.is_empty() {
        leaf
    } else {
        save(db, Node::kv(path.clone(), leaf))
    }
}

/// Replace a branch that lost one side with a kv node towards the survivor
fn collapse<DB: TrieDB + ?Sized>(db: &mut DB, bit: u8, survivor: B256) -> Result<B256> {
    let mut path = BitPath::new();
    path.push(bit);

    match load(db, &survivor)? {
        Node::Kv { path: sub_path, child } => {
            path.extend(&sub_path);
            Ok(save(db, Node::kv(path, child)))
        }
        _ => Ok(save(db, Node::kv(path, survivor))),
    }
}

/// Collect the compact branch for `key` under `root`.
///
/// For a present key the branch ends in the leaf. For an absent key it ends
/// at the node where the key leaves the trie: the blank root, or the child of
/// the kv node whose path diverges from the key.
pub fn get_branch<DB: TrieDB + ?Sized>(
    db: &DB,
    root: B256,
    key: &BitPath,
) -> Result<MerkleBranch> {
    let mut steps = Vec::new();
    let mut node_hash = root;
    let mut key = key.clone();

    loop {
        let data = load_raw(db, &node_hash)?;

        match Node::decode(&data)? {
            Node::Blank | Node::Leaf { .. } => {
                steps.push(BranchStep::Leaf(data.into()));
                break;
            }

            Node::Kv { path, child } => {
                steps.push(BranchStep::KvExtension(path.to_packed().into()));
                if key.starts_with(&path) {
                    key = key.slice(path.len());
                    node_hash = child;
                } else {
                    steps.push(BranchStep::Leaf(load_raw(db, &child)?.into()));
                    break;
                }
            }

            Node::Branch { left, right } => match key.first() {
                Some(0) => {
                    steps.push(BranchStep::BranchLeft(right));
                    key = key.slice(1);
                    node_hash = left;
                }
                Some(_) => {
                    steps.push(BranchStep::BranchRight(left));
                    key = key.slice(1);
                    node_hash = right;
                }
                None => return Err(TrieError::KeyPrefixCollision),
            },
        }
    }

    Ok(MerkleBranch::from_steps(&steps))
}

/// Binary Merkle trie over a node store
#[derive(Debug)]
pub struct BinaryTrie<DB: TrieDB> {
    /// Current root hash
    root: B256,
    /// Node database
    db: DB,
}

impl<DB: TrieDB> BinaryTrie<DB> {
    /// Create new empty trie
    pub fn new(mut db: DB) -> Self {
        let root = save(&mut db, Node::Blank);
        BinaryTrie { root, db }
    }

    /// Open an existing root in `db`
    pub fn from_root(db: DB, root: B256) -> Self {
        BinaryTrie { root, db }
    }

    /// Get root hash
    pub fn root_hash(&self) -> B256 {
        self.root
    }

    /// Check if trie is empty
    pub fn is_empty(&self) -> bool {
        self.root == BLANK_ROOT
    }

    /// Get value for key
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = get(&self.db, self.root, &encode_key(key))?;
        Ok((!value.is_empty()).then_some(value))
    }

    /// Insert key-value pair
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.root = update(&mut self.db, self.root, &encode_key(key), &value)?;
        Ok(())
    }

    /// Delete key from trie, returning whether it was present
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let old = self.root;
        self.root = update(&mut self.db, self.root, &encode_key(key), &[])?;
        Ok(old != self.root)
    }

    /// Compact branch for key
    pub fn proof(&self, key: &[u8]) -> Result<MerkleBranch> {
        get_branch(&self.db, self.root, &encode_key(key))
    }

    /// Borrow the node store
    pub fn db(&self) -> &DB {
        &self.db
    }

    /// Mutably borrow the node store
    pub fn db_mut(&mut self) -> &mut DB {
        &mut self.db
    }

    /// Give back the node store
    pub fn into_db(self) -> DB {
        self.db
    }
}

impl BinaryTrie<MemoryDB> {
    /// Create new trie with in-memory database
    pub fn new_memory() -> Self {
        BinaryTrie::new(MemoryDB::new())
    }
}
