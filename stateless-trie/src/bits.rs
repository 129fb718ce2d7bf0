//! # Bit paths
//!
//! Keys in the binary trie are walked one bit at a time, most significant
//! bit of the first byte first. Kv nodes store their path fragment in a
//! packed form: one byte holding the number of padding bits, followed by the
//! bits packed eight to a byte and zero padded at the end.

use crate::error::{Result, TrieError};
use std::fmt;

/// A sequence of bits (each element is 0 or 1)
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitPath {
    /// The bit data
    bits: Vec<u8>,
}

impl BitPath {
    /// Create an empty path
    pub fn new() -> Self {
        BitPath { bits: Vec::new() }
    }

    /// Create from bytes (each byte becomes 8 bits)
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut bits = Vec::with_capacity(bytes.len() * 8);
        for byte in bytes {
            for shift in (0..8).rev() {
                bits.push((byte >> shift) & 1);
            }
        }
        BitPath { bits }
    }

    /// Create from raw bits
    pub fn from_raw(bits: Vec<u8>) -> Self {
        debug_assert!(bits.iter().all(|b| *b < 2));
        BitPath { bits }
    }

    /// Decode a packed path fragment as stored in Kv nodes and branch steps
    pub fn from_packed(packed: &[u8]) -> Result<Self> {
        let (&pad, body) = packed.split_first().ok_or(TrieError::InvalidPath)?;
        if pad > 7 || body.is_empty() {
            return Err(TrieError::InvalidPath);
        }

        let total = body.len() * 8 - pad as usize;
        let mut path = BitPath::from_bytes(body);

        // Padding bits must be zero so each path has one encoding
        if path.bits[total..].iter().any(|b| *b != 0) {
            return Err(TrieError::InvalidPath);
        }
        path.bits.truncate(total);

        Ok(path)
    }

    /// Encode to the packed format
    pub fn to_packed(&self) -> Vec<u8> {
        let pad = (8 - self.bits.len() % 8) % 8;

        let mut packed = Vec::with_capacity(1 + (self.bits.len() + pad) / 8);
        packed.push(pad as u8);

        for chunk in self.bits.chunks(8) {
            let byte = chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, bit)| acc | (bit << (7 - i)));
            packed.push(byte);
        }

        packed
    }

    /// Get length in bits
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Get bit at index
    pub fn get(&self, index: usize) -> Option<u8> {
        self.bits.get(index).copied()
    }

    /// Get first bit
    pub fn first(&self) -> Option<u8> {
        self.bits.first().copied()
    }

    /// Get slice from index
    pub fn slice(&self, start: usize) -> Self {
        BitPath {
            bits: self.bits[start..].to_vec(),
        }
    }

    /// Get slice range
    pub fn slice_range(&self, start: usize, end: usize) -> Self {
        BitPath {
            bits: self.bits[start..end].to_vec(),
        }
    }

    /// Find common prefix length with another path
    pub fn common_prefix_len(&self, other: &BitPath) -> usize {
        self.bits
            .iter()
            .zip(other.bits.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Check whether `prefix` is a prefix of this path
    pub fn starts_with(&self, prefix: &BitPath) -> bool {
        self.bits.starts_with(&prefix.bits)
    }

    /// Append another path
    pub fn extend(&mut self, other: &BitPath) {
        self.bits.extend_from_slice(&other.bits);
    }

    /// Push a single bit
    pub fn push(&mut self, bit: u8) {
        debug_assert!(bit < 2);
        self.bits.push(bit);
    }

    /// Get as slice
    pub fn as_slice(&self) -> &[u8] {
        &self.bits
    }
}

impl Default for BitPath {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitPath({})", self)
    }
}

impl fmt::Display for BitPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.bits {
            write!(f, "{}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes() {
        let path = BitPath::from_bytes(&[0xa5]);
        assert_eq!(path.len(), 8);
        assert_eq!(path.as_slice(), &[1, 0, 1, 0, 0, 1, 0, 1]);
    }

    #[test]
    fn test_packed_byte_aligned() {
        let path = BitPath::from_bytes(&[0xab, 0xcd]);
        let packed = path.to_packed();
        assert_eq!(packed, vec![0x00, 0xab, 0xcd]);
        assert_eq!(BitPath::from_packed(&packed).unwrap(), path);
    }

    #[test]
    fn test_packed_odd_length() {
        let path = BitPath::from_raw(vec![1, 0, 1]);
        let packed = path.to_packed();
        // Five padding bits, body 101_00000
        assert_eq!(packed, vec![0x05, 0xa0]);
        assert_eq!(BitPath::from_packed(&packed).unwrap(), path);
    }

    #[test]
    fn test_packed_single_bit() {
        let path = BitPath::from_raw(vec![1]);
        assert_eq!(path.to_packed(), vec![0x07, 0x80]);
    }

    #[test]
    fn test_from_packed_rejects_garbage() {
        assert_eq!(BitPath::from_packed(&[]), Err(TrieError::InvalidPath));
        // Pad count without a body
        assert_eq!(BitPath::from_packed(&[0x00]), Err(TrieError::InvalidPath));
        // Pad count out of range
        assert_eq!(BitPath::from_packed(&[0x08, 0xff]), Err(TrieError::InvalidPath));
        // Non-zero padding bits
        assert_eq!(BitPath::from_packed(&[0x05, 0xa1]), Err(TrieError::InvalidPath));
    }

    #[test]
    fn test_common_prefix() {
        let a = BitPath::from_raw(vec![1, 0, 1, 1, 0]);
        let b = BitPath::from_raw(vec![1, 0, 1, 0, 0]);

        assert_eq!(a.common_prefix_len(&b), 3);
        assert!(a.starts_with(&BitPath::from_raw(vec![1, 0, 1])));
        assert!(!a.starts_with(&b));
    }

    #[test]
    fn test_slice() {
        let path = BitPath::from_raw(vec![1, 1, 0, 0, 1]);

        assert_eq!(path.slice(2), BitPath::from_raw(vec![0, 0, 1]));
        assert_eq!(path.slice_range(1, 4), BitPath::from_raw(vec![1, 0, 0]));
    }
}
