//! Bit-prefix keys for locating nodes in the tree

use crate::field::Zp;
use crate::{CoreError, Result};
use bitvec::prelude::*;
use std::fmt;
use std::str::FromStr;

const LEN_PREFIX: usize = 4;

/// An ordered bit sequence used as a trie key
///
/// Bit `i` lives in byte `i / 8`, most significant bit first. Element keys
/// are built from the byte-reversed element encoding so the low-order bytes
/// of an element decide the top tree levels.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitKey {
    bits: BitVec<u8, Msb0>,
}

impl BitKey {
    /// The zero-length root key
    pub fn root() -> Self {
        Self::default()
    }

    /// A key of `len` zero bits
    pub fn zeroed(len: usize) -> Self {
        Self {
            bits: BitVec::repeat(false, len),
        }
    }

    /// Build a key holding `capacity` bits from raw bytes; excess bytes are
    /// dropped and missing bits are zero
    pub fn from_raw(bytes: &[u8], capacity: usize) -> Self {
        let mut bits = BitVec::<u8, Msb0>::from_slice(bytes);
        bits.resize(capacity, false);
        Self { bits }
    }

    /// The full key of a field element
    pub fn for_element(z: &Zp, capacity: usize) -> Self {
        let mut bytes = z.to_bytes_be();
        bytes.reverse();
        Self::from_raw(&bytes, capacity)
    }

    /// Length in bits
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Check if this is the root key
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Get a bit; positions past the end read as zero
    pub fn get(&self, index: usize) -> bool {
        self.bits.get(index).map_or(false, |b| *b)
    }

    /// Set a bit. Panics if `index >= len`, like slice indexing.
    pub fn set(&mut self, index: usize) {
        self.bits.set(index, true);
    }

    /// Clear a bit. Panics if `index >= len`, like slice indexing.
    pub fn unset(&mut self, index: usize) {
        self.bits.set(index, false);
    }

    /// Append one bit
    pub fn push(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    /// Shorten the key to `len` bits
    pub fn truncate(&mut self, len: usize) {
        self.bits.truncate(len);
    }

    /// Read `width` bits starting at level `depth` as a child index.
    /// Bit `j` of the index is key bit `depth * width + j`.
    pub fn index_at(&self, depth: usize, width: usize) -> usize {
        let start = depth * width;
        (0..width).fold(0, |acc, j| {
            if self.get(start + j) {
                acc | (1 << j)
            } else {
                acc
            }
        })
    }

    /// Key of child `index` under this key
    pub fn child(&self, index: usize, width: usize) -> Self {
        let mut key = self.clone();
        for j in 0..width {
            key.push((index >> j) & 1 == 1);
        }
        key
    }

    /// Key of the parent, or `None` for keys shorter than one level
    pub fn parent(&self, width: usize) -> Option<Self> {
        if self.len() < width || self.is_empty() {
            return None;
        }
        let mut key = self.clone();
        key.truncate(self.len() - width);
        Some(key)
    }

    /// Check if this key is a prefix of `other`
    pub fn is_prefix_of(&self, other: &BitKey) -> bool {
        self.len() <= other.len() && other.bits[..self.len()] == self.bits[..]
    }

    /// Serialize as a big-endian `u32` bit length followed by the packed bits
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(LEN_PREFIX + self.byte_len());
        out.extend_from_slice(&(self.len() as u32).to_be_bytes());
        // Truncation leaves stale bits past the end of the last byte
        let mut packed = self.bits.clone();
        packed.set_uninitialized(false);
        out.extend_from_slice(packed.as_raw_slice());
        out
    }

    /// Parse the encoding produced by [`BitKey::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LEN_PREFIX {
            return Err(CoreError::MalformedRecord(format!(
                "key of {} bytes lacks its length prefix",
                bytes.len()
            )));
        }
        let (prefix, body) = bytes.split_at(LEN_PREFIX);
        let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if body.len() != len.div_ceil(8) {
            return Err(CoreError::MalformedRecord(format!(
                "key of {len} bits needs {} bytes, found {}",
                len.div_ceil(8),
                body.len()
            )));
        }
        let key = Self::from_raw(body, len);
        // Padding bits must be clear so the encoding is canonical
        if key.to_bytes() != bytes {
            return Err(CoreError::MalformedRecord(
                "key padding bits are not zero".into(),
            ));
        }
        Ok(key)
    }

    fn byte_len(&self) -> usize {
        self.len().div_ceil(8)
    }
}

impl fmt::Display for BitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("<root>");
        }
        for bit in self.bits.iter().by_vals() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitKey({self})")
    }
}

impl FromStr for BitKey {
    type Err = CoreError;

    /// Parse a string of `0`/`1` characters; empty or `<root>` is the root key
    fn from_str(s: &str) -> Result<Self> {
        let mut key = BitKey::root();
        if s == "<root>" {
            return Ok(key);
        }
        for c in s.chars() {
            match c {
                '0' => key.push(false),
                '1' => key.push(true),
                other => {
                    return Err(CoreError::InvalidConfig(format!(
                        "invalid key character {other:?}"
                    )))
                }
            }
        }
        Ok(key)
    }
}
