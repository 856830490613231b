//! Finite field arithmetic over Z(p)
//!
//! Every value carries its modulus. Operations never mutate their operands;
//! they return a fresh, normalized value or a [`CoreError::FieldMismatch`]
//! when the operands come from different fields.

use crate::{CoreError, Result};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, LazyLock};

const P128_BYTES: [u8; 17] = [
    0x01, 0x11, 0x0d, 0xb2, 0x97, 0xcd, 0x30, 0x8d, 0x90, 0xe5, 0x3f, 0xb8, 0xa1, 0x30, 0x90, 0x97,
    0xe9,
];

const P160_BYTES: [u8; 21] = [
    0x01, 0xfe, 0x90, 0xe7, 0xb4, 0x19, 0x88, 0xa6, 0x41, 0xb1, 0xa6, 0xfe, 0xc8, 0x7d, 0x89, 0xa3,
    0x1e, 0x2a, 0x61, 0x31, 0xf5,
];

const P256_BYTES: [u8; 33] = [
    0x01, 0xdd, 0xf4, 0x8a, 0xc3, 0x45, 0x19, 0x18, 0x13, 0xab, 0x7d, 0x92, 0x27, 0x99, 0xe8, 0x93,
    0x96, 0x19, 0x43, 0x08, 0xa4, 0xa5, 0x09, 0x0b, 0x36, 0xc9, 0x62, 0xd5, 0xd5, 0xd6, 0xdd, 0x80,
    0x27,
];

const P512_BYTES: [u8; 65] = [
    0x01, 0xc7, 0x19, 0x72, 0x25, 0xf4, 0xa5, 0xd5, 0x8a, 0xc0, 0x02, 0xa4, 0xdc, 0x8d, 0xb1, 0xd9,
    0xb0, 0xa1, 0x5b, 0x7a, 0x43, 0x22, 0x5d, 0x5b, 0x51, 0xa8, 0x1c, 0x76, 0x17, 0x44, 0x2a, 0x4a,
    0x9c, 0x62, 0xdc, 0x9e, 0x25, 0xd6, 0xe3, 0x12, 0x1a, 0xea, 0xef, 0xac, 0xd9, 0xfd, 0x8d, 0x6c,
    0xb7, 0x26, 0x6d, 0x19, 0x15, 0x53, 0xd7, 0x0d, 0xb6, 0x68, 0x3b, 0x65, 0x40, 0x89, 0x18, 0x3e,
    0xbd,
];

static P128: LazyLock<Arc<BigUint>> = LazyLock::new(|| Arc::new(BigUint::from_bytes_be(&P128_BYTES)));
static P160: LazyLock<Arc<BigUint>> = LazyLock::new(|| Arc::new(BigUint::from_bytes_be(&P160_BYTES)));
static P256: LazyLock<Arc<BigUint>> = LazyLock::new(|| Arc::new(BigUint::from_bytes_be(&P256_BYTES)));
static P512: LazyLock<Arc<BigUint>> = LazyLock::new(|| Arc::new(BigUint::from_bytes_be(&P512_BYTES)));

/// Supported prime fields, named by the element width they hold
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldSize {
    /// Prime just above 2^128
    #[default]
    P128,
    /// Prime just above 2^160
    P160,
    /// Prime just above 2^256
    P256,
    /// Prime just above 2^512
    P512,
}

impl FieldSize {
    /// The prime modulus of this field
    pub fn modulus(&self) -> Arc<BigUint> {
        match self {
            FieldSize::P128 => Arc::clone(&P128),
            FieldSize::P160 => Arc::clone(&P160),
            FieldSize::P256 => Arc::clone(&P256),
            FieldSize::P512 => Arc::clone(&P512),
        }
    }

    /// Bit length of the modulus, which bounds element key capacity
    pub fn bit_len(&self) -> usize {
        self.modulus().bits() as usize
    }

    /// Create a value in this field
    pub fn element(&self, value: BigUint) -> Zp {
        Zp::new(self.modulus(), value)
    }
}

impl fmt::Display for FieldSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldSize::P128 => "p128",
            FieldSize::P160 => "p160",
            FieldSize::P256 => "p256",
            FieldSize::P512 => "p512",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for FieldSize {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "p128" | "128" => Ok(FieldSize::P128),
            "p160" | "160" => Ok(FieldSize::P160),
            "p256" | "256" => Ok(FieldSize::P256),
            "p512" | "512" => Ok(FieldSize::P512),
            other => Err(CoreError::InvalidConfig(format!("unknown field size: {other}"))),
        }
    }
}

/// A value in the finite field Z(p)
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Zp {
    value: BigUint,
    modulus: Arc<BigUint>,
}

impl Zp {
    /// Create a value, reducing it into `[0, p)`
    pub fn new(modulus: Arc<BigUint>, value: BigUint) -> Self {
        let value = value % modulus.as_ref();
        Self { value, modulus }
    }

    /// Create a value from a signed integer; negatives wrap around `p`
    pub fn from_i64(modulus: Arc<BigUint>, n: i64) -> Self {
        let magnitude = BigUint::from(n.unsigned_abs()) % modulus.as_ref();
        let value = if n < 0 && !magnitude.is_zero() {
            modulus.as_ref() - magnitude
        } else {
            magnitude
        };
        Self { value, modulus }
    }

    /// Create a value from big-endian bytes, reducing it into the field
    pub fn from_bytes_be(modulus: Arc<BigUint>, bytes: &[u8]) -> Self {
        Self::new(modulus, BigUint::from_bytes_be(bytes))
    }

    /// Decode big-endian bytes that must already be a canonical field value
    ///
    /// Only the minimal encoding is accepted: zero is `[0]` and no other value
    /// carries a leading zero byte.
    pub fn decode(modulus: Arc<BigUint>, bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || (bytes.len() > 1 && bytes[0] == 0) {
            return Err(CoreError::MalformedRecord(format!(
                "non-minimal value encoding {}",
                hex::encode(bytes)
            )));
        }
        let value = BigUint::from_bytes_be(bytes);
        if value >= *modulus {
            return Err(CoreError::MalformedRecord(format!(
                "value {value} is not below modulus {modulus}"
            )));
        }
        Ok(Self { value, modulus })
    }

    /// The additive identity
    pub fn zero(modulus: Arc<BigUint>) -> Self {
        Self {
            value: BigUint::zero(),
            modulus,
        }
    }

    /// The multiplicative identity
    pub fn one(modulus: Arc<BigUint>) -> Self {
        Self {
            value: BigUint::one(),
            modulus,
        }
    }

    /// The integer value in `[0, p)`
    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// The prime modulus
    pub fn modulus(&self) -> &Arc<BigUint> {
        &self.modulus
    }

    /// Minimal big-endian encoding of the value
    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.value.to_bytes_be()
    }

    /// Check if the value is zero
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Check that `other` lives in the same field
    pub fn check_field(&self, other: &Zp) -> Result<()> {
        if Arc::ptr_eq(&self.modulus, &other.modulus) || self.modulus == other.modulus {
            Ok(())
        } else {
            Err(CoreError::FieldMismatch {
                expected: self.modulus.to_string(),
                actual: other.modulus.to_string(),
            })
        }
    }

    /// Order two values of the same field
    pub fn compare(&self, other: &Zp) -> Result<Ordering> {
        self.check_field(other)?;
        Ok(self.value.cmp(&other.value))
    }

    /// `self + other (mod p)`
    pub fn add(&self, other: &Zp) -> Result<Zp> {
        self.check_field(other)?;
        Ok(Zp::new(Arc::clone(&self.modulus), &self.value + &other.value))
    }

    /// `self - other (mod p)`
    pub fn sub(&self, other: &Zp) -> Result<Zp> {
        self.check_field(other)?;
        let value = if self.value >= other.value {
            &self.value - &other.value
        } else {
            self.modulus.as_ref() - (&other.value - &self.value)
        };
        Ok(Zp {
            value,
            modulus: Arc::clone(&self.modulus),
        })
    }

    /// `self * other (mod p)`
    pub fn mul(&self, other: &Zp) -> Result<Zp> {
        self.check_field(other)?;
        Ok(Zp::new(Arc::clone(&self.modulus), &self.value * &other.value))
    }

    /// `-self (mod p)`
    pub fn neg(&self) -> Zp {
        let value = if self.value.is_zero() {
            BigUint::zero()
        } else {
            self.modulus.as_ref() - &self.value
        };
        Zp {
            value,
            modulus: Arc::clone(&self.modulus),
        }
    }
}

impl fmt::Display for Zp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl fmt::Debug for Zp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Zp({} mod {}-bit p)", self.value, self.modulus.bits())
    }
}

/// Generate `n` sample points: `0, -1, 1, -2, 2, ...` in the field
pub fn sample_points(modulus: &Arc<BigUint>, n: usize) -> Vec<Zp> {
    (0..n)
        .map(|i| {
            let magnitude = ((i + 1) / 2) as i64;
            let v = if i % 2 == 0 { magnitude } else { -magnitude };
            Zp::from_i64(Arc::clone(modulus), v)
        })
        .collect()
}

/// Per-element multipliers `[point_j - z]` applied to every sketch on the insert path
pub fn delta_vector(points: &[Zp], z: &Zp) -> Result<Vec<Zp>> {
    points.iter().map(|p| p.sub(z)).collect()
}
