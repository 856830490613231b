//! Tree configuration

use crate::field::FieldSize;
use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Default bits consumed per tree level
pub const DEFAULT_BIT_QUANTUM: usize = 2;

/// Default sample point parameter
pub const DEFAULT_M_BAR: usize = 5;

/// Default split threshold multiplier
pub const DEFAULT_THRESH_MULT: usize = 10;

/// Largest supported bit quantum (fan-out 256)
pub const MAX_BIT_QUANTUM: usize = 8;

/// Configuration for prefix tree behavior
///
/// Only the field and the three tuning knobs are configured; sample count and
/// both thresholds are derived from them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Prime field the elements live in
    pub field: FieldSize,
    /// Key bits consumed per level
    pub bit_quantum: usize,
    /// Sample point parameter; the tree keeps `m_bar + 1` sample values per node
    pub m_bar: usize,
    /// Leaf payload budget multiplier
    pub thresh_mult: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            field: FieldSize::default(),
            bit_quantum: DEFAULT_BIT_QUANTUM,
            m_bar: DEFAULT_M_BAR,
            thresh_mult: DEFAULT_THRESH_MULT,
        }
    }
}

impl TreeConfig {
    /// Check the configured values
    pub fn validate(&self) -> Result<()> {
        if self.bit_quantum == 0 || self.bit_quantum > MAX_BIT_QUANTUM {
            return Err(CoreError::InvalidConfig(format!(
                "bit_quantum must be in 1..={MAX_BIT_QUANTUM}, got {}",
                self.bit_quantum
            )));
        }
        if self.m_bar == 0 {
            return Err(CoreError::InvalidConfig("m_bar must be at least 1".into()));
        }
        if self.thresh_mult == 0 {
            return Err(CoreError::InvalidConfig(
                "thresh_mult must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Number of sample points
    pub fn num_samples(&self) -> usize {
        self.m_bar + 1
    }

    /// Leaf payload size in bytes above which a leaf splits
    pub fn split_threshold(&self) -> usize {
        self.thresh_mult * self.m_bar
    }

    /// Payload size below which siblings would merge. Unused: removal is unsupported.
    pub fn join_threshold(&self) -> usize {
        self.split_threshold() / 2
    }

    /// Children per internal node
    pub fn fan_out(&self) -> usize {
        1 << self.bit_quantum
    }

    /// Maximum key length in bits
    pub fn key_capacity(&self) -> usize {
        self.field.bit_len()
    }

    /// Number of levels, counted from the root, whose leaves may split.
    /// A leaf at depth `d` splits on key bits `d*bq..(d+1)*bq`, so every
    /// depth below this value has a whole level of bits left.
    pub fn splittable_levels(&self) -> usize {
        self.key_capacity() / self.bit_quantum
    }
}
