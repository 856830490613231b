//! Prefix tree of field elements
//!
//! Elements are routed by the bits of their byte-reversed encoding,
//! `bit_quantum` bits per level. Every node keeps the evaluations of
//! `∏ (point_j - e)` over the elements below it at the tree's sample points:
//! - Leaves hold elements until their encoded payload outgrows the split threshold
//! - A split creates all `2^bit_quantum` children at once and rebuilds their sketches
//! - Each insert is staged and committed to the node store atomically

mod key;
mod node;
mod tree;
mod txn;

pub use key::BitKey;
pub use node::{NodeKind, PrefixNode};
pub use tree::{PrefixTree, TreeStats};
