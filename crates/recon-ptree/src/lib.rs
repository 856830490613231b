//! # Recon Prefix Tree
//!
//! Core sketch engine for set reconciliation.
//!
//! This crate provides:
//! - **Finite fields**: exact modular arithmetic over fixed prime fields
//! - **Prefix Trees**: tries over element bits with per-node polynomial sketches
//! - **Codecs**: lossless encoding of field value arrays and bit-prefix keys
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     Reconciliation Protocol (peer)      │
//! ├─────────────────────────────────────────┤
//! │              Prefix Tree                │
//! ├───────────────────┬─────────────────────┤
//! │  Field arithmetic │  Key/array codecs   │
//! ├───────────────────┴─────────────────────┤
//! │               NodeStore                 │
//! └─────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod field;
pub mod ptree;

pub use config::TreeConfig;
pub use error::{CoreError, Result};
pub use field::{FieldSize, Zp};
pub use ptree::{BitKey, PrefixNode, PrefixTree, TreeStats};
