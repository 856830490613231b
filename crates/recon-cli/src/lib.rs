//! # Recon CLI
//!
//! Offline tooling for the reconciliation prefix tree.
//!
//! This crate provides:
//! - **build**: load hex elements into an in-memory tree and print its root sketch
//! - **show**: print a single node by its bit-prefix key
//! - **points**: list the sample points of the configured field
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          ptree (clap commands)          │
//! ├─────────────────────────────────────────┤
//! │   CliConfig (TOML file + RECON_* env)   │
//! ├─────────────────────────────────────────┤
//! │              recon-ptree                │
//! ├─────────────────────────────────────────┤
//! │   recon-store (cached in-memory store)  │
//! └─────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod config;

pub use config::CliConfig;
