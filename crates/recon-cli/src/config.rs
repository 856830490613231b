//! CLI configuration

use recon_ptree::TreeConfig;
use recon_store::DEFAULT_CACHE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix, e.g. `RECON_TREE__M_BAR=8`
pub const ENV_PREFIX: &str = "RECON";

/// Settings for the `ptree` tool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Prefix tree parameters
    pub tree: TreeConfig,
    /// Node record cache entries
    pub cache_capacity: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            tree: TreeConfig::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl CliConfig {
    /// Layer defaults, an optional TOML file and `RECON_*` environment variables
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: CliConfig = settings.try_deserialize()?;
        config.tree.validate()?;
        Ok(config)
    }
}
