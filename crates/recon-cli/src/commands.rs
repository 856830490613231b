//! Command implementations

use crate::config::CliConfig;
use anyhow::Context;
use num_bigint::BigUint;
use recon_ptree::field::sample_points;
use recon_ptree::{BitKey, PrefixNode, PrefixTree, Zp};
use recon_store::{CachedNodeStore, MemoryNodeStore};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Tree type the commands work on
pub type CliTree = PrefixTree<CachedNodeStore<MemoryNodeStore>>;

/// Parse one hex element per line; blank lines and `#` comments are skipped.
/// Every element must already lie below `modulus`.
pub fn parse_elements(input: &str, modulus: &BigUint) -> anyhow::Result<Vec<BigUint>> {
    input
        .lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(n, line)| {
            let digits = line.trim_start_matches("0x");
            let digits = if digits.len() % 2 == 1 {
                format!("0{digits}")
            } else {
                digits.to_string()
            };
            let bytes = hex::decode(&digits)
                .with_context(|| format!("line {n}: invalid hex element {line:?}"))?;
            let value = BigUint::from_bytes_be(&bytes);
            if value >= *modulus {
                anyhow::bail!(
                    "line {n}: element {line} is not below the field modulus {modulus:x}"
                );
            }
            Ok(value)
        })
        .collect()
}

/// Open an in-memory tree and insert every element from `path`
pub async fn build_tree(config: &CliConfig, path: &Path) -> anyhow::Result<CliTree> {
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("reading elements from {}", path.display()))?;
    let values = parse_elements(&input, &config.tree.field.modulus())?;

    let store = CachedNodeStore::new(MemoryNodeStore::new(), config.cache_capacity)?;
    let tree = PrefixTree::open(Arc::new(store), config.tree.clone()).await?;
    let elements: Vec<Zp> = values.into_iter().map(|v| tree.element(v)).collect();
    let inserted = tree.insert_all(&elements).await?;
    info!(inserted, "tree built");
    Ok(tree)
}

/// Render a node for display
pub fn describe_node(node: &PrefixNode) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "key:          {}", node.key());
    let _ = writeln!(out, "leaf:         {}", node.is_leaf());
    let _ = writeln!(out, "num_elements: {}", node.size());
    for (j, sv) in node.svalues().iter().enumerate() {
        let _ = writeln!(out, "svalue[{j}]:    {sv}");
    }
    for e in node.elements() {
        let _ = writeln!(out, "element:      {:x}", e.value());
    }
    out
}

/// `build`: insert elements, report the root sketch and tree shape
pub async fn build(config: &CliConfig, elements: &Path) -> anyhow::Result<String> {
    let tree = build_tree(config, elements).await?;
    let stats = tree.stats().await?;
    let mut out = describe_node(&tree.root().await?);
    let _ = writeln!(out, "nodes:        {}", stats.node_count);
    let _ = writeln!(out, "leaves:       {}", stats.leaf_count);
    let _ = writeln!(out, "max_depth:    {}", stats.max_depth);
    let _ = writeln!(out, "largest_leaf: {}", stats.max_leaf_elements);
    Ok(out)
}

/// `show`: insert elements, then print the node stored under `key`
pub async fn show(config: &CliConfig, elements: &Path, key: &str) -> anyhow::Result<String> {
    let tree = build_tree(config, elements).await?;
    let key: BitKey = key.parse()?;
    let node = tree.node(&key).await?;
    Ok(describe_node(&node))
}

/// `points`: list the sample points of the configured field
pub fn points(config: &CliConfig) -> String {
    let modulus = config.tree.field.modulus();
    let mut out = String::new();
    let _ = writeln!(out, "field: {} (modulus {modulus})", config.tree.field);
    for (i, p) in sample_points(&modulus, config.tree.num_samples()).iter().enumerate() {
        let _ = writeln!(out, "point[{i}]: {p}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_ptree::FieldSize;
    use std::io::Write;

    #[test]
    fn test_parse_elements() {
        let input = "# fingerprints\n0x01\nabc\n\n  ff  # trailing\n";
        let values = parse_elements(input, &FieldSize::P128.modulus()).unwrap();
        assert_eq!(
            values,
            vec![BigUint::from(1u32), BigUint::from(0xabcu32), BigUint::from(0xffu32)]
        );
    }

    #[test]
    fn test_parse_elements_reports_line() {
        let err = parse_elements("01\nzz\n", &FieldSize::P128.modulus()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_elements_rejects_values_outside_field() {
        let modulus = FieldSize::P128.modulus();
        let below = &*modulus - 1u32;
        let input = format!("{below:x}\n# too large\n{:x}\n", &*modulus);
        let err = parse_elements(&input, &modulus).unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");

        assert_eq!(parse_elements(&format!("{below:x}\n"), &modulus).unwrap(), vec![below]);
    }

    #[test]
    fn test_points_output() {
        let out = points(&CliConfig::default());
        assert!(out.starts_with("field: p128"));
        assert_eq!(out.lines().count(), 1 + CliConfig::default().tree.num_samples());
        assert!(out.contains("point[0]: 0"));
    }

    #[tokio::test]
    async fn test_build_and_show() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for v in 0..40u32 {
            writeln!(file, "{:x}", v * 7919).unwrap();
        }

        let config = CliConfig::default();
        let out = build(&config, file.path()).await.unwrap();
        assert!(out.contains("num_elements: 40"));
        assert!(out.contains("leaf:         false"));

        let out = show(&config, file.path(), "").await.unwrap();
        assert!(out.contains("key:          <root>"));

        let err = show(&config, file.path(), "0101010101").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
