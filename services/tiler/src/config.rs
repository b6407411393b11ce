//! Tiler configuration.
//!
//! A YAML file supplies the tiling settings, the database connection and an
//! optional product table. `${VAR}` and `${VAR:-default}` are expanded from
//! the environment before parsing, then a few variables override the
//! parsed values:
//!
//! - `DATABASE_URL`: database.url
//! - `TILER_SCRATCH_DIR`: scratch_dir
//! - `TILER_MAX_CONCURRENCY`: max_concurrency

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use radar_common::ProductDescriptor;
use tiling::{ProductCatalog, TilingSettings};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

/// Top-level tiler configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilerConfig {
    #[serde(flatten)]
    pub tiling: TilingSettings,

    pub database: DatabaseConfig,

    /// Replaces the builtin product table when present
    pub products: Option<Vec<ProductDescriptor>>,
}

impl TilerConfig {
    /// Load from an optional YAML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read tiler config from {:?}", path))?;
        Self::from_yaml_str(&content).with_context(|| format!("Invalid tiler config {:?}", path))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: TilerConfig =
            serde_yaml::from_str(&expanded).context("Failed to parse tiler config YAML")?;
        Ok(config)
    }

    /// Apply variable overrides; `lookup` returns a variable's value if set.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = set("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(dir) = set("TILER_SCRATCH_DIR") {
            self.tiling.scratch_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = set("TILER_MAX_CONCURRENCY") {
            self.tiling.max_concurrency = value
                .trim()
                .parse()
                .with_context(|| format!("TILER_MAX_CONCURRENCY is not a number: {:?}", value))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.tiling.validate()?;
        anyhow::ensure!(
            self.database.max_connections > 0,
            "database.max_connections must be at least 1"
        );
        self.catalog()?;
        Ok(())
    }

    /// The configured product table, or the builtin one.
    pub fn catalog(&self) -> Result<ProductCatalog> {
        match &self.products {
            Some(entries) => Ok(ProductCatalog::from_entries(entries.clone())?),
            None => Ok(ProductCatalog::builtin()),
        }
    }
}

/// Expand `${VAR}` and `${VAR:-default}` in YAML content.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .with_context(|| format!("Unclosed variable substitution: ${{{}", after))?;
        result.push_str(&resolve_var_expr(&after[..end])?);
        rest = &after[end + 1..];
    }
    result.push_str(rest);

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((name, default)) = expr.split_once(":-") {
        match std::env::var(name.trim()) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let config = TilerConfig::default();
        assert_eq!(config.tiling.zoom_sizes, vec![2, 5, 10, 20]);
        assert_eq!(config.database.max_connections, 10);
        assert!(config.database.url.is_none());
        assert_eq!(config.catalog().unwrap().len(), ProductCatalog::builtin().len());
    }

    #[test]
    fn test_parse_flattened_settings() {
        let yaml = r#"
zoom_sizes: [5]
dpi: 50
y_step_km: 44.5
collection_prefix: P
retry:
  max_retries: 1
database:
  url: postgresql://localhost/radar
"#;
        let config = TilerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.tiling.zoom_sizes, vec![5]);
        assert_eq!(config.tiling.dpi, 50);
        assert_eq!(config.tiling.grid.x_step_km, 44.5);
        assert_eq!(config.tiling.grid.y_step_km, 44.5);
        assert_eq!(config.tiling.collection_prefix, "P");
        assert_eq!(config.tiling.retry.max_retries, 1);
        assert_eq!(config.database.url.as_deref(), Some("postgresql://localhost/radar"));
        assert_eq!(config.database.max_connections, 10);
        config.validate().unwrap();
    }

    #[test]
    fn test_overrides() {
        let mut config = TilerConfig::default();
        config
            .apply_overrides(vars(&[
                ("DATABASE_URL", "postgresql://db/tiles"),
                ("TILER_SCRATCH_DIR", "/var/tmp/tiles"),
                ("TILER_MAX_CONCURRENCY", " 3 "),
            ]))
            .unwrap();
        assert_eq!(config.database.url.as_deref(), Some("postgresql://db/tiles"));
        assert_eq!(config.tiling.scratch_dir, Some(PathBuf::from("/var/tmp/tiles")));
        assert_eq!(config.tiling.max_concurrency, 3);

        let err = config
            .apply_overrides(vars(&[("TILER_MAX_CONCURRENCY", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("TILER_MAX_CONCURRENCY"));
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let mut config = TilerConfig::default();
        config.database.url = Some("postgresql://from-file".to_string());
        config.apply_overrides(vars(&[("DATABASE_URL", "")])).unwrap();
        assert_eq!(config.database.url.as_deref(), Some("postgresql://from-file"));
    }

    #[test]
    fn test_custom_products() {
        let yaml = r#"
products:
  - scan_code: 94
    elevation_angle: 0.5
    display_code: N0Q
    title: Base Reflectivity Data Array - Tilt 1
    color_scheme: NWSRef
    quantity: reflectivity
"#;
        let config = TilerConfig::from_yaml_str(yaml).unwrap();
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.resolve(19, 0.5).is_err());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let config = TilerConfig::from_yaml_str("zoom_sizes: []").unwrap();
        assert!(config.validate().is_err());

        let config = TilerConfig::from_yaml_str("products: []").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TILER_TEST_PREFIX", "P");
        std::env::remove_var("TILER_TEST_UNSET");
        let expanded =
            expand_env_vars("prefix: ${TILER_TEST_PREFIX}\ndir: ${TILER_TEST_UNSET:-/tmp/x}\n").unwrap();
        assert_eq!(expanded, "prefix: P\ndir: /tmp/x\n");

        assert!(expand_env_vars("${TILER_TEST_UNSET}").is_err());
        assert!(expand_env_vars("${TILER_TEST_PREFIX").is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiler.yaml");
        fs::write(&path, "zoom_sizes: [10]\njob_timeout_secs: 30\n").unwrap();

        let config = TilerConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.tiling.zoom_sizes, vec![10]);
        assert_eq!(config.tiling.job_timeout_secs, 30);

        assert!(TilerConfig::from_yaml_file(&dir.path().join("missing.yaml")).is_err());
    }
}
