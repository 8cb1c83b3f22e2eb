//! YAML plugin configuration.

use crate::config::DriftConfig;
use driftkit_spi::{DriftError, DriftResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One discovery plugin entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Plugin name
    pub name: String,
    /// Whether the plugin is registered at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Registration order: lower number = higher priority
    #[serde(default)]
    pub priority: i32,
    /// Resource types the plugin contributes
    #[serde(default)]
    pub resource_types: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

/// Top-level plugin configuration file.
///
/// ```yaml
/// discovery_plugins:
///   aws:
///     - name: ec2
///       priority: 1
///       resource_types: [aws_instance]
///     - name: s3
///       priority: 2
/// discovery_settings:
///   max_workers: 4
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin descriptors per provider name
    #[serde(default)]
    pub discovery_plugins: BTreeMap<String, Vec<PluginDescriptor>>,
    /// Global knobs, same shape as [`DriftConfig`]
    #[serde(default)]
    pub discovery_settings: DriftConfig,
}

impl PluginConfig {
    /// Parse from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> DriftResult<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| DriftError::Validation(format!("plugin config: {}", e)))
    }

    /// Parse from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> DriftResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DriftError::Validation(format!(
                "plugin config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Enabled plugins for one provider, ascending priority.
    ///
    /// Disabled plugins are skipped with a debug log.
    pub fn ordered_plugins(&self, provider: &str) -> Vec<&PluginDescriptor> {
        let mut plugins: Vec<&PluginDescriptor> = self
            .discovery_plugins
            .get(provider)
            .map(|list| {
                list.iter()
                    .filter(|p| {
                        if !p.enabled {
                            tracing::debug!(provider, plugin = %p.name, "plugin disabled, skipping");
                        }
                        p.enabled
                    })
                    .collect()
            })
            .unwrap_or_default();
        plugins.sort_by_key(|p| p.priority);
        plugins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
discovery_plugins:
  aws:
    - name: s3
      priority: 2
      resource_types: [aws_s3_bucket]
    - name: ec2
      priority: 1
      resource_types: [aws_instance, aws_ebs_volume]
    - name: legacy
      enabled: false
      priority: 0
  digitalocean:
    - name: droplets
discovery_settings:
  max_workers: 4
  cache_ttl: 120
"#;

    #[test]
    fn test_parse_sample() {
        let config = PluginConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.discovery_plugins["aws"].len(), 3);
        assert_eq!(config.discovery_settings.max_workers, 4);
        assert_eq!(
            config.discovery_settings.cache_ttl,
            std::time::Duration::from_secs(120)
        );
    }

    #[test]
    fn test_ordering_and_enabled_filtering() {
        let config = PluginConfig::from_yaml_str(SAMPLE).unwrap();
        let plugins = config.ordered_plugins("aws");
        // `legacy` is disabled; `ec2` (1) sorts before `s3` (2)
        assert_eq!(
            plugins.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["ec2", "s3"]
        );
    }

    #[test]
    fn test_unknown_provider_is_empty() {
        let config = PluginConfig::from_yaml_str(SAMPLE).unwrap();
        assert!(config.ordered_plugins("oracle").is_empty());
    }

    #[test]
    fn test_invalid_yaml_is_a_validation_error() {
        let err = PluginConfig::from_yaml_str("discovery_plugins: [not, a, map]").unwrap_err();
        assert_eq!(err.kind(), driftkit_spi::ErrorKind::Validation);
    }
}
