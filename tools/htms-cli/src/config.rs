//! CLI configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use htms_core::{PipelineConfig, ResolutionPolicy};
use htms_http::HtmsOptions;
use serde::{Deserialize, Serialize};

/// CLI configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Pipeline options for rendered documents.
    #[serde(default)]
    pub render: RenderConfig,

    /// Fragment directory used to resolve tasks.
    #[serde(default)]
    pub fragments: FragmentsConfig,

    /// Options for serving documents over HTTP.
    #[serde(default)]
    pub server: HtmsOptions,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if is_json(path) {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// `[render]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Show error details in failed chunks.
    #[serde(default)]
    pub debug: bool,

    /// `graceful` or `fatal`.
    #[serde(default)]
    pub resolution: ResolutionPolicy,
}

impl RenderConfig {
    /// Pipeline configuration with command-line overrides applied.
    pub fn pipeline_config(&self, debug: bool, fatal: bool) -> PipelineConfig {
        let resolution = if fatal {
            ResolutionPolicy::Fatal
        } else {
            self.resolution
        };

        PipelineConfig::new()
            .with_debug(self.debug || debug)
            .with_resolution(resolution)
    }
}

/// `[fragments]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentsConfig {
    /// Fragment root; defaults to the document's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Fragment file extension.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Keep fragments in memory after the first read.
    #[serde(default)]
    pub cache: bool,
}

fn default_extension() -> String {
    "html".to_string()
}

impl Default for FragmentsConfig {
    fn default() -> Self {
        Self {
            root: None,
            extension: default_extension(),
            cache: false,
        }
    }
}

/// Generate a default htms.toml config file.
pub fn generate_default_config() -> String {
    r#"# htms configuration

[render]
debug = false
# graceful: failed task lookups render an error chunk
# fatal: failed task lookups end the stream
resolution = "graceful"

[fragments]
# root = "fragments"
extension = "html"
cache = false

[server]
root = "public"
index = "index.html"
patterns = ["**/*.html", "**/*.htm"]
compression = true
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: CliConfig = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.render, RenderConfig::default());
        assert_eq!(config.fragments, FragmentsConfig::default());
        assert_eq!(config.server.root, PathBuf::from("public"));
        assert_eq!(config.server.index, "index.html");
    }

    #[test]
    fn test_partial_config() {
        let config: CliConfig = toml::from_str("[render]\nresolution = \"fatal\"\n").unwrap();
        assert_eq!(config.render.resolution, ResolutionPolicy::Fatal);
        assert_eq!(config.fragments.extension, "html");
        assert!(config.server.compression);
    }

    #[test]
    fn test_flags_override_config() {
        let render = RenderConfig::default();
        let config = render.pipeline_config(true, true);
        assert!(config.debug);
        assert_eq!(config.resolution, ResolutionPolicy::Fatal);
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("htms.json");

        let mut config = CliConfig::default();
        config.fragments.cache = true;
        config.save(&path).unwrap();

        assert_eq!(CliConfig::load(&path).unwrap(), config);
    }
}
