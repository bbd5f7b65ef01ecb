//! Configuration file (`codescape.toml`).
//!
//! Every section is optional; missing keys fall back to the defaults below.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::palette::Palette;
use crate::domain::trace::DEFAULT_SYNTHETIC_MARKER;

pub const DEFAULT_CONFIG_FILE: &str = "codescape.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub trace: TraceConfig,
    pub palette: Palette,
    pub view: ViewConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Trace records whose class contains this marker are spliced out.
    pub synthetic_marker: String,
    /// Depth a new session starts with in trace depth mode.
    pub default_depth: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            synthetic_marker: DEFAULT_SYNTHETIC_MARKER.to_string(),
            default_depth: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Group path and trace nodes by package.
    pub clustering: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self { clustering: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads for load-time passes; 0 picks half the cores.
    pub workers: usize,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid configuration file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content)
    }

    /// Load `path` if given, else `codescape.toml` in the working directory
    /// if present, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::palette::Rgb;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.trace.default_depth, 1);
        assert_eq!(config.trace.synthetic_marker, "$");
        assert!(config.view.clustering);
    }

    #[test]
    fn test_partial_config() {
        let config = Config::from_toml(
            r#"
            [trace]
            default_depth = 3

            [palette]
            call_start = { r = 0.0, g = 0.0, b = 1.0 }
            "#,
        )
        .unwrap();
        assert_eq!(config.trace.default_depth, 3);
        assert_eq!(config.trace.synthetic_marker, "$");
        assert_eq!(config.palette.call_start, Rgb::new(0.0, 0.0, 1.0));
        assert_eq!(config.palette.call_end, Rgb::RED);
    }

    #[test]
    fn test_unknown_types_are_rejected() {
        assert!(Config::from_toml("[view]\nclustering = \"yes\"").is_err());
    }
}
