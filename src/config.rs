use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{DoxprepError, Result};

pub const CONFIG_FILE: &str = "doxprep.toml";

/// Contents of an optional `doxprep.toml`.
///
/// Every table and key may be omitted; command-line flags take precedence
/// over anything set here.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct DoxprepConfig {
    #[serde(default)]
    pub docs: DocsConfig,
    #[serde(default)]
    pub ci: CiConfig,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct DocsConfig {
    /// Repository whose GitHub Pages links are turned into `@ref`s.
    pub repo: Option<String>,
    /// Mirrors Doxygen's `CASE_SENSE_NAMES`.
    #[serde(default)]
    pub case_sense_names: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CiConfig {
    pub boards: Option<Vec<String>>,
    #[serde(default = "default_skip_examples")]
    pub skip_examples: Vec<String>,
    #[serde(default = "default_support_url")]
    pub support_url: String,
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            boards: None,
            skip_examples: default_skip_examples(),
            support_url: default_support_url(),
        }
    }
}

fn default_skip_examples() -> Vec<String> {
    [".history", "logger_test", "menu_a_la_carte"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_support_url() -> String {
    "https://raw.githubusercontent.com/EnviroDIY/workflows/main/scripts".to_string()
}

impl DoxprepConfig {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DoxprepError::ConfigParse(e.to_string()))
    }

    /// Load the config at `path`, falling back to defaults when it is absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// Load `doxprep.toml` from the current directory.
pub fn load_config() -> Result<DoxprepConfig> {
    DoxprepConfig::load_from(Path::new(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = DoxprepConfig::parse("").unwrap();
        assert!(config.docs.repo.is_none());
        assert!(!config.docs.case_sense_names);
        assert!(config.ci.boards.is_none());
        assert_eq!(config.ci.skip_examples.len(), 3);
        assert!(config.ci.support_url.starts_with("https://"));
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[docs]
repo = "ModularSensors"
case_sense_names = true

[ci]
boards = ["mayfly", "uno"]
skip_examples = ["scratch"]
"#;
        let config = DoxprepConfig::parse(toml_str).unwrap();
        assert_eq!(config.docs.repo.as_deref(), Some("ModularSensors"));
        assert!(config.docs.case_sense_names);
        assert_eq!(
            config.ci.boards,
            Some(vec!["mayfly".to_string(), "uno".to_string()])
        );
        assert_eq!(config.ci.skip_examples, vec!["scratch".to_string()]);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let err = DoxprepConfig::parse("[docs\nrepo = ").unwrap_err();
        assert!(matches!(err, DoxprepError::ConfigParse(_)));
    }

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = DoxprepConfig::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert!(config.docs.repo.is_none());
    }
}
