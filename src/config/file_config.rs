//! Configuration file support for paper-enrich.
//!
//! # Configuration File Format
//!
//! ```toml
//! [lookup]
//! backend = "semantic"            # or "crossref"
//! semantic_scholar_api_key = "your-api-key"
//! requests_per_second = 1.0
//! max_candidates = 5
//!
//! [retry]
//! max_attempts = 5
//! initial_delay_ms = 1000
//! max_delay_ms = 60000
//!
//! [matching]
//! threshold = 0.85
//! tie_margin = 0.05
//! ambiguity = "fail"              # or "take-best"
//!
//! [enrich]
//! title_column = "paper_title"
//! authors_column = "authors"
//! output_fields = ["paperId", "doi", "abstract", "venue", "citationCount"]
//! column_prefix = ""
//! status_column = "enrichment_status"
//! overwrite = false
//!
//! [dataset]
//! in_place = true
//! delimiter = ","
//! rows = ":"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use super::Settings;

/// File name looked up in the working directory
const LOCAL_CONFIG_FILE: &str = "paper-enrich.toml";

impl Settings {
    /// Load configuration from a TOML file, without environment overrides
    pub fn load_toml(path: &Path) -> Result<Self, ConfigFileError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save_toml(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }

    /// Render as pretty TOML
    pub fn to_toml(&self) -> Result<String, ConfigFileError> {
        toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))
    }
}

/// Per-user configuration path: `<config_dir>/paper-enrich/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("paper-enrich").join("config.toml"))
}

/// Find a configuration file: `./paper-enrich.toml` first, then the per-user path
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    default_config_path().filter(|p| p.is_file())
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
