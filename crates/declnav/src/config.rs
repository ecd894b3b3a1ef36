//! Project configuration.
//!
//! Loads settings from `.declnav.toml` in the project root.
//! Uses figment for layered configuration with provenance tracking.

use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default directories to exclude when walking a project.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    ".vs",
    ".idea",
    "build",
    "out",
    "cmake-build-debug",
    "cmake-build-release",
    "target",
];

/// Navigation engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Directories searched for `#include <...>` and unresolved `"..."`
    /// includes, relative to the project root.
    #[serde(default)]
    pub include_dirs: Vec<String>,

    /// Additional directories to exclude from the walk (merged with defaults).
    #[serde(default)]
    pub exclude_dirs: Vec<String>,

    /// Maximum recursion depth for extraction (default: 500).
    #[serde(default = "default_recursion_depth")]
    pub max_recursion_depth: usize,

    /// Whether to respect .gitignore files when walking (default: true).
    #[serde(default = "default_respect_gitignore")]
    pub respect_gitignore: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include_dirs: Vec::new(),
            exclude_dirs: Vec::new(),
            max_recursion_depth: default_recursion_depth(),
            respect_gitignore: default_respect_gitignore(),
        }
    }
}

fn default_recursion_depth() -> usize {
    500
}

fn default_respect_gitignore() -> bool {
    true
}

impl Config {
    /// Load configuration from `.declnav.toml` in the given root directory.
    ///
    /// Returns default config if the file doesn't exist. Parse errors are
    /// reported with file, line, and key information and fall back to the
    /// defaults.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(".declnav.toml");

        // Layered config: defaults <- toml file
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let figment = if config_path.exists() {
            figment.merge(Toml::file(&config_path))
        } else {
            figment
        };

        match figment.extract() {
            Ok(config) => {
                if config_path.exists() {
                    tracing::info!("Loaded config from {:?}", config_path);
                }
                config
            }
            Err(e) => {
                tracing::warn!("Config error: {}", e);
                Self::default()
            }
        }
    }

    /// All directories to exclude (defaults + user-configured).
    pub fn excluded_dirs(&self) -> Vec<&str> {
        let mut dirs: Vec<&str> = DEFAULT_EXCLUDE_DIRS.to_vec();
        for dir in &self.exclude_dirs {
            if !dirs.contains(&dir.as_str()) {
                dirs.push(dir.as_str());
            }
        }
        dirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.include_dirs.is_empty());
        assert_eq!(config.max_recursion_depth, 500);
        assert!(config.respect_gitignore);
        let excluded = config.excluded_dirs();
        assert!(excluded.contains(&".git"));
        assert!(excluded.contains(&"build"));
    }

    #[test]
    fn test_load_missing_config() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path());
        assert!(config.exclude_dirs.is_empty());
    }

    #[test]
    fn test_load_config() {
        let temp = TempDir::new().unwrap();
        let config_content = r#"
include_dirs = ["include", "third_party/include"]
exclude_dirs = ["generated"]
"#;
        std::fs::write(temp.path().join(".declnav.toml"), config_content).unwrap();

        let config = Config::load(temp.path());
        assert_eq!(config.include_dirs, vec!["include", "third_party/include"]);

        let excluded = config.excluded_dirs();
        assert!(excluded.contains(&"generated"));
        assert!(excluded.contains(&".git")); // default still present
    }

    #[test]
    fn test_invalid_config_returns_defaults() {
        let temp = TempDir::new().unwrap();
        // Invalid: max_recursion_depth should be a number, not a string
        let config_content = r#"
max_recursion_depth = "not a number"
"#;
        std::fs::write(temp.path().join(".declnav.toml"), config_content).unwrap();

        let config = Config::load(temp.path());
        assert_eq!(config.max_recursion_depth, 500); // default value
    }

    #[test]
    fn test_partial_config_merges_with_defaults() {
        let temp = TempDir::new().unwrap();
        let config_content = r#"
respect_gitignore = false
"#;
        std::fs::write(temp.path().join(".declnav.toml"), config_content).unwrap();

        let config = Config::load(temp.path());
        assert!(!config.respect_gitignore); // from config
        assert_eq!(config.max_recursion_depth, 500); // from defaults
    }
}
