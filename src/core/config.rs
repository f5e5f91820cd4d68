//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::PathBuf;

/// Default Monte Carlo iteration count when neither config nor CLI sets one
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// PBT configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default Monte Carlo iteration count
    pub iterations: Option<u32>,

    /// Fixed RNG seed for reproducible Monte Carlo runs
    pub seed: Option<u64>,

    /// Default output format
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/pbt/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                if let Ok(contents) = std::fs::read_to_string(&global_path) {
                    if let Ok(global) = serde_yml::from_str::<Config>(&contents) {
                        config.merge(global);
                    }
                }
            }
        }

        // 3. Environment variables
        if let Ok(value) = std::env::var("PBT_ITERATIONS") {
            if let Ok(iterations) = value.parse() {
                config.iterations = Some(iterations);
            }
        }
        if let Ok(value) = std::env::var("PBT_SEED") {
            if let Ok(seed) = value.parse() {
                config.seed = Some(seed);
            }
        }
        if let Ok(format) = std::env::var("PBT_FORMAT") {
            config.default_format = Some(format);
        }

        config
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "pbt")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.iterations.is_some() {
            self.iterations = other.iterations;
        }
        if other.seed.is_some() {
            self.seed = other.seed;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
    }

    /// Iteration count with the built-in fallback applied
    pub fn iterations(&self) -> u32 {
        self.iterations.unwrap_or(DEFAULT_ITERATIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_iterations() {
        let config = Config::default();
        assert_eq!(config.iterations(), DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = Config {
            iterations: Some(1000),
            seed: None,
            default_format: Some("yaml".to_string()),
        };
        base.merge(Config {
            iterations: Some(5000),
            seed: Some(42),
            default_format: None,
        });
        assert_eq!(base.iterations, Some(5000));
        assert_eq!(base.seed, Some(42));
        assert_eq!(base.default_format.as_deref(), Some("yaml"));
    }

    #[test]
    fn test_parse_from_yaml() {
        let config: Config = serde_yml::from_str("iterations: 2500\nseed: 7\n").unwrap();
        assert_eq!(config.iterations, Some(2500));
        assert_eq!(config.seed, Some(7));
        assert!(config.default_format.is_none());
    }
}
