//! Unified configuration schema for gozero.
//!
//! A single YAML file configures the search and the evaluator front-end.
//! Fields that have sensible engine defaults are optional in the file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid config: {msg}")]
    Invalid { msg: &'static str },
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Search settings.
    pub search: SearchSettings,
    /// Evaluator front-end settings.
    #[serde(default)]
    pub network: NetworkSettings,
}

/// Search settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchSettings {
    /// Worker pool size.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    /// PUCT exploration constant.
    #[serde(default = "default_c_puct")]
    pub c_puct: f32,
    /// Virtual loss added per in-flight descent.
    #[serde(default = "default_virtual_loss")]
    pub virtual_loss: i32,
    /// Root Dirichlet noise alpha (self-play only).
    #[serde(default = "default_noise_alpha")]
    pub noise_alpha: f32,
    /// Root Dirichlet noise mix-in fraction (self-play only).
    #[serde(default = "default_noise_epsilon")]
    pub noise_epsilon: f32,
    /// Seed for the search RNG (rotation ensemble, noise, sampling).
    #[serde(default)]
    pub random_seed: u64,
}

fn default_num_threads() -> usize {
    1
}

fn default_c_puct() -> f32 {
    0.85
}

fn default_virtual_loss() -> i32 {
    3
}

fn default_noise_alpha() -> f32 {
    0.03
}

fn default_noise_epsilon() -> f32 {
    0.25
}

/// Evaluator front-end settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkSettings {
    /// Softmax temperature applied to raw policy logits.
    #[serde(default = "default_softmax_temp")]
    pub softmax_temp: f32,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            softmax_temp: default_softmax_temp(),
        }
    }
}

fn default_softmax_temp() -> f32 {
    1.0
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.num_threads == 0 {
            return Err(ConfigError::Invalid {
                msg: "search.num_threads must be >= 1",
            });
        }
        if !(self.search.c_puct.is_finite() && self.search.c_puct >= 0.0) {
            return Err(ConfigError::Invalid {
                msg: "search.c_puct must be finite and >= 0",
            });
        }
        if self.search.virtual_loss < 0 {
            return Err(ConfigError::Invalid {
                msg: "search.virtual_loss must be >= 0",
            });
        }
        if !(0.0..=1.0).contains(&self.search.noise_epsilon) {
            return Err(ConfigError::Invalid {
                msg: "search.noise_epsilon must be in [0, 1]",
            });
        }
        if !(self.network.softmax_temp.is_finite() && self.network.softmax_temp > 0.0) {
            return Err(ConfigError::Invalid {
                msg: "network.softmax_temp must be finite and > 0",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_yaml_string_with_defaults() {
        let yaml = r#"
search:
  num_threads: 8
  c_puct: 0.85
"#;
        let config = Config::from_yaml(yaml).expect("parse");
        assert_eq!(config.search.num_threads, 8);
        assert_eq!(config.search.virtual_loss, 3);
        assert!((config.search.noise_epsilon - 0.25).abs() < 1e-6);
        assert!((config.network.softmax_temp - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_zero_threads() {
        let yaml = r#"
search:
  num_threads: 0
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn rejects_bad_temperature() {
        let yaml = r#"
search:
  num_threads: 1
network:
  softmax_temp: 0.0
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn roundtrips_through_yaml() {
        let yaml = r#"
search:
  num_threads: 4
  c_puct: 1.1
  virtual_loss: 3
  noise_alpha: 0.03
  noise_epsilon: 0.25
  random_seed: 7
network:
  softmax_temp: 0.67
"#;
        let config = Config::from_yaml(yaml).expect("parse");
        let dumped = serde_yaml::to_string(&config).expect("dump");
        let again = Config::from_yaml(&dumped).expect("reparse");
        assert_eq!(again.search.num_threads, 4);
        assert_eq!(again.search.random_seed, 7);
        assert!((again.network.softmax_temp - 0.67).abs() < 1e-6);
    }
}
