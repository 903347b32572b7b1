//! # Analysis Configuration
//!
//! All statistical thresholds and tuning knobs of a run live in one immutable
//! [`AnalysisConfig`]. It is built once (defaults, then an optional TOML file,
//! then command-line overrides), validated, and passed by reference to the
//! classifier, the pair statistic and the scanner.

use crate::error::{NetworkError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_PROB_THRESHOLD: f64 = 0.10;
pub const DEFAULT_STAT_THRESHOLD: f64 = 3.0;
pub const DEFAULT_SINGLE_THRESHOLD: f64 = 0.05;
pub const DEFAULT_SINGLE_CUTOFF: usize = 20;
/// Genes per block. Bounds peak memory to two blocks of decoded profiles.
pub const DEFAULT_BLOCK_SIZE: usize = 8_000;
pub const DEFAULT_CACHE_ROWS: usize = 4_096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Maximum error score for a sparse cell to count as an implication.
    pub prob_threshold: f64,
    /// Minimum residual for a cell to be considered at all.
    pub stat_threshold: f64,
    /// Maximum minority proportion for a gene to be called low or high.
    pub single_threshold: f64,
    /// Minority count below which a gene may be called low or high.
    pub single_cutoff: usize,
    pub block_size: usize,
    /// Rows kept by the bit-vector reader's LRU cache.
    pub cache_rows: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            prob_threshold: DEFAULT_PROB_THRESHOLD,
            stat_threshold: DEFAULT_STAT_THRESHOLD,
            single_threshold: DEFAULT_SINGLE_THRESHOLD,
            single_cutoff: DEFAULT_SINGLE_CUTOFF,
            block_size: DEFAULT_BLOCK_SIZE,
            cache_rows: DEFAULT_CACHE_ROWS,
        }
    }
}

impl AnalysisConfig {
    /// Reads a TOML file. Keys that are absent keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| NetworkError::resource(path, e))?;
        toml::from_str(&text).map_err(|source| NetworkError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        fn check_probability(name: &str, value: f64) -> Result<()> {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(NetworkError::config(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
            Ok(())
        }

        check_probability("threshold", self.prob_threshold)?;
        check_probability("single_threshold", self.single_threshold)?;
        if !self.stat_threshold.is_finite() {
            return Err(NetworkError::config(format!(
                "stat_threshold must be finite, got {}",
                self.stat_threshold
            )));
        }
        if self.block_size == 0 {
            return Err(NetworkError::config("block_size must be at least 1"));
        }
        if self.cache_rows == 0 {
            return Err(NetworkError::config("cache_rows must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_documented_values() {
        let config = AnalysisConfig::default();
        assert_eq!(config.prob_threshold, 0.10);
        assert_eq!(config.stat_threshold, 3.0);
        assert_eq!(config.single_threshold, 0.05);
        assert_eq!(config.single_cutoff, 20);
        assert_eq!(config.block_size, 8_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_file_overrides_only_present_keys() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "stat_threshold = 5.0\nblock_size = 128").unwrap();
        let config = AnalysisConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.stat_threshold, 5.0);
        assert_eq!(config.block_size, 128);
        assert_eq!(config.prob_threshold, DEFAULT_PROB_THRESHOLD);
    }

    #[test]
    fn unknown_toml_keys_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "blocksize = 10").unwrap();
        let err = AnalysisConfig::from_toml_file(file.path()).unwrap_err();
        assert!(matches!(err, NetworkError::ConfigFile { .. }));
    }

    #[test]
    fn validation_rejects_zero_block_size_and_bad_probabilities() {
        let config = AnalysisConfig {
            block_size: 0,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            prob_threshold: 1.5,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AnalysisConfig {
            stat_threshold: f64::NAN,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
