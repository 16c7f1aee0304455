use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;

/// Field names used by `CREATE ... INTERSECT`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IntervalFields {
    /// Chromosome field of the source features
    pub chrom: String,
    /// Position field of the source features
    pub position: String,
    /// Chromosome field of the loaded interval records
    pub record_chrom: String,
    pub start: String,
    pub end: String,
}

impl Default for IntervalFields {
    fn default() -> Self {
        IntervalFields {
            chrom: "chr".to_string(),
            position: "pos".to_string(),
            record_chrom: "chr".to_string(),
            start: "start".to_string(),
            end: "end".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Set read by `SELECT` without `FROM`
    pub default_source: String,
    pub interval: IntervalFields,
    /// Compiled size limit for `~`, `!~` and `like` patterns, in bytes
    pub regex_size_limit: usize,
    /// Maximum number of rows rendered by `SHOW` of a set
    pub show_limit: Option<usize>,
    /// Directory searched for `<name>.txt` word lists
    pub wordset_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_source: "variants".to_string(),
            interval: IntervalFields::default(),
            regex_size_limit: 10 * (1 << 20),
            show_limit: None,
            wordset_dir: None,
        }
    }
}

impl EngineConfig {
    /// Reads an optional config file (any format the `config` crate knows,
    /// picked by extension) overlaid with `VQL_*` environment variables,
    /// e.g. `VQL_DEFAULT_SOURCE` or `VQL_INTERVAL__CHROM`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let settings = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix("VQL").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_file_missing() {
        let config = EngineConfig::load("/nonexistent/vql-config").unwrap();
        assert_eq!(config.default_source, "variants");
        assert_eq!(config.interval, IntervalFields::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(
            &path,
            r#"{"default_source": "calls", "interval": {"position": "start_pos"}, "show_limit": 5}"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.default_source, "calls");
        assert_eq!(config.interval.position, "start_pos");
        assert_eq!(config.interval.chrom, "chr");
        assert_eq!(config.show_limit, Some(5));
    }
}
