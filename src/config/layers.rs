//! Layered Configuration Loading
//!
//! Parameters are read from a fixed search order of YAML files:
//!
//! 1. `pipeline.yml` in the run directory
//! 2. `pipeline.yml` one directory up
//! 3. the defaults embedded in the binary
//!
//! The first file in which a key appears wins for that key; later layers
//! only fill in keys that are still missing. The merged mapping is then
//! deserialized into the typed [`Config`] struct.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_yaml::Value;

use super::params::{Config, ConfigError};

/// Defaults packaged with the binary, also written by `coexflow config`.
pub const DEFAULT_CONFIG: &str = include_str!("default_config.yml");

/// Relative search order for user configuration files.
const SEARCH_ORDER: &[&str] = &["pipeline.yml", "../pipeline.yml"];

/// Loads configuration from the standard search order rooted at `dir`.
///
/// Missing files are skipped; the embedded defaults always form the final
/// layer, so every optional key has a value after loading.
pub fn load(dir: &Path) -> Result<Config, ConfigError> {
    let paths: Vec<PathBuf> = SEARCH_ORDER.iter().map(|p| dir.join(p)).collect();
    load_from(&paths)
}

/// Loads configuration from an explicit list of candidate files.
///
/// Earlier files take precedence per key. Files that do not exist are
/// skipped; files that exist but fail to parse are a hard error.
pub fn load_from(paths: &[PathBuf]) -> Result<Config, ConfigError> {
    let mut merged = Value::Mapping(Default::default());

    for path in paths {
        if !path.is_file() {
            debug!("No configuration file at {}", path.display());
            continue;
        }

        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            source: e,
        })?;

        let layer: Value = serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            source: e,
        })?;

        info!("Loaded configuration layer: {}", path.display());
        merge_missing(&mut merged, layer);
    }

    // The packaged defaults are always the last layer.
    let defaults: Value = serde_yaml::from_str(DEFAULT_CONFIG).map_err(|e| ConfigError::Parse {
        path: PathBuf::from("<embedded defaults>"),
        source: e,
    })?;
    merge_missing(&mut merged, defaults);

    let config: Config =
        serde_yaml::from_value(merged).map_err(|e| ConfigError::Invalid(e.to_string()))?;

    Ok(config)
}

/// Recursively copies keys from `other` into `base` where `base` has none.
///
/// Existing scalar values are never overwritten, so earlier layers win.
/// Explicit nulls count as present, allowing a user file to blank out an
/// optional default.
fn merge_missing(base: &mut Value, other: Value) {
    match (base, other) {
        (Value::Mapping(base_map), Value::Mapping(other_map)) => {
            for (key, other_val) in other_map {
                if base_map.contains_key(&key) {
                    if let Some(base_val) = base_map.get_mut(&key) {
                        merge_missing(base_val, other_val);
                    }
                } else {
                    base_map.insert(key, other_val);
                }
            }
        }
        // Scalars, sequences and mismatched shapes: keep the base value.
        _ => {}
    }
}

/// Writes the default configuration to `path` for the `config` subcommand.
///
/// Refuses to overwrite an existing file.
pub fn write_default(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }

    fs::write(path, DEFAULT_CONFIG).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;

    info!("Wrote default configuration to {}", path.display());
    Ok(())
}
