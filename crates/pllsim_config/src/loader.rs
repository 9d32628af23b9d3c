//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::RunConfig;
use std::path::Path;

/// Name of the configuration file looked up in a project directory.
pub const CONFIG_FILE_NAME: &str = "pllsim.toml";

/// Loads and validates a configuration file.
///
/// A directory is accepted too, in which case `<dir>/pllsim.toml` is read.
pub fn load_config(path: &Path) -> Result<RunConfig, ConfigError> {
    let file = if path.is_dir() {
        path.join(CONFIG_FILE_NAME)
    } else {
        path.to_path_buf()
    };
    let content = std::fs::read_to_string(&file)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<RunConfig, ConfigError> {
    let config: RunConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks cross-field consistency that serde cannot express.
fn validate_config(config: &RunConfig) -> Result<(), ConfigError> {
    let bench = &config.bench;
    let explicit = [("bench.n", bench.n), ("bench.m", bench.m), ("bench.od", bench.od)];
    let given = explicit.iter().filter(|(_, v)| v.is_some()).count();
    if given != 0 && given != explicit.len() {
        if let Some((name, _)) = explicit.iter().find(|(_, v)| v.is_none()) {
            return Err(ConfigError::MissingField((*name).to_string()));
        }
    }
    if given == explicit.len() && bench.target.is_some() {
        return Err(ConfigError::ValidationError(
            "bench.target cannot be combined with explicit n/m/od".to_string(),
        ));
    }
    if config.waveform.path.as_deref().is_some_and(str::is_empty) {
        return Err(ConfigError::MissingField("waveform.path".to_string()));
    }
    if config.limits.max_deltas == 0 {
        return Err(ConfigError::ValidationError(
            "limits.max_deltas must be at least 1".to_string(),
        ));
    }
    Ok(())
}
