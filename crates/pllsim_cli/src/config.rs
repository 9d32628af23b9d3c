//! Locating and loading the run configuration.

use std::path::{Path, PathBuf};

use pllsim_config::{load_config, ConfigError, RunConfig, CONFIG_FILE_NAME};

use crate::GlobalArgs;

/// Loads `--config` if given, else `./pllsim.toml` if present, else defaults.
pub fn load(global: &GlobalArgs) -> Result<(RunConfig, Option<PathBuf>), ConfigError> {
    load_from(global.config.as_deref().map(Path::new), Path::new("."))
}

fn load_from(
    explicit: Option<&Path>,
    cwd: &Path,
) -> Result<(RunConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = explicit {
        return Ok((load_config(path)?, Some(path.to_path_buf())));
    }
    let implicit = cwd.join(CONFIG_FILE_NAME);
    if implicit.is_file() {
        tracing::debug!(path = %implicit.display(), "using configuration");
        return Ok((load_config(&implicit)?, Some(implicit)));
    }
    Ok((RunConfig::default(), None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = load_from(None, dir.path()).unwrap();
        assert_eq!(config, RunConfig::default());
        assert!(source.is_none());
    }

    #[test]
    fn implicit_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[bench]\nstart_code = 0\n").unwrap();
        let (config, source) = load_from(None, dir.path()).unwrap();
        assert_eq!(config.bench.start_code, 0);
        assert!(source.is_some());
    }

    #[test]
    fn explicit_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_from(Some(&missing), dir.path()).is_err());
    }
}
