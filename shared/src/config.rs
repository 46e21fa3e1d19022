use std::{env, path::Path, path::PathBuf};

use anyhow::{Context, Result};

pub struct EnvConfig {
    /// Path to the TOML file holding counter and summarizer settings
    pub config_path: PathBuf,
}

impl EnvConfig {
    pub fn load(manifest_dir: &Path) -> Result<Self> {
        #[cfg(debug_assertions)]
        if let Err(e) = dotenvy::from_path(manifest_dir.join(".env")) {
            tracing::debug!("no .env file loaded: {e}");
        }

        let config_path = match env::var("TALLY_CONFIG") {
            Ok(path) => PathBuf::from(path),
            Err(env::VarError::NotPresent) => PathBuf::from("tally.toml"),
            Err(e) => return Err(e).context("TALLY_CONFIG is not valid unicode"),
        };

        Ok(Self { config_path })
    }
}

/// Load environment config using the calling crate's manifest directory.
#[macro_export]
macro_rules! load_env_config {
    () => {
        $crate::config::EnvConfig::load(std::path::Path::new(env!("CARGO_MANIFEST_DIR")))
    };
}
