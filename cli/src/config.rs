//! `authz-codegen.toml` configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::CliError;

const DEFAULT_CONFIG_FILE: &str = "authz-codegen.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct AuthzCodegenConfig {
    /// Path to the JSON analysis bundle (`{"analyses": [...], "inline": {...}}`).
    pub bundle: PathBuf,
    /// Directory the generated migration SQL is written into.
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Whether to emit `_no_wildcard` check variants in the migration.
    #[serde(default = "default_true")]
    pub emit_no_wildcard: bool,
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_true() -> bool {
    true
}

impl AuthzCodegenConfig {
    pub fn load(explicit: Option<&Path>) -> Result<Self, CliError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        if !path.exists() {
            return Err(CliError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(&path)?;
        let config: AuthzCodegenConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
