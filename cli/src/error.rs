//! CLI error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("analysis bundle not found: {0}")]
    BundleNotFound(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Generate(#[from] authz_codegen_gen::GenerateError),
}
