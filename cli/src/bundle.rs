//! The JSON analysis bundle handed to the generator: every relation's
//! `RelationAnalysis` plus the schema-wide inlined closure/userset data.

use authz_analysis::{InlineSqlData, RelationAnalysis};
use serde::Deserialize;

use crate::error::CliError;

#[derive(Debug, Deserialize)]
pub struct AnalysisBundle {
    pub analyses: Vec<RelationAnalysis>,
    #[serde(default)]
    pub inline: InlineSqlData,
}

impl AnalysisBundle {
    pub fn load(path: &std::path::Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Err(CliError::BundleNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let bundle: AnalysisBundle = serde_json::from_str(&content)?;
        Ok(bundle)
    }
}
