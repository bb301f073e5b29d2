//! Build-time error taxonomy.
//!
//! Build errors are fatal per (type, relation): the generator wraps
//! them with `"building X for T.R: …"` context and aborts the whole
//! run — no partial output is ever emitted.

use authz_planner::PlanError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("building {object_type}.{relation}: {source}")]
    Plan {
        object_type: String,
        relation: String,
        #[source]
        source: PlanError,
    },

    #[error("building {object_type}.{relation}: {message}")]
    Build {
        object_type: String,
        relation: String,
        message: String,
    },
}

impl CodegenError {
    pub fn plan(object_type: &str, relation: &str, source: PlanError) -> Self {
        CodegenError::Plan {
            object_type: object_type.to_string(),
            relation: relation.to_string(),
            source,
        }
    }

    pub fn build(object_type: &str, relation: &str, message: impl Into<String>) -> Self {
        CodegenError::Build {
            object_type: object_type.to_string(),
            relation: relation.to_string(),
            message: message.into(),
        }
    }
}
