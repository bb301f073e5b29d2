//! Plan-build errors.

use authz_analysis::AnalysisError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("{object_type}.{relation}: strategy Composed requires an indirect anchor, found none")]
    MissingIndirectAnchor {
        object_type: String,
        relation: String,
    },

    #[error("{object_type}.{relation}: strategy Recursive requires at least one parent relation")]
    RecursiveWithoutParents {
        object_type: String,
        relation: String,
    },
}
