//! Pure validation errors for [`crate::types::RelationAnalysis`].

use thiserror::Error;

/// A contradiction in an analysis that the plan builder should refuse
/// rather than silently mis-render.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("{object_type}.{relation}: recursive strategy implied but no parent relations present")]
    RecursiveWithoutParents {
        object_type: String,
        relation: String,
    },

    #[error("{object_type}.{relation}: indirect anchor path is empty")]
    EmptyIndirectAnchor {
        object_type: String,
        relation: String,
    },

    #[error("{object_type}.{relation}: max_userset_depth overflowed its allowed window ({depth})")]
    DepthOutOfRange {
        object_type: String,
        relation: String,
        depth: u32,
    },

    #[error("{object_type}.{relation}: neither check_allowed nor list_allowed is set")]
    NoCapability {
        object_type: String,
        relation: String,
    },
}
