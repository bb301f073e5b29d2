//! The data model the codegen pipeline consumes: per-relation
//! analysis and the inlined closure/userset catalog.

pub mod error;
pub mod inline;
pub mod strategy;
pub mod types;
pub mod validate;

pub use error::AnalysisError;
pub use inline::{ClosureRow, InlineSqlData, UsersetCatalogRow, CLOSURE_ALIAS, USERSET_ALIAS};
pub use strategy::Strategy;
pub use types::{
    AnchorStep, IndirectAnchor, IntersectionGroup, IntersectionPart, IntersectionPartKind,
    ParentRelation, RelationAnalysis, RelationName, TypeName, UsersetPattern,
};
