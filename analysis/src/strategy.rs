//! The per-relation resolution strategy.

use serde::{Deserialize, Serialize};

/// Exactly one of these is chosen per relation by the strategy selector
/// in `authz-planner`. `RelationAnalysis::list_strategy_hint`
/// may carry a value an upstream analyzer precomputed; the selector
/// recomputes it independently from the flags below and does not trust
/// the hint, so the two may legitimately disagree during development of
/// the analyzer without corrupting generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    Direct,
    Userset,
    Recursive,
    Intersection,
    SelfRefUserset,
    Composed,
    DepthExceeded,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Userset => "userset",
            Strategy::Recursive => "recursive",
            Strategy::Intersection => "intersection",
            Strategy::SelfRefUserset => "self_ref_userset",
            Strategy::Composed => "composed",
            Strategy::DepthExceeded => "depth_exceeded",
        }
    }
}
