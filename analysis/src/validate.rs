//! Pure, no-I/O sanity checks over a [`RelationAnalysis`].
//!
//! These catch contradictions an upstream analyzer should never produce
//! but that would otherwise silently mis-render rather than fail the
//! build loudly.

use crate::error::AnalysisError;
use crate::types::RelationAnalysis;

/// Depths above this are almost certainly an analyzer bug (a legitimate
/// `DepthExceeded` relation is flagged at 26, not six orders of
/// magnitude higher); it exists purely to catch integer-overflow-style
/// corruption in upstream data.
const SANITY_DEPTH_CEILING: u32 = 100_000;

impl RelationAnalysis {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.check_allowed && !self.list_allowed {
            return Err(AnalysisError::NoCapability {
                object_type: self.object_type.to_string(),
                relation: self.relation.to_string(),
            });
        }

        if self.max_userset_depth > SANITY_DEPTH_CEILING {
            return Err(AnalysisError::DepthOutOfRange {
                object_type: self.object_type.to_string(),
                relation: self.relation.to_string(),
                depth: self.max_userset_depth,
            });
        }

        if let Some(anchor) = &self.indirect_anchor {
            if anchor.steps.is_empty() {
                return Err(AnalysisError::EmptyIndirectAnchor {
                    object_type: self.object_type.to_string(),
                    relation: self.relation.to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IndirectAnchor, RelationAnalysis};

    fn base() -> RelationAnalysis {
        RelationAnalysis {
            object_type: "document".into(),
            relation: "viewer".into(),
            check_allowed: true,
            list_allowed: true,
            has_intersection: false,
            has_exclusion: false,
            has_wildcard: false,
            has_userset_subject: false,
            has_complex_userset_patterns: false,
            needs_plpgsql: false,
            simple_closure_relations: vec![],
            complex_closure_relations: vec![],
            intersection_closure_relations: vec![],
            intersection_groups: vec![],
            parent_relations: vec![],
            closure_parent_relations: vec![],
            userset_patterns: vec![],
            closure_userset_patterns: vec![],
            allowed_subject_types: vec!["user".into()],
            all_satisfying_relations: vec!["viewer".into()],
            indirect_anchor: None,
            max_userset_depth: 0,
            list_strategy_hint: None,
        }
    }

    #[test]
    fn rejects_no_capability() {
        let mut a = base();
        a.check_allowed = false;
        a.list_allowed = false;
        assert!(matches!(a.validate(), Err(AnalysisError::NoCapability { .. })));
    }

    #[test]
    fn rejects_empty_indirect_anchor() {
        let mut a = base();
        a.indirect_anchor = Some(IndirectAnchor {
            steps: vec![],
            anchor_relation: "owner".into(),
        });
        assert!(matches!(
            a.validate(),
            Err(AnalysisError::EmptyIndirectAnchor { .. })
        ));
    }

    #[test]
    fn accepts_well_formed_analysis() {
        assert!(base().validate().is_ok());
    }
}
