//! The strategy precedence table. First match wins.

use authz_analysis::{RelationAnalysis, Strategy};

/// Max self-/cross-type userset recursion depth; relations whose
/// analyzer-reported depth exceeds this compile to a `RAISE M2002` body
/// unconditionally.
pub const MAX_USERSET_DEPTH: u32 = 25;

pub fn select_strategy(analysis: &RelationAnalysis) -> Strategy {
    if analysis.max_userset_depth > MAX_USERSET_DEPTH {
        return Strategy::DepthExceeded;
    }
    if !analysis.has_standalone_access() && analysis.indirect_anchor.is_some() {
        return Strategy::Composed;
    }
    if analysis.any_self_referential_userset() {
        return Strategy::SelfRefUserset;
    }
    if analysis.has_intersection {
        return Strategy::Intersection;
    }
    if analysis.any_parent_relation() {
        return Strategy::Recursive;
    }
    if analysis.any_userset_pattern() {
        return Strategy::Userset;
    }
    Strategy::Direct
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz_analysis::{
        AnchorStep, IndirectAnchor, ParentRelation, RelationAnalysis, UsersetPattern,
    };

    fn base(object_type: &str, relation: &str) -> RelationAnalysis {
        RelationAnalysis {
            object_type: object_type.into(),
            relation: relation.into(),
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
            all_satisfying_relations: vec![relation.into()],
            indirect_anchor: None,
            max_userset_depth: 0,
            list_strategy_hint: None,
        }
    }

    #[test]
    fn depth_exceeded_wins_over_everything() {
        let mut a = base("document", "viewer");
        a.max_userset_depth = 26;
        a.has_intersection = true;
        assert_eq!(select_strategy(&a), Strategy::DepthExceeded);
    }

    #[test]
    fn direct_when_nothing_else_present() {
        let a = base("document", "viewer");
        assert_eq!(select_strategy(&a), Strategy::Direct);
    }

    #[test]
    fn userset_when_pattern_present() {
        let mut a = base("document", "viewer");
        a.userset_patterns.push(UsersetPattern {
            subject_type: "group".into(),
            subject_relation: "member".into(),
            satisfying_relations: vec!["viewer".into()],
        });
        assert_eq!(select_strategy(&a), Strategy::Userset);
    }

    #[test]
    fn self_ref_userset_takes_precedence_over_userset() {
        let mut a = base("group", "member");
        a.userset_patterns.push(UsersetPattern {
            subject_type: "group".into(),
            subject_relation: "member".into(),
            satisfying_relations: vec!["member".into()],
        });
        assert_eq!(select_strategy(&a), Strategy::SelfRefUserset);
    }

    #[test]
    fn recursive_when_parent_relation_present() {
        let mut a = base("folder", "viewer");
        a.parent_relations.push(ParentRelation {
            relation: "viewer".into(),
            linking_relation: "parent".into(),
            allowed_linking_types: vec!["folder".into()],
        });
        assert_eq!(select_strategy(&a), Strategy::Recursive);
    }

    #[test]
    fn intersection_takes_precedence_over_recursive() {
        let mut a = base("doc", "editor");
        a.has_intersection = true;
        a.parent_relations.push(ParentRelation {
            relation: "editor".into(),
            linking_relation: "parent".into(),
            allowed_linking_types: vec!["doc".into()],
        });
        assert_eq!(select_strategy(&a), Strategy::Intersection);
    }

    #[test]
    fn composed_when_no_standalone_access_but_anchor_present() {
        let mut a = base("doc", "can_comment");
        a.indirect_anchor = Some(IndirectAnchor {
            steps: vec![AnchorStep::TupleToUserset {
                linking_relation: "parent".into(),
            }],
            anchor_relation: "viewer".into(),
        });
        assert_eq!(select_strategy(&a), Strategy::Composed);
    }
}
