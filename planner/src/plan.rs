//! Plan construction: `RelationAnalysis` + `InlineSqlData`
//! normalize into a render-ready `CheckPlan` or `ListPlan`. A plan is
//! immutable after construction and owns only borrowed references to
//! its analysis and inline data.

use authz_analysis::{InlineSqlData, RelationAnalysis, Strategy};
use authz_sql_dsl::{function_name, Expr, ProcKind};
use compact_str::CompactString;

use crate::error::PlanError;
use crate::strategy_selector::select_strategy;

/// An exclusion predicate parameterized over the column expressions a
/// particular query block uses, so it can be re-bound when a subquery
/// renames its columns.
#[derive(Debug, Clone)]
pub struct ExclusionPredicate {
    pub excluded_relation: CompactString,
}

impl ExclusionPredicate {
    /// Builds the `check_permission_internal(...) = 0` guard for this
    /// exclusion, bound to the given object type and column expressions.
    pub fn to_expr(
        &self,
        object_type: &str,
        subject_type: Expr,
        subject_id: Expr,
        object_id: Expr,
        visited: Expr,
    ) -> Expr {
        Expr::CheckPermission {
            subject_type: Box::new(subject_type),
            subject_id: Box::new(subject_id),
            relation: self.excluded_relation.to_string(),
            object_type: Box::new(Expr::str_lit(object_type)),
            object_id: Box::new(object_id),
            visited: Box::new(visited),
            expect_allow: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExclusionPredicateSet(pub Vec<ExclusionPredicate>);

impl ExclusionPredicateSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn build_exclusions(analysis: &RelationAnalysis) -> ExclusionPredicateSet {
    if !analysis.has_exclusion {
        return ExclusionPredicateSet::default();
    }
    let mut preds = Vec::new();
    for group in &analysis.intersection_groups {
        for part in &group.parts {
            if let Some(excluded) = &part.excluded_relation {
                preds.push(ExclusionPredicate {
                    excluded_relation: excluded.clone(),
                });
            }
        }
    }
    ExclusionPredicateSet(preds)
}

/// Shared, render-ready view carried by both [`CheckPlan`] and
/// [`ListPlan`].
#[derive(Debug, Clone)]
pub struct PlanCore<'a> {
    pub analysis: &'a RelationAnalysis,
    pub inline: &'a InlineSqlData,
    pub strategy: Strategy,
    pub exclusions: ExclusionPredicateSet,

    pub has_standalone_access: bool,
    pub has_userset_subject: bool,
    pub has_userset_patterns: bool,
    pub has_exclusion: bool,
    pub has_intersection: bool,
    pub allow_wildcard: bool,
    pub exclude_wildcard: bool,
}

impl<'a> PlanCore<'a> {
    fn build(analysis: &'a RelationAnalysis, inline: &'a InlineSqlData) -> Self {
        let strategy = select_strategy(analysis);
        Self {
            analysis,
            inline,
            strategy,
            exclusions: build_exclusions(analysis),
            has_standalone_access: analysis.has_standalone_access(),
            has_userset_subject: analysis.has_userset_subject,
            has_userset_patterns: analysis.any_userset_pattern(),
            has_exclusion: analysis.has_exclusion,
            has_intersection: analysis.has_intersection,
            allow_wildcard: analysis.has_wildcard,
            exclude_wildcard: !analysis.has_wildcard,
        }
    }

    pub fn object_type(&self) -> &str {
        &self.analysis.object_type
    }

    pub fn relation(&self) -> &str {
        &self.analysis.relation
    }

    fn check_preconditions(&self) -> Result<(), PlanError> {
        let object_type = self.object_type().to_string();
        let relation = self.relation().to_string();
        match self.strategy {
            Strategy::Composed if self.analysis.indirect_anchor.is_none() => {
                Err(PlanError::MissingIndirectAnchor {
                    object_type,
                    relation,
                })
            }
            Strategy::Recursive if !self.analysis.any_parent_relation() => {
                Err(PlanError::RecursiveWithoutParents {
                    object_type,
                    relation,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Render-ready view used by the check builder.
#[derive(Debug, Clone)]
pub struct CheckPlan<'a> {
    pub core: PlanCore<'a>,
    pub function_name: CompactString,
    pub no_wildcard_function_name: CompactString,
}

impl<'a> std::ops::Deref for CheckPlan<'a> {
    type Target = PlanCore<'a>;
    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// Render-ready view used by the list-objects and list-subjects
/// builders.
#[derive(Debug, Clone)]
pub struct ListPlan<'a> {
    pub core: PlanCore<'a>,
    pub objects_function_name: CompactString,
    pub subjects_function_name: CompactString,
}

impl<'a> std::ops::Deref for ListPlan<'a> {
    type Target = PlanCore<'a>;
    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

pub fn build_check_plan<'a>(
    analysis: &'a RelationAnalysis,
    inline: &'a InlineSqlData,
) -> Result<CheckPlan<'a>, PlanError> {
    analysis.validate()?;
    let core = PlanCore::build(analysis, inline);
    core.check_preconditions()?;
    let check_function_name =
        function_name(ProcKind::Check, &analysis.object_type, &analysis.relation);
    let no_wildcard_function_name =
        function_name(ProcKind::CheckNoWildcard, &analysis.object_type, &analysis.relation);
    Ok(CheckPlan {
        core,
        function_name: check_function_name,
        no_wildcard_function_name,
    })
}

pub fn build_list_plan<'a>(
    analysis: &'a RelationAnalysis,
    inline: &'a InlineSqlData,
) -> Result<ListPlan<'a>, PlanError> {
    analysis.validate()?;
    let core = PlanCore::build(analysis, inline);
    core.check_preconditions()?;
    let objects_function_name =
        function_name(ProcKind::ListObjects, &analysis.object_type, &analysis.relation);
    let subjects_function_name =
        function_name(ProcKind::ListSubjects, &analysis.object_type, &analysis.relation);
    Ok(ListPlan {
        core,
        objects_function_name,
        subjects_function_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz_analysis::RelationAnalysis;

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
    fn builds_direct_check_plan() {
        let analysis = base();
        let inline = InlineSqlData::default();
        let plan = build_check_plan(&analysis, &inline).unwrap();
        assert_eq!(plan.function_name, "check_document_viewer");
        assert_eq!(plan.no_wildcard_function_name, "check_document_viewer_no_wildcard");
        assert_eq!(plan.strategy, Strategy::Direct);
        assert!(plan.exclude_wildcard);
    }

    #[test]
    fn exclusion_predicates_collected_from_intersection_groups() {
        use authz_analysis::{IntersectionGroup, IntersectionPart, IntersectionPartKind};
        let mut analysis = base();
        analysis.has_intersection = true;
        analysis.has_exclusion = true;
        analysis.intersection_groups.push(IntersectionGroup {
            parts: vec![
                IntersectionPart {
                    kind: IntersectionPartKind::IsThis,
                    excluded_relation: None,
                },
                IntersectionPart {
                    kind: IntersectionPartKind::Computed("writer".into()),
                    excluded_relation: Some("blocked".into()),
                },
            ],
        });
        let inline = InlineSqlData::default();
        let plan = build_check_plan(&analysis, &inline).unwrap();
        assert_eq!(plan.exclusions.0.len(), 1);
        assert_eq!(plan.exclusions.0[0].excluded_relation, "blocked");
    }
}
