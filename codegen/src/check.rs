//! The check-procedure builder: turns a [`CheckPlan`] into the
//! `Vec<Stmt>` body of a `check_<type>_<relation>` function.
//!
//! All access paths fold into one boolean (`v_granted`), and the
//! exclusion postcondition applies once, uniformly, at the end —
//! except the userset-subject branches in step 1, which return early
//! since they run before the cycle/depth bound is even computed.

use authz_analysis::{IntersectionPartKind, Strategy, CLOSURE_ALIAS, USERSET_ALIAS};
use authz_planner::CheckPlan;
use authz_sql_dsl::{function_name, Expr, ProcKind, SelectStmt, Stmt, DEPTH_EXCEEDED_CODE, DEPTH_EXCEEDED_MESSAGE};

use crate::error::CodegenError;
use crate::schema::{col, tuples};

fn visited_with_key() -> Expr {
    Expr::concat([Expr::param("p_visited"), Expr::array_literal([Expr::param("v_key")])])
}

/// `RETURN 1;` when no exclusion set applies, otherwise a guard that
/// re-checks every exclusion predicate and returns `0` if any fires.
fn granted_return(plan: &CheckPlan, visited: Expr) -> Stmt {
    if plan.has_exclusion && !plan.exclusions.is_empty() {
        let fired = Expr::or(plan.exclusions.0.iter().map(|p| {
            p.to_expr(
                plan.object_type(),
                Expr::param("p_subject_type"),
                Expr::param("p_subject_id"),
                Expr::param("p_object_id"),
                visited.clone(),
            )
            .not()
        }));
        Stmt::If {
            cond: fired,
            then_branch: vec![Stmt::Return(Expr::Int(0))],
            else_branch: vec![Stmt::Return(Expr::Int(1))],
        }
    } else {
        Stmt::Return(Expr::Int(1))
    }
}

/// Step 1a: the subject is a userset pointing back at the object
/// currently being checked; resolved structurally against the inline
/// closure table rather than a stored tuple.
fn self_ref_userset_branch(plan: &CheckPlan, object_type: &str, relation: &str) -> Stmt {
    let subject_id = Expr::param("p_subject_id");
    let guard = Expr::and([
        Expr::has_userset(subject_id.clone()),
        Expr::param("p_subject_type").eq(Expr::str_lit(object_type)),
        Expr::userset_object_id(subject_id.clone()).eq(Expr::param("p_object_id")),
    ]);
    let hit = Expr::exists(
        SelectStmt::new()
            .column(Expr::Int(1))
            .from(plan.inline.closure_table())
            .filter(Expr::and([
                col(CLOSURE_ALIAS, "object_type").eq(Expr::str_lit(object_type)),
                col(CLOSURE_ALIAS, "relation").eq(Expr::str_lit(relation)),
                col(CLOSURE_ALIAS, "satisfying_relation").eq(Expr::substring_userset_relation(subject_id.clone())),
            ])),
    );
    Stmt::If {
        cond: guard,
        then_branch: vec![Stmt::If {
            cond: hit,
            then_branch: vec![granted_return(plan, Expr::param("p_visited"))],
            else_branch: vec![],
        }],
        else_branch: vec![],
    }
}

/// Step 1b: the subject is some other userset; validated against the
/// catalog row declaring that `(object_type, relation)` accepts that
/// userset shape, plus the grant tuple carrying it verbatim.
fn computed_userset_branch(plan: &CheckPlan, object_type: &str, relation: &str) -> Stmt {
    let subject_id = Expr::param("p_subject_id");
    let t = "grant_t";
    let hit = Expr::exists(
        SelectStmt::new()
            .column(Expr::Int(1))
            .from(plan.inline.userset_table())
            .join(authz_sql_dsl::Join {
                kind: authz_sql_dsl::JoinKind::Inner,
                table: tuples(t),
                on: Expr::and([
                    col(t, "object_type").eq(Expr::str_lit(object_type)),
                    col(t, "object_id").eq(Expr::param("p_object_id")),
                    col(t, "relation").eq(col(USERSET_ALIAS, "relation")),
                    col(t, "subject_type").eq(col(USERSET_ALIAS, "subject_type")),
                    col(t, "subject_id").eq(subject_id.clone()),
                ]),
            })
            .filter(Expr::and([
                col(USERSET_ALIAS, "object_type").eq(Expr::str_lit(object_type)),
                col(USERSET_ALIAS, "relation").eq(Expr::str_lit(relation)),
                col(USERSET_ALIAS, "subject_type").eq(Expr::param("p_subject_type")),
                col(USERSET_ALIAS, "subject_relation").eq(Expr::substring_userset_relation(subject_id.clone())),
            ])),
    );
    Stmt::If {
        cond: Expr::has_userset(subject_id),
        then_branch: vec![Stmt::If {
            cond: hit,
            then_branch: vec![granted_return(plan, Expr::param("p_visited"))],
            else_branch: vec![],
        }],
        else_branch: vec![],
    }
}

fn direct_tuple_expr(plan: &CheckPlan, object_type: &str, allow_wildcard: bool) -> Expr {
    let t = "t";
    let relations = plan
        .analysis
        .all_satisfying_relations
        .iter()
        .map(|r| Expr::str_lit(r.as_str()));
    Expr::exists(
        SelectStmt::new().column(Expr::Int(1)).from(tuples(t)).filter(Expr::and([
            col(t, "object_type").eq(Expr::str_lit(object_type)),
            col(t, "object_id").eq(Expr::param("p_object_id")),
            col(t, "relation").any_eq(Expr::array_literal(relations)),
            col(t, "subject_type").eq(Expr::param("p_subject_type")),
            Expr::subject_id_match(col(t, "subject_id"), Expr::param("p_subject_id"), allow_wildcard),
        ])),
    )
}

/// Concrete subject satisfies a userset pattern by being a member of a
/// granted group: a grant tuple whose subject is a userset, joined to a
/// membership tuple for that userset that names the concrete subject.
fn userset_membership_join_expr(plan: &CheckPlan, object_type: &str) -> Expr {
    let grant = "grant_t";
    let member = "member_t";
    let relations = plan
        .analysis
        .all_satisfying_relations
        .iter()
        .map(|r| Expr::str_lit(r.as_str()));
    Expr::exists(
        SelectStmt::new()
            .column(Expr::Int(1))
            .from(tuples(grant))
            .join(authz_sql_dsl::Join {
                kind: authz_sql_dsl::JoinKind::Inner,
                table: tuples(member),
                on: Expr::and([
                    col(member, "object_type").eq(col(grant, "subject_type")),
                    col(member, "object_id").eq(Expr::userset_object_id(col(grant, "subject_id"))),
                    col(member, "relation").eq(Expr::userset_relation(col(grant, "subject_id"))),
                ]),
            })
            .filter(Expr::and([
                col(grant, "object_type").eq(Expr::str_lit(object_type)),
                col(grant, "object_id").eq(Expr::param("p_object_id")),
                col(grant, "relation").any_eq(Expr::array_literal(relations)),
                Expr::has_userset(col(grant, "subject_id")),
                col(member, "subject_type").eq(Expr::param("p_subject_type")),
                col(member, "subject_id").eq(Expr::param("p_subject_id")),
            ])),
    )
}

fn complex_closure_call_exprs(plan: &CheckPlan, object_type: &str) -> Vec<Expr> {
    plan.analysis
        .complex_closure_relations
        .iter()
        .map(|rel| {
            let name = function_name(ProcKind::Check, object_type, rel);
            Expr::check_permission_call(
                name,
                [
                    Expr::param("p_subject_type"),
                    Expr::param("p_subject_id"),
                    Expr::param("p_object_id"),
                    visited_with_key(),
                ],
                true,
            )
        })
        .collect()
}

fn parent_ttu_exprs(plan: &CheckPlan, object_type: &str, relation: &str) -> Vec<Expr> {
    let mut out = Vec::new();
    let t = "lt";
    for pr in plan.analysis.parent_relations.iter().chain(plan.analysis.closure_parent_relations.iter()) {
        for allowed_type in &pr.allowed_linking_types {
            let callee = function_name(ProcKind::Check, allowed_type, relation);
            out.push(Expr::exists(
                SelectStmt::new().column(Expr::Int(1)).from(tuples(t)).filter(Expr::and([
                    col(t, "object_type").eq(Expr::str_lit(object_type)),
                    col(t, "object_id").eq(Expr::param("p_object_id")),
                    col(t, "relation").eq(Expr::str_lit(pr.linking_relation.as_str())),
                    col(t, "subject_type").eq(Expr::str_lit(allowed_type.as_str())),
                    Expr::check_permission_call(
                        callee,
                        [
                            Expr::param("p_subject_type"),
                            Expr::param("p_subject_id"),
                            col(t, "subject_id"),
                            visited_with_key(),
                        ],
                        true,
                    ),
                ])),
            ));
        }
    }
    out
}

fn standalone_disjuncts(plan: &CheckPlan, object_type: &str, relation: &str, allow_wildcard: bool) -> Vec<Expr> {
    let mut out = Vec::new();
    if plan.analysis.check_allowed_by_direct_tuple() || !plan.analysis.simple_closure_relations.is_empty() {
        out.push(direct_tuple_expr(plan, object_type, allow_wildcard));
    }
    if plan.has_userset_patterns {
        out.push(userset_membership_join_expr(plan, object_type));
    }
    out.extend(complex_closure_call_exprs(plan, object_type));
    out.extend(parent_ttu_exprs(plan, object_type, relation));
    out
}

fn intersection_part_expr(plan: &CheckPlan, object_type: &str, relation: &str, part: &authz_analysis::IntersectionPart) -> Expr {
    let base = match &part.kind {
        IntersectionPartKind::IsThis => direct_this_relation_expr(object_type, relation),
        IntersectionPartKind::ParentRelation(pr) => {
            let t = "lt";
            Expr::or(pr.allowed_linking_types.iter().map(|allowed_type| {
                let callee = function_name(ProcKind::Check, allowed_type, relation);
                Expr::exists(
                    SelectStmt::new().column(Expr::Int(1)).from(tuples(t)).filter(Expr::and([
                        col(t, "object_type").eq(Expr::str_lit(object_type)),
                        col(t, "object_id").eq(Expr::param("p_object_id")),
                        col(t, "relation").eq(Expr::str_lit(pr.linking_relation.as_str())),
                        col(t, "subject_type").eq(Expr::str_lit(allowed_type.as_str())),
                        Expr::check_permission_call(
                            callee,
                            [
                                Expr::param("p_subject_type"),
                                Expr::param("p_subject_id"),
                                col(t, "subject_id"),
                                visited_with_key(),
                            ],
                            true,
                        ),
                    ])),
                )
            }))
        }
        IntersectionPartKind::Computed(rel) => {
            let name = function_name(ProcKind::Check, object_type, rel);
            Expr::check_permission_call(
                name,
                [
                    Expr::param("p_subject_type"),
                    Expr::param("p_subject_id"),
                    Expr::param("p_object_id"),
                    visited_with_key(),
                ],
                true,
            )
        }
    };
    match &part.excluded_relation {
        Some(excluded) => {
            let name = function_name(ProcKind::Check, object_type, excluded);
            let not_excluded = Expr::check_permission_call(
                name,
                [
                    Expr::param("p_subject_type"),
                    Expr::param("p_subject_id"),
                    Expr::param("p_object_id"),
                    visited_with_key(),
                ],
                false,
            );
            Expr::and([base, not_excluded])
        }
        None => base,
    }
}

fn direct_this_relation_expr(object_type: &str, relation: &str) -> Expr {
    let t = "t";
    Expr::exists(
        SelectStmt::new().column(Expr::Int(1)).from(tuples(t)).filter(Expr::and([
            col(t, "object_type").eq(Expr::str_lit(object_type)),
            col(t, "object_id").eq(Expr::param("p_object_id")),
            col(t, "relation").eq(Expr::str_lit(relation)),
            col(t, "subject_type").eq(Expr::param("p_subject_type")),
            Expr::subject_id_match(col(t, "subject_id"), Expr::param("p_subject_id"), false),
        ])),
    )
}

fn intersection_disjuncts(plan: &CheckPlan, object_type: &str, relation: &str) -> Vec<Expr> {
    plan.analysis
        .intersection_groups
        .iter()
        .map(|group| Expr::and(group.parts.iter().map(|p| intersection_part_expr(plan, object_type, relation, p))))
        .collect()
}

/// The normal `check_<type>_<relation>` body, honoring the relation's
/// own wildcard policy.
pub fn build_check_body(plan: &CheckPlan) -> Result<Vec<Stmt>, CodegenError> {
    build_check_body_with_wildcard(plan, plan.allow_wildcard)
}

/// The `check_<type>_<relation>_no_wildcard` body: identical strategy,
/// but every direct-tuple predicate drops the `OR subject_id = '*'`
/// branch regardless of whether the relation otherwise allows it.
pub fn build_check_no_wildcard_body(plan: &CheckPlan) -> Result<Vec<Stmt>, CodegenError> {
    build_check_body_with_wildcard(plan, false)
}

fn build_check_body_with_wildcard(plan: &CheckPlan, allow_wildcard: bool) -> Result<Vec<Stmt>, CodegenError> {
    if plan.strategy == Strategy::DepthExceeded {
        return Ok(vec![Stmt::Raise {
            code: DEPTH_EXCEEDED_CODE.to_string(),
            message: DEPTH_EXCEEDED_MESSAGE.to_string(),
        }]);
    }

    let object_type = plan.object_type().to_string();
    let relation = plan.relation().to_string();
    let mut stmts = Vec::new();

    if plan.has_userset_subject {
        if plan.analysis.any_self_referential_userset() {
            stmts.push(self_ref_userset_branch(plan, &object_type, &relation));
        }
        if plan.has_userset_patterns {
            stmts.push(computed_userset_branch(plan, &object_type, &relation));
        }
    }

    let v_key = Expr::concat([
        Expr::str_lit(format!("{object_type}:")),
        Expr::param("p_object_id"),
        Expr::str_lit(format!(":{relation}")),
    ]);
    stmts.push(Stmt::Assign {
        var: "v_key".to_string(),
        expr: v_key,
    });
    stmts.push(Stmt::If {
        cond: Expr::param("v_key").any_eq(Expr::param("p_visited")),
        then_branch: vec![Stmt::Return(Expr::Int(0))],
        else_branch: vec![],
    });
    stmts.push(Stmt::If {
        cond: Expr::call("array_length", [Expr::param("p_visited"), Expr::Int(1)]).ge(Expr::Int(25)),
        then_branch: vec![Stmt::Raise {
            code: DEPTH_EXCEEDED_CODE.to_string(),
            message: DEPTH_EXCEEDED_MESSAGE.to_string(),
        }],
        else_branch: vec![],
    });

    let mut disjuncts = Vec::new();
    if plan.has_standalone_access {
        disjuncts.extend(standalone_disjuncts(plan, &object_type, &relation, allow_wildcard));
    }
    if plan.has_intersection {
        disjuncts.extend(intersection_disjuncts(plan, &object_type, &relation));
    }

    if disjuncts.is_empty() {
        stmts.push(Stmt::Return(Expr::Int(0)));
        return Ok(stmts);
    }

    stmts.push(Stmt::Assign {
        var: "v_granted".to_string(),
        expr: Expr::or(disjuncts),
    });
    stmts.push(Stmt::If {
        cond: Expr::param("v_granted"),
        then_branch: vec![granted_return(plan, visited_with_key())],
        else_branch: vec![Stmt::Return(Expr::Int(0))],
    });

    Ok(stmts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz_analysis::{InlineSqlData, RelationAnalysis};
    use authz_planner::build_check_plan;
    use authz_sql_dsl::{PostgresPlpgsql, ToSql};

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
    fn direct_relation_renders_tuple_exists_and_cycle_guard() {
        let analysis = base();
        let inline = InlineSqlData::default();
        let plan = build_check_plan(&analysis, &inline).unwrap();
        let body = build_check_body(&plan).unwrap();
        let rendered = body.iter().map(|s| s.to_sql(&PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
        assert!(rendered.contains("v_key = ANY(p_visited)"));
        assert!(rendered.contains("array_length(p_visited, 1) >= 25"));
        assert!(rendered.contains("FROM tuples AS t"));
        assert!(rendered.contains("RETURN 1;"));
    }

    #[test]
    fn depth_exceeded_strategy_renders_bare_raise() {
        let mut analysis = base();
        analysis.max_userset_depth = 26;
        let inline = InlineSqlData::default();
        let plan = build_check_plan(&analysis, &inline).unwrap();
        let body = build_check_body(&plan).unwrap();
        assert_eq!(body.len(), 1);
        let rendered = body[0].to_sql(&PostgresPlpgsql);
        assert!(rendered.contains("M2002"));
    }

    #[test]
    fn no_wildcard_variant_drops_wildcard_match_regardless_of_policy() {
        let mut analysis = base();
        analysis.has_wildcard = true;
        let inline = InlineSqlData::default();
        let plan = build_check_plan(&analysis, &inline).unwrap();

        let normal = build_check_body(&plan).unwrap();
        let normal_rendered = normal.iter().map(|s| s.to_sql(&PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
        assert!(normal_rendered.contains("subject_id = '*'"));

        let no_wildcard = build_check_no_wildcard_body(&plan).unwrap();
        let no_wildcard_rendered = no_wildcard.iter().map(|s| s.to_sql(&PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
        assert!(!no_wildcard_rendered.contains("subject_id = '*'"));
    }

    #[test]
    fn exclusion_adds_postcondition_guard() {
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
        let body = build_check_body(&plan).unwrap();
        let rendered = body.iter().map(|s| s.to_sql(&PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
        assert!(rendered.contains("check_document_blocked"));
        assert!(rendered.contains("v_granted"));
    }
}
