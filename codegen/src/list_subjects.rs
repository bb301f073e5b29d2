//! The list-subjects builder: turns a [`ListPlan`] into the `Vec<Stmt>`
//! body of a `list_<type>_<relation>_subjects` function.
//!
//! Every body starts with the same fork: a userset-filter path taken
//! when `p_subject_type` is itself `T#R`, and a regular path for a
//! concrete subject type. Only the regular path varies by strategy.

use authz_analysis::Strategy;
use authz_planner::ListPlan;
use authz_sql_dsl::{function_name, CteDef, Expr, ProcKind, SelectStmt, Stmt, TableRef, ToSql, DEPTH_EXCEEDED_CODE, DEPTH_EXCEEDED_MESSAGE};

use crate::error::CodegenError;
use crate::render::paginate;
use crate::schema::{col, tuples};

fn empty_candidates() -> TableRef {
    TableRef::Values {
        alias: "empty_subjects".to_string(),
        columns: vec!["subject_id".to_string()],
        rows: vec![],
    }
}

fn return_empty() -> Stmt {
    Stmt::ReturnQuery(paginate(empty_candidates(), "subject_id", false))
}

fn union_as_select(blocks: Vec<SelectStmt>, alias: &str) -> TableRef {
    TableRef::UnionSubquery {
        parts: blocks,
        alias: alias.to_string(),
    }
}

/// Direct userset-tuples block: grant tuples whose subject is a userset
/// of the filter type, renormalized to the filter relation and
/// re-validated with the generic dispatcher (the grant names
/// `G#some_relation`, not necessarily `v_filter_relation`).
fn userset_filter_direct_block(plan: &ListPlan, object_type: &str, relation: &str) -> SelectStmt {
    let t = "t";
    let relations = plan.analysis.all_satisfying_relations.iter().map(|r| Expr::str_lit(r.as_str()));
    let normalized = Expr::concat([
        Expr::userset_object_id(col(t, "subject_id")),
        Expr::str_lit("#"),
        Expr::param("v_filter_relation"),
    ]);
    SelectStmt::new()
        .distinct()
        .column_as(normalized.clone(), "subject_id")
        .from(tuples(t))
        .filter(Expr::and([
            col(t, "object_type").eq(Expr::str_lit(object_type)),
            col(t, "object_id").eq(Expr::param("p_object_id")),
            col(t, "relation").any_eq(Expr::array_literal(relations)),
            col(t, "subject_type").eq(Expr::param("v_filter_type")),
            Expr::CheckPermission {
                subject_type: Box::new(Expr::param("v_filter_type")),
                subject_id: Box::new(normalized),
                relation: relation.to_string(),
                object_type: Box::new(Expr::str_lit(object_type)),
                object_id: Box::new(Expr::param("p_object_id")),
                visited: Box::new(Expr::array_literal([])),
                expect_allow: true,
            },
        ]))
}

/// Self-candidate block: `object_id#v_filter_relation` qualifies when the
/// filter type is this object type and the filter relation satisfies
/// `relation` per the precomputed closure.
fn userset_filter_self_block(plan: &ListPlan, object_type: &str, relation: &str) -> SelectStmt {
    let subject_id = Expr::concat([Expr::param("p_object_id"), Expr::str_lit("#"), Expr::param("v_filter_relation")]);
    SelectStmt::new()
        .distinct()
        .column_as(subject_id, "subject_id")
        .from(plan.inline.closure_table())
        .filter(Expr::and([
            Expr::param("v_filter_type").eq(Expr::str_lit(object_type)),
            col(authz_analysis::CLOSURE_ALIAS, "object_type").eq(Expr::str_lit(object_type)),
            col(authz_analysis::CLOSURE_ALIAS, "relation").eq(Expr::str_lit(relation)),
            col(authz_analysis::CLOSURE_ALIAS, "satisfying_relation").eq(Expr::param("v_filter_relation")),
        ]))
}

fn userset_filter_intersection_closure_blocks(plan: &ListPlan, object_type: &str) -> Vec<SelectStmt> {
    plan.analysis
        .intersection_closure_relations
        .iter()
        .map(|rel| {
            let name = function_name(ProcKind::ListSubjects, object_type, rel);
            SelectStmt::new().column(Expr::col("subject_id")).from(TableRef::FunctionCall {
                name: name.to_string(),
                args: vec![Expr::param("p_object_id"), Expr::param("p_subject_type"), Expr::Null, Expr::Null],
                alias: format!("{rel}_subjects"),
                lateral: false,
            })
        })
        .collect()
}

fn userset_filter_body(plan: &ListPlan, object_type: &str, relation: &str) -> Vec<Stmt> {
    let mut stmts = vec![
        Stmt::Assign {
            var: "v_filter_type".to_string(),
            expr: Expr::userset_object_id(Expr::param("p_subject_type")),
        },
        Stmt::Assign {
            var: "v_filter_relation".to_string(),
            expr: Expr::userset_relation(Expr::param("p_subject_type")),
        },
    ];
    let mut blocks = vec![userset_filter_direct_block(plan, object_type, relation), userset_filter_self_block(plan, object_type, relation)];
    blocks.extend(userset_filter_intersection_closure_blocks(plan, object_type));
    let candidates = union_as_select(blocks, "filter_candidates");
    stmts.push(Stmt::ReturnQuery(paginate(candidates, "subject_id", plan.allow_wildcard)));
    stmts
}

fn direct_tuple_block(plan: &ListPlan, object_type: &str, relation: &str) -> SelectStmt {
    let t = "t";
    let relations = plan.analysis.all_satisfying_relations.iter().map(|r| Expr::str_lit(r.as_str()));
    let _ = relation;
    SelectStmt::new()
        .distinct()
        .column(col(t, "subject_id"))
        .from(tuples(t))
        .filter(Expr::and([
            col(t, "object_type").eq(Expr::str_lit(object_type)),
            col(t, "object_id").eq(Expr::param("p_object_id")),
            col(t, "relation").any_eq(Expr::array_literal(relations)),
            col(t, "subject_type").eq(Expr::param("p_subject_type")),
        ]))
}

fn complex_closure_blocks(plan: &ListPlan, object_type: &str) -> Vec<SelectStmt> {
    plan.analysis
        .complex_closure_relations
        .iter()
        .map(|rel| {
            let t = "t";
            let callee = function_name(ProcKind::Check, object_type, rel);
            SelectStmt::new()
                .distinct()
                .column(col(t, "subject_id"))
                .from(tuples(t))
                .filter(Expr::and([
                    col(t, "object_type").eq(Expr::str_lit(object_type)),
                    col(t, "object_id").eq(Expr::param("p_object_id")),
                    col(t, "relation").eq(Expr::str_lit(rel.as_str())),
                    col(t, "subject_type").eq(Expr::param("p_subject_type")),
                    Expr::check_permission_call(
                        callee,
                        [Expr::param("p_subject_type"), col(t, "subject_id"), Expr::param("p_object_id"), Expr::array_literal([])],
                        true,
                    ),
                ]))
        })
        .collect()
}

fn intersection_closure_blocks(plan: &ListPlan, object_type: &str) -> Vec<SelectStmt> {
    plan.analysis
        .intersection_closure_relations
        .iter()
        .map(|rel| {
            let name = function_name(ProcKind::ListSubjects, object_type, rel);
            SelectStmt::new().column(Expr::col("subject_id")).from(TableRef::FunctionCall {
                name: name.to_string(),
                args: vec![Expr::param("p_object_id"), Expr::param("p_subject_type"), Expr::Null, Expr::Null],
                alias: format!("{rel}_subjects"),
                lateral: false,
            })
        })
        .collect()
}

/// A userset-pattern block: every grant naming a userset `G#R2` expands
/// via a `LATERAL` call into that group's own `list_*_subjects`,
/// filtered to the requested concrete subject type.
fn userset_pattern_blocks(plan: &ListPlan, object_type: &str) -> Vec<SelectStmt> {
    let grant = "grant_t";
    plan.analysis
        .userset_patterns
        .iter()
        .chain(plan.analysis.closure_userset_patterns.iter())
        .map(|pattern| {
            let relations = pattern.satisfying_relations.iter().map(|r| Expr::str_lit(r.as_str()));
            let name = function_name(ProcKind::ListSubjects, &pattern.subject_type, &pattern.subject_relation);
            SelectStmt::new()
                .column(Expr::col("member.subject_id"))
                .from(tuples(grant))
                .join(authz_sql_dsl::Join {
                    kind: authz_sql_dsl::JoinKind::Inner,
                    table: TableRef::FunctionCall {
                        name: name.to_string(),
                        args: vec![
                            Expr::userset_object_id(col(grant, "subject_id")),
                            Expr::param("p_subject_type"),
                            Expr::Null,
                            Expr::Null,
                        ],
                        alias: "member".to_string(),
                        lateral: true,
                    },
                    on: Expr::Bool(true),
                })
                .filter(Expr::and([
                    col(grant, "object_type").eq(Expr::str_lit(object_type)),
                    col(grant, "object_id").eq(Expr::param("p_object_id")),
                    col(grant, "relation").any_eq(Expr::array_literal(relations)),
                    Expr::has_userset(col(grant, "subject_id")),
                    col(grant, "subject_type").eq(Expr::str_lit(pattern.subject_type.as_str())),
                    Expr::userset_relation(col(grant, "subject_id")).eq(Expr::str_lit(pattern.subject_relation.as_str())),
                ]))
        })
        .collect()
}

fn regular_path_blocks(plan: &ListPlan, object_type: &str, relation: &str) -> Vec<SelectStmt> {
    let mut blocks = vec![direct_tuple_block(plan, object_type, relation)];
    blocks.extend(complex_closure_blocks(plan, object_type));
    blocks.extend(intersection_closure_blocks(plan, object_type));
    blocks.extend(userset_pattern_blocks(plan, object_type));
    blocks
}

/// Wraps the regular path in the wildcard-folding stack: once `*`
/// appears anywhere in the pool, every other subject must additionally
/// clear the `_no_wildcard` check before it is emitted alongside the
/// wildcard marker.
fn recursive_wildcard_fold(plan: &ListPlan, object_type: &str, relation: &str) -> Stmt {
    let blocks = regular_path_blocks(plan, object_type, relation);
    let pool_source = union_as_select(blocks, "pool_candidates");
    let subject_pool = CteDef::non_recursive(
        "subject_pool",
        SelectStmt::new().distinct().column(Expr::col("subject_id")).from(pool_source),
    );
    let has_wildcard = CteDef::non_recursive(
        "has_wildcard",
        SelectStmt::new().column_as(
            Expr::exists(
                SelectStmt::new()
                    .column(Expr::Int(1))
                    .from(TableRef::base("subject_pool"))
                    .filter(Expr::col("subject_id").eq(Expr::str_lit("*"))),
            ),
            "present",
        ),
    );
    let no_wildcard_check = Expr::CheckPermissionCall {
        function_name: "check_permission_no_wildcard_internal".to_string(),
        args: vec![
            Expr::param("p_subject_type"),
            Expr::col("subject_pool.subject_id"),
            Expr::str_lit(relation),
            Expr::str_lit(object_type),
            Expr::param("p_object_id"),
            Expr::array_literal([]),
        ],
        expect_allow: true,
    };
    let base_results = CteDef::non_recursive(
        "base_results",
        SelectStmt::new()
            .column(Expr::col("subject_pool.subject_id"))
            .from(TableRef::base("subject_pool"))
            .filter(Expr::or([
                Expr::col("subject_pool.subject_id").eq(Expr::str_lit("*")),
                Expr::not_exists(SelectStmt::new().column(Expr::Int(1)).from(TableRef::base("has_wildcard")).filter(Expr::col("present"))),
                no_wildcard_check,
            ])),
    );
    Stmt::ReturnQueryWith {
        recursive: false,
        ctes: vec![subject_pool, has_wildcard, base_results],
        select: paginate(TableRef::base("base_results"), "subject_id", plan.allow_wildcard),
    }
}

fn intersection_gather_and_filter(plan: &ListPlan, object_type: &str, relation: &str) -> Stmt {
    let blocks = regular_path_blocks(plan, object_type, relation);
    let pool = union_as_select(blocks, "pool_candidates");
    let callee = function_name(ProcKind::Check, object_type, relation);
    let filtered = SelectStmt::new()
        .distinct()
        .column(Expr::col("pool_candidates.subject_id"))
        .from(pool)
        .filter(Expr::check_permission_call(
            callee,
            [Expr::param("p_subject_type"), Expr::col("pool_candidates.subject_id"), Expr::param("p_object_id"), Expr::array_literal([])],
            true,
        ));
    Stmt::ReturnQuery(paginate(TableRef::subquery(filtered, "candidates"), "subject_id", false))
}

fn composed_delegate(plan: &ListPlan, object_type: &str, relation: &str) -> Stmt {
    let anchor = plan.analysis.indirect_anchor.as_ref().map(|a| a.anchor_relation.as_str()).unwrap_or(relation);
    let name = function_name(ProcKind::ListSubjects, object_type, anchor);
    let source = TableRef::FunctionCall {
        name: name.to_string(),
        args: vec![Expr::param("p_object_id"), Expr::param("p_subject_type"), Expr::Null, Expr::Null],
        alias: "anchor_subjects".to_string(),
        lateral: false,
    };
    Stmt::ReturnQuery(paginate(source, "subject_id", plan.allow_wildcard))
}

fn type_guard(plan: &ListPlan) -> Stmt {
    let allowed = plan.analysis.allowed_subject_types.iter().map(|t| Expr::str_lit(t.as_str()));
    Stmt::If {
        cond: Expr::param("p_subject_type").any_eq(Expr::array_literal(allowed)).not(),
        then_branch: vec![return_empty()],
        else_branch: vec![],
    }
}

pub fn build_list_subjects_body(plan: &ListPlan) -> Result<Vec<Stmt>, CodegenError> {
    let object_type = plan.object_type().to_string();
    let relation = plan.relation().to_string();

    if plan.strategy == Strategy::DepthExceeded {
        return Ok(vec![Stmt::Raise {
            code: DEPTH_EXCEEDED_CODE.to_string(),
            message: DEPTH_EXCEEDED_MESSAGE.to_string(),
        }]);
    }

    let mut stmts = vec![Stmt::If {
        cond: Expr::has_userset(Expr::param("p_subject_type")),
        then_branch: userset_filter_body(plan, &object_type, &relation),
        else_branch: vec![],
    }];
    stmts.push(type_guard(plan));

    let tail = match plan.strategy {
        Strategy::Recursive => recursive_wildcard_fold(plan, &object_type, &relation),
        Strategy::Intersection => intersection_gather_and_filter(plan, &object_type, &relation),
        Strategy::Composed => composed_delegate(plan, &object_type, &relation),
        _ => {
            let blocks = regular_path_blocks(plan, &object_type, &relation);
            let candidates = union_as_select(blocks, "candidates");
            Stmt::ReturnQuery(paginate(candidates, "subject_id", plan.allow_wildcard))
        }
    };
    stmts.push(tail);
    Ok(stmts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz_analysis::{InlineSqlData, RelationAnalysis};
    use authz_planner::build_list_plan;
    use authz_sql_dsl::PostgresPlpgsql;

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
    fn direct_strategy_forks_on_userset_filter_and_type_guard() {
        let analysis = base();
        let inline = InlineSqlData::default();
        let plan = build_list_plan(&analysis, &inline).unwrap();
        let body = build_list_subjects_body(&plan).unwrap();
        let rendered = body.iter().map(|s| s.to_sql(&PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
        assert!(rendered.contains("position('#' in p_subject_type) > 0"));
        assert!(rendered.contains("p_subject_type = ANY(ARRAY['user'])"));
        assert!(rendered.contains("RETURN QUERY"));
    }

    #[test]
    fn wildcard_fold_checks_no_wildcard_variant() {
        use authz_analysis::ParentRelation;
        let mut analysis = base();
        analysis.parent_relations.push(ParentRelation {
            relation: "viewer".into(),
            linking_relation: "parent".into(),
            allowed_linking_types: vec!["document".into()],
        });
        analysis.has_wildcard = true;
        let inline = InlineSqlData::default();
        let plan = build_list_plan(&analysis, &inline).unwrap();
        let body = build_list_subjects_body(&plan).unwrap();
        let rendered = body.iter().map(|s| s.to_sql(&PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
        assert!(rendered.contains("check_permission_no_wildcard_internal"));
        assert!(rendered.contains("has_wildcard"));
    }
}
