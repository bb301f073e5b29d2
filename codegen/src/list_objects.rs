//! The list-objects builder: turns a [`ListPlan`] into the `Vec<Stmt>`
//! body of a `list_<type>_<relation>_objects` function, wrapped in the
//! shared pagination shell.

use authz_analysis::Strategy;
use authz_planner::ListPlan;
use authz_sql_dsl::{function_name, CteDef, Expr, Join, JoinKind, ProcKind, SelectStmt, Stmt, TableRef, ToSql, DEPTH_EXCEEDED_CODE, DEPTH_EXCEEDED_MESSAGE};

use crate::error::CodegenError;
use crate::render::paginate;
use crate::schema::{col, tuples};

const MAX_DEPTH: i64 = 25;

fn direct_candidates(plan: &ListPlan, object_type: &str) -> SelectStmt {
    let t = "t";
    let relations = plan.analysis.all_satisfying_relations.iter().map(|r| Expr::str_lit(r.as_str()));
    SelectStmt::new()
        .distinct()
        .column(col(t, "object_id"))
        .from(tuples(t))
        .filter(Expr::and([
            col(t, "object_type").eq(Expr::str_lit(object_type)),
            col(t, "relation").any_eq(Expr::array_literal(relations)),
            col(t, "subject_type").eq(Expr::param("p_subject_type")),
            Expr::subject_id_match(col(t, "subject_id"), Expr::param("p_subject_id"), plan.allow_wildcard),
        ]))
}

fn userset_subject_candidates(object_type: &str) -> SelectStmt {
    let grant = "grant_t";
    let member = "member_t";
    SelectStmt::new()
        .distinct()
        .column(col(grant, "object_id"))
        .from(tuples(grant))
        .join(Join {
            kind: JoinKind::Inner,
            table: tuples(member),
            on: Expr::and([
                col(member, "object_type").eq(col(grant, "subject_type")),
                col(member, "object_id").eq(Expr::userset_object_id(col(grant, "subject_id"))),
                col(member, "relation").eq(Expr::userset_relation(col(grant, "subject_id"))),
            ]),
        })
        .filter(Expr::and([
            col(grant, "object_type").eq(Expr::str_lit(object_type)),
            Expr::has_userset(col(grant, "subject_id")),
            col(member, "subject_type").eq(Expr::param("p_subject_type")),
            col(member, "subject_id").eq(Expr::param("p_subject_id")),
        ]))
}

fn complex_closure_candidates(plan: &ListPlan, object_type: &str) -> Vec<SelectStmt> {
    plan.analysis
        .complex_closure_relations
        .iter()
        .map(|rel| {
            let t = "t";
            let callee = function_name(ProcKind::Check, object_type, rel);
            SelectStmt::new()
                .distinct()
                .column(col(t, "object_id"))
                .from(tuples(t))
                .filter(Expr::and([
                    col(t, "object_type").eq(Expr::str_lit(object_type)),
                    col(t, "relation").eq(Expr::str_lit(rel.as_str())),
                    Expr::check_permission_call(
                        callee,
                        [Expr::param("p_subject_type"), Expr::param("p_subject_id"), col(t, "object_id"), Expr::array_literal([])],
                        true,
                    ),
                ]))
        })
        .collect()
}

fn intersection_closure_candidates(plan: &ListPlan, object_type: &str) -> Vec<SelectStmt> {
    plan.analysis
        .intersection_closure_relations
        .iter()
        .map(|rel| {
            let name = function_name(ProcKind::ListObjects, object_type, rel);
            SelectStmt::new().column(Expr::col("object_id")).from(TableRef::FunctionCall {
                name: name.to_string(),
                args: vec![Expr::param("p_subject_type"), Expr::param("p_subject_id"), Expr::Null, Expr::Null],
                alias: format!("{rel}_objects"),
                lateral: false,
            })
        })
        .collect()
}

fn direct_blocks(plan: &ListPlan, object_type: &str) -> Vec<SelectStmt> {
    let mut blocks = vec![direct_candidates(plan, object_type)];
    if plan.has_userset_subject {
        blocks.push(userset_subject_candidates(object_type));
    }
    blocks.extend(complex_closure_candidates(plan, object_type));
    blocks.extend(intersection_closure_candidates(plan, object_type));
    blocks
}

fn intersection_part_candidates(plan: &ListPlan, object_type: &str, relation: &str, part: &authz_analysis::IntersectionPart) -> SelectStmt {
    use authz_analysis::IntersectionPartKind;
    let (base, id_expr) = match &part.kind {
        IntersectionPartKind::IsThis => {
            let t = "t";
            let id_expr = col(t, "object_id");
            let stmt = SelectStmt::new()
                .distinct()
                .column(id_expr.clone())
                .from(tuples(t))
                .filter(Expr::and([
                    col(t, "object_type").eq(Expr::str_lit(object_type)),
                    col(t, "relation").eq(Expr::str_lit(relation)),
                    col(t, "subject_type").eq(Expr::param("p_subject_type")),
                    Expr::subject_id_match(col(t, "subject_id"), Expr::param("p_subject_id"), false),
                ]));
            (stmt, id_expr)
        }
        IntersectionPartKind::ParentRelation(pr) => {
            let t = "lt";
            let id_expr = col(t, "object_id");
            let types = pr.allowed_linking_types.iter().map(|t| Expr::str_lit(t.as_str()));
            let stmt = SelectStmt::new()
                .distinct()
                .column(id_expr.clone())
                .from(tuples(t))
                .filter(Expr::and([
                    col(t, "object_type").eq(Expr::str_lit(object_type)),
                    col(t, "relation").eq(Expr::str_lit(pr.linking_relation.as_str())),
                    col(t, "subject_type").any_eq(Expr::array_literal(types)),
                    Expr::CheckPermission {
                        subject_type: Box::new(Expr::param("p_subject_type")),
                        subject_id: Box::new(Expr::param("p_subject_id")),
                        relation: relation.to_string(),
                        object_type: Box::new(col(t, "subject_type")),
                        object_id: Box::new(col(t, "subject_id")),
                        visited: Box::new(Expr::array_literal([])),
                        expect_allow: true,
                    },
                ]));
            (stmt, id_expr)
        }
        IntersectionPartKind::Computed(rel) => {
            let id_expr = Expr::col("object_id");
            let name = function_name(ProcKind::ListObjects, object_type, rel);
            let stmt = SelectStmt::new().column(id_expr.clone()).from(TableRef::FunctionCall {
                name: name.to_string(),
                args: vec![Expr::param("p_subject_type"), Expr::param("p_subject_id"), Expr::Null, Expr::Null],
                alias: format!("{rel}_objects"),
                lateral: false,
            });
            (stmt, id_expr)
        }
    };
    if let Some(excluded) = &part.excluded_relation {
        let name = function_name(ProcKind::Check, object_type, excluded);
        base.filter(Expr::check_permission_call(
            name,
            [Expr::param("p_subject_type"), Expr::param("p_subject_id"), id_expr, Expr::array_literal([])],
            false,
        ))
    } else {
        base
    }
}

fn intersection_groups_blocks(plan: &ListPlan, object_type: &str, relation: &str) -> Vec<SelectStmt> {
    plan.analysis
        .intersection_groups
        .iter()
        .map(|group| {
            let parts: Vec<SelectStmt> = group
                .parts
                .iter()
                .map(|p| intersection_part_candidates(plan, object_type, relation, p))
                .collect();
            let alias = "intersection_group";
            SelectStmt::new().column(Expr::col("object_id")).from(TableRef::IntersectSubquery {
                parts,
                alias: alias.to_string(),
            })
        })
        .collect()
}

/// Combines a set of object_id-producing blocks into a single
/// `SELECT object_id, <depth>` source via a typed `UNION` subquery.
fn union_as_depth_select(blocks: Vec<SelectStmt>, depth: Expr) -> SelectStmt {
    let source = TableRef::UnionSubquery {
        parts: blocks,
        alias: "base_candidates".to_string(),
    };
    SelectStmt::new().column(Expr::col("base_candidates.object_id")).column_as(depth, "depth").from(source)
}

/// `WITH RECURSIVE accessible(object_id, depth) AS (base UNION ALL
/// recursive)` for tuple-to-userset inheritance. A guard statement
/// ahead of the final query raises `M2002` if the chain reaches 25.
fn recursive_body(plan: &ListPlan, object_type: &str, relation: &str) -> Vec<Stmt> {
    let mut base_blocks = direct_blocks(plan, object_type);

    // Cross-type (non-recursive) TTU parents are part of the base term,
    // validated via the dynamic-object-type dispatcher call.
    for pr in &plan.analysis.parent_relations {
        if pr.is_self_referential(object_type) {
            continue;
        }
        let t = "lt";
        let types = pr.allowed_linking_types.iter().map(|ty| Expr::str_lit(ty.as_str()));
        base_blocks.push(
            SelectStmt::new()
                .distinct()
                .column(col(t, "object_id"))
                .from(tuples(t))
                .filter(Expr::and([
                    col(t, "object_type").eq(Expr::str_lit(object_type)),
                    col(t, "relation").eq(Expr::str_lit(pr.linking_relation.as_str())),
                    col(t, "subject_type").any_eq(Expr::array_literal(types)),
                    Expr::CheckPermission {
                        subject_type: Box::new(Expr::param("p_subject_type")),
                        subject_id: Box::new(Expr::param("p_subject_id")),
                        relation: relation.to_string(),
                        object_type: Box::new(col(t, "subject_type")),
                        object_id: Box::new(col(t, "subject_id")),
                        visited: Box::new(Expr::array_literal([])),
                        expect_allow: true,
                    },
                ])),
        );
    }

    let mut recursive_terms = Vec::new();
    for pr in &plan.analysis.parent_relations {
        if !pr.is_self_referential(object_type) {
            continue;
        }
        let t = "lt";
        recursive_terms.push(
            SelectStmt::new()
                .column(col(t, "object_id"))
                .from(tuples(t))
                .join(Join {
                    kind: JoinKind::Inner,
                    table: TableRef::base_aliased("accessible", "a"),
                    on: col(t, "subject_id").eq(Expr::col("a.object_id")),
                })
                .filter(Expr::and([
                    col(t, "object_type").eq(Expr::str_lit(object_type)),
                    col(t, "relation").eq(Expr::str_lit(pr.linking_relation.as_str())),
                    col(t, "subject_type").eq(Expr::str_lit(object_type)),
                    Expr::col("a.depth").lt(Expr::Int(MAX_DEPTH)),
                ])),
        );
    }

    let base = union_as_depth_select(base_blocks, Expr::Int(0));
    let recursive_term = if recursive_terms.is_empty() {
        None
    } else {
        Some(union_as_depth_select(recursive_terms, Expr::col("a.depth").add(Expr::Int(1))))
    };

    let cte = CteDef {
        name: "accessible".to_string(),
        columns: vec!["object_id".to_string(), "depth".to_string()],
        base,
        recursive_term,
    };

    // A standalone `WITH RECURSIVE` probe for the depth guard: `accessible`
    // is scoped to the statement that defines it, so the guard can't share
    // the CTE with the final `RETURN QUERY` below and re-walks the same
    // recursion once more to find out whether it ever reached 25.
    let probe = Stmt::with(
        true,
        vec![cte.clone()],
        Stmt::Select(
            SelectStmt::new()
                .column(Expr::Int(1))
                .from(TableRef::base("accessible"))
                .filter(Expr::col("depth").ge(Expr::Int(MAX_DEPTH))),
        ),
    );
    let depth_check = Stmt::If {
        cond: Expr::Raw(format!("EXISTS (\n{}\n)", probe.to_sql(&authz_sql_dsl::PostgresPlpgsql))),
        then_branch: vec![Stmt::Raise {
            code: DEPTH_EXCEEDED_CODE.to_string(),
            message: DEPTH_EXCEEDED_MESSAGE.to_string(),
        }],
        else_branch: vec![],
    };

    let result = SelectStmt::new().distinct().column(Expr::col("object_id")).from(TableRef::base("accessible"));

    vec![
        depth_check,
        Stmt::ReturnQueryWith {
            recursive: true,
            ctes: vec![cte],
            select: paginate(candidates_inline(result), "object_id", false),
        },
    ]
}

fn candidates_inline(select: SelectStmt) -> TableRef {
    TableRef::subquery(select, "candidates")
}

pub fn build_list_objects_body(plan: &ListPlan) -> Result<Vec<Stmt>, CodegenError> {
    let object_type = plan.object_type().to_string();
    let relation = plan.relation().to_string();

    if plan.strategy == Strategy::DepthExceeded {
        return Ok(vec![Stmt::Raise {
            code: DEPTH_EXCEEDED_CODE.to_string(),
            message: DEPTH_EXCEEDED_MESSAGE.to_string(),
        }]);
    }

    let blocks: Vec<SelectStmt> = match plan.strategy {
        Strategy::Direct | Strategy::Userset | Strategy::SelfRefUserset => direct_blocks(plan, &object_type),
        Strategy::Intersection => {
            let mut v = direct_blocks(plan, &object_type);
            v.extend(intersection_groups_blocks(plan, &object_type, &relation));
            v
        }
        Strategy::Recursive => return Ok(recursive_body(plan, &object_type, &relation)),
        Strategy::Composed => {
            let anchor = plan
                .analysis
                .indirect_anchor
                .as_ref()
                .map(|a| a.anchor_relation.as_str())
                .unwrap_or(relation.as_str());
            let name = function_name(ProcKind::ListObjects, &object_type, anchor);
            vec![SelectStmt::new().column(Expr::col("object_id")).from(TableRef::FunctionCall {
                name: name.to_string(),
                args: vec![Expr::param("p_subject_type"), Expr::param("p_subject_id"), Expr::Null, Expr::Null],
                alias: "anchor_objects".to_string(),
            lateral: false,
            })]
        }
        Strategy::DepthExceeded => unreachable!(),
    };

    let candidates = TableRef::UnionSubquery {
        parts: blocks,
        alias: "candidates".to_string(),
    };
    Ok(vec![Stmt::ReturnQuery(paginate(candidates, "object_id", false))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz_analysis::{InlineSqlData, RelationAnalysis};
    use authz_planner::build_list_plan;
    use authz_sql_dsl::ToSql;

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
    fn direct_strategy_returns_paginated_union() {
        let analysis = base();
        let inline = InlineSqlData::default();
        let plan = build_list_plan(&analysis, &inline).unwrap();
        let body = build_list_objects_body(&plan).unwrap();
        let rendered = body.iter().map(|s| s.to_sql(&authz_sql_dsl::PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
        assert!(rendered.contains("RETURN QUERY"));
        assert!(rendered.contains("ORDER BY"));
        assert!(rendered.contains("LIMIT p_limit"));
    }
}
