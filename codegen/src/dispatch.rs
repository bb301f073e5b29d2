//! The two-stage dispatchers: a PL/pgSQL internal dispatcher that
//! enforces the depth limit and `CASE`-maps `(object_type, relation)` to
//! the specialized procedure, and a thin SQL wrapper that calls it with
//! an empty visited array. List dispatchers are the same shape, minus
//! the depth bookkeeping, forwarding `p_limit`/`p_after` instead.

use authz_sql_dsl::{function_name, Expr, ProcKind, SelectStmt, Stmt, DEPTH_EXCEEDED_CODE, DEPTH_EXCEEDED_MESSAGE};

use crate::render::Language;

/// One `(object_type, relation)` pair eligible for a dispatcher arm.
#[derive(Debug, Clone)]
pub struct DispatchEntry {
    pub object_type: String,
    pub relation: String,
}

#[derive(Debug, Clone)]
pub struct DispatcherBody {
    pub stmts: Vec<Stmt>,
    pub language: Language,
}

fn case_arm(entry: &DispatchEntry, call: Expr) -> (Expr, Expr) {
    let guard = Expr::and([
        Expr::param("p_object_type").eq(Expr::str_lit(entry.object_type.as_str())),
        Expr::param("p_relation").eq(Expr::str_lit(entry.relation.as_str())),
    ]);
    (guard, call)
}

/// `check_permission_internal`: depth guard, then a `CASE` dispatching
/// to each `check_<type>_<relation>`, default branch `0`.
pub fn build_check_internal_dispatcher(entries: &[DispatchEntry]) -> DispatcherBody {
    if entries.is_empty() {
        return DispatcherBody {
            stmts: vec![Stmt::Select(SelectStmt::new().column(Expr::Int(0)))],
            language: Language::Sql,
        };
    }
    let depth_guard = Stmt::If {
        cond: Expr::call("array_length", [Expr::param("p_visited"), Expr::Int(1)]).ge(Expr::Int(25)),
        then_branch: vec![Stmt::Raise {
            code: DEPTH_EXCEEDED_CODE.to_string(),
            message: DEPTH_EXCEEDED_MESSAGE.to_string(),
        }],
        else_branch: vec![],
    };
    let arms = entries
        .iter()
        .map(|e| {
            let name = function_name(ProcKind::Check, &e.object_type, &e.relation);
            let call = Expr::call(
                name,
                [Expr::param("p_subject_type"), Expr::param("p_subject_id"), Expr::param("p_object_id"), Expr::param("p_visited")],
            );
            case_arm(e, call)
        })
        .collect();
    let dispatch = Stmt::Return(Expr::Case {
        arms,
        otherwise: Some(Box::new(Expr::Int(0))),
    });
    DispatcherBody {
        stmts: vec![depth_guard, dispatch],
        language: Language::Plpgsql,
    }
}

/// `check_permission`: a thin SQL wrapper calling the internal
/// dispatcher with an empty visited array.
pub fn build_check_public_wrapper(internal_name: &str) -> DispatcherBody {
    let call = Expr::call(
        internal_name,
        [
            Expr::param("p_subject_type"),
            Expr::param("p_subject_id"),
            Expr::param("p_relation"),
            Expr::param("p_object_type"),
            Expr::param("p_object_id"),
            Expr::array_literal([]),
        ],
    );
    DispatcherBody {
        stmts: vec![Stmt::Select(SelectStmt::new().column(call))],
        language: Language::Sql,
    }
}

/// `check_permission_no_wildcard(_internal)`: identical shape, dispatching
/// to the `_no_wildcard` sibling of each specialized check procedure.
pub fn build_check_no_wildcard_internal_dispatcher(entries: &[DispatchEntry]) -> DispatcherBody {
    if entries.is_empty() {
        return DispatcherBody {
            stmts: vec![Stmt::Select(SelectStmt::new().column(Expr::Int(0)))],
            language: Language::Sql,
        };
    }
    let depth_guard = Stmt::If {
        cond: Expr::call("array_length", [Expr::param("p_visited"), Expr::Int(1)]).ge(Expr::Int(25)),
        then_branch: vec![Stmt::Raise {
            code: DEPTH_EXCEEDED_CODE.to_string(),
            message: DEPTH_EXCEEDED_MESSAGE.to_string(),
        }],
        else_branch: vec![],
    };
    let arms = entries
        .iter()
        .map(|e| {
            let name = function_name(ProcKind::CheckNoWildcard, &e.object_type, &e.relation);
            let call = Expr::call(
                name,
                [Expr::param("p_subject_type"), Expr::param("p_subject_id"), Expr::param("p_object_id"), Expr::param("p_visited")],
            );
            case_arm(e, call)
        })
        .collect();
    let dispatch = Stmt::Return(Expr::Case {
        arms,
        otherwise: Some(Box::new(Expr::Int(0))),
    });
    DispatcherBody {
        stmts: vec![depth_guard, dispatch],
        language: Language::Plpgsql,
    }
}

/// `list_accessible_objects`: forwards `p_limit`/`p_after` instead of
/// `p_visited`; the default branch emits no rows rather than raising.
pub fn build_list_objects_dispatcher(entries: &[DispatchEntry]) -> DispatcherBody {
    build_list_dispatcher(entries, ProcKind::ListObjects, "p_subject_type", "p_subject_id")
}

/// `list_accessible_subjects`: same shape, keyed on `p_object_id`.
pub fn build_list_subjects_dispatcher(entries: &[DispatchEntry]) -> DispatcherBody {
    build_list_dispatcher(entries, ProcKind::ListSubjects, "p_object_id", "p_subject_type")
}

fn build_list_dispatcher(entries: &[DispatchEntry], kind: ProcKind, first_param: &str, second_param: &str) -> DispatcherBody {
    if entries.is_empty() {
        return DispatcherBody {
            stmts: vec![],
            language: Language::Plpgsql,
        };
    }
    let arms: Vec<Stmt> = entries
        .iter()
        .map(|e| {
            let name = function_name(kind, &e.object_type, &e.relation);
            let guard = Expr::and([
                Expr::param("p_object_type").eq(Expr::str_lit(e.object_type.as_str())),
                Expr::param("p_relation").eq(Expr::str_lit(e.relation.as_str())),
            ]);
            let call = SelectStmt::new().column(Expr::col("result")).from(authz_sql_dsl::TableRef::FunctionCall {
                name: name.to_string(),
                args: vec![Expr::param(first_param), Expr::param(second_param), Expr::param("p_limit"), Expr::param("p_after")],
                alias: "result".to_string(),
                lateral: false,
            });
            Stmt::If {
                cond: guard,
                then_branch: vec![Stmt::ReturnQuery(call)],
                else_branch: vec![],
            }
        })
        .collect();
    DispatcherBody {
        stmts: arms,
        language: Language::Plpgsql,
    }
}
