//! Procedure-source rendering: wraps a body ([`Stmt`] tree) with a
//! `CREATE OR REPLACE FUNCTION` signature, and the shared pagination
//! shell every list procedure uses.

use authz_sql_dsl::{Dialect, Expr, OrderItem, SelectStmt, Stmt, TableRef, ToSql};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Sql,
    Plpgsql,
}

#[derive(Debug, Clone)]
pub enum ReturnType {
    Integer,
    Table { column: &'static str },
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub default: Option<&'static str>,
}

impl Param {
    const fn required(name: &'static str, sql_type: &'static str) -> Self {
        Param {
            name,
            sql_type,
            default: None,
        }
    }
    const fn with_default(name: &'static str, sql_type: &'static str, default: &'static str) -> Self {
        Param {
            name,
            sql_type,
            default: Some(default),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcSignature {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: ReturnType,
}

/// `check_*(p_subject_type, p_subject_id, p_object_id, p_visited TEXT[]
/// DEFAULT ARRAY[])`.
pub fn check_signature(function_name: &str) -> ProcSignature {
    ProcSignature {
        name: function_name.to_string(),
        params: vec![
            Param::required("p_subject_type", "TEXT"),
            Param::required("p_subject_id", "TEXT"),
            Param::required("p_object_id", "TEXT"),
            Param::with_default("p_visited", "TEXT[]", "ARRAY[]::TEXT[]"),
        ],
        returns: ReturnType::Integer,
    }
}

pub fn check_permission_signature(name: &str) -> ProcSignature {
    ProcSignature {
        name: name.to_string(),
        params: vec![
            Param::required("p_subject_type", "TEXT"),
            Param::required("p_subject_id", "TEXT"),
            Param::required("p_relation", "TEXT"),
            Param::required("p_object_type", "TEXT"),
            Param::required("p_object_id", "TEXT"),
        ],
        returns: ReturnType::Integer,
    }
}

/// The generic dispatcher's own signature: the same five parameters as
/// [`check_permission_signature`] plus the cycle-tracking `p_visited`
/// the public wrapper never exposes.
pub fn check_permission_internal_signature(name: &str) -> ProcSignature {
    let mut sig = check_permission_signature(name);
    sig.params.push(Param::with_default("p_visited", "TEXT[]", "ARRAY[]::TEXT[]"));
    sig
}

pub fn list_objects_signature(function_name: &str) -> ProcSignature {
    ProcSignature {
        name: function_name.to_string(),
        params: vec![
            Param::required("p_subject_type", "TEXT"),
            Param::required("p_subject_id", "TEXT"),
            Param::required("p_limit", "INTEGER"),
            Param::required("p_after", "TEXT"),
        ],
        returns: ReturnType::Table { column: "object_id" },
    }
}

pub fn list_subjects_signature(function_name: &str) -> ProcSignature {
    ProcSignature {
        name: function_name.to_string(),
        params: vec![
            Param::required("p_object_id", "TEXT"),
            Param::required("p_subject_type", "TEXT"),
            Param::required("p_limit", "INTEGER"),
            Param::required("p_after", "TEXT"),
        ],
        returns: ReturnType::Table { column: "subject_id" },
    }
}

pub fn list_accessible_objects_signature(name: &str) -> ProcSignature {
    ProcSignature {
        name: name.to_string(),
        params: vec![
            Param::required("p_object_type", "TEXT"),
            Param::required("p_relation", "TEXT"),
            Param::required("p_subject_type", "TEXT"),
            Param::required("p_subject_id", "TEXT"),
            Param::required("p_limit", "INTEGER"),
            Param::required("p_after", "TEXT"),
        ],
        returns: ReturnType::Table { column: "object_id" },
    }
}

pub fn list_accessible_subjects_signature(name: &str) -> ProcSignature {
    ProcSignature {
        name: name.to_string(),
        params: vec![
            Param::required("p_object_type", "TEXT"),
            Param::required("p_relation", "TEXT"),
            Param::required("p_object_id", "TEXT"),
            Param::required("p_subject_type", "TEXT"),
            Param::required("p_limit", "INTEGER"),
            Param::required("p_after", "TEXT"),
        ],
        returns: ReturnType::Table { column: "subject_id" },
    }
}

/// The SQL type a local variable is declared with, keyed by the naming
/// convention the builders use (`v_granted` is the one boolean local;
/// everything else — `v_key`, `v_filter_type`, `v_filter_relation`, and
/// any future `v_*` text local — is `TEXT`).
fn declare_type(var: &str) -> &'static str {
    match var {
        "v_granted" => "BOOLEAN",
        _ => "TEXT",
    }
}

/// Walks a body collecting every `var` a `Stmt::Assign` writes to, in
/// first-use order, so `render_function` can emit a matching `DECLARE`
/// block — PL/pgSQL rejects assignment to an undeclared variable.
fn collect_locals(stmts: &[Stmt], names: &mut Vec<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign { var, .. } => {
                if !names.contains(var) {
                    names.push(var.clone());
                }
            }
            Stmt::If { then_branch, else_branch, .. } => {
                collect_locals(then_branch, names);
                collect_locals(else_branch, names);
            }
            Stmt::With { body, .. } => collect_locals(std::slice::from_ref(body.as_ref()), names),
            _ => {}
        }
    }
}

fn render_params(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| match p.default {
            Some(d) => format!("{} {} DEFAULT {d}", p.name, p.sql_type),
            None => format!("{} {}", p.name, p.sql_type),
        })
        .collect::<Vec<_>>()
        .join(",\n    ")
}

/// Renders a full `CREATE OR REPLACE FUNCTION`. `body` is a sequence of
/// statements; every statement but a bare `LANGUAGE sql` body already
/// self-terminates with `;`.
pub fn render_function(
    dialect: &dyn Dialect,
    sig: &ProcSignature,
    header_comments: &[String],
    body: &[Stmt],
    language: Language,
) -> String {
    let mut out = String::new();
    for c in header_comments {
        out.push_str("-- ");
        out.push_str(c);
        out.push('\n');
    }
    let returns = match &sig.returns {
        ReturnType::Integer => "INTEGER".to_string(),
        ReturnType::Table { column } => format!("TABLE({column} TEXT)"),
    };
    out.push_str(&format!(
        "CREATE OR REPLACE FUNCTION {}(\n    {}\n) RETURNS {returns} AS $$\n",
        sig.name,
        render_params(&sig.params)
    ));
    match language {
        Language::Sql => {
            for stmt in body {
                out.push_str(&stmt.to_sql(dialect));
                out.push('\n');
            }
        }
        Language::Plpgsql => {
            let mut locals = Vec::new();
            collect_locals(body, &mut locals);
            if !locals.is_empty() {
                out.push_str("DECLARE\n");
                for name in &locals {
                    out.push_str(&format!("    {name} {};\n", declare_type(name)));
                }
            }
            out.push_str("BEGIN\n");
            for stmt in body {
                out.push_str(&stmt.to_sql(dialect));
                out.push('\n');
            }
            out.push_str("END;\n");
        }
    }
    out.push_str("$$ LANGUAGE ");
    out.push_str(match language {
        Language::Sql => "sql",
        Language::Plpgsql => "plpgsql",
    });
    out.push_str(" STABLE;\n");
    out
}

/// Wraps an already-combined (possibly `UNION`ed) set of candidate rows
/// in the stable, cursor-based pagination shell every list procedure
/// uses: `ORDER BY <id>`, `p_after` as an exclusive lower bound (NULL
/// means "from the smallest id"), `LIMIT p_limit` (NULL means
/// unbounded — Postgres treats `LIMIT NULL` as no limit, so the
/// parameter is passed straight through).
pub fn paginate(candidates: TableRef, id_column: &str, wildcard_first: bool) -> SelectStmt {
    let id = Expr::col(id_column);
    let mut stmt = SelectStmt::new()
        .column(Expr::col(id_column))
        .from(candidates)
        .filter(Expr::or([
            Expr::param("p_after").is_null(),
            id.clone().gt(Expr::param("p_after")),
        ]));
    if wildcard_first {
        stmt = stmt.order_by(OrderItem::desc(id.clone().eq(Expr::str_lit("*"))));
    }
    stmt = stmt.order_by(OrderItem::asc(id));
    stmt.limit(Expr::param("p_limit"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz_sql_dsl::PostgresPlpgsql;

    #[test]
    fn paginate_guards_null_after_and_passes_limit_through() {
        let t = TableRef::Base {
            name: "tuples".to_string(),
            alias: None,
        };
        let stmt = paginate(t, "object_id", false);
        let rendered = stmt.to_sql(&PostgresPlpgsql);
        assert!(rendered.contains("p_after IS NULL"));
        assert!(rendered.contains("object_id > p_after"));
        assert!(rendered.contains("LIMIT p_limit"));
    }

    #[test]
    fn render_function_wraps_plpgsql_body() {
        let sig = check_signature("check_document_viewer");
        let body = vec![Stmt::Return(Expr::Int(0))];
        let rendered = render_function(&PostgresPlpgsql, &sig, &["strategy: Direct".into()], &body, Language::Plpgsql);
        assert!(rendered.starts_with("-- strategy: Direct"));
        assert!(rendered.contains("CREATE OR REPLACE FUNCTION check_document_viewer("));
        assert!(rendered.contains("BEGIN\nRETURN 0;\nEND;\n"));
        assert!(rendered.contains("LANGUAGE plpgsql STABLE;"));
    }

    #[test]
    fn render_function_declares_every_assigned_local_once() {
        let sig = check_signature("check_document_viewer");
        let body = vec![
            Stmt::Assign {
                var: "v_key".to_string(),
                expr: Expr::str_lit("document:x:viewer"),
            },
            Stmt::If {
                cond: Expr::Bool(true),
                then_branch: vec![Stmt::Assign {
                    var: "v_granted".to_string(),
                    expr: Expr::Bool(true),
                }],
                else_branch: vec![],
            },
            Stmt::Return(Expr::Int(1)),
        ];
        let rendered = render_function(&PostgresPlpgsql, &sig, &[], &body, Language::Plpgsql);
        let declare_pos = rendered.find("DECLARE\n").unwrap();
        let begin_pos = rendered.find("BEGIN\n").unwrap();
        assert!(declare_pos < begin_pos);
        let declare_section = &rendered[declare_pos..begin_pos];
        assert!(declare_section.contains("v_key TEXT;"));
        assert!(declare_section.contains("v_granted BOOLEAN;"));
    }

    #[test]
    fn render_function_omits_declare_when_nothing_is_assigned() {
        let sig = check_signature("check_document_viewer");
        let body = vec![Stmt::Return(Expr::Int(0))];
        let rendered = render_function(&PostgresPlpgsql, &sig, &[], &body, Language::Plpgsql);
        assert!(!rendered.contains("DECLARE"));
    }
}
