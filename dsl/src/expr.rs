//! Typed expression AST.
//!
//! Every variant renders itself through [`ToSql::to_sql`]; there is no
//! separate token stream to thread through — each variant already knows
//! its own keyword syntax, which keeps the tree small: tagged enum
//! variants with one uniform rendering method, instead of a deep
//! expression-builder hierarchy.

use crate::dialect::Dialect;
use crate::stmt::SelectStmt;
use crate::ToSql;

/// A typed scalar SQL expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A column reference, optionally table-qualified (`"tuples.subject_id"`).
    Column(String),
    /// A string literal, escaped at render time.
    Str(String),
    /// A procedure parameter or local variable name (`p_subject_id`,
    /// `v_key`), rendered verbatim since PL/pgSQL parameters are already
    /// valid identifiers in scope.
    Param(String),
    Int(i64),
    Bool(bool),
    /// SQL `NULL`.
    Null,
    /// `expr IS NULL`.
    IsNull(Box<Expr>),

    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),

    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),

    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<SelectStmt>,
        negated: bool,
    },

    Exists {
        subquery: Box<SelectStmt>,
        negated: bool,
    },

    Call {
        name: String,
        args: Vec<Expr>,
    },

    Case {
        arms: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },

    /// `needle_pos_in(haystack)` → `position(needle in haystack)`.
    Position { needle: Box<Expr>, haystack: Box<Expr> },
    /// `substring(expr from from_pos)`.
    Substring { expr: Box<Expr>, from: Box<Expr> },
    /// `split_part(expr, delim, index)`.
    SplitPart {
        expr: Box<Expr>,
        delim: Box<Expr>,
        index: Box<Expr>,
    },
    /// `a || b || c` (`||` concatenation; also used for Postgres array
    /// concatenation, which overloads the same operator).
    Concat(Vec<Expr>),
    /// `ARRAY[e1, e2, ...]`.
    ArrayLiteral(Vec<Expr>),
    /// `expr = ANY(array)`.
    AnyEq { expr: Box<Expr>, array: Box<Expr> },

    // ---- domain nodes ----
    /// `position('#' in e) > 0`
    HasUserset(Box<Expr>),
    /// `position('#' in e) = 0`
    NoUserset(Box<Expr>),
    /// `split_part(e, '#', 1)`
    UsersetObjectId(Box<Expr>),
    /// `split_part(e, '#', 2)`
    UsersetRelation(Box<Expr>),
    /// `substring(e from position('#' in e)+1)`
    SubstringUsersetRelation(Box<Expr>),
    /// `col = id` or `(col = id OR col = '*')` when wildcards are allowed.
    SubjectIdMatch {
        column: Box<Expr>,
        id: Box<Expr>,
        allow_wildcard: bool,
    },
    /// A call to `check_permission_internal(...)` compared to 1 or 0.
    /// `object_type` is an expression rather than a fixed string since
    /// TTU candidates carry their parent's type in a column.
    CheckPermission {
        subject_type: Box<Expr>,
        subject_id: Box<Expr>,
        relation: String,
        object_type: Box<Expr>,
        object_id: Box<Expr>,
        visited: Box<Expr>,
        expect_allow: bool,
    },
    /// A direct call to a specific `check_<type>_<relation>` sibling
    /// function, used to compose intersection parts and complex-closure
    /// validation without going through the generic dispatcher.
    CheckPermissionCall {
        function_name: String,
        args: Vec<Expr>,
        expect_allow: bool,
    },

    /// Pre-rendered SQL text, inserted unmodified. Every use site must be
    /// traceable to a comment explaining why the fragment can't be typed
    /// DSL.
    Raw(String),
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Expr {
        Expr::Column(name.into())
    }
    pub fn str_lit(s: impl Into<String>) -> Expr {
        Expr::Str(s.into())
    }
    pub fn param(name: impl Into<String>) -> Expr {
        Expr::Param(name.into())
    }
    pub fn is_null(self) -> Expr {
        Expr::IsNull(Box::new(self))
    }
    pub fn eq(self, other: Expr) -> Expr {
        Expr::Eq(Box::new(self), Box::new(other))
    }
    pub fn ne(self, other: Expr) -> Expr {
        Expr::Ne(Box::new(self), Box::new(other))
    }
    pub fn lt(self, other: Expr) -> Expr {
        Expr::Lt(Box::new(self), Box::new(other))
    }
    pub fn le(self, other: Expr) -> Expr {
        Expr::Le(Box::new(self), Box::new(other))
    }
    pub fn gt(self, other: Expr) -> Expr {
        Expr::Gt(Box::new(self), Box::new(other))
    }
    pub fn ge(self, other: Expr) -> Expr {
        Expr::Ge(Box::new(self), Box::new(other))
    }
    pub fn add(self, other: Expr) -> Expr {
        Expr::Add(Box::new(self), Box::new(other))
    }
    pub fn concat(items: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Concat(items.into_iter().collect())
    }
    pub fn array_literal(items: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::ArrayLiteral(items.into_iter().collect())
    }
    pub fn any_eq(self, array: Expr) -> Expr {
        Expr::AnyEq {
            expr: Box::new(self),
            array: Box::new(array),
        }
    }
    pub fn and(conds: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(conds.into_iter().collect())
    }
    pub fn or(conds: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(conds.into_iter().collect())
    }
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
    pub fn exists(subquery: SelectStmt) -> Expr {
        Expr::Exists {
            subquery: Box::new(subquery),
            negated: false,
        }
    }
    pub fn not_exists(subquery: SelectStmt) -> Expr {
        Expr::Exists {
            subquery: Box::new(subquery),
            negated: true,
        }
    }
    pub fn call(name: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Call {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }
    pub fn has_userset(e: Expr) -> Expr {
        Expr::HasUserset(Box::new(e))
    }
    pub fn no_userset(e: Expr) -> Expr {
        Expr::NoUserset(Box::new(e))
    }
    pub fn userset_object_id(e: Expr) -> Expr {
        Expr::UsersetObjectId(Box::new(e))
    }
    pub fn userset_relation(e: Expr) -> Expr {
        Expr::UsersetRelation(Box::new(e))
    }
    pub fn substring_userset_relation(e: Expr) -> Expr {
        Expr::SubstringUsersetRelation(Box::new(e))
    }
    pub fn subject_id_match(column: Expr, id: Expr, allow_wildcard: bool) -> Expr {
        Expr::SubjectIdMatch {
            column: Box::new(column),
            id: Box::new(id),
            allow_wildcard,
        }
    }
    pub fn check_permission_call(
        function_name: impl Into<String>,
        args: impl IntoIterator<Item = Expr>,
        expect_allow: bool,
    ) -> Expr {
        Expr::CheckPermissionCall {
            function_name: function_name.into(),
            args: args.into_iter().collect(),
            expect_allow,
        }
    }
}

fn render_binop(
    dialect: &dyn Dialect,
    op: &str,
    l: &Expr,
    r: &Expr,
) -> String {
    format!("{} {} {}", l.to_sql(dialect), op, r.to_sql(dialect))
}

fn join_sql(dialect: &dyn Dialect, items: &[Expr], sep: &str) -> String {
    items
        .iter()
        .map(|e| e.to_sql(dialect))
        .collect::<Vec<_>>()
        .join(sep)
}

impl ToSql for Expr {
    fn to_sql(&self, dialect: &dyn Dialect) -> String {
        match self {
            Expr::Column(c) => c.clone(),
            Expr::Str(s) => dialect.quote_string(s),
            Expr::Param(p) => p.clone(),
            Expr::Int(i) => i.to_string(),
            Expr::Bool(b) => if *b { "true".into() } else { "false".into() },
            Expr::Null => "NULL".into(),
            Expr::IsNull(e) => format!("{} IS NULL", e.to_sql(dialect)),

            Expr::Eq(l, r) => render_binop(dialect, "=", l, r),
            Expr::Ne(l, r) => render_binop(dialect, "!=", l, r),
            Expr::Lt(l, r) => render_binop(dialect, "<", l, r),
            Expr::Le(l, r) => render_binop(dialect, "<=", l, r),
            Expr::Gt(l, r) => render_binop(dialect, ">", l, r),
            Expr::Ge(l, r) => render_binop(dialect, ">=", l, r),
            Expr::Add(l, r) => render_binop(dialect, "+", l, r),

            Expr::And(items) => {
                if items.is_empty() {
                    return "true".into();
                }
                if items.len() == 1 {
                    return items[0].to_sql(dialect);
                }
                format!("({})", join_sql(dialect, items, " AND "))
            }
            Expr::Or(items) => {
                if items.is_empty() {
                    return "false".into();
                }
                if items.len() == 1 {
                    return items[0].to_sql(dialect);
                }
                format!("({})", join_sql(dialect, items, " OR "))
            }
            Expr::Not(e) => format!("NOT ({})", e.to_sql(dialect)),

            Expr::In { expr, list, negated } => {
                let op = if *negated { "NOT IN" } else { "IN" };
                format!("{} {} ({})", expr.to_sql(dialect), op, join_sql(dialect, list, ", "))
            }
            Expr::InSubquery { expr, subquery, negated } => {
                let op = if *negated { "NOT IN" } else { "IN" };
                format!(
                    "{} {} ({})",
                    expr.to_sql(dialect),
                    op,
                    subquery.to_sql(dialect)
                )
            }

            Expr::Exists { subquery, negated } => {
                let kw = if *negated { "NOT EXISTS" } else { "EXISTS" };
                format!("{kw} ({})", subquery.to_sql(dialect))
            }

            Expr::Call { name, args } => {
                format!("{name}({})", join_sql(dialect, args, ", "))
            }

            Expr::Case { arms, otherwise } => {
                let mut s = String::from("CASE");
                for (cond, val) in arms {
                    s.push_str(&format!(" WHEN {} THEN {}", cond.to_sql(dialect), val.to_sql(dialect)));
                }
                if let Some(o) = otherwise {
                    s.push_str(&format!(" ELSE {}", o.to_sql(dialect)));
                }
                s.push_str(" END");
                s
            }

            Expr::Position { needle, haystack } => {
                format!(
                    "position({} in {})",
                    needle.to_sql(dialect),
                    haystack.to_sql(dialect)
                )
            }
            Expr::Substring { expr, from } => {
                format!("substring({} from {})", expr.to_sql(dialect), from.to_sql(dialect))
            }
            Expr::SplitPart { expr, delim, index } => format!(
                "split_part({}, {}, {})",
                expr.to_sql(dialect),
                delim.to_sql(dialect),
                index.to_sql(dialect)
            ),
            Expr::Concat(items) => join_sql(dialect, items, " || "),
            Expr::ArrayLiteral(items) => {
                format!("ARRAY[{}]", join_sql(dialect, items, ", "))
            }
            Expr::AnyEq { expr, array } => {
                format!("{} = ANY({})", expr.to_sql(dialect), array.to_sql(dialect))
            }

            Expr::HasUserset(e) => format!(
                "position('#' in {}) > 0",
                e.to_sql(dialect)
            ),
            Expr::NoUserset(e) => format!(
                "position('#' in {}) = 0",
                e.to_sql(dialect)
            ),
            Expr::UsersetObjectId(e) => {
                format!("split_part({}, '#', 1)", e.to_sql(dialect))
            }
            Expr::UsersetRelation(e) => {
                format!("split_part({}, '#', 2)", e.to_sql(dialect))
            }
            Expr::SubstringUsersetRelation(e) => {
                let rendered = e.to_sql(dialect);
                format!(
                    "substring({rendered} from position('#' in {rendered})+1)"
                )
            }
            Expr::SubjectIdMatch { column, id, allow_wildcard } => {
                let col = column.to_sql(dialect);
                let id = id.to_sql(dialect);
                if *allow_wildcard {
                    format!("({col} = {id} OR {col} = '*')")
                } else {
                    format!("{col} = {id}")
                }
            }
            Expr::CheckPermission {
                subject_type,
                subject_id,
                relation,
                object_type,
                object_id,
                visited,
                expect_allow,
            } => {
                let call = format!(
                    "check_permission_internal({}, {}, {}, {}, {}, {})",
                    subject_type.to_sql(dialect),
                    subject_id.to_sql(dialect),
                    dialect.quote_string(relation),
                    object_type.to_sql(dialect),
                    object_id.to_sql(dialect),
                    visited.to_sql(dialect),
                );
                let expected = if *expect_allow { 1 } else { 0 };
                format!("{call} = {expected}")
            }
            Expr::CheckPermissionCall {
                function_name,
                args,
                expect_allow,
            } => {
                let expected = if *expect_allow { 1 } else { 0 };
                format!(
                    "{function_name}({}) = {expected}",
                    join_sql(dialect, args, ", ")
                )
            }

            Expr::Raw(text) => text.clone(),
        }
    }
}
