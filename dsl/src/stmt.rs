//! Statement-position AST nodes: `SELECT`, `WITH [RECURSIVE]`, control
//! flow, and the PL/pgSQL statement forms the builders emit.

use crate::dialect::Dialect;
use crate::expr::Expr;
use crate::table::{Join, TableRef};
use crate::ToSql;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct OrderItem {
    pub expr: Expr,
    pub direction: OrderDirection,
}

impl OrderItem {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Asc,
        }
    }
    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Desc,
        }
    }
}

/// A typed `SELECT`. Columns are `(expression, optional alias)` pairs.
#[derive(Debug, Clone, Default)]
pub struct SelectStmt {
    pub distinct: bool,
    pub columns: Vec<(Expr, Option<String>)>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub filter: Option<Expr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<Expr>,
}

impl SelectStmt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn column(mut self, expr: Expr) -> Self {
        self.columns.push((expr, None));
        self
    }

    pub fn column_as(mut self, expr: Expr, alias: impl Into<String>) -> Self {
        self.columns.push((expr, Some(alias.into())));
        self
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => Expr::and([existing, expr]),
            None => expr,
        });
        self
    }

    pub fn order_by(mut self, item: OrderItem) -> Self {
        self.order_by.push(item);
        self
    }

    pub fn limit(mut self, expr: Expr) -> Self {
        self.limit = Some(expr);
        self
    }

    /// `SELECT 1` — the canonical probe body for `EXISTS(...)`.
    pub fn probe() -> Self {
        SelectStmt::new().column(Expr::Int(1))
    }
}

impl ToSql for SelectStmt {
    fn to_sql(&self, dialect: &dyn Dialect) -> String {
        let mut s = String::from("SELECT ");
        if self.distinct {
            s.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            s.push('*');
        } else {
            let cols = self
                .columns
                .iter()
                .map(|(e, alias)| match alias {
                    Some(a) => format!("{} AS {a}", e.to_sql(dialect)),
                    None => e.to_sql(dialect),
                })
                .collect::<Vec<_>>()
                .join(", ");
            s.push_str(&cols);
        }
        // A SelectStmt with no FROM renders with no FROM.
        if let Some(from) = &self.from {
            s.push_str(" FROM ");
            s.push_str(&from.to_sql(dialect));
        }
        for join in &self.joins {
            s.push(' ');
            s.push_str(&join.to_sql(dialect));
        }
        if let Some(filter) = &self.filter {
            s.push_str(" WHERE ");
            s.push_str(&filter.to_sql(dialect));
        }
        if !self.order_by.is_empty() {
            s.push_str(" ORDER BY ");
            let items = self
                .order_by
                .iter()
                .map(|item| {
                    let dir = match item.direction {
                        OrderDirection::Asc => "ASC",
                        OrderDirection::Desc => "DESC",
                    };
                    format!("{} {dir}", item.expr.to_sql(dialect))
                })
                .collect::<Vec<_>>()
                .join(", ");
            s.push_str(&items);
        }
        if let Some(limit) = &self.limit {
            s.push_str(" LIMIT ");
            s.push_str(&limit.to_sql(dialect));
        }
        s
    }
}

/// One named member of a `WITH [RECURSIVE]` clause. `recursive_term`,
/// when present, is UNION ALL'd onto `base` — the shape every recursive
/// CTE in this generator uses.
#[derive(Debug, Clone)]
pub struct CteDef {
    pub name: String,
    pub columns: Vec<String>,
    pub base: SelectStmt,
    pub recursive_term: Option<SelectStmt>,
}

impl CteDef {
    pub fn non_recursive(name: impl Into<String>, base: SelectStmt) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            base,
            recursive_term: None,
        }
    }
}

fn render_cte(dialect: &dyn Dialect, cte: &CteDef) -> String {
    let header = if cte.columns.is_empty() {
        cte.name.clone()
    } else {
        format!("{}({})", cte.name, cte.columns.join(", "))
    };
    let body = match &cte.recursive_term {
        Some(rec) => format!(
            "{}\nUNION ALL\n{}",
            cte.base.to_sql(dialect),
            rec.to_sql(dialect)
        ),
        None => cte.base.to_sql(dialect),
    };
    format!("{header} AS (\n{body}\n)")
}

/// A PL/pgSQL statement: either a bare query form usable directly as a
/// function body, or an imperative construct used inside a `BEGIN...END`
/// block.
#[derive(Debug, Clone)]
pub enum Stmt {
    Select(SelectStmt),
    With {
        recursive: bool,
        ctes: Vec<CteDef>,
        body: Box<Stmt>,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    Assign {
        var: String,
        expr: Expr,
    },
    ReturnQuery(SelectStmt),
    /// `RETURN QUERY WITH [RECURSIVE] ctes SELECT ...`. Distinct from
    /// [`Stmt::With`] because `RETURN QUERY`'s argument is one SQL query
    /// that may itself open with `WITH` — the `WITH` cannot prefix the
    /// `RETURN QUERY` keyword the way it prefixes a bare statement.
    ReturnQueryWith {
        recursive: bool,
        ctes: Vec<CteDef>,
        select: SelectStmt,
    },
    Return(Expr),
    Raise {
        code: String,
        message: String,
    },
}

impl Stmt {
    pub fn with(recursive: bool, ctes: Vec<CteDef>, body: Stmt) -> Self {
        Stmt::With {
            recursive,
            ctes,
            body: Box::new(body),
        }
    }
}

impl ToSql for Stmt {
    fn to_sql(&self, dialect: &dyn Dialect) -> String {
        match self {
            Stmt::Select(stmt) => stmt.to_sql(dialect),
            Stmt::With { recursive, ctes, body } => {
                let kw = if *recursive { "WITH RECURSIVE" } else { "WITH" };
                let rendered_ctes = ctes
                    .iter()
                    .map(|c| render_cte(dialect, c))
                    .collect::<Vec<_>>()
                    .join(",\n");
                format!("{kw} {rendered_ctes}\n{}", body.to_sql(dialect))
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                // Each child statement already terminates itself with
                // `;` (Assign/Return/ReturnQuery/Raise/If all do), so no
                // extra separator is added here.
                let then_sql = then_branch
                    .iter()
                    .map(|s| s.to_sql(dialect))
                    .collect::<Vec<_>>()
                    .join("\n");
                if else_branch.is_empty() {
                    format!("IF {} THEN\n{then_sql}\nEND IF;", cond.to_sql(dialect))
                } else {
                    let else_sql = else_branch
                        .iter()
                        .map(|s| s.to_sql(dialect))
                        .collect::<Vec<_>>()
                        .join("\n");
                    format!(
                        "IF {} THEN\n{then_sql}\nELSE\n{else_sql}\nEND IF;",
                        cond.to_sql(dialect)
                    )
                }
            }
            Stmt::Assign { var, expr } => format!("{var} := {};", expr.to_sql(dialect)),
            Stmt::ReturnQuery(stmt) => format!("RETURN QUERY\n{};", stmt.to_sql(dialect)),
            Stmt::ReturnQueryWith { recursive, ctes, select } => {
                let kw = if *recursive { "WITH RECURSIVE" } else { "WITH" };
                let rendered_ctes = ctes
                    .iter()
                    .map(|c| render_cte(dialect, c))
                    .collect::<Vec<_>>()
                    .join(",\n");
                format!("RETURN QUERY\n{kw} {rendered_ctes}\n{};", select.to_sql(dialect))
            }
            Stmt::Return(expr) => format!("RETURN {};", expr.to_sql(dialect)),
            Stmt::Raise { code, message } => dialect.raise(code, message),
        }
    }
}
