//! Table-position AST nodes.

use crate::dialect::Dialect;
use crate::error::DslError;
use crate::expr::Expr;
use crate::stmt::SelectStmt;
use crate::ToSql;

#[derive(Debug, Clone)]
pub enum TableRef {
    /// A base table reference, e.g. the single tuples table.
    Base { name: String, alias: Option<String> },
    /// `(SELECT ...) AS alias`.
    Subquery { stmt: Box<SelectStmt>, alias: String },
    /// `(VALUES (...), (...)) AS alias(col1, col2, ...)`.
    ///
    /// An empty `rows` list still renders a syntactically valid VALUES
    /// block that can never match: a single all-NULL row
    /// guarded by a `WHERE false`.
    Values {
        alias: String,
        columns: Vec<String>,
        rows: Vec<Vec<Expr>>,
    },
    /// `(SELECT ... INTERSECT SELECT ... ) AS alias`.
    IntersectSubquery {
        parts: Vec<SelectStmt>,
        alias: String,
    },
    /// `(SELECT ... UNION SELECT ... ) AS alias` — the typed way to
    /// combine several candidate blocks into one FROM source, used
    /// everywhere a procedure builder would otherwise have to render
    /// each block to text itself.
    UnionSubquery {
        parts: Vec<SelectStmt>,
        alias: String,
    },
    /// A set-returning function used in the FROM list, optionally
    /// `LATERAL` when it references columns from a preceding FROM item.
    FunctionCall {
        name: String,
        args: Vec<Expr>,
        alias: String,
        lateral: bool,
    },
    /// Pre-rendered SQL used as a subquery source. The table-position
    /// twin of [`Expr::Raw`], for the rare fragment a builder can't
    /// express as a typed node at all (e.g. the recursive depth guard's
    /// `EXISTS` probe) — not a substitute for [`TableRef::UnionSubquery`]
    /// or [`TableRef::IntersectSubquery`].
    Raw { sql: String, alias: String },
}

impl TableRef {
    pub fn base(name: impl Into<String>) -> Self {
        TableRef::Base {
            name: name.into(),
            alias: None,
        }
    }
    pub fn base_aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        TableRef::Base {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }
    pub fn subquery(stmt: SelectStmt, alias: impl Into<String>) -> Self {
        TableRef::Subquery {
            stmt: Box::new(stmt),
            alias: alias.into(),
        }
    }

    /// Checks row arity for VALUES tables; a well-typed plan never
    /// triggers this, which is why callers treat it as an invariant
    /// breach rather than a recoverable build error.
    pub fn validate(&self) -> Result<(), DslError> {
        if let TableRef::Values { alias, columns, rows } = self {
            for (row, r) in rows.iter().enumerate() {
                if r.len() != columns.len() {
                    return Err(DslError::ValuesArityMismatch {
                        alias: alias.clone(),
                        columns: columns.len(),
                        row,
                        got: r.len(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn alias_name(&self) -> Option<&str> {
        match self {
            TableRef::Base { alias, .. } => alias.as_deref(),
            TableRef::Subquery { alias, .. } => Some(alias),
            TableRef::Values { alias, .. } => Some(alias),
            TableRef::IntersectSubquery { alias, .. } => Some(alias),
            TableRef::UnionSubquery { alias, .. } => Some(alias),
            TableRef::FunctionCall { alias, .. } => Some(alias),
            TableRef::Raw { alias, .. } => Some(alias),
        }
    }
}

impl ToSql for TableRef {
    fn to_sql(&self, dialect: &dyn Dialect) -> String {
        match self {
            TableRef::Base { name, alias } => match alias {
                Some(a) => format!("{name} AS {a}"),
                None => name.clone(),
            },
            TableRef::Subquery { stmt, alias } => {
                format!("({}) AS {alias}", stmt.to_sql(dialect))
            }
            TableRef::Values { alias, columns, rows } => {
                let col_list = columns.join(", ");
                if rows.is_empty() {
                    // A single unmatchable NULL row keeps the VALUES block
                    // syntactically valid without touching real data.
                    let nulls = vec!["NULL"; columns.len()].join(", ");
                    return format!(
                        "(SELECT {col_list} FROM (VALUES ({nulls})) AS {alias}({col_list}) WHERE false) AS {alias}"
                    );
                }
                let row_text = rows
                    .iter()
                    .map(|row| {
                        let cells = row
                            .iter()
                            .map(|e| e.to_sql(dialect))
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!("({cells})")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("(VALUES {row_text}) AS {alias}({col_list})")
            }
            TableRef::IntersectSubquery { parts, alias } => {
                let rendered = parts
                    .iter()
                    .map(|p| p.to_sql(dialect))
                    .collect::<Vec<_>>()
                    .join("\nINTERSECT\n");
                format!("({rendered}) AS {alias}")
            }
            TableRef::UnionSubquery { parts, alias } => {
                let rendered = parts
                    .iter()
                    .map(|p| p.to_sql(dialect))
                    .collect::<Vec<_>>()
                    .join("\nUNION\n");
                format!("({rendered}) AS {alias}")
            }
            TableRef::FunctionCall {
                name,
                args,
                alias,
                lateral,
            } => {
                let args_text = args
                    .iter()
                    .map(|a| a.to_sql(dialect))
                    .collect::<Vec<_>>()
                    .join(", ");
                let kw = if *lateral { "LATERAL " } else { "" };
                format!("{kw}{name}({args_text}) AS {alias}")
            }
            TableRef::Raw { sql, alias } => format!("({sql}) AS {alias}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Expr,
}

impl ToSql for Join {
    fn to_sql(&self, dialect: &dyn Dialect) -> String {
        let kw = match self.kind {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
        };
        format!(
            "{kw} {} ON {}",
            self.table.to_sql(dialect),
            self.on.to_sql(dialect)
        )
    }
}
