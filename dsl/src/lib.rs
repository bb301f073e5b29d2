//! Typed SQL DSL: expression/table/statement trees and their rendering
//! to PL/pgSQL-flavored SQL text.
//!
//! The DSL never produces pre-formatted SQL itself — every node is a
//! tagged variant with a single [`ToSql::to_sql`] method. Combining
//! several candidate blocks into one FROM source stays typed via
//! [`table::TableRef::UnionSubquery`] / [`table::TableRef::IntersectSubquery`];
//! the only escape hatch for text a builder cannot otherwise express is
//! [`expr::Expr::Raw`] / [`table::TableRef::Raw`].

pub mod dialect;
pub mod error;
pub mod expr;
pub mod ident;
pub mod stmt;
pub mod table;

pub use dialect::{Dialect, PostgresPlpgsql, DEPTH_EXCEEDED_CODE, DEPTH_EXCEEDED_MESSAGE};
pub use error::DslError;
pub use expr::Expr;
pub use ident::{function_name, is_valid_ident, sanitize_ident, ProcKind};
pub use stmt::{CteDef, OrderDirection, OrderItem, SelectStmt, Stmt};
pub use table::{Join, JoinKind, TableRef};

/// Implemented by every DSL node: expressions, table references, joins,
/// and statements all render to SQL text through this one method.
pub trait ToSql {
    fn to_sql(&self, dialect: &dyn Dialect) -> String;
}
