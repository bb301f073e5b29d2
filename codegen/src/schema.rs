//! The single external tuple-storage table every generated procedure
//! reads from: `(object_type, object_id, relation, subject_type,
//! subject_id)`. Subject IDs may be userset references `T#R` or the
//! wildcard `*`. Every other table referenced by emitted SQL is an
//! inline VALUES block built by `authz_analysis::InlineSqlData`.

use authz_sql_dsl::{Expr, TableRef};

pub const TUPLES_TABLE: &str = "tuples";

pub fn tuples(alias: &str) -> TableRef {
    TableRef::base_aliased(TUPLES_TABLE, alias)
}

pub fn col(alias: &str, column: &str) -> Expr {
    Expr::col(format!("{alias}.{column}"))
}
