//! Inlined closure and userset catalog data.
//!
//! The closure table `(object_type, relation, satisfying_relation)` and
//! the userset catalog `(object_type, relation, subject_type,
//! subject_relation)` are precomputed once per build and embedded as
//! `VALUES` tables in every generated query that needs them, instead of
//! being looked up from real schema tables at runtime.

use authz_sql_dsl::{Expr, TableRef};
use serde::{Deserialize, Serialize};

use crate::types::{RelationName, TypeName};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureRow {
    pub object_type: TypeName,
    pub relation: RelationName,
    pub satisfying_relation: RelationName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersetCatalogRow {
    pub object_type: TypeName,
    pub relation: RelationName,
    pub subject_type: TypeName,
    pub subject_relation: RelationName,
}

pub const CLOSURE_ALIAS: &str = "closure_data";
pub const USERSET_ALIAS: &str = "userset_catalog";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InlineSqlData {
    pub closure_rows: Vec<ClosureRow>,
    pub userset_rows: Vec<UsersetCatalogRow>,
}

impl InlineSqlData {
    pub fn closure_table(&self) -> TableRef {
        TableRef::Values {
            alias: CLOSURE_ALIAS.to_string(),
            columns: vec![
                "object_type".to_string(),
                "relation".to_string(),
                "satisfying_relation".to_string(),
            ],
            rows: self
                .closure_rows
                .iter()
                .map(|r| {
                    vec![
                        Expr::str_lit(r.object_type.as_str()),
                        Expr::str_lit(r.relation.as_str()),
                        Expr::str_lit(r.satisfying_relation.as_str()),
                    ]
                })
                .collect(),
        }
    }

    pub fn userset_table(&self) -> TableRef {
        TableRef::Values {
            alias: USERSET_ALIAS.to_string(),
            columns: vec![
                "object_type".to_string(),
                "relation".to_string(),
                "subject_type".to_string(),
                "subject_relation".to_string(),
            ],
            rows: self
                .userset_rows
                .iter()
                .map(|r| {
                    vec![
                        Expr::str_lit(r.object_type.as_str()),
                        Expr::str_lit(r.relation.as_str()),
                        Expr::str_lit(r.subject_type.as_str()),
                        Expr::str_lit(r.subject_relation.as_str()),
                    ]
                })
                .collect(),
        }
    }

    /// Closure rows that satisfy `(object_type, relation)`, in input
    /// order.
    pub fn satisfying_relations_for<'a>(
        &'a self,
        object_type: &'a str,
        relation: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.closure_rows
            .iter()
            .filter(move |r| r.object_type == object_type && r.relation == relation)
            .map(|r| r.satisfying_relation.as_str())
    }
}
