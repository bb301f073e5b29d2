//! Error types for the SQL DSL.

use thiserror::Error;

/// DSL-level precondition violations.
///
/// These are unreachable for well-typed inputs produced by the plan
/// builder; they exist so malformed trees fail loudly during rendering
/// instead of producing silently-wrong SQL.
#[derive(Debug, Error)]
pub enum DslError {
    #[error("identifier `{0}` sanitizes to an empty string")]
    EmptyIdentifier(String),

    #[error("AND/OR requires at least one operand")]
    EmptyLogicalGroup,

    #[error("VALUES table `{alias}` has {columns} columns but row {row} has {got}")]
    ValuesArityMismatch {
        alias: String,
        columns: usize,
        row: usize,
        got: usize,
    },

    #[error("CASE expression has no WHEN arms")]
    EmptyCase,
}
