//! Dialect seam. One implementation ships; the trait exists so
//! string-literal quoting and `RAISE` syntax aren't hardcoded at every
//! call site, keeping dialect-variable rendering behind a trait even
//! when only one dialect is wired up.

/// The error SQLSTATE the generator ever raises.
pub const DEPTH_EXCEEDED_CODE: &str = "M2002";
pub const DEPTH_EXCEEDED_MESSAGE: &str = "resolution too complex";

pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Escapes a string literal by single-quote doubling and wraps it in
    /// single quotes.
    fn quote_string(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('\'');
        for c in s.chars() {
            if c == '\'' {
                out.push('\'');
            }
            out.push(c);
        }
        out.push('\'');
        out
    }

    /// Renders a `RAISE` with a SQLSTATE error code.
    fn raise(&self, code: &str, message: &str) -> String {
        format!(
            "RAISE EXCEPTION '{message}' USING ERRCODE = '{code}';",
            message = message.replace('\'', "''"),
            code = code
        )
    }
}

/// The one supported target: PostgreSQL PL/pgSQL stored procedures.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresPlpgsql;

impl Dialect for PostgresPlpgsql {
    fn name(&self) -> &'static str {
        "postgres_plpgsql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_single_quotes() {
        let d = PostgresPlpgsql;
        assert_eq!(d.quote_string("it's"), "'it''s'");
    }

    #[test]
    fn raises_depth_exceeded() {
        let d = PostgresPlpgsql;
        let sql = d.raise(DEPTH_EXCEEDED_CODE, DEPTH_EXCEEDED_MESSAGE);
        assert!(sql.contains("M2002"));
        assert!(sql.contains("resolution too complex"));
    }
}
