//! Identifier sanitization and the emitted-procedure name grammar.

use compact_str::CompactString;

/// Maps every byte outside `[A-Za-z0-9_]` to `_`, then ensures the result
/// starts with `[A-Za-z_]` by prefixing an underscore if needed.
///
/// The prefix step is needed for the round-trip property to hold for
/// every input, not just schemas that already start object/relation
/// names with a letter.
pub fn sanitize_ident(raw: &str) -> CompactString {
    let mut out = CompactString::with_capacity(raw.len());
    for b in raw.bytes() {
        let c = b as char;
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    match out.as_str().chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => out,
        _ => {
            let mut prefixed = CompactString::with_capacity(out.len() + 1);
            prefixed.push('_');
            prefixed.push_str(&out);
            prefixed
        }
    }
}

/// Returns true iff `name` already matches `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One of the procedure kinds the name grammar below distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcKind {
    Check,
    CheckNoWildcard,
    ListObjects,
    ListSubjects,
}

/// Builds `check_<type>_<relation>`, `list_<type>_<relation>_objects`, etc.
pub fn function_name(kind: ProcKind, object_type: &str, relation: &str) -> CompactString {
    let t = sanitize_ident(object_type);
    let r = sanitize_ident(relation);
    match kind {
        ProcKind::Check => CompactString::from(format!("check_{t}_{r}")),
        ProcKind::CheckNoWildcard => CompactString::from(format!("check_{t}_{r}_no_wildcard")),
        ProcKind::ListObjects => CompactString::from(format!("list_{t}_{r}_objects")),
        ProcKind::ListSubjects => CompactString::from(format!("list_{t}_{r}_subjects")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_non_alphanumeric() {
        assert_eq!(sanitize_ident("group#member"), "group_member");
        assert_eq!(sanitize_ident("doc-viewer"), "doc_viewer");
        assert_eq!(sanitize_ident("viewer"), "viewer");
    }

    #[test]
    fn prefixes_leading_digit() {
        let sanitized = sanitize_ident("2fa");
        assert!(is_valid_ident(&sanitized));
        assert_eq!(sanitized, "_2fa");
    }

    #[test]
    fn round_trips_under_is_valid_ident() {
        for raw in ["viewer", "group#member", "123abc", "a-b-c", "_private"] {
            assert!(is_valid_ident(&sanitize_ident(raw)));
        }
    }

    #[test]
    fn builds_name_grammar() {
        assert_eq!(
            function_name(ProcKind::Check, "document", "viewer"),
            "check_document_viewer"
        );
        assert_eq!(
            function_name(ProcKind::ListObjects, "document", "viewer"),
            "list_document_viewer_objects"
        );
        assert_eq!(
            function_name(ProcKind::ListSubjects, "document", "viewer"),
            "list_document_viewer_subjects"
        );
        assert_eq!(
            function_name(ProcKind::CheckNoWildcard, "document", "viewer"),
            "check_document_viewer_no_wildcard"
        );
    }
}
