//! Facade crate: wires [`authz_analysis`]/[`authz_planner`]/[`authz_codegen`]
//! into the two public entry points, `generate_check_sql` and
//! `generate_list_sql`, and assembles the ordered migration script.

use authz_analysis::{InlineSqlData, RelationAnalysis};
use authz_codegen::dispatch::{
    build_check_internal_dispatcher, build_check_no_wildcard_internal_dispatcher, build_check_public_wrapper,
    build_list_objects_dispatcher, build_list_subjects_dispatcher, DispatchEntry,
};
use authz_codegen::{
    check, check_permission_internal_signature, check_permission_signature, check_signature, list_objects,
    list_subjects, list_accessible_objects_signature, list_accessible_subjects_signature, list_objects_signature,
    list_subjects_signature, render_function, CodegenError, Language,
};
use authz_planner::{build_check_plan, build_list_plan};
use authz_sql_dsl::{Dialect, PostgresPlpgsql};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Codegen(#[from] CodegenError),
    #[error(transparent)]
    Plan(#[from] authz_planner::PlanError),
}

/// One relation's (object_type, relation) identity plus the analysis and
/// pre-computed inline data it needs to be planned and rendered.
pub struct RelationInput<'a> {
    pub analysis: &'a RelationAnalysis,
    pub inline: &'a InlineSqlData,
}

fn sorted<'a>(inputs: &'a [RelationInput<'a>]) -> Vec<&'a RelationInput<'a>> {
    let mut v: Vec<&RelationInput> = inputs.iter().collect();
    v.sort_by(|a, b| {
        (a.analysis.object_type.as_str(), a.analysis.relation.as_str())
            .cmp(&(b.analysis.object_type.as_str(), b.analysis.relation.as_str()))
    });
    v
}

/// `GenerateCheckSQL`: per-relation `check_<type>_<rel>[_no_wildcard]`
/// bodies, plus the internal/public dispatchers over every check-allowed
/// relation.
pub struct CheckSqlOutput {
    pub per_relation: Vec<String>,
    pub internal_dispatcher: String,
    pub public_dispatcher: String,
    pub no_wildcard_internal_dispatcher: String,
    pub no_wildcard_public_dispatcher: String,
}

pub fn generate_check_sql(inputs: &[RelationInput<'_>]) -> Result<CheckSqlOutput, GenerateError> {
    let dialect: &dyn Dialect = &PostgresPlpgsql;
    let ordered = sorted(inputs);
    let mut per_relation = Vec::new();
    let mut entries = Vec::new();

    for input in &ordered {
        if !input.analysis.check_allowed {
            continue;
        }
        let plan = build_check_plan(input.analysis, input.inline)?;
        debug!(object_type = %plan.object_type(), relation = %plan.relation(), strategy = ?plan.strategy, "building check procedure");

        let body = check::build_check_body(&plan)?;
        let sig = check_signature(&plan.function_name);
        let header = vec![format!("strategy: {:?}", plan.strategy)];
        per_relation.push(render_function(dialect, &sig, &header, &body, Language::Plpgsql));

        let no_wildcard_body = check::build_check_no_wildcard_body(&plan)?;
        let no_wildcard_sig = check_signature(&plan.no_wildcard_function_name);
        per_relation.push(render_function(dialect, &no_wildcard_sig, &header, &no_wildcard_body, Language::Plpgsql));

        entries.push(DispatchEntry {
            object_type: plan.object_type().to_string(),
            relation: plan.relation().to_string(),
        });
    }

    let internal_sig = check_permission_internal_signature("check_permission_internal");
    let internal_body = build_check_internal_dispatcher(&entries);
    let internal_dispatcher = render_function(dialect, &internal_sig, &[], &internal_body.stmts, internal_body.language);

    let public_sig = check_permission_signature("check_permission");
    let public_body = build_check_public_wrapper("check_permission_internal");
    let public_dispatcher = render_function(dialect, &public_sig, &[], &public_body.stmts, public_body.language);

    let no_wildcard_internal_sig = check_permission_internal_signature("check_permission_no_wildcard_internal");
    let no_wildcard_internal_body = build_check_no_wildcard_internal_dispatcher(&entries);
    let no_wildcard_internal_dispatcher = render_function(
        dialect,
        &no_wildcard_internal_sig,
        &[],
        &no_wildcard_internal_body.stmts,
        no_wildcard_internal_body.language,
    );

    let no_wildcard_public_sig = check_permission_signature("check_permission_no_wildcard");
    let no_wildcard_public_body = build_check_public_wrapper("check_permission_no_wildcard_internal");
    let no_wildcard_public_dispatcher = render_function(
        dialect,
        &no_wildcard_public_sig,
        &[],
        &no_wildcard_public_body.stmts,
        no_wildcard_public_body.language,
    );

    Ok(CheckSqlOutput {
        per_relation,
        internal_dispatcher,
        public_dispatcher,
        no_wildcard_internal_dispatcher,
        no_wildcard_public_dispatcher,
    })
}

/// `GenerateListSQL`: per-relation `list_<type>_<rel>_objects`/`_subjects`
/// bodies, plus the `list_accessible_objects`/`list_accessible_subjects`
/// dispatchers.
pub struct ListSqlOutput {
    pub per_relation_objects: Vec<String>,
    pub per_relation_subjects: Vec<String>,
    pub objects_dispatcher: String,
    pub subjects_dispatcher: String,
}

pub fn generate_list_sql(inputs: &[RelationInput<'_>]) -> Result<ListSqlOutput, GenerateError> {
    let dialect: &dyn Dialect = &PostgresPlpgsql;
    let ordered = sorted(inputs);
    let mut per_relation_objects = Vec::new();
    let mut per_relation_subjects = Vec::new();
    let mut entries = Vec::new();

    for input in &ordered {
        if !input.analysis.list_allowed {
            continue;
        }
        let plan = build_list_plan(input.analysis, input.inline)?;
        debug!(object_type = %plan.object_type(), relation = %plan.relation(), strategy = ?plan.strategy, "building list procedures");

        let objects_body = list_objects::build_list_objects_body(&plan)?;
        let objects_sig = list_objects_signature(&plan.objects_function_name);
        let header = vec![format!("strategy: {:?}", plan.strategy)];
        per_relation_objects.push(render_function(dialect, &objects_sig, &header, &objects_body, Language::Plpgsql));

        let subjects_body = list_subjects::build_list_subjects_body(&plan)?;
        let subjects_sig = list_subjects_signature(&plan.subjects_function_name);
        per_relation_subjects.push(render_function(dialect, &subjects_sig, &header, &subjects_body, Language::Plpgsql));

        entries.push(DispatchEntry {
            object_type: plan.object_type().to_string(),
            relation: plan.relation().to_string(),
        });
    }

    let objects_dispatcher_sig = list_accessible_objects_signature("list_accessible_objects");
    let objects_dispatcher_body = build_list_objects_dispatcher(&entries);
    let objects_dispatcher = render_function(
        dialect,
        &objects_dispatcher_sig,
        &[],
        &objects_dispatcher_body.stmts,
        objects_dispatcher_body.language,
    );

    let subjects_dispatcher_sig = list_accessible_subjects_signature("list_accessible_subjects");
    let subjects_dispatcher_body = build_list_subjects_dispatcher(&entries);
    let subjects_dispatcher = render_function(
        dialect,
        &subjects_dispatcher_sig,
        &[],
        &subjects_dispatcher_body.stmts,
        subjects_dispatcher_body.language,
    );

    Ok(ListSqlOutput {
        per_relation_objects,
        per_relation_subjects,
        objects_dispatcher,
        subjects_dispatcher,
    })
}

/// Concatenates both generator outputs into one ordered migration
/// script, matching the `function_name` grammar used throughout.
pub fn assemble_migration(check: &CheckSqlOutput, list: &ListSqlOutput) -> String {
    let mut out = String::new();
    for s in &check.per_relation {
        out.push_str(s);
        out.push('\n');
    }
    out.push_str(&check.internal_dispatcher);
    out.push('\n');
    out.push_str(&check.public_dispatcher);
    out.push('\n');
    out.push_str(&check.no_wildcard_internal_dispatcher);
    out.push('\n');
    out.push_str(&check.no_wildcard_public_dispatcher);
    out.push('\n');
    for s in &list.per_relation_objects {
        out.push_str(s);
        out.push('\n');
    }
    for s in &list.per_relation_subjects {
        out.push_str(s);
        out.push('\n');
    }
    out.push_str(&list.objects_dispatcher);
    out.push('\n');
    out.push_str(&list.subjects_dispatcher);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz_analysis::InlineSqlData;

    fn direct_analysis(object_type: &str, relation: &str) -> RelationAnalysis {
        RelationAnalysis {
            object_type: object_type.into(),
            relation: relation.into(),
            check_allowed: true,
            list_allowed: true,
            has_intersection: false,
            has_exclusion: false,
            has_wildcard: false,
            has_userset_subject: false,
            has_complex_userset_patterns: false,
            needs_plpgsql: false,
            simple_closure_relations: vec![],
            complex_closure_relations: vec![],
            intersection_closure_relations: vec![],
            intersection_groups: vec![],
            parent_relations: vec![],
            closure_parent_relations: vec![],
            userset_patterns: vec![],
            closure_userset_patterns: vec![],
            allowed_subject_types: vec!["user".into()],
            all_satisfying_relations: vec![relation.into()],
            indirect_anchor: None,
            max_userset_depth: 0,
            list_strategy_hint: None,
        }
    }

    #[test]
    fn check_sql_orders_by_type_then_relation_and_builds_dispatcher() {
        let inline = InlineSqlData::default();
        let a = direct_analysis("document", "viewer");
        let b = direct_analysis("album", "editor");
        let inputs = vec![
            RelationInput { analysis: &a, inline: &inline },
            RelationInput { analysis: &b, inline: &inline },
        ];
        let out = generate_check_sql(&inputs).unwrap();
        assert_eq!(out.per_relation.len(), 4);
        assert!(out.per_relation[0].contains("check_album_editor"));
        assert!(out.per_relation[2].contains("check_document_viewer"));
        assert!(out.internal_dispatcher.contains("check_album_editor("));
        assert!(out.internal_dispatcher.contains("check_document_viewer("));
        assert!(out.public_dispatcher.contains("check_permission_internal("));
    }

    #[test]
    fn no_check_allowed_relations_yield_constant_zero_dispatchers() {
        let inline = InlineSqlData::default();
        let mut a = direct_analysis("document", "viewer");
        a.check_allowed = false;
        let inputs = vec![RelationInput { analysis: &a, inline: &inline }];
        let out = generate_check_sql(&inputs).unwrap();
        assert!(out.per_relation.is_empty());
        assert!(out.internal_dispatcher.contains("SELECT 0"));
    }

    #[test]
    fn assemble_migration_concatenates_in_order() {
        let inline = InlineSqlData::default();
        let a = direct_analysis("document", "viewer");
        let inputs = vec![RelationInput { analysis: &a, inline: &inline }];
        let check_out = generate_check_sql(&inputs).unwrap();
        let list_out = generate_list_sql(&inputs).unwrap();
        let script = assemble_migration(&check_out, &list_out);
        let check_pos = script.find("check_document_viewer(").unwrap();
        let dispatcher_pos = script.find("check_permission_internal(").unwrap();
        assert!(check_pos < dispatcher_pos);
    }
}
