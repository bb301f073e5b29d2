//! End-to-end scenario tests: one per literal example, asserting
//! structural properties of the generated SQL text (no database is
//! driven here — assertions are string containment and shape checks).

use authz_analysis::{
    InlineSqlData, IntersectionGroup, IntersectionPart, IntersectionPartKind, ParentRelation,
    RelationAnalysis, UsersetPattern,
};
use authz_codegen::{check, list_objects, list_subjects, render::render_function, Language};
use authz_planner::{build_check_plan, build_list_plan};
use authz_sql_dsl::{PostgresPlpgsql, ToSql};

fn base(object_type: &str, relation: &str) -> RelationAnalysis {
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

fn render_check(analysis: &RelationAnalysis, inline: &InlineSqlData) -> String {
    let plan = build_check_plan(analysis, inline).unwrap();
    let body = check::build_check_body(&plan).unwrap();
    render_function(&PostgresPlpgsql, &authz_codegen::check_signature(&plan.function_name), &[], &body, Language::Plpgsql)
}

// 1. Direct grant: document { viewer: [user] }.
#[test]
fn direct_grant_checks_tuple_and_lists_both_directions() {
    let inline = InlineSqlData::default();
    let analysis = base("document", "viewer");
    let plan = build_check_plan(&analysis, &inline).unwrap();
    let body = check::build_check_body(&plan).unwrap();
    let rendered = body.iter().map(|s| s.to_sql(&PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
    assert!(rendered.contains("object_type = 'document'"));
    assert!(rendered.contains("subject_type = p_subject_type"));

    let list_plan = build_list_plan(&analysis, &inline).unwrap();
    let objects_body = list_objects::build_list_objects_body(&list_plan).unwrap();
    let objects_rendered = objects_body.iter().map(|s| s.to_sql(&PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
    assert!(objects_rendered.contains("RETURN QUERY"));

    let subjects_body = list_subjects::build_list_subjects_body(&list_plan).unwrap();
    let subjects_rendered = subjects_body.iter().map(|s| s.to_sql(&PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
    assert!(subjects_rendered.contains("position('#' in p_subject_type)"));
}

// 2. Userset membership: document { viewer: [group#member] }.
#[test]
fn userset_membership_joins_through_group_member() {
    let inline = InlineSqlData::default();
    let mut analysis = base("document", "viewer");
    analysis.has_userset_subject = true;
    analysis.userset_patterns.push(UsersetPattern {
        subject_type: "group".into(),
        subject_relation: "member".into(),
        satisfying_relations: vec!["viewer".into()],
    });
    let rendered = render_check(&analysis, &inline);
    assert!(rendered.contains("check_document_viewer"));

    let list_plan = build_list_plan(&analysis, &inline).unwrap();
    let subjects_body = list_subjects::build_list_subjects_body(&list_plan).unwrap();
    let subjects_rendered = subjects_body.iter().map(|s| s.to_sql(&PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
    assert!(subjects_rendered.contains("LATERAL") || subjects_rendered.contains("list_group_member_subjects"));
}

// 3. TTU / parent inheritance: folder { viewer: [user], parent: [folder] }.
#[test]
fn ttu_chain_guards_depth_and_self_referential_parent_recurses() {
    let inline = InlineSqlData::default();
    let mut analysis = base("folder", "viewer");
    analysis.parent_relations.push(ParentRelation {
        relation: "viewer".into(),
        linking_relation: "parent".into(),
        allowed_linking_types: vec!["folder".into()],
    });
    let rendered = render_check(&analysis, &inline);
    assert!(rendered.contains("array_length(p_visited, 1) >= 25"));
    assert!(rendered.contains("M2002") || rendered.contains("resolution too complex"));

    let list_plan = build_list_plan(&analysis, &inline).unwrap();
    let objects_body = list_objects::build_list_objects_body(&list_plan).unwrap();
    let objects_rendered = objects_body.iter().map(|s| s.to_sql(&PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
    assert!(objects_rendered.contains("RECURSIVE"));
    assert!(objects_rendered.contains("depth"));
    assert!(objects_rendered.contains(">= 25") || objects_rendered.contains(">=25"));
}

// 4. Intersection with exclusion: doc { editor: writer AND NOT blocked }.
#[test]
fn intersection_with_exclusion_reverifies_blocked_relation() {
    let inline = InlineSqlData::default();
    let mut analysis = base("doc", "editor");
    analysis.has_intersection = true;
    analysis.has_exclusion = true;
    analysis.intersection_groups.push(IntersectionGroup {
        parts: vec![
            IntersectionPart {
                kind: IntersectionPartKind::Computed("writer".into()),
                excluded_relation: Some("blocked".into()),
            },
        ],
    });
    let rendered = render_check(&analysis, &inline);
    assert!(rendered.contains("check_doc_writer") || rendered.contains("writer"));
    assert!(rendered.contains("check_doc_blocked") || rendered.contains("blocked"));
}

// 5. Wildcard: doc { viewer: [user, user:*] }.
#[test]
fn wildcard_relation_has_matching_no_wildcard_variant() {
    let inline = InlineSqlData::default();
    let mut analysis = base("doc", "viewer");
    analysis.has_wildcard = true;
    let plan = build_check_plan(&analysis, &inline).unwrap();
    assert!(plan.allow_wildcard);

    let normal = check::build_check_body(&plan).unwrap();
    let normal_rendered = normal.iter().map(|s| s.to_sql(&PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
    assert!(normal_rendered.contains("subject_id = '*'") || normal_rendered.contains("OR"));

    let no_wildcard = check::build_check_no_wildcard_body(&plan).unwrap();
    let no_wildcard_rendered = no_wildcard.iter().map(|s| s.to_sql(&PostgresPlpgsql)).collect::<Vec<_>>().join("\n");
    assert!(!no_wildcard_rendered.contains("subject_id = '*'"));
}

// 6. Depth exceeded at compile time.
#[test]
fn depth_exceeded_relation_compiles_to_a_bare_raise() {
    let inline = InlineSqlData::default();
    let mut analysis = base("document", "viewer");
    analysis.max_userset_depth = 42;
    let plan = build_check_plan(&analysis, &inline).unwrap();
    let body = check::build_check_body(&plan).unwrap();
    assert_eq!(body.len(), 1);
    let rendered = body[0].to_sql(&PostgresPlpgsql);
    assert!(rendered.contains("M2002"));
    assert!(rendered.contains("resolution too complex"));
}
