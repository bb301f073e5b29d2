use authz_analysis::{InlineSqlData, RelationAnalysis};
use authz_codegen_gen::{generate_check_sql, generate_list_sql, RelationInput};
use criterion::{criterion_group, criterion_main, Criterion};

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

fn synthetic_schema(n: usize) -> Vec<RelationAnalysis> {
    (0..n)
        .map(|i| direct_analysis(&format!("type_{i}"), "viewer"))
        .collect()
}

fn bench_generate(c: &mut Criterion) {
    let inline = InlineSqlData::default();
    let analyses = synthetic_schema(200);
    let inputs: Vec<RelationInput> = analyses
        .iter()
        .map(|a| RelationInput { analysis: a, inline: &inline })
        .collect();

    c.bench_function("generate_check_sql/200_relations", |b| {
        b.iter(|| generate_check_sql(&inputs).unwrap());
    });
    c.bench_function("generate_list_sql/200_relations", |b| {
        b.iter(|| generate_list_sql(&inputs).unwrap());
    });
}

criterion_group!(benches, bench_generate);
criterion_main!(benches);
