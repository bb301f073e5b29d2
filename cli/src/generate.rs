//! The `generate` command: bundle + config in, migration SQL files out.

use authz_codegen_gen::{assemble_migration, generate_check_sql, generate_list_sql, RelationInput};
use tracing::info;

use crate::bundle::AnalysisBundle;
use crate::config::AuthzCodegenConfig;
use crate::error::CliError;

pub fn run(config: &AuthzCodegenConfig) -> Result<(), CliError> {
    let bundle = AnalysisBundle::load(&config.bundle)?;
    let inputs: Vec<RelationInput> = bundle
        .analyses
        .iter()
        .map(|analysis| RelationInput {
            analysis,
            inline: &bundle.inline,
        })
        .collect();

    let check = generate_check_sql(&inputs)?;
    let list = generate_list_sql(&inputs)?;
    let script = if config.emit_no_wildcard {
        assemble_migration(&check, &list)
    } else {
        assemble_migration_without_no_wildcard(&check, &list)
    };

    std::fs::create_dir_all(&config.out_dir)?;
    let out_path = config.out_dir.join("authz.sql");
    std::fs::write(&out_path, script)?;
    info!(path = %out_path.display(), relations = inputs.len(), "wrote migration");
    Ok(())
}

/// Same assembly as [`assemble_migration`], minus the `_no_wildcard`
/// bodies and dispatcher, for configs that opt out of the variant.
fn assemble_migration_without_no_wildcard(
    check: &authz_codegen_gen::CheckSqlOutput,
    list: &authz_codegen_gen::ListSqlOutput,
) -> String {
    let mut out = String::new();
    for s in check.per_relation.iter().step_by(2) {
        out.push_str(s);
        out.push('\n');
    }
    out.push_str(&check.internal_dispatcher);
    out.push('\n');
    out.push_str(&check.public_dispatcher);
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
