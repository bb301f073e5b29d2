//! Turns a planned [`authz_planner::CheckPlan`]/[`authz_planner::ListPlan`]
//! into rendered PL/pgSQL procedure source. Each submodule builds one
//! procedure's statement body; [`render`] wraps a body with its
//! `CREATE OR REPLACE FUNCTION` signature and the shared pagination shell.

pub mod check;
pub mod dispatch;
pub mod error;
pub mod list_objects;
pub mod list_subjects;
pub mod render;
pub mod schema;

pub use dispatch::{
    build_check_internal_dispatcher, build_check_no_wildcard_internal_dispatcher, build_check_public_wrapper,
    build_list_objects_dispatcher, build_list_subjects_dispatcher, DispatchEntry, DispatcherBody,
};
pub use error::CodegenError;
pub use render::{
    check_permission_internal_signature, check_permission_signature, check_signature,
    list_accessible_objects_signature, list_accessible_subjects_signature, list_objects_signature,
    list_subjects_signature, paginate, render_function, Language, Param, ProcSignature, ReturnType,
};
