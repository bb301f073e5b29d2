//! Strategy selection and plan construction.

pub mod error;
pub mod plan;
pub mod strategy_selector;

pub use error::PlanError;
pub use plan::{build_check_plan, build_list_plan, CheckPlan, ExclusionPredicate, ExclusionPredicateSet, ListPlan, PlanCore};
pub use strategy_selector::{select_strategy, MAX_USERSET_DEPTH};
