//! `RelationAnalysis` and its supporting structures.
//!
//! This is the external collaborator's output. It's plain, serde-friendly data — no
//! behavior lives here beyond the pure `validate()` pass.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::strategy::Strategy;

pub type TypeName = CompactString;
pub type RelationName = CompactString;

/// One step of an [`IndirectAnchor`] path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorStep {
    /// Follow a tuple-to-userset parent relation.
    TupleToUserset { linking_relation: RelationName },
    /// Follow a userset pattern (`subject_type#subject_relation`).
    Userset {
        subject_type: TypeName,
        subject_relation: RelationName,
    },
}

/// A path of TTU/userset steps that lands on a relation with direct
/// grants, used to compose a relation that has no grants of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndirectAnchor {
    pub steps: Vec<AnchorStep>,
    pub anchor_relation: RelationName,
}

/// A tuple-to-userset (TTU) parent relation: "I have R on this object if
/// I have R on its parent, reached via `linking_relation`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRelation {
    pub relation: RelationName,
    pub linking_relation: RelationName,
    pub allowed_linking_types: Vec<TypeName>,
}

impl ParentRelation {
    /// A TTU is self-referential when the object type can link to
    /// itself through `linking_relation` (e.g. `folder.parent: folder`).
    pub fn is_self_referential(&self, object_type: &str) -> bool {
        self.allowed_linking_types.iter().any(|t| t == object_type)
    }
}

/// A userset shape `subject_type#subject_relation`, with the relations
/// that are satisfied by membership in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersetPattern {
    pub subject_type: TypeName,
    pub subject_relation: RelationName,
    pub satisfying_relations: Vec<RelationName>,
}

impl UsersetPattern {
    pub fn is_self_referential(&self, object_type: &str, relation: &str) -> bool {
        self.subject_type == object_type && self.subject_relation == relation
    }
}

/// One operand of an [`IntersectionGroup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntersectionPartKind {
    /// The relation itself carries a direct tuple grant.
    IsThis,
    /// Satisfied via a TTU parent relation.
    ParentRelation(ParentRelation),
    /// Satisfied via a named relation that must be checked/listed.
    Computed(RelationName),
}

/// One operand of a conjunction; `excluded_relation`, when present,
/// requires that relation's check to be `= 0` for this part to hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectionPart {
    pub kind: IntersectionPartKind,
    pub excluded_relation: Option<RelationName>,
}

/// A conjunction of access paths; the relation's intersection semantics
/// are a disjunction of these groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectionGroup {
    pub parts: Vec<IntersectionPart>,
}

/// The full per-(object_type, relation) analysis the rest of the
/// pipeline consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationAnalysis {
    pub object_type: TypeName,
    pub relation: RelationName,

    // ---- capability flags ----
    pub check_allowed: bool,
    pub list_allowed: bool,

    // ---- feature flags ----
    pub has_intersection: bool,
    pub has_exclusion: bool,
    pub has_wildcard: bool,
    pub has_userset_subject: bool,
    pub has_complex_userset_patterns: bool,
    pub needs_plpgsql: bool,

    // ---- closure relations ----
    /// Resolvable by a plain tuple lookup (no nested check call needed).
    pub simple_closure_relations: Vec<RelationName>,
    /// Need a `check_<type>_<rel>` call to validate.
    pub complex_closure_relations: Vec<RelationName>,
    /// Implied relations that themselves carry intersection and must be
    /// composed rather than tuple-looked-up.
    pub intersection_closure_relations: Vec<RelationName>,

    pub intersection_groups: Vec<IntersectionGroup>,

    pub parent_relations: Vec<ParentRelation>,
    pub closure_parent_relations: Vec<ParentRelation>,

    pub userset_patterns: Vec<UsersetPattern>,
    pub closure_userset_patterns: Vec<UsersetPattern>,

    pub allowed_subject_types: Vec<TypeName>,
    pub all_satisfying_relations: Vec<RelationName>,

    pub indirect_anchor: Option<IndirectAnchor>,

    pub max_userset_depth: u32,

    /// Advisory only; see [`Strategy`]'s doc comment.
    pub list_strategy_hint: Option<Strategy>,
}

impl RelationAnalysis {
    pub fn has_standalone_access(&self) -> bool {
        !self.simple_closure_relations.is_empty()
            || !self.complex_closure_relations.is_empty()
            || !self.parent_relations.is_empty()
            || !self.userset_patterns.is_empty()
            || self.has_intersection
            || self.check_allowed_by_direct_tuple()
    }

    /// Whether this relation itself can be satisfied by a direct tuple
    /// grant (i.e. it appears among its own satisfying relations, or has
    /// no closure at all and must rely on direct tuples as the base
    /// case). Direct-tuple eligibility is implicit for every relation
    /// unless it is purely composed.
    pub fn check_allowed_by_direct_tuple(&self) -> bool {
        self.indirect_anchor.is_none()
    }

    pub fn any_self_referential_userset(&self) -> bool {
        self.userset_patterns
            .iter()
            .chain(self.closure_userset_patterns.iter())
            .any(|p| p.is_self_referential(&self.object_type, &self.relation))
    }

    pub fn any_parent_relation(&self) -> bool {
        !self.parent_relations.is_empty() || !self.closure_parent_relations.is_empty()
    }

    pub fn any_userset_pattern(&self) -> bool {
        !self.userset_patterns.is_empty() || !self.closure_userset_patterns.is_empty()
    }
}
