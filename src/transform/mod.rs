//! Transformers deriving rule populations from a model
//!
//! Architecture: Strategy Pattern - each Transformer projects one granularity of the model
//! - Every invocation scans the model once and yields borrowed, read-only views
//! - Output order is deterministic: classes by name, members in declaration order,
//!   accesses in loader order
//! - Transformers are dispatched by name through a lookup table, never by subtype

use crate::domain::element::{Element, ElementKind};
use crate::domain::model::{AccessKind, MemberKind, Model};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Broad shape of the elements a transformer yields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationKind {
    Classes,
    Members,
    Accesses,
}

/// A named projection from a model to a population of elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transformer {
    Classes,
    /// Fields, methods and constructors of every class
    Members,
    Fields,
    /// Methods and constructors
    Methods,
    /// Read and write accesses to fields
    FieldAccesses,
    MethodCalls,
    Accesses,
}

/// Name lookup table, including the camel-case spellings rules are often written with
const TRANSFORMER_NAMES: &[(&str, Transformer)] = &[
    ("classes", Transformer::Classes),
    ("members", Transformer::Members),
    ("fields", Transformer::Fields),
    ("methods", Transformer::Methods),
    ("field_accesses", Transformer::FieldAccesses),
    ("fieldAccesses", Transformer::FieldAccesses),
    ("method_calls", Transformer::MethodCalls),
    ("methodCalls", Transformer::MethodCalls),
    ("accesses", Transformer::Accesses),
];

impl Transformer {
    pub const ALL: [Transformer; 7] = [
        Self::Classes,
        Self::Members,
        Self::Fields,
        Self::Methods,
        Self::FieldAccesses,
        Self::MethodCalls,
        Self::Accesses,
    ];

    /// Look up a transformer by its registered name
    pub fn from_name(name: &str) -> Option<Self> {
        TRANSFORMER_NAMES
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, transformer)| *transformer)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Classes => "classes",
            Self::Members => "members",
            Self::Fields => "fields",
            Self::Methods => "methods",
            Self::FieldAccesses => "field_accesses",
            Self::MethodCalls => "method_calls",
            Self::Accesses => "accesses",
        }
    }

    /// Plural noun used in rule text
    pub fn description(self) -> &'static str {
        match self {
            Self::FieldAccesses => "field accesses",
            Self::MethodCalls => "method calls",
            other => other.name(),
        }
    }

    pub fn population_kind(self) -> PopulationKind {
        match self {
            Self::Classes => PopulationKind::Classes,
            Self::Members | Self::Fields | Self::Methods => PopulationKind::Members,
            Self::FieldAccesses | Self::MethodCalls | Self::Accesses => PopulationKind::Accesses,
        }
    }

    /// Element kinds this transformer can yield
    pub fn element_kinds(self) -> &'static [ElementKind] {
        match self {
            Self::Classes => &[ElementKind::Class],
            Self::Members => &[ElementKind::Field, ElementKind::Method, ElementKind::Constructor],
            Self::Fields => &[ElementKind::Field],
            Self::Methods => &[ElementKind::Method, ElementKind::Constructor],
            Self::FieldAccesses | Self::MethodCalls | Self::Accesses => &[ElementKind::Access],
        }
    }

    /// Project the population out of the model
    pub fn apply<'m>(self, model: &'m Model) -> Vec<Element<'m>> {
        match self {
            Self::Classes => model.classes().map(Element::Class).collect(),
            Self::Members => members_where(model, |_| true),
            Self::Fields => members_where(model, |kind| kind == MemberKind::Field),
            Self::Methods => members_where(model, MemberKind::is_code_unit),
            Self::FieldAccesses => accesses_where(model, AccessKind::is_field_access),
            Self::MethodCalls => accesses_where(model, |kind| kind == AccessKind::Call),
            Self::Accesses => accesses_where(model, |_| true),
        }
    }
}

/// Members of every class, deduplicated by (owner, name, parameter list)
fn members_where<'m, F>(model: &'m Model, keep: F) -> Vec<Element<'m>>
where
    F: Fn(MemberKind) -> bool,
{
    let mut seen: HashSet<(&'m str, &'m str, bool, &'m [String])> = HashSet::new();
    let mut population = Vec::new();

    for owner in model.classes() {
        for member in owner.members() {
            if !keep(member.kind) {
                continue;
            }
            let identity = (
                member.owner.as_str(),
                member.name.as_str(),
                member.kind.is_code_unit(),
                member.parameters.as_slice(),
            );
            if seen.insert(identity) {
                population.push(Element::Member { owner, member });
            }
        }
    }

    population
}

fn accesses_where<'m, F>(model: &'m Model, keep: F) -> Vec<Element<'m>>
where
    F: Fn(AccessKind) -> bool,
{
    model
        .accesses()
        .iter()
        .filter(|edge| keep(edge.kind))
        .filter_map(|edge| Element::access(model, edge))
        .collect()
}

impl fmt::Display for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{AccessEdge, ClassElement, MemberElement, MemberRef};

    const A: &str = "org.example.A";
    const B: &str = "org.example.B";

    fn model() -> Model {
        let run = MemberRef::method(B, "run", Vec::<String>::new());
        Model::builder()
            .class(ClassElement::new(B))
            .class(ClassElement::new(A))
            .member(MemberElement::field(A, "id", "long"))
            .member(MemberElement::method(A, "getId", "long", Vec::<String>::new()))
            .member(MemberElement::constructor(A, Vec::<String>::new()))
            .member(MemberElement::field(B, "a", A))
            .member(MemberElement::method(B, "run", "void", Vec::<String>::new()))
            .access(AccessEdge::new(run.clone(), MemberRef::field(A, "id"), AccessKind::Read))
            .access(AccessEdge::new(run.clone(), MemberRef::field(A, "id"), AccessKind::Read))
            .access(AccessEdge::new(run.clone(), MemberRef::field(B, "a"), AccessKind::Write))
            .access(AccessEdge::new(
                run,
                MemberRef::method(A, "getId", Vec::<String>::new()),
                AccessKind::Call,
            ))
            .build()
            .unwrap()
    }

    fn names(population: &[Element<'_>]) -> Vec<String> {
        population.iter().map(|e| e.full_name().into_owned()).collect()
    }

    #[test]
    fn test_classes_in_name_order() {
        let model = model();
        assert_eq!(names(&Transformer::Classes.apply(&model)), vec![A, B]);
    }

    #[test]
    fn test_members_counts_each_member_once() {
        let model = model();
        let members = Transformer::Members.apply(&model);

        // id is read twice, still one member
        assert_eq!(members.len(), model.stats().members());
        assert_eq!(
            names(&members),
            vec![
                "org.example.A.id",
                "org.example.A.getId()",
                "org.example.A.<init>()",
                "org.example.B.a",
                "org.example.B.run()",
            ]
        );
    }

    #[test]
    fn test_member_subsets() {
        let model = model();
        assert_eq!(Transformer::Fields.apply(&model).len(), 2);
        assert_eq!(Transformer::Methods.apply(&model).len(), 3);
    }

    #[test]
    fn test_access_subsets_keep_loader_order() {
        let model = model();
        let field_accesses = Transformer::FieldAccesses.apply(&model);

        assert_eq!(field_accesses.len(), 3);
        assert_eq!(
            names(&field_accesses),
            vec!["org.example.A.id", "org.example.A.id", "org.example.B.a"]
        );
        assert_eq!(Transformer::MethodCalls.apply(&model).len(), 1);
        assert_eq!(Transformer::Accesses.apply(&model).len(), 4);
    }

    #[test]
    fn test_empty_model_yields_empty_population() {
        let model = Model::empty();
        for transformer in Transformer::ALL {
            assert!(transformer.apply(&model).is_empty());
        }
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(Transformer::from_name("members"), Some(Transformer::Members));
        assert_eq!(Transformer::from_name("fieldAccesses"), Some(Transformer::FieldAccesses));
        assert_eq!(Transformer::from_name("packages"), None);
        for transformer in Transformer::ALL {
            assert_eq!(Transformer::from_name(transformer.name()), Some(transformer));
        }
        assert_eq!(Transformer::MethodCalls.to_string(), "method calls");
    }
}
