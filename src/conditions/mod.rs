//! Conditions checked against every element of a rule's population
//!
//! CDD Principle: Domain Services - Conditions turn elements into explained verdicts
//! - A condition reports whether its property holds, never whether that is a violation
//! - Polarity (should / should not) is applied by the rule, not the condition
//! - Messages are deterministic: annotation sets are sorted and deduplicated

use crate::domain::element::Element;
use crate::domain::model::Model;
use crate::predicates::{PackageIdentifier, PatternError, Predicate};
use crate::transform::PopulationKind;
use std::collections::BTreeSet;
use std::fmt;

/// Verdict of one condition check with its explanation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionEvent {
    /// Whether the condition's property holds for the element
    pub holds: bool,
    pub message: String,
}

impl ConditionEvent {
    pub fn new(holds: bool, message: impl Into<String>) -> Self {
        Self { holds, message: message.into() }
    }
}

/// A check producing explained verdicts per element
#[derive(Debug, Clone)]
pub enum Condition {
    /// The element satisfies a predicate
    Satisfy(Predicate),
    /// The element carries annotations whose type resides in a package
    BeAnnotatedWithTypeIn(PackageIdentifier),
    /// The element reads or writes a field through an access matching the predicate
    AccessFieldWhere(Predicate),
    /// The element accesses a class matching the predicate
    AccessClassesThat(Predicate),
}

impl Condition {
    pub fn satisfy(predicate: Predicate) -> Self {
        Self::Satisfy(predicate)
    }

    /// Shorthand for satisfying `annotated_with(inner)`
    pub fn be_annotated_with(inner: Predicate) -> Self {
        Self::Satisfy(Predicate::annotated_with(inner))
    }

    pub fn be_annotated_with_type_in(identifier: &str) -> Result<Self, PatternError> {
        Ok(Self::BeAnnotatedWithTypeIn(PackageIdentifier::parse(identifier)?))
    }

    pub fn access_field_where(predicate: Predicate) -> Self {
        Self::AccessFieldWhere(predicate)
    }

    pub fn access_classes_that(predicate: Predicate) -> Self {
        Self::AccessClassesThat(predicate)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Satisfy(_) => "satisfy",
            Self::BeAnnotatedWithTypeIn(_) => "be_annotated_with_type_in",
            Self::AccessFieldWhere(_) => "access_field_where",
            Self::AccessClassesThat(_) => "access_classes_that",
        }
    }

    /// Phrase following "should" in rule text
    pub fn description(&self) -> String {
        match self {
            Self::Satisfy(predicate) => predicate.should_phrase(),
            Self::BeAnnotatedWithTypeIn(identifier) => {
                format!("be annotated with type in {identifier}")
            }
            Self::AccessFieldWhere(predicate) => {
                format!("access field where {}", predicate.description())
            }
            Self::AccessClassesThat(predicate) => {
                format!("access classes that {}", predicate.description())
            }
        }
    }

    /// Whether the condition can be checked against the given population
    pub fn supports(&self, population: PopulationKind) -> bool {
        match self {
            Self::Satisfy(_) => true,
            Self::BeAnnotatedWithTypeIn(_)
            | Self::AccessFieldWhere(_)
            | Self::AccessClassesThat(_) => {
                matches!(population, PopulationKind::Classes | PopulationKind::Members)
            }
        }
    }

    /// Check one element, producing at least one event
    pub fn check<'m>(&self, model: &'m Model, element: &Element<'m>) -> Vec<ConditionEvent> {
        match self {
            Self::Satisfy(predicate) => vec![check_predicate(predicate, element)],
            Self::BeAnnotatedWithTypeIn(identifier) => vec![check_annotations(identifier, element)],
            Self::AccessFieldWhere(predicate) => check_accesses(
                model,
                element,
                |access| {
                    matches!(access, Element::Access { edge, .. } if edge.kind.is_field_access())
                        && predicate.test(access)
                },
                || format!("access field where {}", predicate.description()),
            ),
            Self::AccessClassesThat(predicate) => check_accesses(
                model,
                element,
                |access| access.target_owner().is_some_and(|owner| predicate.test(&owner)),
                || format!("access classes that {}", predicate.description()),
            ),
        }
    }
}

fn check_predicate(predicate: &Predicate, element: &Element<'_>) -> ConditionEvent {
    let holds = predicate.test(element);
    let verb = if holds { "matches" } else { "does not match" };
    ConditionEvent::new(
        holds,
        format!(
            "{} {} {} in {}",
            element.describe(),
            verb,
            predicate.description(),
            element.location()
        ),
    )
}

/// Scan the element's annotations for types residing in the target package
fn check_annotations(identifier: &PackageIdentifier, element: &Element<'_>) -> ConditionEvent {
    let offending: BTreeSet<&str> = element
        .annotations()
        .iter()
        .filter(|annotation| identifier.matches(annotation.type_package()))
        .map(|annotation| annotation.type_name.as_str())
        .collect();

    if offending.is_empty() {
        return ConditionEvent::new(
            false,
            format!(
                "{} {} is not annotated with type in {} in {}",
                element.kind_label(),
                element.full_name(),
                identifier,
                element.location()
            ),
        );
    }

    let listed: Vec<String> = offending.iter().map(|name| format!("@{name}")).collect();
    ConditionEvent::new(
        true,
        format!(
            "{} {} is annotated with [{}] in {}",
            element.kind_label(),
            element.full_name(),
            listed.join(", "),
            element.location()
        ),
    )
}

/// One holding event per matching access originating in the element
fn check_accesses<'m, P, D>(
    model: &'m Model,
    element: &Element<'m>,
    selects: P,
    describe_condition: D,
) -> Vec<ConditionEvent>
where
    P: Fn(&Element<'m>) -> bool,
    D: FnOnce() -> String,
{
    let events: Vec<ConditionEvent> = outgoing_accesses(model, element)
        .into_iter()
        .filter(|access| selects(access))
        .map(|access| {
            ConditionEvent::new(true, format!("{} in {}", access.describe(), access.location()))
        })
        .collect();

    if events.is_empty() {
        return vec![ConditionEvent::new(
            false,
            format!(
                "{} does not {} in {}",
                element.describe(),
                describe_condition(),
                element.location()
            ),
        )];
    }

    events
}

/// Accesses whose origin is the element (member) or lies inside it (class)
fn outgoing_accesses<'m>(model: &'m Model, element: &Element<'m>) -> Vec<Element<'m>> {
    match *element {
        Element::Class(class) => model
            .accesses_from(&class.name)
            .filter_map(|edge| Element::access(model, edge))
            .collect(),
        Element::Member { owner, member } => model
            .accesses_from(&owner.name)
            .filter_map(|edge| Element::access(model, edge))
            .filter(|access| {
                matches!(access, Element::Access { origin, .. } if std::ptr::eq(*origin, member))
            })
            .collect(),
        _ => Vec::new(),
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::element::ElementKind;
    use crate::domain::model::{
        AccessEdge, AccessKind, ClassElement, MemberElement, MemberRef, Model,
    };

    const FOO: &str = "org.example.servlet.Foo";
    const DAO: &str = "org.example.servlet.Dao";

    fn foo_model() -> Model {
        Model::builder()
            .class(ClassElement::new(FOO))
            .member(MemberElement::field(FOO, "id", "long"))
            .annotate_member(&MemberRef::field(FOO, "id"), "org.example.persist.Id")
            .build()
            .unwrap()
    }

    fn access_model() -> Model {
        let save = MemberRef::method(DAO, "save", Vec::<String>::new());
        Model::builder()
            .class(ClassElement::new(FOO).with_source_file("Foo.java"))
            .class(ClassElement::new(DAO).with_source_file("Dao.java"))
            .member(MemberElement::field(FOO, "id", "long"))
            .member(MemberElement::field(FOO, "name", "java.lang.String"))
            .member(MemberElement::method(DAO, "save", "void", Vec::<String>::new()))
            .member(MemberElement::method(DAO, "noop", "void", Vec::<String>::new()))
            .annotate_member(&MemberRef::field(FOO, "id"), "javax.persistence.Id")
            .access(AccessEdge::new(save.clone(), MemberRef::field(FOO, "name"), AccessKind::Read).with_line(20))
            .access(AccessEdge::new(save.clone(), MemberRef::field(FOO, "id"), AccessKind::Write).with_line(21))
            .access(
                AccessEdge::new(
                    save,
                    MemberRef::method("javax.persistence.EntityManager", "flush", Vec::<String>::new()),
                    AccessKind::Call,
                )
                .with_line(22),
            )
            .build()
            .unwrap()
    }

    fn member<'m>(model: &'m Model, class: &str, name: &str) -> Element<'m> {
        let owner = model.class(class).unwrap();
        Element::Member { owner, member: owner.member(name, None).unwrap() }
    }

    #[test]
    fn test_annotation_scan_reports_offending_annotation_and_location() {
        let model = foo_model();
        let condition = Condition::be_annotated_with_type_in("org.example.persist..").unwrap();

        let events = condition.check(&model, &member(&model, FOO, "id"));
        assert_eq!(
            events,
            vec![ConditionEvent::new(
                true,
                "field org.example.servlet.Foo.id is annotated with [@org.example.persist.Id] in (Foo:0)"
            )]
        );
    }

    #[test]
    fn test_annotation_scan_reports_only_target_package_sorted() {
        let model = Model::builder()
            .class(ClassElement::new(FOO))
            .member(MemberElement::field(FOO, "id", "long").with_line(9))
            .annotate_member(&MemberRef::field(FOO, "id"), "z.w.Other")
            .annotate_member(&MemberRef::field(FOO, "id"), "x.y.Zeta")
            .annotate_member(&MemberRef::field(FOO, "id"), "x.y.Alpha")
            .build()
            .unwrap();

        let condition = Condition::be_annotated_with_type_in("x.y").unwrap();
        let events = condition.check(&model, &member(&model, FOO, "id"));

        assert_eq!(events.len(), 1);
        assert!(events[0].holds);
        assert_eq!(
            events[0].message,
            "field org.example.servlet.Foo.id is annotated with [@x.y.Alpha, @x.y.Zeta] in (Foo:9)"
        );
    }

    #[test]
    fn test_annotation_scan_on_unannotated_element() {
        let model = Model::builder()
            .class(ClassElement::new(FOO))
            .annotate_class(FOO, "z.w.Component")
            .build()
            .unwrap();

        let condition = Condition::be_annotated_with_type_in("x.y..").unwrap();
        let events = condition.check(&model, &Element::Class(model.class(FOO).unwrap()));

        assert!(!events[0].holds);
        assert_eq!(
            events[0].message,
            "class org.example.servlet.Foo is not annotated with type in x.y.. in (Foo:0)"
        );
    }

    #[test]
    fn test_satisfy_message() {
        let model = foo_model();
        let condition =
            Condition::be_annotated_with(Predicate::name_matches(r"org\.example\.persist\.Id").unwrap());

        let events = condition.check(&model, &member(&model, FOO, "id"));
        assert!(events[0].holds);
        assert_eq!(
            events[0].message,
            r"field org.example.servlet.Foo.id matches annotated with name matching 'org\.example\.persist\.Id' in (Foo:0)"
        );

        let events = condition.check(&model, &Element::Class(model.class(FOO).unwrap()));
        assert!(!events[0].holds);
        assert_eq!(
            events[0].message,
            r"class org.example.servlet.Foo does not match annotated with name matching 'org\.example\.persist\.Id' in (Foo:0)"
        );
        assert_eq!(
            condition.description(),
            r"be annotated with name matching 'org\.example\.persist\.Id'"
        );
    }

    #[test]
    fn test_access_field_where_target_is_id() {
        let model = access_model();
        let target_is_id = Predicate::target(Predicate::annotated_with(
            Predicate::name_matches(r"javax\.persistence\.Id").unwrap(),
        ));
        let condition = Condition::access_field_where(target_is_id);

        let events = condition.check(&model, &member(&model, DAO, "save"));
        assert_eq!(
            events,
            vec![ConditionEvent::new(
                true,
                "method org.example.servlet.Dao.save() writes field org.example.servlet.Foo.id in (Dao.java:21)"
            )]
        );

        let idle = condition.check(&model, &member(&model, DAO, "noop"));
        assert_eq!(idle.len(), 1);
        assert!(!idle[0].holds);
        assert!(idle[0].message.starts_with("method org.example.servlet.Dao.noop() does not access field where"));
    }

    #[test]
    fn test_access_classes_that_reside_in_external_package() {
        let model = access_model();
        let condition = Condition::access_classes_that(
            Predicate::resides_in_package("javax.persistence..").unwrap(),
        );

        let dao = Element::Class(model.class(DAO).unwrap());
        let events = condition.check(&model, &dao);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].message,
            "method org.example.servlet.Dao.save() calls method javax.persistence.EntityManager.flush() in (Dao.java:22)"
        );

        let foo = Element::Class(model.class(FOO).unwrap());
        assert!(!condition.check(&model, &foo)[0].holds);
    }

    #[test]
    fn test_population_compatibility() {
        let scan = Condition::be_annotated_with_type_in("a..").unwrap();
        assert!(scan.supports(PopulationKind::Members));
        assert!(!scan.supports(PopulationKind::Accesses));
        assert!(Condition::satisfy(Predicate::has_kind(ElementKind::Access))
            .supports(PopulationKind::Accesses));
    }
}
