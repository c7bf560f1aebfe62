//! Composable predicates over model elements
//!
//! CDD Principle: Composite Pattern - Predicates are pure, named boolean functions
//! - Every predicate carries a human-readable description used verbatim in messages
//! - Patterns are compiled once at construction; matching never allocates a regex
//! - Combinators preserve descriptions by parenthesized concatenation

pub mod package;

pub use package::{PackageIdentifier, PatternError};

use crate::domain::element::{Element, ElementKind};
use crate::domain::results::ArchError;
use regex::Regex;
use std::fmt;

/// A boolean function over an [`Element`] plus its description
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Anchored full-name match
    NameMatches { pattern: String, regex: Regex },
    ResidesInPackage(PackageIdentifier),
    /// Holds when any annotation satisfies the nested predicate
    AnnotatedWith(Box<Predicate>),
    /// Member's owning class, or access's origin class
    Owner(Box<Predicate>),
    /// Accessed member of an access
    Target(Box<Predicate>),
    /// Class of the accessed member
    TargetOwner(Box<Predicate>),
    HasKind(ElementKind),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    /// Replaces the generated description with an explicit label
    Described { label: String, inner: Box<Predicate> },
}

impl Predicate {
    /// Full-name match against an anchored regular expression
    pub fn name_matches(pattern: &str) -> Result<Self, PatternError> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| PatternError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::NameMatches { pattern: pattern.to_string(), regex })
    }

    /// Package membership, e.g. `org.example..` for the package and its subpackages
    pub fn resides_in_package(identifier: &str) -> Result<Self, PatternError> {
        Ok(Self::ResidesInPackage(PackageIdentifier::parse(identifier)?))
    }

    pub fn annotated_with(inner: Predicate) -> Self {
        Self::AnnotatedWith(Box::new(inner))
    }

    pub fn owner(inner: Predicate) -> Self {
        Self::Owner(Box::new(inner))
    }

    pub fn target(inner: Predicate) -> Self {
        Self::Target(Box::new(inner))
    }

    pub fn target_owner(inner: Predicate) -> Self {
        Self::TargetOwner(Box::new(inner))
    }

    pub fn has_kind(kind: ElementKind) -> Self {
        Self::HasKind(kind)
    }

    pub fn and(self, other: Predicate) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn described(self, label: impl Into<String>) -> Self {
        Self::Described { label: label.into(), inner: Box::new(self) }
    }

    /// Evaluate the predicate against one element
    pub fn test(&self, element: &Element<'_>) -> bool {
        match self {
            Self::NameMatches { regex, .. } => regex.is_match(&element.full_name()),
            Self::ResidesInPackage(identifier) => identifier.matches(element.package()),
            Self::AnnotatedWith(inner) => element
                .annotations()
                .iter()
                .any(|annotation| inner.test(&Element::Annotation(annotation))),
            Self::Owner(inner) => element.owner().is_some_and(|owner| inner.test(&owner)),
            Self::Target(inner) => element.target().is_some_and(|target| inner.test(&target)),
            Self::TargetOwner(inner) => {
                element.target_owner().is_some_and(|owner| inner.test(&owner))
            }
            Self::HasKind(kind) => element.kind() == *kind,
            Self::And(left, right) => left.test(element) && right.test(element),
            Self::Or(left, right) => left.test(element) || right.test(element),
            Self::Not(inner) => !inner.test(element),
            Self::Described { inner, .. } => inner.test(element),
        }
    }

    /// Human-readable description
    pub fn description(&self) -> String {
        match self {
            Self::NameMatches { pattern, .. } => format!("name matching '{pattern}'"),
            Self::ResidesInPackage(identifier) => format!("resides in package {identifier}"),
            Self::AnnotatedWith(inner) => format!("annotated with {}", inner.description()),
            Self::Owner(inner) => format!("owner {}", inner.description()),
            Self::Target(inner) => format!("target {}", inner.description()),
            Self::TargetOwner(inner) => format!("target owner {}", inner.description()),
            Self::HasKind(kind) => format!("is {}", with_article(kind.as_str())),
            Self::And(left, right) => {
                format!("({}) and ({})", left.description(), right.description())
            }
            Self::Or(left, right) => format!("({}) or ({})", left.description(), right.description()),
            Self::Not(inner) => format!("not ({})", inner.description()),
            Self::Described { label, .. } => label.clone(),
        }
    }

    /// Phrase used after "should" in rule text, e.g. "be annotated with ..."
    pub fn should_phrase(&self) -> String {
        match self {
            Self::AnnotatedWith(inner) => format!("be annotated with {}", inner.description()),
            Self::ResidesInPackage(identifier) => format!("reside in package {identifier}"),
            Self::NameMatches { pattern, .. } => format!("have name matching '{pattern}'"),
            Self::HasKind(kind) => format!("be {}", with_article(kind.as_str())),
            Self::Described { label, .. } => label.clone(),
            _ => format!("satisfy {}", self.description()),
        }
    }
}

fn with_article(noun: &str) -> String {
    match noun.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => format!("an {noun}"),
        _ => format!("a {noun}"),
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

impl std::ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Self::Output {
        self.negate()
    }
}

impl From<PatternError> for ArchError {
    fn from(error: PatternError) -> Self {
        let context = match &error {
            PatternError::InvalidRegex { pattern, .. } => format!("regex '{pattern}'"),
            PatternError::InvalidPackage { identifier, .. } => {
                format!("package identifier '{identifier}'")
            }
        };
        let message = match error {
            PatternError::InvalidRegex { reason, .. } | PatternError::InvalidPackage { reason, .. } => {
                reason
            }
        };
        ArchError::RuleConfiguration { context, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        AccessEdge, AccessKind, ClassElement, MemberElement, MemberRef, Model,
    };

    const FOO: &str = "org.example.servlet.Foo";
    const REPO: &str = "org.example.persist.Repository";

    fn model() -> Model {
        Model::builder()
            .class(ClassElement::new(FOO).with_source_file("Foo.java"))
            .class(ClassElement::new(REPO))
            .member(MemberElement::field(FOO, "id", "long"))
            .member(MemberElement::field(FOO, "name", "java.lang.String"))
            .member(MemberElement::method(REPO, "load", "void", Vec::<String>::new()))
            .annotate_member(&MemberRef::field(FOO, "id"), "org.example.persist.Id")
            .annotate_member(&MemberRef::field(FOO, "name"), "z.w.Column")
            .annotate_class(REPO, "org.example.persist.Repo")
            .access(AccessEdge::new(
                MemberRef::method(REPO, "load", Vec::<String>::new()),
                MemberRef::field(FOO, "id"),
                AccessKind::Read,
            ))
            .build()
            .unwrap()
    }

    fn member<'m>(model: &'m Model, class: &str, name: &str) -> Element<'m> {
        let owner = model.class(class).unwrap();
        Element::Member { owner, member: owner.member(name, None).unwrap() }
    }

    #[test]
    fn test_name_matches_is_anchored() {
        let model = model();
        let id = member(&model, FOO, "id");

        assert!(Predicate::name_matches(r".*\.Foo\.id").unwrap().test(&id));
        assert!(!Predicate::name_matches(r"Foo\.id").unwrap().test(&id));
        assert!(!Predicate::name_matches(r".*\.Foo").unwrap().test(&id));
    }

    #[test]
    fn test_invalid_regex_is_a_configuration_error() {
        let err = Predicate::name_matches("javax.(jws").unwrap_err();
        let err: ArchError = err.into();
        assert!(matches!(
            &err,
            ArchError::RuleConfiguration { context, .. } if context == "regex 'javax.(jws'"
        ));
    }

    #[test]
    fn test_annotated_with_nested_package_predicate() {
        let model = model();
        let in_persist =
            Predicate::annotated_with(Predicate::resides_in_package("org.example.persist..").unwrap());

        assert!(in_persist.test(&member(&model, FOO, "id")));
        assert!(!in_persist.test(&member(&model, FOO, "name")));
        assert!(in_persist.test(&Element::Class(model.class(REPO).unwrap())));
        assert!(!in_persist.test(&Element::Class(model.class(FOO).unwrap())));
    }

    #[test]
    fn test_owner_and_target_navigation() {
        let model = model();
        let access = Element::access(&model, &model.accesses()[0]).unwrap();

        let from_persist = Predicate::owner(Predicate::resides_in_package("..persist").unwrap());
        let reads_id = Predicate::target(Predicate::annotated_with(
            Predicate::name_matches(r".*\.Id").unwrap(),
        ));
        let into_servlet =
            Predicate::target_owner(Predicate::resides_in_package("..servlet..").unwrap());

        assert!(from_persist.test(&access));
        assert!(reads_id.test(&access));
        assert!(into_servlet.test(&access));
        assert!(!Predicate::target(Predicate::has_kind(ElementKind::Method)).test(&access));
    }

    #[test]
    fn test_combinators_and_descriptions() {
        let annotated = Predicate::annotated_with(Predicate::name_matches("x").unwrap());
        let in_pkg = Predicate::resides_in_package("y..").unwrap();
        let both = annotated.clone().and(in_pkg.clone());

        assert_eq!(
            both.description(),
            "(annotated with name matching 'x') and (resides in package y..)"
        );
        assert_eq!(
            (!annotated.or(in_pkg)).description(),
            "not ((annotated with name matching 'x') or (resides in package y..))"
        );
        assert_eq!(Predicate::has_kind(ElementKind::Access).description(), "is an access");
        assert_eq!(
            Predicate::has_kind(ElementKind::Field).described("fields only").description(),
            "fields only"
        );
    }

    #[test]
    fn test_combinators_evaluate() {
        let model = model();
        let id = member(&model, FOO, "id");
        let is_field = Predicate::has_kind(ElementKind::Field);
        let in_other = Predicate::resides_in_package("org.other..").unwrap();

        assert!(is_field.clone().or(in_other.clone()).test(&id));
        assert!(!is_field.clone().and(in_other.clone()).test(&id));
        assert!(is_field.and(!in_other).test(&id));
    }

    #[test]
    fn test_should_phrase() {
        let annotated = Predicate::annotated_with(Predicate::name_matches(r"javax\.jws\.WebService").unwrap());
        assert_eq!(
            annotated.should_phrase(),
            r"be annotated with name matching 'javax\.jws\.WebService'"
        );
        assert_eq!(
            Predicate::resides_in_package("a..").unwrap().should_phrase(),
            "reside in package a.."
        );
    }
}
