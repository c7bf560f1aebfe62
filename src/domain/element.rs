//! Borrowed, read-only views over model elements
//!
//! Architecture: Value Objects - Element is the uniform face every rule sees
//! - Predicates, transformers and conditions operate on Element, never on raw model types
//! - Each view carries the owner context it needs, resolved once by the transformer
//! - Views borrow from the Model and can never mutate it

use crate::domain::model::{
    split_qualified_name, AccessEdge, AnnotationInstance, ClassElement, Location, MemberElement,
    MemberKind, MemberRef, Model,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Kind of an element, as matched by the `kind` predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Class,
    Field,
    Method,
    Constructor,
    Access,
    Annotation,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Field => "field",
            Self::Method => "method",
            Self::Constructor => "constructor",
            Self::Access => "access",
            Self::Annotation => "annotation",
        }
    }
}

impl From<MemberKind> for ElementKind {
    fn from(kind: MemberKind) -> Self {
        match kind {
            MemberKind::Field => Self::Field,
            MemberKind::Method => Self::Method,
            MemberKind::Constructor => Self::Constructor,
        }
    }
}

/// A model element as seen by rules
#[derive(Debug, Clone, Copy)]
pub enum Element<'m> {
    Class(&'m ClassElement),
    Member {
        owner: &'m ClassElement,
        member: &'m MemberElement,
    },
    Access {
        edge: &'m AccessEdge,
        origin_owner: &'m ClassElement,
        origin: &'m MemberElement,
        /// Target's class when it is part of the model
        target_owner: Option<&'m ClassElement>,
        /// Target member when it resolves inside the model
        target: Option<&'m MemberElement>,
    },
    Annotation(&'m AnnotationInstance),
    /// A class known only by name (outside the model)
    TypeName(&'m str),
    /// A member known only by reference (outside the model)
    Reference(&'m MemberRef),
}

impl<'m> Element<'m> {
    /// View an access edge, resolving its origin and target against the model
    pub fn access(model: &'m Model, edge: &'m AccessEdge) -> Option<Self> {
        let (origin_owner, origin) = model.resolve_member(&edge.origin)?;
        let target_owner = model.class(&edge.target.owner);
        let target = target_owner
            .and_then(|class| class.member(&edge.target.name, edge.target.parameters.as_deref()));
        Some(Self::Access { edge, origin_owner, origin, target_owner, target })
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Class(_) | Self::TypeName(_) => ElementKind::Class,
            Self::Member { member, .. } => member.kind.into(),
            Self::Access { .. } => ElementKind::Access,
            Self::Annotation(_) => ElementKind::Annotation,
            Self::Reference(r) if r.parameters.is_some() => ElementKind::Method,
            Self::Reference(_) => ElementKind::Field,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Fully qualified name; for accesses, the accessed target's name
    pub fn full_name(&self) -> Cow<'m, str> {
        match *self {
            Self::Class(class) => Cow::Borrowed(class.name.as_str()),
            Self::Member { member, .. } => Cow::Owned(member.full_name()),
            Self::Access { edge, .. } => Cow::Owned(edge.target.full_name()),
            Self::Annotation(annotation) => Cow::Borrowed(annotation.type_name.as_str()),
            Self::TypeName(name) => Cow::Borrowed(name),
            Self::Reference(r) => Cow::Owned(r.full_name()),
        }
    }

    /// Package the element lives in; for accesses, the origin's package
    pub fn package(&self) -> &'m str {
        match *self {
            Self::Class(class) => &class.package,
            Self::Member { owner, .. } => &owner.package,
            Self::Access { origin_owner, .. } => &origin_owner.package,
            Self::Annotation(annotation) => annotation.type_package(),
            Self::TypeName(name) => split_qualified_name(name).0,
            Self::Reference(r) => split_qualified_name(&r.owner).0,
        }
    }

    /// Annotations attached directly to the element
    pub fn annotations(&self) -> &'m [AnnotationInstance] {
        match *self {
            Self::Class(class) => class.annotations(),
            Self::Member { member, .. } => member.annotations(),
            _ => &[],
        }
    }

    pub fn location(&self) -> Location {
        match *self {
            Self::Class(class) => class.location(),
            Self::Member { owner, member } => owner.location_at(member.line),
            Self::Access { edge, origin_owner, .. } => origin_owner.location_at(edge.line),
            Self::Annotation(annotation) => {
                Location::new(split_qualified_name(annotation.owner.class_name()).1, 0)
            }
            Self::TypeName(name) => Location::new(split_qualified_name(name).1, 0),
            Self::Reference(r) => Location::new(split_qualified_name(&r.owner).1, 0),
        }
    }

    /// Owning class of a member, origin class of an access
    pub fn owner(&self) -> Option<Element<'m>> {
        match *self {
            Self::Member { owner, .. } => Some(Self::Class(owner)),
            Self::Access { origin_owner, .. } => Some(Self::Class(origin_owner)),
            _ => None,
        }
    }

    /// Accessed member of an access, resolved when possible
    pub fn target(&self) -> Option<Element<'m>> {
        match *self {
            Self::Access { target_owner: Some(owner), target: Some(member), .. } => {
                Some(Self::Member { owner, member })
            }
            Self::Access { edge, .. } => Some(Self::Reference(&edge.target)),
            _ => None,
        }
    }

    /// Class of the accessed member, resolved when possible
    pub fn target_owner(&self) -> Option<Element<'m>> {
        match *self {
            Self::Access { target_owner: Some(owner), .. } => Some(Self::Class(owner)),
            Self::Access { edge, .. } => Some(Self::TypeName(&edge.target.owner)),
            _ => None,
        }
    }

    /// Sentence-style description, e.g. "method a.B.run() reads field a.C.id"
    pub fn describe(&self) -> String {
        match *self {
            Self::Access { edge, origin, .. } => format!(
                "{} {} {} {}",
                ElementKind::from(origin.kind).as_str(),
                origin.full_name(),
                edge.kind.verb(),
                edge.target.full_name()
            ),
            _ => format!("{} {}", self.kind_label(), self.full_name()),
        }
    }
}
