//! Immutable model of one analyzed codebase snapshot
//!
//! Architecture: Aggregate Root - Model exclusively owns every class, member and annotation
//! - Elements refer to their owners through name-based back-references only
//! - ModelBuilder is the single construction path and enforces referential integrity
//! - Once built, the model is never mutated; derived views borrow from it

use crate::domain::results::{ArchError, ArchResult};
use crate::predicates::PackageIdentifier;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Split a fully qualified name into `(package, simple name)`
pub fn split_qualified_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => (&name[..idx], &name[idx + 1..]),
        None => ("", name),
    }
}

/// Declaring location of an element: source file (or class) and line
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    /// 0 when the loader had no line information
    pub line: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self { file: file.into(), line }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}:{})", self.file, self.line)
    }
}

/// Kind of class member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    Field,
    Method,
    Constructor,
}

impl MemberKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::Method => "method",
            Self::Constructor => "constructor",
        }
    }

    /// Methods and constructors carry parameter lists
    pub fn is_code_unit(self) -> bool {
        !matches!(self, Self::Field)
    }
}

/// Kind of access from one member to another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    Read,
    Write,
    Call,
}

impl AccessKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Call => "call",
        }
    }

    pub fn is_field_access(self) -> bool {
        matches!(self, Self::Read | Self::Write)
    }

    /// Verb phrase used in access descriptions
    pub fn verb(self) -> &'static str {
        match self {
            Self::Read => "reads field",
            Self::Write => "writes field",
            Self::Call => "calls method",
        }
    }
}

/// Name-based reference to a member, possibly outside the model
///
/// `parameters = None` addresses the unique member with that name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
}

impl MemberRef {
    pub fn field(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self { owner: owner.into(), name: name.into(), parameters: None }
    }

    pub fn method<I, S>(owner: impl Into<String>, name: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner: owner.into(),
            name: name.into(),
            parameters: Some(parameters.into_iter().map(Into::into).collect()),
        }
    }

    pub fn full_name(&self) -> String {
        match &self.parameters {
            Some(params) => format!("{}.{}({})", self.owner, self.name, params.join(", ")),
            None => format!("{}.{}", self.owner, self.name),
        }
    }
}

/// Owner of an annotation: a class or one of its members
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementRef {
    Member {
        class: String,
        member: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parameters: Option<Vec<String>>,
    },
    Class {
        class: String,
    },
}

impl ElementRef {
    pub fn class(class: impl Into<String>) -> Self {
        Self::Class { class: class.into() }
    }

    pub fn member(member: &MemberRef) -> Self {
        Self::Member {
            class: member.owner.clone(),
            member: member.name.clone(),
            parameters: member.parameters.clone(),
        }
    }

    pub fn class_name(&self) -> &str {
        match self {
            Self::Member { class, .. } | Self::Class { class } => class,
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class { class } => write!(f, "{class}"),
            Self::Member { class, member, parameters: Some(params) } => {
                write!(f, "{class}.{member}({})", params.join(", "))
            }
            Self::Member { class, member, parameters: None } => write!(f, "{class}.{member}"),
        }
    }
}

/// An annotation attached to a class or member
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationInstance {
    /// Fully qualified annotation type name
    pub type_name: String,
    /// Back-reference to the decorated element
    pub owner: ElementRef,
}

impl AnnotationInstance {
    pub fn new(type_name: impl Into<String>, owner: ElementRef) -> Self {
        Self { type_name: type_name.into(), owner }
    }

    pub fn type_package(&self) -> &str {
        split_qualified_name(&self.type_name).0
    }
}

/// A field, method or constructor of a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberElement {
    /// Fully qualified name of the owning class (back-reference)
    pub owner: String,
    pub kind: MemberKind,
    pub name: String,
    /// Declared type for fields, return type for methods
    pub type_name: String,
    /// Parameter type names, empty for fields
    pub parameters: Vec<String>,
    pub line: Option<u32>,
    pub(crate) annotations: Vec<AnnotationInstance>,
}

impl MemberElement {
    pub fn field(owner: impl Into<String>, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            kind: MemberKind::Field,
            name: name.into(),
            type_name: type_name.into(),
            parameters: Vec::new(),
            line: None,
            annotations: Vec::new(),
        }
    }

    pub fn method<I, S>(
        owner: impl Into<String>,
        name: impl Into<String>,
        return_type: impl Into<String>,
        parameters: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner: owner.into(),
            kind: MemberKind::Method,
            name: name.into(),
            type_name: return_type.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
            line: None,
            annotations: Vec::new(),
        }
    }

    pub fn constructor<I, S>(owner: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let owner = owner.into();
        Self {
            type_name: owner.clone(),
            owner,
            kind: MemberKind::Constructor,
            name: "<init>".to_string(),
            parameters: parameters.into_iter().map(Into::into).collect(),
            line: None,
            annotations: Vec::new(),
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn annotations(&self) -> &[AnnotationInstance] {
        &self.annotations
    }

    /// `Owner.name` for fields, `Owner.name(P1, P2)` for code units
    pub fn full_name(&self) -> String {
        if self.kind.is_code_unit() {
            format!("{}.{}({})", self.owner, self.name, self.parameters.join(", "))
        } else {
            format!("{}.{}", self.owner, self.name)
        }
    }

    /// Reference that addresses exactly this member
    pub fn to_ref(&self) -> MemberRef {
        MemberRef {
            owner: self.owner.clone(),
            name: self.name.clone(),
            parameters: self.kind.is_code_unit().then(|| self.parameters.clone()),
        }
    }

    /// Identity within the owning class
    pub(crate) fn same_signature(&self, other: &MemberElement) -> bool {
        self.name == other.name
            && self.kind.is_code_unit() == other.kind.is_code_unit()
            && self.parameters == other.parameters
    }
}

/// A compiled class: identity, package, members and direct annotations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassElement {
    /// Fully qualified name, unique within a model
    pub name: String,
    pub package: String,
    pub simple_name: String,
    pub source_file: Option<String>,
    pub line: Option<u32>,
    pub(crate) members: Vec<MemberElement>,
    pub(crate) annotations: Vec<AnnotationInstance>,
}

/// Outcome of looking up a member by reference inside one class
enum MemberLookup {
    Found(usize),
    Missing,
    Ambiguous,
}

impl ClassElement {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (package, simple_name) = split_qualified_name(&name);
        let (package, simple_name) = (package.to_string(), simple_name.to_string());
        Self {
            name,
            package,
            simple_name,
            source_file: None,
            line: None,
            members: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn with_source_file(mut self, file: impl Into<String>) -> Self {
        self.source_file = Some(file.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn members(&self) -> &[MemberElement] {
        &self.members
    }

    pub fn annotations(&self) -> &[AnnotationInstance] {
        &self.annotations
    }

    pub fn location(&self) -> Location {
        self.location_at(self.line)
    }

    /// Location inside this class's source, line 0 when unknown
    pub fn location_at(&self, line: Option<u32>) -> Location {
        let file = self.source_file.clone().unwrap_or_else(|| self.simple_name.clone());
        Location::new(file, line.unwrap_or(0))
    }

    /// Find a member by name and optional parameter list
    pub fn member(&self, name: &str, parameters: Option<&[String]>) -> Option<&MemberElement> {
        match self.lookup_member(name, parameters) {
            MemberLookup::Found(idx) => Some(&self.members[idx]),
            MemberLookup::Missing | MemberLookup::Ambiguous => None,
        }
    }

    fn lookup_member(&self, name: &str, parameters: Option<&[String]>) -> MemberLookup {
        let mut candidates = self.members.iter().enumerate().filter(|(_, m)| {
            m.name == name
                && match parameters {
                    Some(params) => m.kind.is_code_unit() && m.parameters == params,
                    None => true,
                }
        });

        match (candidates.next(), candidates.next()) {
            (Some((idx, _)), None) => MemberLookup::Found(idx),
            (None, _) => MemberLookup::Missing,
            (Some(_), Some(_)) => MemberLookup::Ambiguous,
        }
    }
}

/// Directed access from one member to another
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessEdge {
    /// Accessing member; always resolves inside the model
    pub origin: MemberRef,
    /// Accessed member; may be external to the model
    pub target: MemberRef,
    pub kind: AccessKind,
    pub line: Option<u32>,
}

impl AccessEdge {
    pub fn new(origin: MemberRef, target: MemberRef, kind: AccessKind) -> Self {
        Self { origin, target, kind, line: None }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// Element counts of a model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelStats {
    pub classes: usize,
    pub fields: usize,
    pub methods: usize,
    pub constructors: usize,
    pub annotations: usize,
    pub accesses: usize,
}

impl ModelStats {
    pub fn members(&self) -> usize {
        self.fields + self.methods + self.constructors
    }
}

/// The full immutable collection of classes for one analyzed snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct Model {
    classes: BTreeMap<String, ClassElement>,
    accesses: Vec<AccessEdge>,
    /// Indices into `accesses` grouped by origin class
    #[serde(skip)]
    outgoing: HashMap<String, Vec<usize>>,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::new()
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn from_parts(classes: BTreeMap<String, ClassElement>, accesses: Vec<AccessEdge>) -> Self {
        let mut outgoing: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, edge) in accesses.iter().enumerate() {
            outgoing.entry(edge.origin.owner.clone()).or_default().push(idx);
        }
        Self { classes, accesses, outgoing }
    }

    /// Classes ordered by fully qualified name
    pub fn classes(&self) -> impl Iterator<Item = &ClassElement> {
        self.classes.values()
    }

    pub fn class(&self, name: &str) -> Option<&ClassElement> {
        self.classes.get(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Accesses in loader order
    pub fn accesses(&self) -> &[AccessEdge] {
        &self.accesses
    }

    /// Accesses whose origin member belongs to the given class
    pub fn accesses_from<'a>(&'a self, class_name: &str) -> impl Iterator<Item = &'a AccessEdge> + 'a {
        self.outgoing
            .get(class_name)
            .into_iter()
            .flat_map(move |indices| indices.iter().map(move |&idx| &self.accesses[idx]))
    }

    /// Resolve a member reference to its class and member, if both are in the model
    pub fn resolve_member(&self, member: &MemberRef) -> Option<(&ClassElement, &MemberElement)> {
        let class = self.classes.get(&member.owner)?;
        let found = class.member(&member.name, member.parameters.as_deref())?;
        Some((class, found))
    }

    /// Fresh model containing only the classes accepted by `keep`
    ///
    /// Accesses originating in dropped classes are dropped; accesses into
    /// dropped classes remain and become external.
    pub fn retain_classes<F>(&self, mut keep: F) -> Model
    where
        F: FnMut(&ClassElement) -> bool,
    {
        let classes: BTreeMap<String, ClassElement> = self
            .classes
            .iter()
            .filter(|(_, class)| keep(class))
            .map(|(name, class)| (name.clone(), class.clone()))
            .collect();

        let accesses = self
            .accesses
            .iter()
            .filter(|edge| classes.contains_key(&edge.origin.owner))
            .cloned()
            .collect();

        tracing::debug!(
            "Retained {} of {} classes",
            classes.len(),
            self.classes.len()
        );

        Self::from_parts(classes, accesses)
    }

    /// Fresh model limited to classes residing in any of the given packages
    ///
    /// An empty list keeps every class.
    pub fn retain_packages(&self, packages: &[PackageIdentifier]) -> Model {
        if packages.is_empty() {
            return self.clone();
        }
        self.retain_classes(|class| packages.iter().any(|id| id.matches(&class.package)))
    }

    pub fn stats(&self) -> ModelStats {
        let mut stats = ModelStats { classes: self.classes.len(), accesses: self.accesses.len(), ..Default::default() };

        for class in self.classes.values() {
            stats.annotations += class.annotations.len();
            for member in &class.members {
                stats.annotations += member.annotations.len();
                match member.kind {
                    MemberKind::Field => stats.fields += 1,
                    MemberKind::Method => stats.methods += 1,
                    MemberKind::Constructor => stats.constructors += 1,
                }
            }
        }

        stats
    }

    /// Hex SHA-256 over the canonical JSON form of the model
    pub fn fingerprint(&self) -> ArchResult<String> {
        let canonical = serde_json::to_vec(self)
            .map_err(|e| ArchError::integrity(format!("Failed to serialize model: {e}")))?;
        let digest = Sha256::digest(&canonical);
        Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
    }
}

/// Collects loader output and assembles a validated [`Model`]
#[derive(Debug, Default)]
pub struct ModelBuilder {
    classes: Vec<ClassElement>,
    members: Vec<MemberElement>,
    annotations: Vec<AnnotationInstance>,
    accesses: Vec<AccessEdge>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, class: ClassElement) -> Self {
        self.classes.push(class);
        self
    }

    pub fn member(mut self, member: MemberElement) -> Self {
        self.members.push(member);
        self
    }

    pub fn annotation(mut self, annotation: AnnotationInstance) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Annotate a class with the given annotation type
    pub fn annotate_class(self, class: &str, type_name: &str) -> Self {
        self.annotation(AnnotationInstance::new(type_name, ElementRef::class(class)))
    }

    /// Annotate a member with the given annotation type
    pub fn annotate_member(self, member: &MemberRef, type_name: &str) -> Self {
        self.annotation(AnnotationInstance::new(type_name, ElementRef::member(member)))
    }

    pub fn access(mut self, access: AccessEdge) -> Self {
        self.accesses.push(access);
        self
    }

    /// Assemble the model, checking every back-reference
    pub fn build(self) -> ArchResult<Model> {
        let mut classes: BTreeMap<String, ClassElement> = BTreeMap::new();

        for mut class in self.classes {
            // Members and annotations only enter through the builder
            class.members.clear();
            class.annotations.clear();
            if classes.contains_key(&class.name) {
                return Err(ArchError::integrity(format!("Duplicate class '{}'", class.name)));
            }
            classes.insert(class.name.clone(), class);
        }

        for mut member in self.members {
            member.annotations.clear();
            let Some(owner) = classes.get_mut(&member.owner) else {
                return Err(ArchError::integrity(format!(
                    "Member '{}' references unknown owner class '{}'",
                    member.full_name(),
                    member.owner
                )));
            };
            if owner.members.iter().any(|existing| existing.same_signature(&member)) {
                return Err(ArchError::integrity(format!(
                    "Duplicate member '{}'",
                    member.full_name()
                )));
            }
            owner.members.push(member);
        }

        for annotation in self.annotations {
            let slot = match classes.get_mut(annotation.owner.class_name()) {
                None => None,
                Some(class) => match &annotation.owner {
                    ElementRef::Class { .. } => Some(&mut class.annotations),
                    ElementRef::Member { member, parameters, .. } => {
                        match class.lookup_member(member, parameters.as_deref()) {
                            MemberLookup::Found(idx) => Some(&mut class.members[idx].annotations),
                            MemberLookup::Missing => None,
                            MemberLookup::Ambiguous => {
                                return Err(ArchError::integrity(format!(
                                    "Annotation @{} owner '{}' is ambiguous",
                                    annotation.type_name, annotation.owner
                                )))
                            }
                        }
                    }
                },
            };

            match slot {
                Some(annotations) => annotations.push(annotation),
                None => {
                    return Err(ArchError::integrity(format!(
                        "Annotation @{} references unknown owner '{}'",
                        annotation.type_name, annotation.owner
                    )))
                }
            }
        }

        for edge in &self.accesses {
            let origin = &edge.origin;
            let resolved = classes.get(&origin.owner).map(|class| {
                class.lookup_member(&origin.name, origin.parameters.as_deref())
            });
            if !matches!(resolved, Some(MemberLookup::Found(_))) {
                return Err(ArchError::integrity(format!(
                    "Access origin '{}' does not resolve to a unique member",
                    origin.full_name()
                )));
            }
        }

        let model = Model::from_parts(classes, self.accesses);
        tracing::debug!(
            "Built model with {} classes and {} accesses",
            model.len(),
            model.accesses.len()
        );
        Ok(model)
    }
}
