//! Loading model snapshots produced by an external class-graph provider
//!
//! Architecture: Anti-Corruption Layer - Snapshot records are translated into domain elements
//! - The loader only decodes; every integrity check happens in ModelBuilder::build
//! - Snapshots may be one file or a directory of fragments merged in path order
//! - Read and decode failures surface as load errors naming the offending file

use crate::domain::model::{AccessEdge, AnnotationInstance, ClassElement, MemberElement, MemberKind, Model, ModelBuilder};
use crate::domain::results::{ArchError, ArchResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default file name pattern for snapshot fragments
pub const DEFAULT_FRAGMENT_PATTERN: &str = "*.json";

/// Source of a model snapshot
pub trait ModelLoader {
    /// Load and validate a complete model
    fn load(&self) -> ArchResult<Model>;

    /// Human-readable description of the source
    fn source(&self) -> String;
}

/// A class as written by the class-graph provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// A member with its owner back-reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub owner: String,
    pub kind: MemberKind,
    pub name: String,
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl MemberRecord {
    fn into_element(self) -> MemberElement {
        let member = match self.kind {
            MemberKind::Field => MemberElement::field(self.owner, self.name, self.type_name),
            MemberKind::Method => {
                MemberElement::method(self.owner, self.name, self.type_name, self.parameters)
            }
            MemberKind::Constructor => MemberElement::constructor(self.owner, self.parameters),
        };
        match self.line {
            Some(line) => member.with_line(line),
            None => member,
        }
    }
}

/// Flat snapshot document: elements with explicit back-references
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub classes: Vec<ClassRecord>,
    #[serde(default)]
    pub members: Vec<MemberRecord>,
    #[serde(default)]
    pub annotations: Vec<AnnotationInstance>,
    #[serde(default)]
    pub accesses: Vec<AccessEdge>,
}

impl Snapshot {
    /// Append another fragment
    pub fn merge(&mut self, other: Snapshot) {
        self.classes.extend(other.classes);
        self.members.extend(other.members);
        self.annotations.extend(other.annotations);
        self.accesses.extend(other.accesses);
    }

    /// Build the validated model
    pub fn into_model(self) -> ArchResult<Model> {
        let mut builder = ModelBuilder::new();

        for class in self.classes {
            let mut element = ClassElement::new(class.name);
            if let Some(file) = class.source_file {
                element = element.with_source_file(file);
            }
            if let Some(line) = class.line {
                element = element.with_line(line);
            }
            builder = builder.class(element);
        }
        for member in self.members {
            builder = builder.member(member.into_element());
        }
        for annotation in self.annotations {
            builder = builder.annotation(annotation);
        }
        for access in self.accesses {
            builder = builder.access(access);
        }

        builder.build()
    }
}

/// Loads JSON snapshots from a file or a directory of fragments
#[derive(Debug, Clone)]
pub struct JsonSnapshotLoader {
    path: PathBuf,
    pattern: glob::Pattern,
}

impl JsonSnapshotLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> ArchResult<Self> {
        Self::with_pattern(path, DEFAULT_FRAGMENT_PATTERN)
    }

    /// Loader with a custom fragment file name pattern
    pub fn with_pattern<P: AsRef<Path>>(path: P, pattern: &str) -> ArchResult<Self> {
        let pattern = glob::Pattern::new(pattern)
            .map_err(|e| ArchError::config(format!("Invalid fragment pattern '{pattern}': {e}")))?;
        Ok(Self { path: path.as_ref().to_path_buf(), pattern })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fragment files under the snapshot directory, in path order
    pub fn fragment_files(&self) -> ArchResult<Vec<PathBuf>> {
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        if !self.path.is_dir() {
            return Err(ArchError::load(self.path.display().to_string(), "no such file or directory"));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.path).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| ArchError::load(self.path.display().to_string(), e.to_string()))?;
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }

            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| self.pattern.matches(name));
            if matches {
                files.push(path.to_path_buf());
            } else {
                tracing::debug!("Ignoring non-snapshot file {}", path.display());
            }
        }

        Ok(files)
    }

    /// Read and decode one snapshot file
    pub fn read_fragment(path: &Path) -> ArchResult<Snapshot> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ArchError::load(path.display().to_string(), format!("Failed to read: {e}")))?;
        serde_json::from_str(&contents)
            .map_err(|e| ArchError::load(path.display().to_string(), format!("Failed to decode: {e}")))
    }
}

impl ModelLoader for JsonSnapshotLoader {
    fn load(&self) -> ArchResult<Model> {
        let files = self.fragment_files()?;
        if files.is_empty() {
            tracing::warn!(
                "No snapshot fragments matching '{}' in {}",
                self.pattern.as_str(),
                self.path.display()
            );
        }

        let mut snapshot = Snapshot::default();
        for file in &files {
            snapshot.merge(Self::read_fragment(file)?);
        }

        let model = snapshot.into_model()?;
        tracing::debug!(
            "Loaded {} classes from {} snapshot file(s) in {}",
            model.len(),
            files.len(),
            self.path.display()
        );
        Ok(model)
    }

    fn source(&self) -> String {
        self.path.display().to_string()
    }
}
