//! Package identifiers such as `org.example..` compiled to anchored matchers
//!
//! Architectural Principle: Value Object - PackageIdentifier owns the matching rules for package names
//! - `*` matches within a single package segment
//! - `..` matches any number of packages, including none
//! - A trailing `..` means "the package or any subpackage"; a leading `..` means "under any parent"

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

lazy_static! {
    static ref IDENTIFIER_SYNTAX: Regex =
        Regex::new(r"^[\w$*.]+$").expect("package identifier syntax regex is valid");
}

/// Errors raised while compiling name patterns and package identifiers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("malformed package identifier '{identifier}': {reason}")]
    InvalidPackage { identifier: String, reason: String },
}

impl PatternError {
    fn package(identifier: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPackage { identifier: identifier.to_string(), reason: reason.into() }
    }

    /// The offending pattern text
    pub fn subject(&self) -> &str {
        match self {
            Self::InvalidRegex { pattern, .. } => pattern,
            Self::InvalidPackage { identifier, .. } => identifier,
        }
    }
}

/// A compiled package identifier
#[derive(Debug, Clone)]
pub struct PackageIdentifier {
    /// Identifier as written, used in descriptions
    original: String,
    regex: Regex,
}

impl PackageIdentifier {
    /// Compile an identifier, rejecting malformed syntax
    pub fn parse(identifier: &str) -> Result<Self, PatternError> {
        if identifier.is_empty() {
            return Err(PatternError::package(identifier, "identifier is empty"));
        }
        if !IDENTIFIER_SYNTAX.is_match(identifier) {
            return Err(PatternError::package(
                identifier,
                "only letters, digits, '_', '$', '*' and '.' are allowed",
            ));
        }
        if identifier.contains("...") {
            return Err(PatternError::package(identifier, "'...' is not a valid separator"));
        }

        let pattern = translate(identifier)?;
        let regex = Regex::new(&pattern).map_err(|e| PatternError::package(identifier, e.to_string()))?;

        tracing::debug!("Compiled package identifier '{}' to '{}'", identifier, pattern);
        Ok(Self { original: identifier.to_string(), regex })
    }

    /// Whether a package name is matched by this identifier
    pub fn matches(&self, package: &str) -> bool {
        self.regex.is_match(package)
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }
}

/// Translate an identifier into an anchored regular expression
fn translate(identifier: &str) -> Result<String, PatternError> {
    if identifier == ".." {
        return Ok("^.*$".to_string());
    }

    let parts: Vec<&str> = identifier.split("..").collect();
    let last = parts.len() - 1;
    let mut pattern = String::from("^");

    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            if i == 0 {
                pattern.push_str(r"(?:.*\.)?");
            } else if i == last {
                pattern.push_str(r"(?:\..*)?");
            } else {
                return Err(PatternError::package(identifier, "consecutive '..' separators"));
            }
            continue;
        }

        if i > 0 && !parts[i - 1].is_empty() {
            pattern.push_str(r"(?:\..*)?\.");
        }
        pattern.push_str(&translate_fragment(identifier, part)?);
    }

    pattern.push('$');
    Ok(pattern)
}

/// Translate a dotted fragment without `..`, e.g. `org.*.web`
fn translate_fragment(identifier: &str, fragment: &str) -> Result<String, PatternError> {
    let mut segments = Vec::new();

    for segment in fragment.split('.') {
        if segment.is_empty() {
            return Err(PatternError::package(identifier, "empty package segment"));
        }
        let translated: Vec<String> = segment.split('*').map(regex::escape).collect();
        segments.push(translated.join("[^.]*"));
    }

    Ok(segments.join(r"\."))
}

impl PartialEq for PackageIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.original == other.original
    }
}

impl Eq for PackageIdentifier {}

impl fmt::Display for PackageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Serialize for PackageIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.original)
    }
}

impl<'de> Deserialize<'de> for PackageIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
