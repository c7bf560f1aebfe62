//! Configuration loading and rule declarations for archcheck
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML rule declarations
//! - Raw YAML structures are compiled into validated RuleSpecs before any evaluation
//! - Default rules are embedded in the domain, not infrastructure
//! - The compiled registry is immutable and shared, never a mutable global

use crate::conditions::Condition;
use crate::domain::element::ElementKind;
use crate::domain::results::{ArchError, ArchResult, Priority};
use crate::engine::rule::{RuleRegistry, RuleSpec};
use crate::predicates::{PackageIdentifier, Predicate};
use crate::transform::Transformer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File names searched, in order, when no configuration path is given
pub const CONFIG_FILE_NAMES: &[&str] = &["archcheck.yaml", "archcheck.yml", ".archcheck.yaml"];

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Main configuration structure for archcheck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchConfig {
    /// Configuration format version
    pub version: String,
    /// Import scope of the analyzed model
    #[serde(default)]
    pub analyze: AnalyzeConfig,
    /// Rule declarations in evaluation order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Which part of the model is analyzed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeConfig {
    /// Package identifiers; empty analyzes the whole model
    #[serde(default)]
    pub packages: Vec<String>,
}

/// "no X should" or "all X should"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantifier {
    #[default]
    Not,
    All,
}

/// A single rule declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Unique identifier for this rule
    pub name: String,
    #[serde(default)]
    pub priority: Priority,
    /// Transformer name, e.g. `classes` or `members`
    pub population: String,
    #[serde(default)]
    pub should: Quantifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub that: Option<PredicateConfig>,
    /// Package identifier restricting the population
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub condition: ConditionConfig,
    /// Reason the rule is disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Predicate declaration; exactly one key must be set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredicateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_matches: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resides_in_package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_with: Option<Box<PredicateConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Box<PredicateConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Box<PredicateConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_owner: Option<Box<PredicateConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ElementKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<PredicateConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<PredicateConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<PredicateConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub described: Option<DescribedConfig>,
}

/// A predicate with an explicit label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescribedConfig {
    pub label: String,
    pub predicate: Box<PredicateConfig>,
}

/// Condition declaration; exactly one key must be set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satisfy: Option<PredicateConfig>,
    /// Sugar for `satisfy: { annotated_with: ... }`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub be_annotated_with: Option<PredicateConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub be_annotated_with_type_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_field_where: Option<PredicateConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_classes_that: Option<PredicateConfig>,
}

impl PredicateConfig {
    pub fn name_matches(pattern: impl Into<String>) -> Self {
        Self { name_matches: Some(pattern.into()), ..Default::default() }
    }

    pub fn resides_in_package(identifier: impl Into<String>) -> Self {
        Self { resides_in_package: Some(identifier.into()), ..Default::default() }
    }

    pub fn annotated_with(inner: PredicateConfig) -> Self {
        Self { annotated_with: Some(Box::new(inner)), ..Default::default() }
    }

    pub fn target(inner: PredicateConfig) -> Self {
        Self { target: Some(Box::new(inner)), ..Default::default() }
    }

    /// Compile into a predicate, reporting errors against the owning rule
    pub fn compile(&self, rule: &str) -> ArchResult<Predicate> {
        let mut compiled: Vec<Predicate> = Vec::new();

        if let Some(pattern) = &self.name_matches {
            compiled.push(Predicate::name_matches(pattern).map_err(|e| ArchError::rule_config(rule, e.to_string()))?);
        }
        if let Some(identifier) = &self.resides_in_package {
            compiled.push(
                Predicate::resides_in_package(identifier)
                    .map_err(|e| ArchError::rule_config(rule, e.to_string()))?,
            );
        }
        if let Some(inner) = &self.annotated_with {
            compiled.push(Predicate::annotated_with(inner.compile(rule)?));
        }
        if let Some(inner) = &self.owner {
            compiled.push(Predicate::owner(inner.compile(rule)?));
        }
        if let Some(inner) = &self.target {
            compiled.push(Predicate::target(inner.compile(rule)?));
        }
        if let Some(inner) = &self.target_owner {
            compiled.push(Predicate::target_owner(inner.compile(rule)?));
        }
        if let Some(kind) = self.kind {
            compiled.push(Predicate::has_kind(kind));
        }
        if let Some(operands) = &self.and {
            compiled.push(fold_operands(rule, "and", operands, Predicate::and)?);
        }
        if let Some(operands) = &self.or {
            compiled.push(fold_operands(rule, "or", operands, Predicate::or)?);
        }
        if let Some(inner) = &self.not {
            compiled.push(inner.compile(rule)?.negate());
        }
        if let Some(described) = &self.described {
            compiled.push(described.predicate.compile(rule)?.described(described.label.clone()));
        }

        exactly_one(rule, "predicate", compiled)
    }
}

fn fold_operands(
    rule: &str,
    operator: &str,
    operands: &[PredicateConfig],
    combine: fn(Predicate, Predicate) -> Predicate,
) -> ArchResult<Predicate> {
    let mut compiled = operands.iter().map(|operand| operand.compile(rule));
    let first = compiled
        .next()
        .ok_or_else(|| ArchError::rule_config(rule, format!("'{operator}' needs at least one operand")))??;
    compiled.try_fold(first, |acc, next| Ok(combine(acc, next?)))
}

fn exactly_one<T>(rule: &str, what: &str, mut compiled: Vec<T>) -> ArchResult<T> {
    match compiled.len() {
        1 => compiled.pop().ok_or_else(|| ArchError::rule_config(rule, format!("empty {what}"))),
        0 => Err(ArchError::rule_config(rule, format!("{what} declares no key"))),
        n => Err(ArchError::rule_config(rule, format!("{what} declares {n} keys, expected exactly one"))),
    }
}

impl ConditionConfig {
    pub fn be_annotated_with(inner: PredicateConfig) -> Self {
        Self { be_annotated_with: Some(inner), ..Default::default() }
    }

    pub fn be_annotated_with_type_in(identifier: impl Into<String>) -> Self {
        Self { be_annotated_with_type_in: Some(identifier.into()), ..Default::default() }
    }

    pub fn access_field_where(predicate: PredicateConfig) -> Self {
        Self { access_field_where: Some(predicate), ..Default::default() }
    }

    pub fn access_classes_that(predicate: PredicateConfig) -> Self {
        Self { access_classes_that: Some(predicate), ..Default::default() }
    }

    pub fn compile(&self, rule: &str) -> ArchResult<Condition> {
        let mut compiled: Vec<Condition> = Vec::new();

        if let Some(predicate) = &self.satisfy {
            compiled.push(Condition::satisfy(predicate.compile(rule)?));
        }
        if let Some(inner) = &self.be_annotated_with {
            compiled.push(Condition::be_annotated_with(inner.compile(rule)?));
        }
        if let Some(identifier) = &self.be_annotated_with_type_in {
            compiled.push(
                Condition::be_annotated_with_type_in(identifier)
                    .map_err(|e| ArchError::rule_config(rule, e.to_string()))?,
            );
        }
        if let Some(predicate) = &self.access_field_where {
            compiled.push(Condition::access_field_where(predicate.compile(rule)?));
        }
        if let Some(predicate) = &self.access_classes_that {
            compiled.push(Condition::access_classes_that(predicate.compile(rule)?));
        }

        exactly_one(rule, "condition", compiled)
    }
}

impl RuleConfig {
    /// A "no <population> should <condition>" rule with medium priority
    pub fn new(name: impl Into<String>, population: impl Into<String>, condition: ConditionConfig) -> Self {
        Self {
            name: name.into(),
            priority: Priority::default(),
            population: population.into(),
            should: Quantifier::Not,
            that: None,
            scope: None,
            condition,
            ignored: None,
            description: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn all(mut self) -> Self {
        self.should = Quantifier::All;
        self
    }

    pub fn ignored(mut self, reason: impl Into<String>) -> Self {
        self.ignored = Some(reason.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Compile the declaration into a validated rule
    pub fn compile(&self) -> ArchResult<RuleSpec> {
        let transformer = Transformer::from_name(&self.population).ok_or_else(|| {
            ArchError::rule_config(&self.name, format!("unknown population '{}'", self.population))
        })?;

        let mut builder = RuleSpec::builder(&self.name).priority(self.priority);
        builder = match self.should {
            Quantifier::Not => builder.no(transformer),
            Quantifier::All => builder.all(transformer),
        };
        if let Some(that) = &self.that {
            builder = builder.that(that.compile(&self.name)?);
        }
        if let Some(scope) = &self.scope {
            builder = builder.in_package(scope.clone());
        }
        builder = builder.should(self.condition.compile(&self.name)?);
        if let Some(reason) = &self.ignored {
            builder = builder.ignored(reason.clone());
        }
        if let Some(description) = &self.description {
            builder = builder.because(description.clone());
        }

        builder.build()
    }
}

impl ArchConfig {
    /// Load and validate configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ArchResult<Self> {
        let config = Self::read_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML file without compiling its rules
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> ArchResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            ArchError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            ArchError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> ArchResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ArchError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// First conventional configuration file present in `dir`
    pub fn discover<P: AsRef<Path>>(dir: P) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.as_ref().join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Read the given file, or the discovered one, or fall back to defaults
    ///
    /// Rules are not compiled yet; callers compile once with [`ArchConfig::compiled`].
    pub fn resolve(explicit: Option<&Path>, dir: &Path) -> ArchResult<Self> {
        if let Some(path) = explicit {
            return Self::read_from_file(path);
        }
        match Self::discover(dir) {
            Some(path) => {
                tracing::debug!("Using configuration {}", path.display());
                Self::read_from_file(path)
            }
            None => {
                tracing::debug!("No configuration file found, using built-in rules");
                Ok(Self::with_defaults())
            }
        }
    }

    /// Default configuration with the built-in sample rules
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            analyze: AnalyzeConfig { packages: vec!["org.superbiz.servlet".to_string()] },
            rules: Self::default_rules(),
        }
    }

    fn default_rules() -> Vec<RuleConfig> {
        let annotated = |pattern: &str| ConditionConfig::be_annotated_with(PredicateConfig::name_matches(pattern));
        let accesses_field_annotated = |pattern: &str| {
            ConditionConfig::access_field_where(PredicateConfig::target(PredicateConfig::annotated_with(
                PredicateConfig::name_matches(pattern),
            )))
        };
        const RETENTION_NOTE: &str =
            "Annotation presence is read from the model regardless of retention; kept active";

        vec![
            // javax.jws
            RuleConfig::new("no_jws_web_service", "classes", annotated(r"javax\.jws\.WebService")),
            RuleConfig::new("no_jws_handler_chain", "classes", annotated(r"javax\.jws\.HandlerChain")),
            // javax.persistence
            RuleConfig::new(
                "no_persistence_at_all",
                "classes",
                ConditionConfig::access_classes_that(PredicateConfig::resides_in_package(
                    "javax.persistence..",
                )),
            )
            .priority(Priority::Low)
            .ignored("Pending decision on whether any access to javax.persistence is allowed at all"),
            RuleConfig::new("no_entities", "classes", annotated(r"javax\.persistence\.Entity"))
                .priority(Priority::Low),
            RuleConfig::new("no_id_fields", "classes", accesses_field_annotated(r"javax\.persistence\.Id"))
                .priority(Priority::Low)
                .description(RETENTION_NOTE),
            RuleConfig::new(
                "no_column_fields",
                "classes",
                accesses_field_annotated(r"javax\.persistence\.Column"),
            )
            .priority(Priority::Low),
            RuleConfig::new(
                "no_generated_values",
                "classes",
                accesses_field_annotated(r"javax\.persistence\.GeneratedValue"),
            )
            .priority(Priority::Low)
            .description(RETENTION_NOTE),
            RuleConfig::new(
                "no_persistence_units",
                "classes",
                accesses_field_annotated(r"javax\.persistence\.PersistenceUnit"),
            )
            .priority(Priority::Low)
            .description(RETENTION_NOTE),
            RuleConfig::new(
                "no_persistence_annotations_on_members",
                "members",
                ConditionConfig::be_annotated_with_type_in("javax.persistence.."),
            ),
        ]
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> ArchResult<()> {
        self.compiled().map(|_| ())
    }

    /// Check the version, then compile the import scope and every rule once
    pub fn compiled(&self) -> ArchResult<CompiledConfig> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            return Err(ArchError::config(format!(
                "Unsupported configuration version: {}. Supported versions: {}",
                self.version,
                SUPPORTED_VERSIONS.join(", ")
            )));
        }

        Ok(CompiledConfig {
            import_scope: self.import_scope()?,
            registry: Arc::new(self.compile()?),
        })
    }

    /// Compiled `analyze.packages`
    ///
    /// A plain package name imports the package and all of its subpackages;
    /// entries using `..` or `*` are taken as written.
    pub fn import_scope(&self) -> ArchResult<Vec<PackageIdentifier>> {
        self.analyze
            .packages
            .iter()
            .map(|identifier| {
                let recursive = if identifier.contains("..") || identifier.contains('*') {
                    identifier.clone()
                } else {
                    format!("{identifier}..")
                };
                PackageIdentifier::parse(&recursive).map_err(ArchError::from)
            })
            .collect()
    }

    /// Compile every rule into a registry, failing on the first malformed rule
    pub fn compile(&self) -> ArchResult<RuleRegistry> {
        RuleRegistry::from_rules(
            self.rules
                .iter()
                .map(RuleConfig::compile)
                .collect::<ArchResult<Vec<_>>>()?,
        )
    }

    pub fn rule(&self, name: &str) -> Option<&RuleConfig> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    /// Convert to YAML for display
    pub fn to_yaml(&self) -> ArchResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| ArchError::config(format!("Failed to serialize config: {e}")))
    }

    /// Create a fingerprint of the configuration
    pub fn fingerprint(&self) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        // JSON keeps struct field order, so equal configurations hash equally
        match serde_json::to_string(self) {
            Ok(canonical) => canonical.hash(&mut hasher),
            Err(e) => {
                tracing::warn!("Failed to serialize config for fingerprint: {}", e);
                self.version.hash(&mut hasher);
                self.rules.len().hash(&mut hasher);
            }
        }

        format!("{:x}", hasher.finish())
    }
}

/// Validated configuration: import scope plus the shared, read-only registry
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    pub import_scope: Vec<PackageIdentifier>,
    pub registry: Arc<RuleRegistry>,
}

impl Default for ArchConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: ArchConfig,
}

impl ConfigBuilder {
    /// Create a builder with no rules and the whole model in scope
    pub fn new() -> Self {
        Self {
            config: ArchConfig {
                version: "1.0".to_string(),
                analyze: AnalyzeConfig::default(),
                rules: Vec::new(),
            },
        }
    }

    /// Start from the built-in rules
    pub fn from_defaults() -> Self {
        Self { config: ArchConfig::with_defaults() }
    }

    /// Add a package to the import scope
    pub fn analyze_package(mut self, identifier: impl Into<String>) -> Self {
        self.config.analyze.packages.push(identifier.into());
        self
    }

    pub fn rule(mut self, rule: RuleConfig) -> Self {
        self.config.rules.push(rule);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ArchResult<ArchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
