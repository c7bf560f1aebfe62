//! archcheck - Architecture rule evaluation over compiled class models
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure domain logic separated from loading and presentation concerns
//! - Rules are compiled once into an immutable registry before any evaluation
//! - Test-runner integration evaluates a rule and fails loudly on violations

pub mod conditions;
pub mod config;
pub mod domain;
pub mod engine;
pub mod loader;
pub mod predicates;
pub mod report;
pub mod transform;

// Re-export main types for convenient access
pub use domain::element::{Element, ElementKind};
pub use domain::model::{
    AccessEdge, AccessKind, AnnotationInstance, ClassElement, ElementRef, Location, MemberElement,
    MemberKind, MemberRef, Model, ModelBuilder, ModelStats,
};
pub use domain::results::{
    ArchError, ArchResult, EvaluationReport, EvaluationSummary, Priority, RuleResult, RuleStatus,
    ViolationEvent,
};

pub use conditions::{Condition, ConditionEvent};
pub use config::{
    ArchConfig, CompiledConfig, ConditionConfig, ConfigBuilder, PredicateConfig, RuleConfig,
};
pub use engine::{
    evaluate_rule, EvaluationOptions, Polarity, RegistryStats, RuleBuilder, RuleEngine,
    RuleRegistry, RuleSpec,
};
pub use loader::{JsonSnapshotLoader, ModelLoader, Snapshot};
pub use predicates::{PackageIdentifier, Predicate};
pub use report::{OutputFormat, ReportFormatter, ReportOptions};
pub use transform::Transformer;

use std::path::Path;

/// High-level checker: configuration, compiled rules and report formatting
pub struct ArchChecker {
    config: ArchConfig,
    engine: RuleEngine,
    import_scope: Vec<PackageIdentifier>,
    report_formatter: ReportFormatter,
}

impl ArchChecker {
    /// Create a checker, compiling every rule of the configuration
    pub fn new_with_config(config: ArchConfig) -> ArchResult<Self> {
        let CompiledConfig { import_scope, registry } = config.compiled()?;
        let engine = RuleEngine::new(registry).with_config_fingerprint(config.fingerprint());

        Ok(Self { config, engine, import_scope, report_formatter: ReportFormatter::default() })
    }

    /// Create a checker with the built-in rules
    pub fn new() -> ArchResult<Self> {
        Self::new_with_config(ArchConfig::default())
    }

    /// Create a checker loading configuration from file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> ArchResult<Self> {
        Self::new_with_config(ArchConfig::read_from_file(path)?)
    }

    /// Set custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.report_formatter = formatter;
        self
    }

    pub fn config(&self) -> &ArchConfig {
        &self.config
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Restrict a model to the configured import scope
    pub fn scoped_model(&self, model: &Model) -> Model {
        model.retain_packages(&self.import_scope)
    }

    /// Evaluate every configured rule against a model
    pub fn check_model(&self, model: &Model, options: &EvaluationOptions) -> ArchResult<EvaluationReport> {
        let scoped = self.scoped_model(model);
        self.engine.evaluate_all(&scoped, options)
    }

    /// Load a snapshot file or directory and evaluate every configured rule
    pub fn check_snapshot<P: AsRef<Path>>(
        &self,
        path: P,
        options: &EvaluationOptions,
    ) -> ArchResult<EvaluationReport> {
        let model = JsonSnapshotLoader::new(path)?.load()?;
        self.check_model(&model, options)
    }

    /// Format an evaluation report for output
    pub fn format_report(&self, report: &EvaluationReport, format: OutputFormat) -> ArchResult<String> {
        self.report_formatter.format_report(report, format)
    }

    /// Get statistics about the compiled rules
    pub fn rule_statistics(&self) -> RegistryStats {
        self.engine.registry_stats()
    }
}

/// Convenience function to evaluate a snapshot with the built-in rules
pub fn check_snapshot<P: AsRef<Path>>(path: P) -> ArchResult<EvaluationReport> {
    ArchChecker::new()?.check_snapshot(path, &EvaluationOptions::default())
}

/// Test-runner integration
pub mod runner {
    use super::*;

    /// Evaluate a rule and panic with every violation message if it fails
    ///
    /// Ignored rules never panic.
    ///
    /// # Panics
    ///
    /// When the rule reports violations or is cancelled.
    pub fn assert_rule(model: &Model, rule: &RuleSpec) {
        let result = evaluate_rule(model, rule);
        if result.failed() || result.is_cancelled() {
            panic!("{}", failure_message(&result));
        }
    }

    /// Evaluate every rule of a registry, panicking on the first failure
    ///
    /// # Panics
    ///
    /// When any non-ignored rule reports violations.
    pub fn assert_registry(model: &Model, registry: &RuleRegistry) {
        for rule in registry.rules() {
            assert_rule(model, rule);
        }
    }

    /// Assertion text in the conventional layout: header plus one line per violation
    pub fn failure_message(result: &RuleResult) -> String {
        let mut message = format!(
            "Architecture Violation [Priority: {}] - Rule '{}' was violated ({} times):",
            result.priority.as_str().to_uppercase(),
            result.description,
            result.violations.len()
        );
        if let RuleStatus::Cancelled { reason } = &result.status {
            message.push_str(&format!("\nevaluation cancelled: {reason}"));
        }
        for line in result.messages() {
            message.push('\n');
            message.push_str(line);
        }
        message
    }
}
