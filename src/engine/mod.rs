//! Rule engine: evaluates registered rules against a model snapshot
//!
//! CDD Principle: Domain Services - RuleEngine orchestrates population, filtering and conditions
//! - Rules read an immutable model and write only to their own result
//! - Independent rules are evaluated in parallel; results keep registry order
//! - A rule may be cancelled on timeout without affecting any other rule

pub mod rule;

pub use rule::{Polarity, RegistryStats, RuleBuilder, RuleRegistry, RuleSpec};

use crate::conditions::ConditionEvent;
use crate::domain::element::Element;
use crate::domain::model::Model;
use crate::domain::results::{ArchError, ArchResult, EvaluationReport, RuleResult, ViolationEvent};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Options for customizing an evaluation run
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
    /// Whether to evaluate rules in parallel
    pub parallel: bool,
    /// Deadline for each individual rule
    pub rule_timeout: Option<Duration>,
    /// Evaluate only these rules (empty = all)
    pub only: Vec<String>,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self { parallel: true, rule_timeout: None, only: Vec::new() }
    }
}

/// Evaluate one rule against a model
pub fn evaluate_rule(model: &Model, rule: &RuleSpec) -> RuleResult {
    evaluate_with_deadline(model, rule, None)
}

/// Evaluate one rule, cancelling it when the timeout elapses
pub fn evaluate_rule_with_timeout(model: &Model, rule: &RuleSpec, timeout: Duration) -> RuleResult {
    evaluate_with_deadline(model, rule, Some(timeout))
}

fn evaluate_with_deadline(model: &Model, rule: &RuleSpec, timeout: Option<Duration>) -> RuleResult {
    let start_time = Instant::now();
    let text = rule.text();

    if let Some(reason) = &rule.ignored {
        tracing::warn!("Skipping ignored rule '{}': {}", rule.name, reason);
        return RuleResult::skipped(&rule.name, text, rule.priority, reason.clone());
    }

    let deadline = timeout.map(|limit| start_time + limit);
    let mut violations = Vec::new();
    let mut checked = 0usize;

    for element in rule.transformer.apply(model) {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            let limit_ms = timeout.map(|t| t.as_millis()).unwrap_or_default();
            tracing::warn!(
                "Rule '{}' cancelled after checking {} elements (timeout {}ms)",
                rule.name,
                checked,
                limit_ms
            );
            return RuleResult::evaluated(&rule.name, text, rule.priority, violations, checked)
                .cancel(format!("exceeded timeout of {limit_ms}ms"))
                .with_execution_time(start_time.elapsed().as_millis() as u64);
        }

        if !in_scope(rule, &element) {
            continue;
        }

        checked += 1;
        let events = rule.condition.check(model, &element);
        collect_violations(rule.polarity, &element, events, &mut violations);
    }

    tracing::debug!(
        "Rule '{}' checked {} elements, {} violations",
        rule.name,
        checked,
        violations.len()
    );

    RuleResult::evaluated(&rule.name, text, rule.priority, violations, checked)
        .with_execution_time(start_time.elapsed().as_millis() as u64)
}

/// Rule-level package scope and `that` filter
fn in_scope(rule: &RuleSpec, element: &Element<'_>) -> bool {
    let in_package = rule.scope.as_ref().map_or(true, |scope| scope.matches(element.package()));
    in_package && rule.that.as_ref().map_or(true, |that| that.test(element))
}

/// Apply polarity: events that hold are violations of "no X should", and
/// an element with no holding event violates "all X should"
fn collect_violations(
    polarity: Polarity,
    element: &Element<'_>,
    events: Vec<ConditionEvent>,
    violations: &mut Vec<ViolationEvent>,
) {
    let offending: Vec<ConditionEvent> = match polarity {
        Polarity::ShouldNot => events.into_iter().filter(|event| event.holds).collect(),
        Polarity::Should if events.iter().any(|event| event.holds) => Vec::new(),
        Polarity::Should => events,
    };

    if offending.is_empty() {
        return;
    }

    let subject = element.full_name().into_owned();
    let location = element.location();
    for event in offending {
        violations.push(ViolationEvent::violation(
            subject.clone(),
            element.kind_label(),
            location.clone(),
            event.message,
        ));
    }
}

/// Evaluates every registered rule against model snapshots
#[derive(Debug, Clone)]
pub struct RuleEngine {
    registry: Arc<RuleRegistry>,
    config_fingerprint: Option<String>,
}

impl RuleEngine {
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self { registry, config_fingerprint: None }
    }

    /// Record the fingerprint of the configuration the registry was built from
    pub fn with_config_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.config_fingerprint = Some(fingerprint.into());
        self
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Evaluate the named rule
    pub fn evaluate_rule(&self, model: &Model, name: &str) -> ArchResult<RuleResult> {
        let rule = self
            .registry
            .get(name)
            .ok_or_else(|| ArchError::rule_config(name, "unknown rule"))?;
        Ok(evaluate_rule(model, rule))
    }

    /// Evaluate all selected rules and assemble a report in registry order
    pub fn evaluate_all(&self, model: &Model, options: &EvaluationOptions) -> ArchResult<EvaluationReport> {
        let start_time = Instant::now();
        let rules = self.select_rules(options)?;

        tracing::debug!(
            "Evaluating {} rules against {} classes (parallel: {})",
            rules.len(),
            model.len(),
            options.parallel
        );

        let evaluate = |rule: &&RuleSpec| evaluate_with_deadline(model, rule, options.rule_timeout);
        let results: Vec<RuleResult> = if options.parallel && rules.len() > 1 {
            rules.par_iter().map(evaluate).collect()
        } else {
            rules.iter().map(evaluate).collect()
        };

        let mut report = EvaluationReport::new();
        for result in results {
            report.add_result(result);
        }

        report.set_total_classes(model.len());
        report.set_model_fingerprint(model.fingerprint()?);
        if let Some(fingerprint) = &self.config_fingerprint {
            report.set_config_fingerprint(fingerprint.clone());
        }
        report.set_execution_time(start_time.elapsed().as_millis() as u64);

        let counts = &report.summary.rules;
        tracing::info!(
            "Evaluated {} rules: {} passed, {} failed, {} skipped, {} cancelled",
            counts.total(),
            counts.passed,
            counts.failed,
            counts.skipped,
            counts.cancelled
        );

        Ok(report)
    }

    fn select_rules(&self, options: &EvaluationOptions) -> ArchResult<Vec<&RuleSpec>> {
        if options.only.is_empty() {
            return Ok(self.registry.rules().iter().collect());
        }

        if let Some(unknown) = options.only.iter().find(|name| self.registry.get(name).is_none()) {
            return Err(ArchError::rule_config(unknown, "unknown rule"));
        }

        Ok(self
            .registry
            .rules()
            .iter()
            .filter(|rule| options.only.contains(&rule.name))
            .collect())
    }

    pub fn registry_stats(&self) -> RegistryStats {
        self.registry.stats()
    }
}
