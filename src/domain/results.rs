//! Evaluation outcomes: violation events, per-rule results and run reports
//!
//! Architecture: Rich Domain Models - Results are aggregates with behavior, not just data
//! - RuleResult owns the ordered violation events produced for one rule
//! - EvaluationReport acts as the aggregate root for a whole run
//! - Pass/fail status is derived from the collected events, never stored separately

use crate::domain::model::Location;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered severity of a rule, used for reporting emphasis only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse a priority name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// One element's outcome for a rule's condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationEvent {
    /// Full name of the element the event is about
    pub subject: String,
    /// Element kind label (class, field, method, access, ...)
    pub subject_kind: String,
    /// Declaring location of the element
    pub location: Location,
    /// `false` marks a violation
    pub satisfied: bool,
    /// Human-readable explanation
    pub message: String,
}

impl ViolationEvent {
    /// Create a violation (an unsatisfied event)
    pub fn violation(
        subject: impl Into<String>,
        subject_kind: impl Into<String>,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            subject_kind: subject_kind.into(),
            location,
            satisfied: false,
            message: message.into(),
        }
    }

    /// Whether this event is a violation
    pub fn is_violation(&self) -> bool {
        !self.satisfied
    }
}

/// Final state of a rule after evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RuleStatus {
    Passed,
    Failed,
    /// Rule is declared `ignored`; it was never evaluated
    Skipped { reason: String },
    /// Evaluation was stopped before the population was exhausted
    Cancelled { reason: String },
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped { .. } => "skipped",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

/// Aggregated outcome of evaluating one rule against one model
///
/// Equality compares the outcome only; `execution_time_ms` is ignored so that
/// repeated evaluations of the same rule and model compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_name: String,
    /// Rule text, e.g. "no members should be annotated with type in x.y.."
    pub description: String,
    pub priority: Priority,
    pub status: RuleStatus,
    /// Violations in the order the evaluator produced them
    pub violations: Vec<ViolationEvent>,
    /// Number of elements the condition was checked against
    pub checked_elements: usize,
    pub execution_time_ms: u64,
}

impl PartialEq for RuleResult {
    fn eq(&self, other: &Self) -> bool {
        self.rule_name == other.rule_name
            && self.description == other.description
            && self.priority == other.priority
            && self.status == other.status
            && self.violations == other.violations
            && self.checked_elements == other.checked_elements
    }
}

impl Eq for RuleResult {}

impl RuleResult {
    /// Build a result from collected violations; status is derived from them
    pub fn evaluated(
        rule_name: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
        violations: Vec<ViolationEvent>,
        checked_elements: usize,
    ) -> Self {
        let status = if violations.is_empty() { RuleStatus::Passed } else { RuleStatus::Failed };
        Self {
            rule_name: rule_name.into(),
            description: description.into(),
            priority,
            status,
            violations,
            checked_elements,
            execution_time_ms: 0,
        }
    }

    /// Result for a rule that was not evaluated because it is ignored
    pub fn skipped(
        rule_name: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            description: description.into(),
            priority,
            status: RuleStatus::Skipped { reason: reason.into() },
            violations: Vec::new(),
            checked_elements: 0,
            execution_time_ms: 0,
        }
    }

    /// Mark the result as cancelled, keeping whatever was collected so far
    pub fn cancel(mut self, reason: impl Into<String>) -> Self {
        self.status = RuleStatus::Cancelled { reason: reason.into() };
        self
    }

    pub fn with_execution_time(mut self, duration_ms: u64) -> Self {
        self.execution_time_ms = duration_ms;
        self
    }

    pub fn passed(&self) -> bool {
        self.status == RuleStatus::Passed
    }

    pub fn failed(&self) -> bool {
        self.status == RuleStatus::Failed
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, RuleStatus::Skipped { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.status, RuleStatus::Cancelled { .. })
    }

    /// Violation messages in evaluator order
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.violations.iter().map(|v| v.message.as_str())
    }
}

/// Count of rules by outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCounts {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
}

impl RuleCounts {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.cancelled
    }

    pub fn add(&mut self, status: &RuleStatus) {
        match status {
            RuleStatus::Passed => self.passed += 1,
            RuleStatus::Failed => self.failed += 1,
            RuleStatus::Skipped { .. } => self.skipped += 1,
            RuleStatus::Cancelled { .. } => self.cancelled += 1,
        }
    }
}

/// Count of violations by the priority of the rule that produced them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ViolationCounts {
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }

    pub fn add(&mut self, priority: Priority, count: usize) {
        match priority {
            Priority::High => self.high += count,
            Priority::Medium => self.medium += count,
            Priority::Low => self.low += count,
        }
    }
}

/// Summary statistics for an evaluation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub rules: RuleCounts,
    pub violations: ViolationCounts,
    /// Number of classes in the evaluated model
    pub total_classes: usize,
    pub execution_time_ms: u64,
    pub evaluated_at: DateTime<Utc>,
}

/// Complete report for one run: every rule result plus metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Results in registry order
    pub results: Vec<RuleResult>,
    pub summary: EvaluationSummary,
    /// Unique identifier of this run
    pub run_id: String,
    /// SHA-256 of the evaluated model snapshot
    pub model_fingerprint: Option<String>,
    /// Fingerprint of the configuration the rules came from
    pub config_fingerprint: Option<String>,
}

impl EvaluationReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            summary: EvaluationSummary { evaluated_at: Utc::now(), ..Default::default() },
            run_id: uuid::Uuid::new_v4().to_string(),
            model_fingerprint: None,
            config_fingerprint: None,
        }
    }

    /// Add a rule result to the report
    pub fn add_result(&mut self, result: RuleResult) {
        self.summary.rules.add(&result.status);
        self.summary.violations.add(result.priority, result.violations.len());
        self.results.push(result);
    }

    /// Whether the run as a whole failed: a non-skipped rule failed or was cancelled
    pub fn is_failure(&self) -> bool {
        self.results.iter().any(|r| r.failed() || r.is_cancelled())
    }

    /// Whether any rule reported violations
    pub fn has_violations(&self) -> bool {
        self.summary.violations.total() > 0
    }

    pub fn result(&self, rule_name: &str) -> Option<&RuleResult> {
        self.results.iter().find(|r| r.rule_name == rule_name)
    }

    pub fn failed_rules(&self) -> impl Iterator<Item = &RuleResult> {
        self.results.iter().filter(|r| r.failed())
    }

    pub fn set_total_classes(&mut self, count: usize) {
        self.summary.total_classes = count;
    }

    pub fn set_execution_time(&mut self, duration_ms: u64) {
        self.summary.execution_time_ms = duration_ms;
    }

    pub fn set_model_fingerprint(&mut self, fingerprint: impl Into<String>) {
        self.model_fingerprint = Some(fingerprint.into());
    }

    pub fn set_config_fingerprint(&mut self, fingerprint: impl Into<String>) {
        self.config_fingerprint = Some(fingerprint.into());
    }
}

impl Default for EvaluationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Error types that can abort a run
///
/// Violations are not errors; they are always collected into [`RuleResult`]s.
#[derive(Debug, thiserror::Error)]
pub enum ArchError {
    /// A back-reference in the model does not resolve; the loader is broken
    #[error("Model integrity error: {message}")]
    ModelIntegrity { message: String },

    /// A rule is malformed (unknown transformer/condition, bad regex or package)
    #[error("Rule configuration error in {context}: {message}")]
    RuleConfiguration { context: String, message: String },

    /// Configuration file could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Model snapshot could not be read or decoded
    #[error("Load error in {path}: {message}")]
    Load { path: String, message: String },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Report could not be rendered
    #[error("Report error: {message}")]
    Report { message: String },
}

impl ArchError {
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::ModelIntegrity { message: message.into() }
    }

    /// Configuration error for the named rule
    pub fn rule_config(rule: &str, message: impl Into<String>) -> Self {
        Self::RuleConfiguration { context: format!("rule '{rule}'"), message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load { path: path.into(), message: message.into() }
    }

    pub fn report(message: impl Into<String>) -> Self {
        Self::Report { message: message.into() }
    }
}

/// Result type for archcheck operations
pub type ArchResult<T> = Result<T, ArchError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(message: &str) -> ViolationEvent {
        ViolationEvent::violation(
            "org.example.Foo.id",
            "field",
            Location::new("Foo.java", 0),
            message,
        )
    }

    #[test]
    fn test_result_status_derived_from_violations() {
        let passing = RuleResult::evaluated("r", "no classes should x", Priority::Low, vec![], 3);
        assert!(passing.passed());
        assert_eq!(passing.checked_elements, 3);

        let failing = RuleResult::evaluated(
            "r",
            "no classes should x",
            Priority::Low,
            vec![violation("first"), violation("second")],
            3,
        );
        assert!(failing.failed());
        assert_eq!(failing.messages().collect::<Vec<_>>(), vec!["first", "second"]);
    }

    #[test]
    fn test_skipped_rule_never_fails_report() {
        let mut report = EvaluationReport::new();
        report.add_result(RuleResult::skipped("r", "d", Priority::Low, "pending decision"));

        assert!(!report.is_failure());
        assert_eq!(report.summary.rules.skipped, 1);
        assert!(matches!(
            &report.results[0].status,
            RuleStatus::Skipped { reason } if reason == "pending decision"
        ));
    }

    #[test]
    fn test_report_counts() {
        let mut report = EvaluationReport::new();
        report.add_result(RuleResult::evaluated("a", "d", Priority::High, vec![violation("m")], 1));
        report.add_result(RuleResult::evaluated("b", "d", Priority::Low, vec![], 1));
        report.add_result(
            RuleResult::evaluated("c", "d", Priority::Medium, vec![], 0).cancel("timed out"),
        );

        assert!(report.is_failure());
        assert!(report.has_violations());
        assert_eq!(report.summary.rules.total(), 3);
        assert_eq!(report.summary.rules.cancelled, 1);
        assert_eq!(report.summary.violations.high, 1);
        assert_eq!(report.failed_rules().count(), 1);
        assert!(report.result("b").is_some_and(|r| r.passed()));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert_eq!(Priority::parse("MEDIUM"), Some(Priority::Medium));
        assert_eq!(Priority::parse("urgent"), None);
    }
}
