//! Report generation with multiple output formats
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - EvaluationReport (domain) is converted to various external representations
//! - Each formatter encapsulates the rules for its specific output format
//! - Violation messages keep the order the evaluator produced them in

use crate::domain::results::{
    ArchError, ArchResult, EvaluationReport, Priority, RuleResult, RuleStatus, ViolationEvent,
};
use serde_json::Value as JsonValue;
use std::io::Write;

/// Supported output formats for evaluation reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format with colors
    Human,
    /// JSON format for programmatic consumption
    Json,
    /// JUnit XML format for CI/CD integration
    Junit,
    /// GitHub Actions workflow annotations
    GitHub,
}

impl OutputFormat {
    /// Parse format from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            "junit" => Some(Self::Junit),
            "github" => Some(Self::GitHub),
            _ => None,
        }
    }

    /// Get all available format names
    pub fn all_formats() -> &'static [&'static str] {
        &["human", "json", "junit", "github"]
    }
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (for human format)
    pub use_colors: bool,
    /// Whether passing rules are listed
    pub show_passed: bool,
    /// Rules below this priority are not rendered; run status is unaffected
    pub min_priority: Option<Priority>,
    /// Maximum number of messages rendered per rule
    pub max_violations_per_rule: Option<usize>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            use_colors: true,
            show_passed: false,
            min_priority: None,
            max_violations_per_rule: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Red,
    Green,
    Yellow,
    Cyan,
    Dim,
    Bold,
}

#[cfg(feature = "colors")]
fn paint(text: &str, tone: Tone, enabled: bool) -> String {
    use colored::Colorize;

    if !enabled {
        return text.to_string();
    }
    match tone {
        Tone::Red => text.red().to_string(),
        Tone::Green => text.green().to_string(),
        Tone::Yellow => text.yellow().to_string(),
        Tone::Cyan => text.cyan().to_string(),
        Tone::Dim => text.dimmed().to_string(),
        Tone::Bold => text.bold().to_string(),
    }
}

#[cfg(not(feature = "colors"))]
fn paint(text: &str, _tone: Tone, _enabled: bool) -> String {
    text.to_string()
}

fn priority_tone(priority: Priority) -> Tone {
    match priority {
        Priority::High => Tone::Red,
        Priority::Medium => Tone::Yellow,
        Priority::Low => Tone::Cyan,
    }
}

/// Main report formatter that dispatches to specific formatters
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    /// Create a new report formatter with options
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    /// Format an evaluation report in the specified format
    pub fn format_report(&self, report: &EvaluationReport, format: OutputFormat) -> ArchResult<String> {
        let results = self.filter_results(&report.results);

        match format {
            OutputFormat::Human => Ok(self.format_human(report, &results)),
            OutputFormat::Json => self.format_json(report, &results),
            OutputFormat::Junit => Ok(self.format_junit(report, &results)),
            OutputFormat::GitHub => Ok(self.format_github(&results)),
        }
    }

    /// Write a formatted report to a writer
    pub fn write_report<W: Write>(
        &self,
        report: &EvaluationReport,
        format: OutputFormat,
        mut writer: W,
    ) -> ArchResult<()> {
        let formatted = self.format_report(report, format)?;
        writer.write_all(formatted.as_bytes())?;
        Ok(())
    }

    /// Results at or above the minimum priority, in report order
    fn filter_results<'a>(&self, results: &'a [RuleResult]) -> Vec<&'a RuleResult> {
        results
            .iter()
            .filter(|r| self.options.min_priority.map_or(true, |min| r.priority >= min))
            .collect()
    }

    /// Violations of one rule, limited by options
    fn shown_violations<'a>(&self, result: &'a RuleResult) -> &'a [ViolationEvent] {
        match self.options.max_violations_per_rule {
            Some(max) if max < result.violations.len() => &result.violations[..max],
            _ => &result.violations,
        }
    }

    /// Format report in human-readable format
    fn format_human(&self, report: &EvaluationReport, results: &[&RuleResult]) -> String {
        let colors = self.options.use_colors;
        let mut output = String::new();

        if results.iter().any(|r| r.failed() || r.is_cancelled()) {
            output.push_str(&format!("❌ {}\n\n", paint("Architecture Violations Found", Tone::Red, colors)));
        } else {
            output.push_str(&format!("✅ {}\n\n", paint("All architecture rules passed", Tone::Green, colors)));
        }

        for result in results {
            match &result.status {
                RuleStatus::Failed => {
                    output.push_str(&format!(
                        "{} [{}]\n",
                        paint(&result.rule_name, Tone::Bold, colors),
                        paint(result.priority.as_str(), priority_tone(result.priority), colors)
                    ));
                    output.push_str(&format!("  {}\n", paint(&result.description, Tone::Dim, colors)));

                    let shown = self.shown_violations(result);
                    for violation in shown {
                        output.push_str(&format!("  - {}\n", violation.message));
                    }
                    let hidden = result.violations.len() - shown.len();
                    if hidden > 0 {
                        output.push_str(&format!("  ... and {hidden} more\n"));
                    }
                    output.push('\n');
                }
                RuleStatus::Cancelled { reason } => {
                    output.push_str(&format!(
                        "{} [{}] cancelled (reason: {})\n",
                        paint(&result.rule_name, Tone::Bold, colors),
                        result.priority.as_str(),
                        reason
                    ));
                    output.push_str(&format!("  {}\n\n", paint(&result.description, Tone::Dim, colors)));
                }
                RuleStatus::Skipped { reason } => {
                    output.push_str(&format!(
                        "{} skipped (reason: {})\n\n",
                        paint(&result.rule_name, Tone::Dim, colors),
                        reason
                    ));
                }
                RuleStatus::Passed if self.options.show_passed => {
                    output.push_str(&format!(
                        "{} passed ({} elements checked)\n\n",
                        paint(&result.rule_name, Tone::Green, colors),
                        result.checked_elements
                    ));
                }
                RuleStatus::Passed => {}
            }
        }

        output.push_str(&self.format_summary(report));
        output
    }

    /// Format report in JSON format
    fn format_json(&self, report: &EvaluationReport, results: &[&RuleResult]) -> ArchResult<String> {
        let json_results: Vec<JsonValue> = results
            .iter()
            .map(|r| {
                let reason = match &r.status {
                    RuleStatus::Skipped { reason } | RuleStatus::Cancelled { reason } => Some(reason),
                    _ => None,
                };
                let violations: Vec<JsonValue> = self
                    .shown_violations(r)
                    .iter()
                    .map(|v| {
                        serde_json::json!({
                            "subject": v.subject,
                            "kind": v.subject_kind,
                            "file": v.location.file,
                            "line": v.location.line,
                            "message": v.message
                        })
                    })
                    .collect();

                serde_json::json!({
                    "rule": r.rule_name,
                    "description": r.description,
                    "priority": r.priority.as_str(),
                    "status": r.status.as_str(),
                    "reason": reason,
                    "checked_elements": r.checked_elements,
                    "violation_count": r.violations.len(),
                    "violations": violations,
                    "execution_time_ms": r.execution_time_ms
                })
            })
            .collect();

        let summary = &report.summary;
        let json_report = serde_json::json!({
            "run_id": report.run_id,
            "results": json_results,
            "summary": {
                "rules": {
                    "total": summary.rules.total(),
                    "passed": summary.rules.passed,
                    "failed": summary.rules.failed,
                    "skipped": summary.rules.skipped,
                    "cancelled": summary.rules.cancelled
                },
                "violations_by_priority": {
                    "high": summary.violations.high,
                    "medium": summary.violations.medium,
                    "low": summary.violations.low
                },
                "total_classes": summary.total_classes,
                "execution_time_ms": summary.execution_time_ms,
                "evaluated_at": summary.evaluated_at.to_rfc3339()
            },
            "failed": report.is_failure(),
            "model_fingerprint": report.model_fingerprint,
            "config_fingerprint": report.config_fingerprint
        });

        serde_json::to_string_pretty(&json_report)
            .map_err(|e| ArchError::report(format!("JSON serialization failed: {e}")))
    }

    /// Format report in JUnit XML format, one testcase per rule
    fn format_junit(&self, report: &EvaluationReport, results: &[&RuleResult]) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        let failures = results.iter().filter(|r| r.failed()).count();
        let errors = results.iter().filter(|r| r.is_cancelled()).count();
        let skipped = results.iter().filter(|r| r.is_skipped()).count();
        let execution_time = (report.summary.execution_time_ms as f64) / 1000.0;

        xml.push_str(&format!(
            "<testsuite name=\"archcheck\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\" time=\"{:.3}\">\n",
            results.len(),
            failures,
            errors,
            skipped,
            execution_time
        ));

        for result in results {
            xml.push_str(&format!(
                "  <testcase classname=\"archcheck.{}\" name=\"{}\" time=\"{:.3}\">\n",
                result.priority.as_str(),
                escape_xml(&result.rule_name),
                (result.execution_time_ms as f64) / 1000.0
            ));

            match &result.status {
                RuleStatus::Failed => {
                    xml.push_str(&format!(
                        "    <failure message=\"{}\">\n",
                        escape_xml(&result.description)
                    ));
                    for violation in self.shown_violations(result) {
                        xml.push_str(&format!("      {}\n", escape_xml(&violation.message)));
                    }
                    xml.push_str("    </failure>\n");
                }
                RuleStatus::Cancelled { reason } => {
                    xml.push_str(&format!("    <error message=\"{}\"/>\n", escape_xml(reason)));
                }
                RuleStatus::Skipped { reason } => {
                    xml.push_str(&format!("    <skipped message=\"{}\"/>\n", escape_xml(reason)));
                }
                RuleStatus::Passed => {}
            }

            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }

    /// Format report for GitHub Actions
    fn format_github(&self, results: &[&RuleResult]) -> String {
        let mut output = String::new();

        for result in results {
            let level = match result.priority {
                Priority::High => "error",
                Priority::Medium => "warning",
                Priority::Low => "notice",
            };

            match &result.status {
                RuleStatus::Failed => {
                    for violation in self.shown_violations(result) {
                        output.push_str(&format!(
                            "::{} file={},line={},title={}::{}\n",
                            level,
                            escape_workflow_property(&violation.location.file),
                            violation.location.line,
                            escape_workflow_property(&result.rule_name),
                            escape_workflow_data(&violation.message)
                        ));
                    }
                }
                RuleStatus::Cancelled { reason } => {
                    output.push_str(&format!(
                        "::error title={}::rule cancelled (reason: {})\n",
                        escape_workflow_property(&result.rule_name),
                        escape_workflow_data(reason)
                    ));
                }
                RuleStatus::Skipped { .. } | RuleStatus::Passed => {}
            }
        }

        output
    }

    /// Format the summary section
    fn format_summary(&self, report: &EvaluationReport) -> String {
        let colors = self.options.use_colors;
        let rules = &report.summary.rules;
        let violations = report.summary.violations.total();
        let execution_time = (report.summary.execution_time_ms as f64) / 1000.0;

        let mut parts = vec![format!("{} passed", rules.passed)];
        if rules.failed > 0 {
            parts.push(paint(&format!("{} failed", rules.failed), Tone::Red, colors));
        }
        if rules.skipped > 0 {
            parts.push(format!("{} skipped", rules.skipped));
        }
        if rules.cancelled > 0 {
            parts.push(paint(&format!("{} cancelled", rules.cancelled), Tone::Yellow, colors));
        }

        format!(
            "{} {} rule{} ({}), {} violation{} in {} classes ({:.1}s)\n",
            paint("Summary:", Tone::Bold, colors),
            rules.total(),
            if rules.total() == 1 { "" } else { "s" },
            parts.join(", "),
            violations,
            if violations == 1 { "" } else { "s" },
            report.summary.total_classes,
            execution_time
        )
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(ReportOptions::default())
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Escape the message part of a workflow command
fn escape_workflow_data(s: &str) -> String {
    s.replace('%', "%25").replace('\r', "%0D").replace('\n', "%0A")
}

/// Escape a `key=value` property of a workflow command
fn escape_workflow_property(s: &str) -> String {
    escape_workflow_data(s).replace(':', "%3A").replace(',', "%2C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Location;

    fn violation(message: &str) -> ViolationEvent {
        ViolationEvent::violation(
            "org.superbiz.servlet.JpaBean.id",
            "field",
            Location::new("JpaBean.java", 36),
            message,
        )
    }

    fn create_test_report() -> EvaluationReport {
        let mut report = EvaluationReport::new();
        report.add_result(RuleResult::evaluated(
            "no_persistence_annotations_on_members",
            "no members should be annotated with type in javax.persistence..",
            Priority::Medium,
            vec![
                violation("field org.superbiz.servlet.JpaBean.id is annotated with [@javax.persistence.Id] in (JpaBean.java:36)"),
                violation("field org.superbiz.servlet.JpaBean.name is annotated with [@javax.persistence.Column] in (JpaBean.java:40)"),
            ],
            5,
        ));
        report.add_result(RuleResult::evaluated("no_jws_web_service", "no classes should x", Priority::Medium, vec![], 2));
        report.add_result(RuleResult::skipped(
            "no_persistence_at_all",
            "no classes should access classes that resides in package javax.persistence..",
            Priority::Low,
            "pending decision",
        ));
        report.set_total_classes(2);
        report.set_execution_time(1200);
        report
    }

    fn plain() -> ReportOptions {
        ReportOptions { use_colors: false, ..Default::default() }
    }

    #[test]
    fn test_human_format() {
        let output = ReportFormatter::new(plain())
            .format_report(&create_test_report(), OutputFormat::Human)
            .unwrap();

        assert!(output.contains("Architecture Violations Found"));
        assert!(output.contains("no_persistence_annotations_on_members [medium]"));
        assert!(output.contains("no_persistence_at_all skipped (reason: pending decision)"));
        assert!(!output.contains("no_jws_web_service"));
        assert!(output.contains("Summary: 3 rules (1 passed, 1 failed, 1 skipped), 2 violations in 2 classes"));

        let id = output.find("JpaBean.id").unwrap();
        let name = output.find("JpaBean.name").unwrap();
        assert!(id < name);
    }

    #[test]
    fn test_human_format_passing_run() {
        let mut report = EvaluationReport::new();
        report.add_result(RuleResult::evaluated("r", "d", Priority::High, vec![], 0));

        let output = ReportFormatter::new(ReportOptions { show_passed: true, ..plain() })
            .format_report(&report, OutputFormat::Human)
            .unwrap();
        assert!(output.contains("All architecture rules passed"));
        assert!(output.contains("r passed (0 elements checked)"));
    }

    #[test]
    fn test_max_violations_per_rule() {
        let output = ReportFormatter::new(ReportOptions { max_violations_per_rule: Some(1), ..plain() })
            .format_report(&create_test_report(), OutputFormat::Human)
            .unwrap();
        assert!(output.contains("... and 1 more"));
        assert!(!output.contains("JpaBean.name"));
    }

    #[test]
    fn test_json_format() {
        let output = ReportFormatter::default()
            .format_report(&create_test_report(), OutputFormat::Json)
            .unwrap();

        let json: JsonValue = serde_json::from_str(&output).unwrap();
        assert_eq!(json["results"].as_array().unwrap().len(), 3);
        assert_eq!(json["results"][0]["status"], "failed");
        assert_eq!(json["results"][0]["violations"][0]["line"], 36);
        assert_eq!(json["results"][2]["reason"], "pending decision");
        assert_eq!(json["summary"]["rules"]["skipped"], 1);
        assert_eq!(json["failed"], true);
        assert!(json["run_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[test]
    fn test_junit_format() {
        let output = ReportFormatter::default()
            .format_report(&create_test_report(), OutputFormat::Junit)
            .unwrap();

        assert!(output.contains("<?xml version=\"1.0\""));
        assert!(output.contains("tests=\"3\" failures=\"1\" errors=\"0\" skipped=\"1\""));
        assert!(output.contains("<failure message=\"no members should be annotated with type in javax.persistence..\">"));
        assert!(output.contains("<skipped message=\"pending decision\"/>"));
    }

    #[test]
    fn test_github_format() {
        let output = ReportFormatter::default()
            .format_report(&create_test_report(), OutputFormat::GitHub)
            .unwrap();

        assert!(output.starts_with("::warning file=JpaBean.java,line=36,title=no_persistence_annotations_on_members::"));
        assert_eq!(output.lines().count(), 2);
    }

    #[test]
    fn test_github_format_escapes_workflow_values() {
        let mut report = EvaluationReport::new();
        report.add_result(RuleResult::evaluated(
            "rule:a,b",
            "no classes should x",
            Priority::High,
            vec![ViolationEvent::violation(
                "a.B",
                "class",
                Location::new("C:/src/B.java", 3),
                "100% wrong\nsecond line",
            )],
            1,
        ));
        report.add_result(
            RuleResult::evaluated("slow", "no classes should y", Priority::Low, vec![], 0)
                .cancel("exceeded\r\ntimeout"),
        );

        let output = ReportFormatter::default().format_report(&report, OutputFormat::GitHub).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                "::error file=C%3A/src/B.java,line=3,title=rule%3Aa%2Cb::100%25 wrong%0Asecond line",
                "::error title=slow::rule cancelled (reason: exceeded%0D%0Atimeout)",
            ]
        );
    }

    #[test]
    fn test_min_priority_filters_rendering_only() {
        let report = create_test_report();
        let output = ReportFormatter::new(ReportOptions { min_priority: Some(Priority::High), ..plain() })
            .format_report(&report, OutputFormat::Json)
            .unwrap();

        let json: JsonValue = serde_json::from_str(&output).unwrap();
        assert!(json["results"].as_array().unwrap().is_empty());
        assert_eq!(json["failed"], true);
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::parse("GitHub"), Some(OutputFormat::GitHub));
        assert_eq!(OutputFormat::parse("sarif"), None);
        for name in OutputFormat::all_formats() {
            assert!(OutputFormat::parse(name).is_some());
        }
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("<a & 'b'>"), "&lt;a &amp; &#39;b&#39;&gt;");
    }
}
