//! archcheck CLI - Command-line interface for architecture rule evaluation
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to rule evaluations over loaded snapshots
//! - Handles external concerns like file I/O, process exit codes, and terminal output
//! - Evaluation runs on the blocking pool so the async runtime stays responsive

use anyhow::{Context, Result};
use archcheck::config::CONFIG_FILE_NAMES;
use archcheck::loader::DEFAULT_FRAGMENT_PATTERN;
use archcheck::{
    ArchChecker, ArchConfig, EvaluationOptions, EvaluationReport, JsonSnapshotLoader, ModelLoader,
    OutputFormat, Priority, ReportFormatter, ReportOptions,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit code when every evaluated rule passed
const EXIT_PASSED: i32 = 0;
/// Exit code when at least one rule failed or was cancelled
const EXIT_VIOLATIONS: i32 = 1;
/// Exit code for configuration, load and I/O errors
const EXIT_ERROR: i32 = 2;

/// archcheck - Architecture rules over compiled class models
#[derive(Parser)]
#[command(name = "archcheck")]
#[command(version)]
#[command(about = "Evaluate architecture rules against a snapshot of compiled classes")]
#[command(long_about = "archcheck evaluates declarative architecture rules (\"no classes should be annotated with javax.jws.WebService\") against a class-graph snapshot and reports every violation with its source location. Designed for CI pipelines and test-runner integration.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate rules against a model snapshot
    Check(CheckArgs),

    /// Re-evaluate whenever the snapshot or configuration changes
    Watch {
        /// Snapshot file or directory of fragments
        model: PathBuf,

        /// Debounce delay in milliseconds
        #[arg(long, default_value = "500")]
        delay: u64,
    },

    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },

    /// Explain what a specific rule checks
    Explain {
        /// Rule name to explain
        rule: String,
    },

    /// List configured rules
    Rules {
        /// Also list ignored rules
        #[arg(long)]
        include_ignored: bool,
    },

    /// Print model statistics and fingerprint
    Model {
        /// Snapshot file or directory of fragments
        model: PathBuf,
    },
}

#[derive(Args, Clone)]
struct CheckArgs {
    /// Snapshot file or directory of fragments
    model: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormatArg,

    /// Minimum priority to report
    #[arg(short = 'p', long, value_enum)]
    min_priority: Option<PriorityArg>,

    /// Evaluate only the named rule (repeatable)
    #[arg(long = "rule", action = clap::ArgAction::Append)]
    rules: Vec<String>,

    /// Disable parallel rule evaluation
    #[arg(long)]
    no_parallel: bool,

    /// Cancel any rule running longer than this many milliseconds
    #[arg(long)]
    rule_timeout_ms: Option<u64>,

    /// List passing rules as well
    #[arg(long)]
    show_passed: bool,

    /// Maximum number of violations shown per rule
    #[arg(long)]
    max_violations: Option<usize>,
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Human,
    Json,
    Junit,
    Github,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Junit => OutputFormat::Junit,
            OutputFormatArg::Github => OutputFormat::GitHub,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum PriorityArg {
    Low,
    Medium,
    High,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Priority::Low,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::High => Priority::High,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    match run_command(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(EXIT_ERROR);
        }
    }
}

async fn run_command(cli: Cli) -> Result<i32> {
    let use_colors = !cli.no_color;
    match cli.command {
        Commands::Check(args) => run_check(cli.config, args, use_colors).await,
        Commands::Watch { model, delay } => {
            let config = cli.config;
            tokio::task::spawn_blocking(move || run_watch(config, model, delay, use_colors))
                .await
                .context("Watch task terminated unexpectedly")?
        }
        Commands::ValidateConfig { config_file } => run_validate_config(config_file.or(cli.config)),
        Commands::Explain { rule } => run_explain(cli.config, &rule),
        Commands::Rules { include_ignored } => run_list_rules(cli.config, include_ignored),
        Commands::Model { model } => run_model(cli.config, model).await,
    }
}

/// Locate and parse the configuration; rules are compiled by the caller
fn load_config(config_path: Option<&Path>) -> Result<ArchConfig> {
    let config = ArchConfig::resolve(config_path, Path::new("."))
        .context("Failed to load configuration")?;
    Ok(config)
}

fn build_checker(config: ArchConfig, report_options: ReportOptions) -> Result<ArchChecker> {
    let checker = ArchChecker::new_with_config(config)
        .context("Failed to compile rules")?
        .with_report_formatter(ReportFormatter::new(report_options));
    Ok(checker)
}

async fn run_check(config_path: Option<PathBuf>, args: CheckArgs, use_colors: bool) -> Result<i32> {
    let config = load_config(config_path.as_deref())?;
    let checker = Arc::new(build_checker(
        config,
        ReportOptions {
            use_colors,
            show_passed: args.show_passed,
            min_priority: args.min_priority.map(Into::into),
            max_violations_per_rule: args.max_violations,
        },
    )?);

    let options = EvaluationOptions {
        parallel: !args.no_parallel,
        rule_timeout: args.rule_timeout_ms.map(Duration::from_millis),
        only: args.rules.clone(),
    };

    let report = evaluate_blocking(Arc::clone(&checker), args.model.clone(), options).await?;

    let formatted = checker.format_report(&report, args.format.into())?;
    println!("{formatted}");

    Ok(exit_code(&report))
}

/// Load and evaluate on the blocking pool
async fn evaluate_blocking(
    checker: Arc<ArchChecker>,
    model: PathBuf,
    options: EvaluationOptions,
) -> Result<EvaluationReport> {
    let report = tokio::task::spawn_blocking(move || {
        checker
            .check_snapshot(&model, &options)
            .with_context(|| format!("Failed to evaluate snapshot '{}'", model.display()))
    })
    .await
    .context("Evaluation task panicked")??;
    Ok(report)
}

fn exit_code(report: &EvaluationReport) -> i32 {
    if report.is_failure() {
        EXIT_VIOLATIONS
    } else {
        EXIT_PASSED
    }
}

fn run_watch(config_path: Option<PathBuf>, model: PathBuf, delay_ms: u64, use_colors: bool) -> Result<i32> {
    use notify::{Event, RecursiveMode, Result as NotifyResult, Watcher};
    use std::sync::mpsc;
    use std::time::Instant;

    let watch_root = std::fs::canonicalize(&model)
        .with_context(|| format!("Cannot watch '{}'", model.display()))?;
    let fragment_pattern = glob::Pattern::new(DEFAULT_FRAGMENT_PATTERN)
        .context("Invalid fragment pattern")?;

    println!("🔍 Starting archcheck watch mode...");
    println!("📂 Watching: {}", watch_root.display());
    println!("⏱️  Debounce delay: {delay_ms}ms");
    println!("Press Ctrl+C to stop watching\n");

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: NotifyResult<Event>| match res {
        Ok(event) => {
            if let Err(e) = tx.send(event) {
                tracing::warn!("Dropping watch event: {}", e);
            }
        }
        Err(e) => tracing::warn!("Watch error: {}", e),
    })
    .context("Failed to create file watcher")?;

    watcher
        .watch(&watch_root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch '{}'", watch_root.display()))?;

    // Configuration files live next to the working directory
    if let Err(e) = watcher.watch(Path::new("."), RecursiveMode::NonRecursive) {
        tracing::debug!("Not watching configuration directory: {}", e);
    }

    println!("🚀 Running initial evaluation...");
    run_watch_evaluation(config_path.as_deref(), &model, use_colors);

    let debounce = Duration::from_millis(delay_ms);
    let mut last_run = Instant::now();

    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                let config_changed = is_config_change(&event);
                if !config_changed && !is_snapshot_change(&event, &watch_root, &fragment_pattern) {
                    continue;
                }

                let now = Instant::now();
                if now.duration_since(last_run) < debounce {
                    continue;
                }

                clear_screen();
                if config_changed {
                    println!("🔄 Configuration changed, reloading rules...");
                } else {
                    println!("📝 Snapshot changed, re-evaluating...");
                }
                run_watch_evaluation(config_path.as_deref(), &model, use_colors);
                last_run = Instant::now();
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                eprintln!("File watcher disconnected");
                break;
            }
        }
    }

    Ok(EXIT_PASSED)
}

fn clear_screen() {
    use crossterm::cursor::MoveTo;
    use crossterm::terminal::{Clear, ClearType};

    if let Err(e) = crossterm::execute!(std::io::stdout(), Clear(ClearType::All), MoveTo(0, 0)) {
        tracing::debug!("Failed to clear terminal: {}", e);
    }
}

fn is_relevant_kind(event: &notify::Event) -> bool {
    use notify::EventKind;

    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_))
}

/// Whether an event touches the watched snapshot
fn is_snapshot_change(event: &notify::Event, watch_root: &Path, fragment_pattern: &glob::Pattern) -> bool {
    if !is_relevant_kind(event) {
        return false;
    }

    event.paths.iter().any(|path| {
        if path == watch_root {
            return true;
        }
        path.starts_with(watch_root)
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| fragment_pattern.matches(name))
    })
}

/// Whether an event touches a conventional configuration file
fn is_config_change(event: &notify::Event) -> bool {
    if !is_relevant_kind(event) {
        return false;
    }

    event.paths.iter().any(|path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| CONFIG_FILE_NAMES.contains(&name))
    })
}

/// One watch-mode evaluation; failures are reported and watching continues
fn run_watch_evaluation(config_path: Option<&Path>, model: &Path, use_colors: bool) {
    let checker = match load_config(config_path).and_then(|config| {
        build_checker(config, ReportOptions { use_colors, ..Default::default() })
    }) {
        Ok(checker) => checker,
        Err(e) => {
            eprintln!("❌ {e:#}");
            return;
        }
    };

    match checker.check_snapshot(model, &EvaluationOptions::default()) {
        Ok(report) => {
            match checker.format_report(&report, OutputFormat::Human) {
                Ok(formatted) => println!("{formatted}"),
                Err(e) => eprintln!("❌ Report error: {e}"),
            }
            println!("⌚ Watching for changes... (Press Ctrl+C to stop)\n");
        }
        Err(e) => eprintln!("❌ Evaluation error: {e}"),
    }
}

fn run_validate_config(config_path: Option<PathBuf>) -> Result<i32> {
    let config_path = config_path
        .or_else(|| ArchConfig::discover("."))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAMES[0]));

    println!("Validating configuration: {}", config_path.display());

    match ArchConfig::load_from_file(&config_path) {
        Ok(config) => {
            println!("✅ Configuration is valid");

            let ignored = config.rules.iter().filter(|rule| rule.ignored.is_some()).count();
            println!("📊 Configuration summary:");
            println!("  Rules: {} total, {} ignored", config.rules.len(), ignored);
            if config.analyze.packages.is_empty() {
                println!("  Analyzed packages: whole model");
            } else {
                println!("  Analyzed packages: {}", config.analyze.packages.join(", "));
            }
            println!("  Fingerprint: {}", config.fingerprint());

            Ok(EXIT_PASSED)
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed: {e}");
            Ok(EXIT_VIOLATIONS)
        }
    }
}

fn run_explain(config_path: Option<PathBuf>, rule_name: &str) -> Result<i32> {
    let config = load_config(config_path.as_deref())?;
    config.validate().context("Invalid configuration")?;

    let Some(rule_config) = config.rule(rule_name) else {
        eprintln!("❌ Rule '{rule_name}' not found");
        println!();
        println!("Available rules:");
        for rule in &config.rules {
            println!("  - {}", rule.name);
        }
        return Ok(EXIT_VIOLATIONS);
    };

    let rule = rule_config.compile()?;

    println!("📖 Rule: {}", rule.name);
    println!("⚠️ Priority: {}", rule.priority.as_str());
    println!("🔍 Population: {}", rule.transformer.name());
    match &rule.ignored {
        Some(reason) => println!("⏸️ Ignored: {reason}"),
        None => println!("✅ Active"),
    }
    println!();
    println!("📝 Rule text:");
    println!("   {}", rule.text());
    if let Some(description) = &rule.description {
        println!();
        println!("💬 Description:");
        println!("   {description}");
    }
    if let Some(scope) = &rule.scope {
        println!();
        println!("📦 Scope: {scope}");
    }

    Ok(EXIT_PASSED)
}

fn run_list_rules(config_path: Option<PathBuf>, include_ignored: bool) -> Result<i32> {
    let config = load_config(config_path.as_deref())?;
    let registry = config.compiled().context("Failed to compile rules")?.registry;

    println!("📋 Configured Rules\n");

    for rule in registry.rules() {
        if rule.is_ignored() && !include_ignored {
            continue;
        }

        let status = if rule.is_ignored() { "⏸️" } else { "✅" };
        println!("  {}🔍 {} [{}] - {}", status, rule.name, rule.priority.as_str(), rule.text());
    }

    let stats = registry.stats();
    println!();
    println!(
        "{} rules ({} active, {} ignored; {} high, {} medium, {} low)",
        stats.total_rules(),
        stats.active_rules,
        stats.ignored_rules,
        stats.high_priority,
        stats.medium_priority,
        stats.low_priority
    );

    Ok(EXIT_PASSED)
}

async fn run_model(config_path: Option<PathBuf>, model_path: PathBuf) -> Result<i32> {
    let config = load_config(config_path.as_deref())?;
    let import_scope = config.compiled().context("Failed to compile rules")?.import_scope;

    let (model, scoped) = tokio::task::spawn_blocking(move || {
        let model = JsonSnapshotLoader::new(&model_path)?.load()?;
        let scoped = model.retain_packages(&import_scope);
        Ok::<_, archcheck::ArchError>((model, scoped))
    })
    .await
    .context("Model loading task panicked")?
    .context("Failed to load model")?;

    let stats = model.stats();
    println!("📊 Model statistics");
    println!("   Classes: {}", stats.classes);
    println!("   Members: {} ({} fields, {} methods, {} constructors)",
        stats.members(), stats.fields, stats.methods, stats.constructors);
    println!("   Annotations: {}", stats.annotations);
    println!("   Accesses: {}", stats.accesses);
    println!("   In analyzed packages: {} classes", scoped.len());
    println!("   Fingerprint: {}", model.fingerprint()?);

    Ok(EXIT_PASSED)
}

fn init_logging(verbose: bool, json: bool) {
    let default_directive = if verbose { "archcheck=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const VIOLATING_SNAPSHOT: &str = r#"{
  "classes": [ { "name": "org.superbiz.servlet.JpaBean", "source_file": "JpaBean.java" } ],
  "members": [ { "owner": "org.superbiz.servlet.JpaBean", "kind": "field", "name": "id", "type_name": "int" } ],
  "annotations": [
    { "type_name": "javax.persistence.Entity", "owner": { "class": "org.superbiz.servlet.JpaBean" } }
  ]
}"#;

    const CLEAN_SNAPSHOT: &str = r#"{
  "classes": [ { "name": "org.superbiz.servlet.Plain" } ],
  "members": [ { "owner": "org.superbiz.servlet.Plain", "kind": "field", "name": "id", "type_name": "int" } ]
}"#;

    struct Workspace {
        dir: TempDir,
        config: PathBuf,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let config = dir.path().join("archcheck.yaml");
            fs::write(&config, ArchConfig::with_defaults().to_yaml().unwrap()).unwrap();
            Self { dir, config }
        }

        fn snapshot(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, contents).unwrap();
            path
        }
    }

    fn check_args(model: PathBuf) -> CheckArgs {
        CheckArgs {
            model,
            format: OutputFormatArg::Json,
            min_priority: None,
            rules: Vec::new(),
            no_parallel: false,
            rule_timeout_ms: None,
            show_passed: false,
            max_violations: None,
        }
    }

    #[tokio::test]
    async fn test_check_reports_violations() {
        let workspace = Workspace::new();
        let model = workspace.snapshot("model.json", VIOLATING_SNAPSHOT);

        let result = run_check(Some(workspace.config.clone()), check_args(model), false).await;
        assert_eq!(result.unwrap(), EXIT_VIOLATIONS);
    }

    #[tokio::test]
    async fn test_check_passes_clean_model() {
        let workspace = Workspace::new();
        let model = workspace.snapshot("model.json", CLEAN_SNAPSHOT);

        let mut args = check_args(model);
        args.format = OutputFormatArg::Human;
        args.no_parallel = true;
        let result = run_check(Some(workspace.config.clone()), args, false).await;
        assert_eq!(result.unwrap(), EXIT_PASSED);
    }

    #[tokio::test]
    async fn test_check_rule_filter_and_min_priority() {
        let workspace = Workspace::new();
        let model = workspace.snapshot("model.json", VIOLATING_SNAPSHOT);

        // Only the web-service rule runs, so the entity violation is not counted
        let mut args = check_args(model.clone());
        args.rules = vec!["no_jws_web_service".to_string()];
        assert_eq!(run_check(Some(workspace.config.clone()), args, false).await.unwrap(), EXIT_PASSED);

        // Rendering filters never change the outcome
        let mut args = check_args(model);
        args.min_priority = Some(PriorityArg::High);
        assert_eq!(run_check(Some(workspace.config.clone()), args, false).await.unwrap(), EXIT_VIOLATIONS);
    }

    #[tokio::test]
    async fn test_check_errors() {
        let workspace = Workspace::new();

        let missing = check_args(workspace.dir.path().join("missing.json"));
        assert!(run_check(Some(workspace.config.clone()), missing, false).await.is_err());

        let model = workspace.snapshot("model.json", CLEAN_SNAPSHOT);
        let mut unknown = check_args(model);
        unknown.rules = vec!["no_such_rule".to_string()];
        assert!(run_check(Some(workspace.config.clone()), unknown, false).await.is_err());
    }

    #[tokio::test]
    async fn test_model_command() {
        let workspace = Workspace::new();
        let model = workspace.snapshot("model.json", VIOLATING_SNAPSHOT);

        let result = run_model(Some(workspace.config.clone()), model).await;
        assert_eq!(result.unwrap(), EXIT_PASSED);
    }

    #[test]
    fn test_validate_config() {
        let workspace = Workspace::new();
        assert_eq!(run_validate_config(Some(workspace.config.clone())).unwrap(), EXIT_PASSED);

        let broken = workspace.dir.path().join("broken.yaml");
        fs::write(&broken, "version: \"9.9\"\nrules: []\n").unwrap();
        assert_eq!(run_validate_config(Some(broken)).unwrap(), EXIT_VIOLATIONS);
    }

    #[test]
    fn test_explain_rule() {
        let workspace = Workspace::new();

        let result = run_explain(Some(workspace.config.clone()), "no_persistence_annotations_on_members");
        assert_eq!(result.unwrap(), EXIT_PASSED);

        let result = run_explain(Some(workspace.config.clone()), "nonexistent_rule");
        assert_eq!(result.unwrap(), EXIT_VIOLATIONS);
    }

    #[test]
    fn test_list_rules() {
        let workspace = Workspace::new();

        assert_eq!(run_list_rules(Some(workspace.config.clone()), false).unwrap(), EXIT_PASSED);
        assert_eq!(run_list_rules(Some(workspace.config.clone()), true).unwrap(), EXIT_PASSED);
    }

    #[test]
    fn test_watch_event_filters() {
        use notify::event::{CreateKind, ModifyKind};
        use notify::{Event, EventKind};

        let root = PathBuf::from("/tmp/snapshots");
        let pattern = glob::Pattern::new(DEFAULT_FRAGMENT_PATTERN).unwrap();

        let fragment = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(root.join("a/classes.json"));
        assert!(is_snapshot_change(&fragment, &root, &pattern));

        let unrelated = Event::new(EventKind::Create(CreateKind::File)).add_path(root.join("notes.txt"));
        assert!(!is_snapshot_change(&unrelated, &root, &pattern));

        let elsewhere = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/tmp/x.json"));
        assert!(!is_snapshot_change(&elsewhere, &root, &pattern));

        let config = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("./archcheck.yaml"));
        assert!(is_config_change(&config));

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any)).add_path(PathBuf::from("./archcheck.yaml"));
        assert!(!is_config_change(&access));
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "archcheck",
            "--no-color",
            "check",
            "snapshot.json",
            "--format",
            "junit",
            "--rule",
            "no_entities",
            "--rule",
            "no_id_fields",
            "--rule-timeout-ms",
            "250",
        ])
        .unwrap();

        assert!(cli.no_color);
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.rules, vec!["no_entities", "no_id_fields"]);
                assert_eq!(args.rule_timeout_ms, Some(250));
                assert!(args.format == OutputFormatArg::Junit);
            }
            _ => panic!("expected check command"),
        }
    }
}
