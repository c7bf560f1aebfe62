//! Rule declarations and the read-only rule registry
//!
//! Architecture: Value Objects - a RuleSpec binds population, filter, condition and priority
//! - Rules are plain data, declared once and evaluated against any number of models
//! - The fluent builder validates every rule before it can be registered
//! - The registry is assembled once and never mutated after it is shared

use crate::conditions::Condition;
use crate::domain::results::{ArchError, ArchResult, Priority};
use crate::predicates::{PackageIdentifier, Predicate};
use crate::transform::Transformer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether the condition is required or forbidden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// "all X should ..."
    Should,
    /// "no X should ..."
    ShouldNot,
}

/// A named, reusable architecture rule
#[derive(Debug, Clone)]
pub struct RuleSpec {
    pub name: String,
    /// Free-text rationale shown by `explain`
    pub description: Option<String>,
    pub priority: Priority,
    pub transformer: Transformer,
    pub polarity: Polarity,
    /// Filter applied to the population before the condition
    pub that: Option<Predicate>,
    /// Restricts the population to elements residing in this package
    pub scope: Option<PackageIdentifier>,
    pub condition: Condition,
    /// Reason the rule is disabled, when it is
    pub ignored: Option<String>,
}

impl RuleSpec {
    pub fn builder(name: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(name)
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored.is_some()
    }

    /// Rule text, e.g. "no members should be annotated with type in javax.persistence.."
    pub fn text(&self) -> String {
        let quantifier = match self.polarity {
            Polarity::Should => "all",
            Polarity::ShouldNot => "no",
        };

        let mut text = format!("{} {}", quantifier, self.transformer.description());
        if let Some(that) = &self.that {
            text.push_str(&format!(" that {}", that.description()));
        }
        if let Some(scope) = &self.scope {
            text.push_str(&format!(" in package {scope}"));
        }
        text.push_str(&format!(" should {}", self.condition.description()));
        text
    }
}

/// Fluent construction of a [`RuleSpec`]
#[derive(Debug)]
pub struct RuleBuilder {
    name: String,
    description: Option<String>,
    priority: Priority,
    population: Option<(Polarity, Transformer)>,
    that: Option<Predicate>,
    scope: Option<String>,
    condition: Option<Condition>,
    ignored: Option<String>,
}

impl RuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            priority: Priority::default(),
            population: None,
            that: None,
            scope: None,
            condition: None,
            ignored: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// "no <population> should ..."
    pub fn no(mut self, transformer: Transformer) -> Self {
        self.population = Some((Polarity::ShouldNot, transformer));
        self
    }

    /// "all <population> should ..."
    pub fn all(mut self, transformer: Transformer) -> Self {
        self.population = Some((Polarity::Should, transformer));
        self
    }

    /// Narrow the population; repeated calls are combined with `and`
    pub fn that(mut self, predicate: Predicate) -> Self {
        self.that = Some(match self.that.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn in_package(mut self, identifier: impl Into<String>) -> Self {
        self.scope = Some(identifier.into());
        self
    }

    pub fn should(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn ignored(mut self, reason: impl Into<String>) -> Self {
        self.ignored = Some(reason.into());
        self
    }

    pub fn because(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate and produce the rule
    pub fn build(self) -> ArchResult<RuleSpec> {
        if self.name.trim().is_empty() {
            return Err(ArchError::rule_config(&self.name, "rule name must not be empty"));
        }

        let Some((polarity, transformer)) = self.population else {
            return Err(ArchError::rule_config(&self.name, "no population declared (use `no` or `all`)"));
        };

        let Some(condition) = self.condition else {
            return Err(ArchError::rule_config(&self.name, "no condition declared (use `should`)"));
        };

        if !condition.supports(transformer.population_kind()) {
            return Err(ArchError::rule_config(
                &self.name,
                format!(
                    "condition '{}' cannot be checked against {}",
                    condition.name(),
                    transformer.description()
                ),
            ));
        }

        let scope = self
            .scope
            .as_deref()
            .map(PackageIdentifier::parse)
            .transpose()
            .map_err(|e| ArchError::rule_config(&self.name, e.to_string()))?;

        Ok(RuleSpec {
            name: self.name,
            description: self.description,
            priority: self.priority,
            transformer,
            polarity,
            that: self.that,
            scope,
            condition,
            ignored: self.ignored,
        })
    }
}

/// Statistics about the registered rules
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub active_rules: usize,
    pub ignored_rules: usize,
    pub high_priority: usize,
    pub medium_priority: usize,
    pub low_priority: usize,
}

impl RegistryStats {
    pub fn total_rules(&self) -> usize {
        self.active_rules + self.ignored_rules
    }
}

/// Ordered collection of uniquely named rules
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<RuleSpec>,
    by_name: HashMap<String, usize>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule; names must be unique
    pub fn register(&mut self, rule: RuleSpec) -> ArchResult<()> {
        if self.by_name.contains_key(&rule.name) {
            return Err(ArchError::rule_config(&rule.name, "duplicate rule name"));
        }
        tracing::debug!("Registered rule '{}': {}", rule.name, rule.text());
        self.by_name.insert(rule.name.clone(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    /// Build a registry from rules, failing on the first invalid one
    pub fn from_rules<I>(rules: I) -> ArchResult<Self>
    where
        I: IntoIterator<Item = RuleSpec>,
    {
        let mut registry = Self::new();
        for rule in rules {
            registry.register(rule)?;
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&RuleSpec> {
        self.by_name.get(name).map(|&idx| &self.rules[idx])
    }

    /// Rules in registration order
    pub fn rules(&self) -> &[RuleSpec] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for rule in &self.rules {
            if rule.is_ignored() {
                stats.ignored_rules += 1;
            } else {
                stats.active_rules += 1;
            }
            match rule.priority {
                Priority::High => stats.high_priority += 1,
                Priority::Medium => stats.medium_priority += 1,
                Priority::Low => stats.low_priority += 1,
            }
        }
        stats
    }
}
