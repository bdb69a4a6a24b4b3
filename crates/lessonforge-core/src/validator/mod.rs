//! Static validation of generated component source
//!
//! The validator is an ordered list of independent [`ValidationRule`]s. Every
//! rule runs on every call and each failing rule contributes one
//! [`Violation`], so a verdict always carries the complete list in rule order.
//! A passing verdict is the only way generated source reaches storage or the
//! compiler.

mod ordering;
pub mod patterns;
mod rules;

use serde::{Deserialize, Serialize};
use tree_sitter::Tree;

use crate::syntax;

pub use ordering::{UseBeforeDeclarationRule, TRACKED_IDENTIFIERS};
pub use rules::*;

/// Stable identifier of a validation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleId {
    EmptySource,
    DefaultExport,
    ComponentName,
    RendersMarkup,
    UnclosedMarkup,
    ForbiddenConstruct,
    DisallowedImport,
    UnbalancedDelimiters,
    ClientDirective,
    HookImport,
    UseBeforeDeclaration,
    SyntaxError,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::EmptySource => "empty-source",
            RuleId::DefaultExport => "default-export",
            RuleId::ComponentName => "component-name",
            RuleId::RendersMarkup => "renders-markup",
            RuleId::UnclosedMarkup => "unclosed-markup",
            RuleId::ForbiddenConstruct => "forbidden-construct",
            RuleId::DisallowedImport => "disallowed-import",
            RuleId::UnbalancedDelimiters => "unbalanced-delimiters",
            RuleId::ClientDirective => "client-directive",
            RuleId::HookImport => "hook-import",
            RuleId::UseBeforeDeclaration => "use-before-declaration",
            RuleId::SyntaxError => "syntax-error",
        }
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: RuleId,
    pub message: String,
}

impl Violation {
    pub fn new(rule: RuleId, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

/// Outcome of one validation call. `violations` is empty iff `is_valid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    is_valid: bool,
    violations: Vec<Violation>,
}

impl ValidationVerdict {
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            is_valid: violations.is_empty(),
            violations,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    /// Human-readable numbered list, one violation per line
    pub fn describe(&self) -> String {
        self.violations
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{}. [{}] {}", i + 1, v.rule, v.message))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Source text plus its parse tree, shared by every rule in one pass
pub struct SourceUnit<'a> {
    pub text: &'a str,
    pub tree: Option<Tree>,
}

impl<'a> SourceUnit<'a> {
    pub fn parse(text: &'a str) -> Self {
        let tree = if text.trim().is_empty() {
            None
        } else {
            syntax::parse_tsx(text)
        };
        Self { text, tree }
    }
}

/// One independent check over a [`SourceUnit`]
pub trait ValidationRule: Send + Sync {
    fn id(&self) -> RuleId;

    /// `None` when the rule holds
    fn evaluate(&self, unit: &SourceUnit<'_>) -> Option<Violation>;
}

/// Ordered rule engine
pub struct StaticValidator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl StaticValidator {
    /// Validator with the full default rule set
    pub fn new() -> Self {
        Self::with_rules(rules::default_rules())
    }

    pub fn with_rules(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn validate(&self, source: &str) -> ValidationVerdict {
        let unit = SourceUnit::parse(source);
        let mut violations = Vec::new();

        for rule in &self.rules {
            if let Some(violation) = rule.evaluate(&unit) {
                tracing::debug!("Rule {} failed: {}", rule.id(), violation.message);
                violations.push(violation);
            }
        }

        ValidationVerdict::from_violations(violations)
    }
}

impl Default for StaticValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StaticValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticValidator")
            .field("rules", &self.rules.iter().map(|r| r.id()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_LESSON: &str = r#"'use client';
import React, { useState } from 'react';

const steps = ['Light', 'Water', 'Sugar'];

export default function PhotosynthesisLesson() {
  const [index, setIndex] = useState(0);
  return (
    <div className="lesson">
      <h1>{steps[index]}</h1>
      <button onClick={() => setIndex((index + 1) % steps.length)}>Next</button>
    </div>
  );
}
"#;

    #[test]
    fn test_valid_lesson_passes() {
        let verdict = StaticValidator::new().validate(VALID_LESSON);
        assert!(verdict.is_valid(), "{}", verdict.describe());
        assert!(verdict.violations().is_empty());
    }

    #[test]
    fn test_empty_source_collects_every_failure() {
        let verdict = StaticValidator::new().validate("   ");
        assert!(!verdict.is_valid());
        assert_eq!(verdict.violations()[0].rule, RuleId::EmptySource);
        assert!(verdict.violations().len() > 1);
    }

    #[test]
    fn test_violations_are_reported_in_rule_order() {
        let source = VALID_LESSON
            .replace("'use client';", "")
            .replace("export default function PhotosynthesisLesson", "function lesson");
        let verdict = StaticValidator::new().validate(&source);
        let rules: Vec<RuleId> = verdict.violations().iter().map(|v| v.rule).collect();
        assert_eq!(rules, vec![RuleId::DefaultExport, RuleId::ClientDirective]);
    }

    #[test]
    fn test_custom_rule_set() {
        let validator = StaticValidator::with_rules(vec![Box::new(ClientDirectiveRule)]);
        assert_eq!(validator.rule_count(), 1);
        let verdict = validator.validate("export default function A() { return <div/>; }");
        assert_eq!(verdict.violations().len(), 1);
        assert_eq!(verdict.violations()[0].rule, RuleId::ClientDirective);
    }

    #[test]
    fn test_describe_numbers_violations() {
        let verdict = ValidationVerdict::from_violations(vec![
            Violation::new(RuleId::DefaultExport, "a"),
            Violation::new(RuleId::HookImport, "b"),
        ]);
        assert_eq!(verdict.describe(), "1. [default-export] a\n2. [hook-import] b");
    }

    #[test]
    fn test_rule_id_serializes_kebab_case() {
        let json = serde_json::to_string(&RuleId::UseBeforeDeclaration).unwrap();
        assert_eq!(json, "\"use-before-declaration\"");
    }
}
