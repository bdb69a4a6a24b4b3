//! Use-before-declaration heuristic for a fixed identifier lexicon.
//!
//! Generated lessons often reference a data collection (`steps`, `questions`)
//! at the top of a component and declare it further down. Only references
//! evaluated eagerly in the declaring function's own body are reported;
//! anything inside a nested function runs later and is ignored.

use std::collections::HashMap;

use tree_sitter::Node;

use super::{RuleId, SourceUnit, ValidationRule, Violation};
use crate::syntax::{node_text, walk};

/// Collection names models commonly declare after first use
pub const TRACKED_IDENTIFIERS: &[&str] = &[
    "steps",
    "questions",
    "slides",
    "items",
    "cards",
    "sections",
    "options",
    "answers",
    "quizQuestions",
    "lessons",
    "pages",
    "topics",
    "facts",
    "terms",
    "levels",
    "stages",
    "chapters",
    "concepts",
    "examples",
    "flashcards",
];

const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "function",
    "function_expression",
    "arrow_function",
    "method_definition",
    "generator_function",
    "generator_function_declaration",
];

const STATE_INITIALIZERS: &[&str] = &["useState", "useReducer", "useMemo", "useRef"];

struct Declaration {
    statement_start: usize,
    line: usize,
}

fn enclosing_function(node: Node<'_>) -> Option<usize> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if FUNCTION_KINDS.contains(&parent.kind()) {
            return Some(parent.id());
        }
        current = parent.parent();
    }
    None
}

/// True if the reference sits inside a state-hook call's arguments
fn in_state_initializer(node: Node<'_>, source: &str) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if FUNCTION_KINDS.contains(&parent.kind()) {
            return false;
        }
        if parent.kind() == "call_expression" {
            if let Some(callee) = parent.child_by_field_name("function") {
                let name = node_text(callee, source).rsplit('.').next().unwrap_or("");
                if STATE_INITIALIZERS.contains(&name) {
                    return true;
                }
            }
        }
        current = parent.parent();
    }
    false
}

/// Tracked identifiers bound by a declarator's name pattern
fn bound_names<'t>(pattern: Node<'t>, source: &str, out: &mut Vec<Node<'t>>) {
    walk(pattern, &mut |node| {
        let binds = matches!(node.kind(), "identifier" | "shorthand_property_identifier_pattern");
        if binds && TRACKED_IDENTIFIERS.contains(&node_text(node, source)) {
            out.push(node);
        }
        true
    });
}

pub struct UseBeforeDeclarationRule;

impl UseBeforeDeclarationRule {
    fn collect_declarations(
        root: Node<'_>,
        source: &str,
    ) -> HashMap<(String, Option<usize>), Declaration> {
        let mut declarations = HashMap::new();
        walk(root, &mut |node| {
            if matches!(node.kind(), "lexical_declaration" | "variable_declaration") {
                let scope = enclosing_function(node);
                let mut cursor = node.walk();
                for declarator in node.children(&mut cursor) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(name) = declarator.child_by_field_name("name") else {
                        continue;
                    };
                    let mut names = Vec::new();
                    bound_names(name, source, &mut names);
                    for bound in names {
                        declarations
                            .entry((node_text(bound, source).to_string(), scope))
                            .or_insert(Declaration {
                                statement_start: node.start_byte(),
                                line: node.start_position().row + 1,
                            });
                    }
                }
            }
            true
        });
        declarations
    }
}

impl ValidationRule for UseBeforeDeclarationRule {
    fn id(&self) -> RuleId {
        RuleId::UseBeforeDeclaration
    }

    fn evaluate(&self, unit: &SourceUnit<'_>) -> Option<Violation> {
        let tree = unit.tree.as_ref()?;
        let source = unit.text;
        let root = tree.root_node();
        let declarations = Self::collect_declarations(root, source);
        if declarations.is_empty() {
            return None;
        }

        let mut findings: Vec<(String, String)> = Vec::new();
        walk(root, &mut |node| {
            if !matches!(node.kind(), "identifier" | "shorthand_property_identifier") {
                return true;
            }
            let name = node_text(node, source);
            if !TRACKED_IDENTIFIERS.contains(&name) || findings.iter().any(|(seen, _)| seen == name) {
                return true;
            }
            let key = (name.to_string(), enclosing_function(node));
            let Some(declaration) = declarations.get(&key) else {
                return true;
            };
            if node.start_byte() >= declaration.statement_start {
                return true;
            }

            let line = node.start_position().row + 1;
            let message = if in_state_initializer(node, source) {
                format!(
                    "State initializer references '{}' before its declaration (line {})",
                    name, declaration.line
                )
            } else {
                format!(
                    "'{}' is referenced on line {} before its declaration on line {}",
                    name, line, declaration.line
                )
            };
            findings.push((name.to_string(), message));
            true
        });

        if findings.is_empty() {
            return None;
        }
        let message = findings
            .into_iter()
            .map(|(_, message)| message)
            .collect::<Vec<_>>()
            .join("; ");
        Some(Violation::new(self.id(), message))
    }
}
