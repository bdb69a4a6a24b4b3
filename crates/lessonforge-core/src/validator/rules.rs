//! The default rule set

use lazy_static::lazy_static;
use regex::Regex;

use super::ordering::UseBeforeDeclarationRule;
use super::patterns::{self, ALLOWED_MODULES, DANGEROUS_PATTERNS};
use super::{RuleId, SourceUnit, ValidationRule, Violation};
use crate::syntax;

/// React hooks that must be named-imported when referenced bare
pub const REACT_HOOKS: &[&str] = &[
    "useState",
    "useEffect",
    "useContext",
    "useReducer",
    "useCallback",
    "useMemo",
    "useRef",
    "useLayoutEffect",
    "useImperativeHandle",
    "useDebugValue",
    "useId",
    "useTransition",
    "useDeferredValue",
    "useSyncExternalStore",
    "useInsertionEffect",
];

lazy_static! {
    static ref DEFAULT_EXPORT_FUNCTION: Regex =
        Regex::new(r"\bexport\s+default\s+(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)").unwrap();
    static ref RETURNS_MARKUP: Regex = Regex::new(r"\breturn\s*\(?\s*<").unwrap();
    static ref MARKUP_OPEN: Regex = Regex::new(r"<[A-Za-z>]").unwrap();
    static ref CLIENT_DIRECTIVE: Regex =
        Regex::new(r#"(?m)^\s*(?:'use client'|"use client")\s*;?"#).unwrap();
    static ref REACT_NAMED_IMPORT: Regex =
        Regex::new(r#"\bimport\s+(?:[\w$]+\s*,\s*)?\{([^}]*)\}\s*from\s*['"]react['"]"#).unwrap();
    static ref BARE_HOOK_CALLS: Vec<(&'static str, Regex)> = REACT_HOOKS
        .iter()
        .map(|hook| {
            let pattern = format!(r"(?:^|[^\w$.]){}\s*[(<]", hook);
            (*hook, Regex::new(&pattern).unwrap())
        })
        .collect();
}

/// The rules in reporting order
pub fn default_rules() -> Vec<Box<dyn ValidationRule>> {
    let mut rules: Vec<Box<dyn ValidationRule>> = vec![
        Box::new(EmptySourceRule),
        Box::new(DefaultExportRule),
        Box::new(ComponentNameRule),
        Box::new(RendersMarkupRule),
        Box::new(UnclosedMarkupRule),
    ];
    for index in 0..DANGEROUS_PATTERNS.len() {
        rules.push(Box::new(ForbiddenConstructRule::new(index)));
    }
    rules.push(Box::new(DisallowedImportRule));
    rules.push(Box::new(DelimiterBalanceRule::new('{', '}', "braces")));
    rules.push(Box::new(DelimiterBalanceRule::new('(', ')', "parentheses")));
    rules.push(Box::new(DelimiterBalanceRule::new('[', ']', "brackets")));
    rules.push(Box::new(ClientDirectiveRule));
    rules.push(Box::new(HookImportRule));
    rules.push(Box::new(UseBeforeDeclarationRule));
    rules.push(Box::new(SyntaxErrorRule));
    rules
}

fn default_export_names(text: &str) -> Vec<&str> {
    DEFAULT_EXPORT_FUNCTION
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect()
}

pub struct EmptySourceRule;

impl ValidationRule for EmptySourceRule {
    fn id(&self) -> RuleId {
        RuleId::EmptySource
    }

    fn evaluate(&self, unit: &SourceUnit<'_>) -> Option<Violation> {
        unit.text
            .trim()
            .is_empty()
            .then(|| Violation::new(self.id(), "Source is empty"))
    }
}

/// Exactly one `export default function <Identifier>`
pub struct DefaultExportRule;

impl ValidationRule for DefaultExportRule {
    fn id(&self) -> RuleId {
        RuleId::DefaultExport
    }

    fn evaluate(&self, unit: &SourceUnit<'_>) -> Option<Violation> {
        match default_export_names(unit.text).len() {
            1 => None,
            0 => Some(Violation::new(
                self.id(),
                "Missing `export default function <ComponentName>` entry point",
            )),
            n => Some(Violation::new(
                self.id(),
                format!("Found {} `export default function` declarations; exactly one is allowed", n),
            )),
        }
    }
}

pub struct ComponentNameRule;

impl ValidationRule for ComponentNameRule {
    fn id(&self) -> RuleId {
        RuleId::ComponentName
    }

    fn evaluate(&self, unit: &SourceUnit<'_>) -> Option<Violation> {
        let name = default_export_names(unit.text).into_iter().next()?;
        if name.chars().next().map_or(false, |c| c.is_ascii_uppercase()) {
            return None;
        }
        Some(Violation::new(
            self.id(),
            format!("Component name '{}' must start with an uppercase letter", name),
        ))
    }
}

pub struct RendersMarkupRule;

impl ValidationRule for RendersMarkupRule {
    fn id(&self) -> RuleId {
        RuleId::RendersMarkup
    }

    fn evaluate(&self, unit: &SourceUnit<'_>) -> Option<Violation> {
        if RETURNS_MARKUP.is_match(unit.text) {
            return None;
        }
        Some(Violation::new(self.id(), "Component never returns JSX markup"))
    }
}

pub struct UnclosedMarkupRule;

impl ValidationRule for UnclosedMarkupRule {
    fn id(&self) -> RuleId {
        RuleId::UnclosedMarkup
    }

    fn evaluate(&self, unit: &SourceUnit<'_>) -> Option<Violation> {
        let opens = MARKUP_OPEN.is_match(unit.text);
        let closes = unit.text.contains("</") || unit.text.contains("/>");
        if !opens || closes {
            return None;
        }
        Some(Violation::new(
            self.id(),
            "JSX markup is opened but no closing tag (`</...>` or `/>`) appears",
        ))
    }
}

/// One dangerous primitive from the shared pattern table
pub struct ForbiddenConstructRule {
    label: &'static str,
    pattern: &'static Regex,
}

impl ForbiddenConstructRule {
    /// Rule for entry `index` of the dangerous-pattern table
    pub fn new(index: usize) -> Self {
        let table: &'static Vec<(&'static str, Regex)> = &DANGEROUS_PATTERNS;
        let (label, pattern) = &table[index];
        Self {
            label: *label,
            pattern,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl ValidationRule for ForbiddenConstructRule {
    fn id(&self) -> RuleId {
        RuleId::ForbiddenConstruct
    }

    fn evaluate(&self, unit: &SourceUnit<'_>) -> Option<Violation> {
        self.pattern.is_match(unit.text).then(|| {
            Violation::new(self.id(), format!("Forbidden construct: {}", self.label))
        })
    }
}

pub struct DisallowedImportRule;

impl ValidationRule for DisallowedImportRule {
    fn id(&self) -> RuleId {
        RuleId::DisallowedImport
    }

    fn evaluate(&self, unit: &SourceUnit<'_>) -> Option<Violation> {
        let disallowed = patterns::disallowed_imports(unit.text);
        if disallowed.is_empty() {
            return None;
        }
        let listed = disallowed
            .iter()
            .map(|m| format!("'{}'", m))
            .collect::<Vec<_>>()
            .join(", ");
        Some(Violation::new(
            self.id(),
            format!(
                "Only {} may be imported; found {}",
                ALLOWED_MODULES
                    .iter()
                    .map(|m| format!("'{}'", m))
                    .collect::<Vec<_>>()
                    .join(", "),
                listed
            ),
        ))
    }
}

/// Raw open/close counts of one delimiter pair must match
pub struct DelimiterBalanceRule {
    open: char,
    close: char,
    name: &'static str,
}

impl DelimiterBalanceRule {
    pub fn new(open: char, close: char, name: &'static str) -> Self {
        Self { open, close, name }
    }
}

impl ValidationRule for DelimiterBalanceRule {
    fn id(&self) -> RuleId {
        RuleId::UnbalancedDelimiters
    }

    fn evaluate(&self, unit: &SourceUnit<'_>) -> Option<Violation> {
        let opened = unit.text.chars().filter(|c| *c == self.open).count();
        let closed = unit.text.chars().filter(|c| *c == self.close).count();
        if opened == closed {
            return None;
        }
        Some(Violation::new(
            self.id(),
            format!(
                "Unbalanced {}: {} '{}' vs {} '{}'",
                self.name, opened, self.open, closed, self.close
            ),
        ))
    }
}

pub struct ClientDirectiveRule;

impl ValidationRule for ClientDirectiveRule {
    fn id(&self) -> RuleId {
        RuleId::ClientDirective
    }

    fn evaluate(&self, unit: &SourceUnit<'_>) -> Option<Violation> {
        if CLIENT_DIRECTIVE.is_match(unit.text) {
            return None;
        }
        Some(Violation::new(self.id(), "Missing 'use client' directive"))
    }
}

/// Bare hook calls need `import { useX } from 'react'`
pub struct HookImportRule;

impl HookImportRule {
    fn imported_names(text: &str) -> Vec<String> {
        REACT_NAMED_IMPORT
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .flat_map(|group| {
                group
                    .as_str()
                    .split(',')
                    .filter_map(|spec| {
                        let name = spec.trim().trim_start_matches("type ").split_whitespace().next()?;
                        Some(name.to_string())
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

impl ValidationRule for HookImportRule {
    fn id(&self) -> RuleId {
        RuleId::HookImport
    }

    fn evaluate(&self, unit: &SourceUnit<'_>) -> Option<Violation> {
        let imported = Self::imported_names(unit.text);
        let missing: Vec<&str> = BARE_HOOK_CALLS
            .iter()
            .filter(|(hook, regex)| regex.is_match(unit.text) && !imported.iter().any(|i| i == hook))
            .map(|(hook, _)| *hook)
            .collect();
        if missing.is_empty() {
            return None;
        }
        Some(Violation::new(
            self.id(),
            format!(
                "React hooks used without a named import from 'react': {}",
                missing.join(", ")
            ),
        ))
    }
}

/// Full TSX parse; ERROR and MISSING nodes
pub struct SyntaxErrorRule;

impl ValidationRule for SyntaxErrorRule {
    fn id(&self) -> RuleId {
        RuleId::SyntaxError
    }

    fn evaluate(&self, unit: &SourceUnit<'_>) -> Option<Violation> {
        if unit.text.trim().is_empty() {
            return None;
        }
        let Some(tree) = unit.tree.as_ref() else {
            return Some(Violation::new(self.id(), "Source could not be parsed as TSX"));
        };
        let diagnostics = syntax::syntax_diagnostics(tree, unit.text);
        if diagnostics.is_empty() {
            return None;
        }
        let listed = diagnostics
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Some(Violation::new(self.id(), format!("Syntax errors: {}", listed)))
    }
}
