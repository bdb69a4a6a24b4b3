//! Pattern tables for dangerous primitives and module imports.
//!
//! Shared between the static validator and the compiler, which re-runs the
//! same scans on its input and on the translated output.

use lazy_static::lazy_static;
use regex::Regex;

/// The only module generated components may import
pub const ALLOWED_MODULES: &[&str] = &["react"];

lazy_static! {
    /// (label, pattern) for every dynamic-execution or unsafe-DOM primitive
    pub static ref DANGEROUS_PATTERNS: Vec<(&'static str, Regex)> = vec![
        ("eval()", Regex::new(r"\beval\s*\(").unwrap()),
        ("Function constructor", Regex::new(r#"\bFunction\s*\(|\[\s*['"`]Function['"`]\s*\]"#).unwrap()),
        (
            "innerHTML assignment",
            Regex::new(r#"(?:\.|\[\s*['"`])(?:inner|outer)HTML(?:['"`]\s*\])?\s*\+?=(?:[^=]|$)"#).unwrap(),
        ),
        ("dangerouslySetInnerHTML", Regex::new(r"\bdangerouslySetInnerHTML\b").unwrap()),
        ("__proto__ access", Regex::new(r"__proto__").unwrap()),
        ("document.write()", Regex::new(r"\bdocument\s*\.\s*write(?:ln)?\s*\(").unwrap()),
    ];

    static ref IMPORT_FROM: Regex =
        Regex::new(r#"(?m)^\s*import\s+(?:type\s+)?[\w*$\s{},]+?\s*from\s*['"]([^'"]+)['"]"#).unwrap();
    static ref SIDE_EFFECT_IMPORT: Regex =
        Regex::new(r#"(?m)^\s*import\s*['"]([^'"]+)['"]"#).unwrap();
    static ref REQUIRE_CALL: Regex =
        Regex::new(r#"\brequire\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap();
    static ref DYNAMIC_IMPORT: Regex = Regex::new(r"\bimport\s*\(").unwrap();
}

/// Labels of every dangerous primitive present in `text`, in table order
pub fn find_dangerous(text: &str) -> Vec<&'static str> {
    DANGEROUS_PATTERNS
        .iter()
        .filter(|(_, regex)| regex.is_match(text))
        .map(|(label, _)| *label)
        .collect()
}

/// How a module is pulled in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Static,
    SideEffect,
    Require,
    Dynamic,
}

/// A module reference found in source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportTarget {
    pub module: String,
    pub kind: ImportKind,
}

/// Every import, require and dynamic import in the text
pub fn import_targets(text: &str) -> Vec<ImportTarget> {
    let mut targets = Vec::new();
    let mut push = |regex: &Regex, kind: ImportKind| {
        for captures in regex.captures_iter(text) {
            if let Some(module) = captures.get(1) {
                targets.push(ImportTarget {
                    module: module.as_str().to_string(),
                    kind,
                });
            }
        }
    };
    push(&IMPORT_FROM, ImportKind::Static);
    push(&SIDE_EFFECT_IMPORT, ImportKind::SideEffect);
    push(&REQUIRE_CALL, ImportKind::Require);

    for _ in DYNAMIC_IMPORT.find_iter(text) {
        targets.push(ImportTarget {
            module: "import()".to_string(),
            kind: ImportKind::Dynamic,
        });
    }
    targets
}

/// Module names that are not on the allowlist. Dynamic imports are never allowed.
pub fn disallowed_imports(text: &str) -> Vec<String> {
    let mut disallowed: Vec<String> = Vec::new();
    for target in import_targets(text) {
        let allowed =
            target.kind != ImportKind::Dynamic && ALLOWED_MODULES.contains(&target.module.as_str());
        if !allowed && !disallowed.contains(&target.module) {
            disallowed.push(target.module);
        }
    }
    disallowed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dangerous_table() {
        assert_eq!(find_dangerous("eval('1+1')"), vec!["eval()"]);
        assert_eq!(find_dangerous("const f = new Function('return 1')"), vec!["Function constructor"]);
        assert_eq!(find_dangerous("el.innerHTML = x"), vec!["innerHTML assignment"]);
        assert!(find_dangerous("if (el.innerHTML === x) {}").is_empty());
        assert_eq!(find_dangerous("obj.__proto__.x = 1"), vec!["__proto__ access"]);
        assert_eq!(find_dangerous("document.write('<p>')"), vec!["document.write()"]);
        assert!(find_dangerous("const handleFunction = () => evaluate(x)").is_empty());
        assert!(find_dangerous("handleFunction(1); myFunction (2)").is_empty());
    }

    #[test]
    fn test_function_constructor_through_globals() {
        for source in [
            "const run = window.Function('return document.cookie'); run();",
            "globalThis.Function('return 1')()",
            "self . Function ('x')",
            "window['Function']('return 1')()",
            "Function('return this')()",
        ] {
            assert_eq!(find_dangerous(source), vec!["Function constructor"], "{}", source);
        }
    }

    #[test]
    fn test_bracket_html_assignment() {
        for source in [
            "el['innerHTML'] = '<img src=x onerror=alert(1)>'",
            "el[\"outerHTML\"] += markup",
            "el[ `innerHTML` ]=x",
        ] {
            assert_eq!(find_dangerous(source), vec!["innerHTML assignment"], "{}", source);
        }
        assert!(find_dangerous("if (el['innerHTML'] === '') {}").is_empty());
        assert!(find_dangerous("const html = el['innerHTML'];").is_empty());
    }

    #[test]
    fn test_import_scan() {
        let source = "import React, { useState } from 'react';\nimport {\n  motion\n} from \"framer-motion\";\nimport './styles.css';\nconst fs = require('fs');";
        let modules: Vec<String> = import_targets(source).into_iter().map(|t| t.module).collect();
        assert_eq!(modules, vec!["react", "framer-motion", "./styles.css", "fs"]);
        assert_eq!(
            disallowed_imports(source),
            vec!["framer-motion", "./styles.css", "fs"]
        );
    }

    #[test]
    fn test_dynamic_import_is_disallowed() {
        assert_eq!(disallowed_imports("const m = await import('react')"), vec!["import()"]);
    }
}
