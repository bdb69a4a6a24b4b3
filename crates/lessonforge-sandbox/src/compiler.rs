//! Lesson compiler - normalizes accepted TSX and translates it to JavaScript
//!
//! The pipeline is order-sensitive:
//!
//! 1. size guard on the raw input
//! 2. import allowlist and dangerous-primitive scans on the raw input
//! 3. textual normalization (directive, imports, entry rebinding, exports,
//!    blank-line runs)
//! 4. Tree-Sitter based TSX -> ES2020 translation
//! 5. dangerous-primitive scan on the output
//!
//! The compiled program binds its entry component to [`ENTRY_BINDING`] and
//! expects `React` and the hooks to be ambient globals.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tree_sitter::Node;

use lessonforge_core::syntax::{self, node_text, SyntaxDiagnostic};
use lessonforge_core::validator::patterns;

/// Identifier the entry component is bound to in compiled output
pub const ENTRY_BINDING: &str = "LessonComponent";

/// Inputs smaller than this are not a plausible component
pub const MIN_SOURCE_BYTES: usize = 100;

/// Hard ceiling on input size
pub const MAX_SOURCE_BYTES: usize = 500 * 1024;

/// Deepest syntax tree the translator will walk. Real components sit far
/// below this; the translator recurses once per level.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Compilation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Source too large: {size} bytes (maximum {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Source too small: {size} bytes (minimum {min})")]
    TooSmall { size: usize, min: usize },

    #[error("Disallowed import: {}", .0.join(", "))]
    DisallowedImport(Vec<String>),

    #[error("Source contains forbidden construct: {0}")]
    UnsafeSource(String),

    #[error("Compiled output contains forbidden construct: {0}")]
    UnsafeOutput(String),

    #[error("Source nests {depth} levels deep (maximum {max})")]
    TooDeep { depth: usize, max: usize },

    #[error("Compilation produced empty output")]
    EmptyOutput,

    #[error("Parser error: {0}")]
    Parser(String),
}

impl CompileError {
    /// True for failures caused by the caller's input rather than the compiler
    pub fn is_client_error(&self) -> bool {
        !matches!(self, CompileError::EmptyOutput | CompileError::Parser(_))
    }
}

/// Successful compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledLesson {
    /// Executable JavaScript
    pub code: String,
    /// Parse problems found during translation (non-blocking)
    pub diagnostics: Vec<SyntaxDiagnostic>,
    pub source_bytes: usize,
}

lazy_static! {
    static ref CLIENT_DIRECTIVE: Regex =
        Regex::new(r#"(?m)^[ \t]*(?:'use client'|"use client")[ \t]*;?[ \t]*\r?\n?"#).unwrap();
    static ref IMPORT_STATEMENT: Regex = Regex::new(
        r#"(?m)^[ \t]*import\b(?:\s+type)?[\w\s{},*$]*?\bfrom\s*['"][^'"\n]+['"][ \t]*;?[ \t]*\r?\n?"#
    )
    .unwrap();
    static ref SIDE_EFFECT_IMPORT: Regex =
        Regex::new(r#"(?m)^[ \t]*import\s*['"][^'"\n]+['"][ \t]*;?[ \t]*\r?\n?"#).unwrap();
    static ref DEFAULT_EXPORT_DECLARATION: Regex = Regex::new(
        r"\bexport\s+default\s+((?:async\s+)?function\b\s*\*?\s*([A-Za-z_$][\w$]*)|class\s+([A-Za-z_$][\w$]*))"
    )
    .unwrap();
    static ref DEFAULT_EXPORT_EXPRESSION: Regex = Regex::new(r"\bexport\s+default\s+").unwrap();
    static ref EXPORT_LIST: Regex =
        Regex::new(r#"(?m)^[ \t]*export\s*\{[^}]*\}(?:\s*from\s*['"][^'"]*['"])?[ \t]*;?[ \t]*\r?\n?"#).unwrap();
    static ref EXPORT_KEYWORD: Regex = Regex::new(r"(?m)^([ \t]*)export\s+").unwrap();
    static ref BLANK_LINE_RUN: Regex = Regex::new(r"\n(?:[ \t]*\r?\n){3,}").unwrap();
}

/// Node kinds that only carry TypeScript type information
const ERASED_KINDS: &[&str] = &[
    "type_annotation",
    "type_arguments",
    "type_parameters",
    "interface_declaration",
    "type_alias_declaration",
    "accessibility_modifier",
    "override_modifier",
    "implements_clause",
    "function_signature",
    "abstract_method_signature",
    "index_signature",
    "ambient_declaration",
    "type_predicate_annotation",
    "asserts_annotation",
    "import_statement",
];

/// Size-bounded TSX compiler
#[derive(Debug, Clone)]
pub struct LessonCompiler {
    min_bytes: usize,
    max_bytes: usize,
}

impl Default for LessonCompiler {
    fn default() -> Self {
        Self {
            min_bytes: MIN_SOURCE_BYTES,
            max_bytes: MAX_SOURCE_BYTES,
        }
    }
}

impl LessonCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, min_bytes: usize, max_bytes: usize) -> Self {
        self.min_bytes = min_bytes;
        self.max_bytes = max_bytes;
        self
    }

    pub fn compile(&self, source: &str) -> Result<CompiledLesson, CompileError> {
        let size = source.len();
        if size > self.max_bytes {
            return Err(CompileError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        if size < self.min_bytes {
            return Err(CompileError::TooSmall {
                size,
                min: self.min_bytes,
            });
        }

        let disallowed = patterns::disallowed_imports(source);
        if !disallowed.is_empty() {
            tracing::warn!("Refusing to compile source importing {:?}", disallowed);
            return Err(CompileError::DisallowedImport(disallowed));
        }
        if let Some(label) = patterns::find_dangerous(source).first() {
            tracing::warn!("Refusing to compile source containing {}", label);
            return Err(CompileError::UnsafeSource(label.to_string()));
        }

        let normalized = normalize(source);
        let (code, diagnostics) = translate(&normalized)?;

        for diagnostic in &diagnostics {
            tracing::warn!("TSX translation diagnostic at {}", diagnostic);
        }

        if let Some(label) = patterns::find_dangerous(&code).first() {
            tracing::error!("Compiled output contains {} after a clean input scan", label);
            return Err(CompileError::UnsafeOutput(label.to_string()));
        }
        if code.trim().is_empty() {
            return Err(CompileError::EmptyOutput);
        }

        Ok(CompiledLesson {
            code,
            diagnostics,
            source_bytes: size,
        })
    }
}

/// Compile with the default size limits
pub fn compile(source: &str) -> Result<CompiledLesson, CompileError> {
    LessonCompiler::default().compile(source)
}

/// Textual normalization ahead of translation
pub fn normalize(source: &str) -> String {
    let text = CLIENT_DIRECTIVE.replace_all(source, "");
    let text = IMPORT_STATEMENT.replace_all(&text, "");
    let text = SIDE_EFFECT_IMPORT.replace_all(&text, "");
    let text = rebind_entry(&text);
    let text = EXPORT_LIST.replace_all(&text, "");
    let text = EXPORT_KEYWORD.replace_all(&text, "$1");
    BLANK_LINE_RUN.replace_all(&text, "\n\n").into_owned()
}

fn rebind_entry(text: &str) -> String {
    if let Some(captures) = DEFAULT_EXPORT_DECLARATION.captures(text) {
        let whole = captures.get(0).map_or(0..0, |m| m.range());
        let declaration = captures.get(1).map_or("", |m| m.as_str());
        let name = captures
            .get(2)
            .or_else(|| captures.get(3))
            .map_or("", |m| m.as_str());

        let mut rebound = String::with_capacity(text.len() + 64);
        rebound.push_str(&text[..whole.start]);
        rebound.push_str(declaration);
        rebound.push_str(&text[whole.end..]);
        if !rebound.ends_with('\n') {
            rebound.push('\n');
        }
        rebound.push_str(&format!("var {} = {};\n", ENTRY_BINDING, name));
        return rebound;
    }

    if DEFAULT_EXPORT_EXPRESSION.is_match(text) {
        let replacement = format!("var {} = ", ENTRY_BINDING);
        return DEFAULT_EXPORT_EXPRESSION
            .replace(text, replacement.as_str())
            .into_owned();
    }

    tracing::warn!("No default export found; {} will be undefined", ENTRY_BINDING);
    text.to_string()
}

fn translate(source: &str) -> Result<(String, Vec<SyntaxDiagnostic>), CompileError> {
    let mut parser = syntax::tsx_parser().map_err(|e| CompileError::Parser(e.to_string()))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| CompileError::Parser("parser produced no tree".to_string()))?;
    let root = tree.root_node();
    let depth = syntax::nesting_depth(root);
    if depth > MAX_NESTING_DEPTH {
        tracing::warn!("Refusing to translate source nested {} levels deep", depth);
        return Err(CompileError::TooDeep {
            depth,
            max: MAX_NESTING_DEPTH,
        });
    }
    let diagnostics = syntax::syntax_diagnostics(&tree, source);

    let translator = Translator { source };
    let mut out = String::with_capacity(source.len());
    out.push_str(translator.slice(0, root.start_byte()));
    translator.emit(root, &mut out);
    out.push_str(translator.slice(root.end_byte(), source.len()));
    Ok((out, diagnostics))
}

struct Translator<'s> {
    source: &'s str,
}

impl<'s> Translator<'s> {
    fn slice(&self, start: usize, end: usize) -> &'s str {
        self.source.get(start..end).unwrap_or("")
    }

    fn text(&self, node: Node<'_>) -> &'s str {
        node_text(node, self.source)
    }

    fn emit(&self, node: Node<'_>, out: &mut String) {
        let kind = node.kind();
        if ERASED_KINDS.contains(&kind) {
            return;
        }
        match kind {
            "as_expression" | "satisfies_expression" | "non_null_expression" => {
                if let Some(inner) = node.named_child(0) {
                    self.emit(inner, out);
                }
            }
            "enum_declaration" => self.emit_enum(node, out),
            "jsx_element" | "jsx_self_closing_element" | "jsx_fragment" => {
                out.push_str(&self.lower_jsx(node));
            }
            _ if node.child_count() == 0 => out.push_str(self.text(node)),
            _ => self.emit_children(node, out),
        }
    }

    /// Copy the node verbatim except for translated children
    fn emit_children(&self, node: Node<'_>, out: &mut String) {
        let mut pos = node.start_byte();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            out.push_str(self.slice(pos, child.start_byte()));
            if !is_type_only_token(node, child) {
                self.emit(child, out);
            }
            pos = child.end_byte();
        }
        out.push_str(self.slice(pos, node.end_byte()));
    }

    fn render(&self, node: Node<'_>) -> String {
        let mut out = String::new();
        self.emit(node, &mut out);
        out
    }

    /// `enum E { A, B = 5 }` -> `const E = Object.freeze({ A: 0, B: 5 });`
    fn emit_enum(&self, node: Node<'_>, out: &mut String) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let mut members = Vec::new();
        let mut next = 0f64;

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.named_children(&mut cursor) {
                match member.kind() {
                    "property_identifier" | "string" => {
                        members.push(format!("{}: {}", self.text(member), format_number(next)));
                        next += 1.0;
                    }
                    "enum_assignment" => {
                        let key = member
                            .child_by_field_name("name")
                            .map_or("", |n| self.text(n));
                        let Some(value) = member.child_by_field_name("value") else {
                            continue;
                        };
                        let rendered = self.render(value);
                        next = rendered.trim().parse::<f64>().map_or(next, |v| v) + 1.0;
                        members.push(format!("{}: {}", key, rendered));
                    }
                    _ => {}
                }
            }
        }

        out.push_str(&format!(
            "const {} = Object.freeze({{ {} }});",
            self.text(name),
            members.join(", ")
        ));
    }

    fn lower_jsx(&self, node: Node<'_>) -> String {
        let (element_type, props) = match node.kind() {
            "jsx_fragment" => ("React.Fragment".to_string(), "null".to_string()),
            "jsx_self_closing_element" => (
                self.element_type(node.child_by_field_name("name")),
                self.props(node),
            ),
            _ => match node
                .child_by_field_name("open_tag")
                .or_else(|| node.named_child(0))
            {
                Some(open) => (
                    self.element_type(open.child_by_field_name("name")),
                    self.props(open),
                ),
                None => ("React.Fragment".to_string(), "null".to_string()),
            },
        };

        let mut args = vec![element_type, props];
        if node.kind() != "jsx_self_closing_element" {
            args.extend(self.jsx_children(node));
        }
        format!("React.createElement({})", args.join(", "))
    }

    fn element_type(&self, name: Option<Node<'_>>) -> String {
        let Some(name) = name else {
            return "React.Fragment".to_string();
        };
        let text = self.text(name);
        if text.contains('.') {
            return text.to_string();
        }
        let intrinsic = text.contains('-')
            || text.contains(':')
            || text.chars().next().map_or(true, |c| c.is_ascii_lowercase());
        if intrinsic {
            js_string(text)
        } else {
            text.to_string()
        }
    }

    fn props(&self, element: Node<'_>) -> String {
        let name_id = element.child_by_field_name("name").map(|n| n.id());
        let mut entries = Vec::new();
        let mut cursor = element.walk();
        for child in element.named_children(&mut cursor) {
            if Some(child.id()) == name_id {
                continue;
            }
            match child.kind() {
                "jsx_attribute" => entries.push(self.attribute(child)),
                "jsx_expression" => {
                    if let Some(spread) = self.expression_body(child) {
                        entries.push(spread);
                    }
                }
                _ => {}
            }
        }
        if entries.is_empty() {
            "null".to_string()
        } else {
            format!("{{ {} }}", entries.join(", "))
        }
    }

    fn attribute(&self, attribute: Node<'_>) -> String {
        let mut cursor = attribute.walk();
        let mut named = attribute
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "comment");
        let key = named.next().map_or("", |n| self.text(n));
        let value = match named.next() {
            None => "true".to_string(),
            Some(value) => match value.kind() {
                "string" => {
                    let raw = self.text(value);
                    let inner = raw.get(1..raw.len().saturating_sub(1)).unwrap_or("");
                    js_string(&decode_entities(inner))
                }
                "jsx_expression" => self
                    .expression_body(value)
                    .unwrap_or_else(|| "undefined".to_string()),
                "jsx_element" | "jsx_self_closing_element" | "jsx_fragment" => self.lower_jsx(value),
                _ => self.render(value),
            },
        };

        if is_identifier(key) {
            format!("{}: {}", key, value)
        } else {
            format!("{}: {}", js_string(key), value)
        }
    }

    /// Translated expression inside `{ ... }`, `None` when empty or comment-only
    fn expression_body(&self, expression: Node<'_>) -> Option<String> {
        let mut cursor = expression.walk();
        let parts: Vec<Node<'_>> = expression
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .collect();
        let first = parts.first()?;
        let mut out = String::new();
        let mut pos = first.start_byte();
        for part in &parts {
            out.push_str(self.slice(pos, part.start_byte()));
            self.emit(*part, &mut out);
            pos = part.end_byte();
        }
        Some(out)
    }

    fn jsx_children(&self, element: Node<'_>) -> Vec<String> {
        let mut children = Vec::new();
        let mut cursor = element.walk();
        for child in element.named_children(&mut cursor) {
            match child.kind() {
                "jsx_opening_element" | "jsx_closing_element" | "comment" => {}
                "jsx_text" => {
                    let cleaned = clean_jsx_text(self.text(child));
                    if !cleaned.is_empty() {
                        children.push(js_string(&decode_entities(&cleaned)));
                    }
                }
                "html_character_reference" => {
                    children.push(js_string(&decode_entities(self.text(child))));
                }
                "jsx_expression" => {
                    if let Some(body) = self.expression_body(child) {
                        children.push(body);
                    }
                }
                "jsx_element" | "jsx_self_closing_element" | "jsx_fragment" => {
                    children.push(self.lower_jsx(child));
                }
                _ => {}
            }
        }
        children
    }
}

/// Anonymous tokens that only exist in TypeScript syntax
fn is_type_only_token(parent: Node<'_>, child: Node<'_>) -> bool {
    if child.is_named() {
        return false;
    }
    match parent.kind() {
        "optional_parameter" => child.kind() == "?",
        "variable_declarator" => child.kind() == "!",
        "public_field_definition" | "method_definition" | "abstract_class_declaration" => matches!(
            child.kind(),
            "?" | "!" | "readonly" | "declare" | "abstract" | "override"
        ),
        _ => false,
    }
}

fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// JSX text whitespace rules: lines are trimmed where they meet a line
/// break, whitespace-only lines are dropped and the rest joined by spaces.
pub fn clean_jsx_text(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    let last_non_empty = lines.iter().rposition(|l| !l.trim().is_empty());
    let mut cleaned = String::new();

    for (i, line) in lines.iter().enumerate() {
        let mut segment = line.replace('\t', " ");
        if i != 0 {
            segment = segment.trim_start_matches(' ').to_string();
        }
        if i != lines.len() - 1 {
            segment = segment.trim_end_matches(' ').to_string();
        }
        if segment.is_empty() {
            continue;
        }
        if Some(i) != last_non_empty {
            segment.push(' ');
        }
        cleaned.push_str(&segment);
    }
    cleaned
}

/// Decode the HTML character references JSX text commonly uses
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let decoded = candidate
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&candidate[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(decimal) = name.strip_prefix('#') {
        return decimal.parse::<u32>().ok().and_then(char::from_u32);
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "deg" => '°',
        "times" => '×',
        "divide" => '÷',
        "plusmn" => '±',
        "middot" => '·',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "larr" => '←',
        "rarr" => '→',
        "uarr" => '↑',
        "darr" => '↓',
        "le" => '≤',
        "ge" => '≥',
        "ne" => '≠',
        "pi" => 'π',
        _ => return None,
    };
    Some(c)
}
