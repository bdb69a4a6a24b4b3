//! Tree-Sitter TSX parsing helpers shared by the validator and the compiler.

use serde::{Deserialize, Serialize};
use tree_sitter::{LanguageError, Node, Parser, Tree};

/// Maximum number of syntax diagnostics collected from one parse
pub const MAX_SYNTAX_DIAGNOSTICS: usize = 5;

/// Build a parser for the TSX dialect
pub fn tsx_parser() -> std::result::Result<Parser, LanguageError> {
    let mut parser = Parser::new();
    parser.set_language(tree_sitter_typescript::language_tsx())?;
    Ok(parser)
}

/// Parse TSX source. `None` if the parser could not be built or gave up.
pub fn parse_tsx(source: &str) -> Option<Tree> {
    match tsx_parser() {
        Ok(mut parser) => parser.parse(source, None),
        Err(e) => {
            tracing::error!("Failed to initialize TSX parser: {}", e);
            None
        }
    }
}

/// Pre-order walk. The visitor returns `false` to skip a node's children.
///
/// Driven by a [`TreeCursor`](tree_sitter::TreeCursor), so stack usage does
/// not grow with nesting depth.
pub fn walk<'t, F>(node: Node<'t>, visit: &mut F)
where
    F: FnMut(Node<'t>) -> bool,
{
    let mut cursor = node.walk();
    let mut depth = 0usize;
    let mut descend = visit(node);

    loop {
        if descend && cursor.goto_first_child() {
            depth += 1;
            descend = visit(cursor.node());
            continue;
        }
        loop {
            if depth == 0 {
                return;
            }
            if cursor.goto_next_sibling() {
                descend = visit(cursor.node());
                break;
            }
            cursor.goto_parent();
            depth -= 1;
        }
    }
}

/// Deepest level below `node` (a leaf is depth 0)
pub fn nesting_depth(node: Node<'_>) -> usize {
    let mut cursor = node.walk();
    let mut depth = 0usize;
    let mut deepest = 0usize;

    loop {
        if cursor.goto_first_child() {
            depth += 1;
            deepest = deepest.max(depth);
            continue;
        }
        loop {
            if depth == 0 {
                return deepest;
            }
            if cursor.goto_next_sibling() {
                break;
            }
            cursor.goto_parent();
            depth -= 1;
        }
    }
}

/// Source text covered by a node
pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// One parse problem, 1-based position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxDiagnostic {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl std::fmt::Display for SyntaxDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}: {}", self.line, self.column, self.message)
    }
}

/// Collect ERROR and MISSING nodes, outermost first
pub fn syntax_diagnostics(tree: &Tree, source: &str) -> Vec<SyntaxDiagnostic> {
    let mut diagnostics = Vec::new();
    if !tree.root_node().has_error() {
        return diagnostics;
    }

    walk(tree.root_node(), &mut |node| {
        if diagnostics.len() >= MAX_SYNTAX_DIAGNOSTICS {
            return false;
        }
        if node.is_missing() {
            diagnostics.push(diagnostic_at(node, format!("missing `{}`", node.kind())));
            return false;
        }
        if node.is_error() {
            let snippet: String = node_text(node, source)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .chars()
                .take(40)
                .collect();
            diagnostics.push(diagnostic_at(node, format!("unexpected syntax near `{}`", snippet)));
            return false;
        }
        node.has_error()
    });

    if diagnostics.is_empty() {
        diagnostics.push(SyntaxDiagnostic {
            line: 1,
            column: 1,
            message: "source could not be parsed".to_string(),
        });
    }
    diagnostics
}

fn diagnostic_at(node: Node<'_>, message: String) -> SyntaxDiagnostic {
    let position = node.start_position();
    SyntaxDiagnostic {
        line: position.row + 1,
        column: position.column + 1,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_tsx_has_no_diagnostics() {
        let source = "export default function A() { return <div className=\"x\">hi</div>; }";
        let tree = parse_tsx(source).unwrap();
        assert!(syntax_diagnostics(&tree, source).is_empty());
    }

    #[test]
    fn test_broken_tsx_reports_position() {
        let source = "function A() {\n  return <div>;\n}";
        let tree = parse_tsx(source).unwrap();
        let diagnostics = syntax_diagnostics(&tree, source);
        assert!(!diagnostics.is_empty());
        assert!(diagnostics.len() <= MAX_SYNTAX_DIAGNOSTICS);
    }

    #[test]
    fn test_walk_can_prune() {
        let source = "const a = () => { const b = 1; };";
        let tree = parse_tsx(source).unwrap();
        let mut seen = Vec::new();
        walk(tree.root_node(), &mut |node| {
            seen.push(node.kind());
            node.kind() != "arrow_function"
        });
        assert!(seen.contains(&"arrow_function"));
        assert!(!seen.contains(&"statement_block"));
        // siblings after the pruned subtree are still visited
        let source = "const a = () => 1; let b = 2;";
        let tree = parse_tsx(source).unwrap();
        let mut kinds = Vec::new();
        walk(tree.root_node(), &mut |node| {
            kinds.push(node.kind());
            node.kind() != "arrow_function"
        });
        assert!(kinds.contains(&"lexical_declaration"));
        assert_eq!(kinds.iter().filter(|k| **k == "number").count(), 1);
    }

    #[test]
    fn test_walk_visits_every_node_once() {
        let source = "function A() { return [1, [2, [3]]]; }";
        let tree = parse_tsx(source).unwrap();
        let mut visited = 0usize;
        walk(tree.root_node(), &mut |_| {
            visited += 1;
            true
        });
        assert_eq!(visited, count_recursive(tree.root_node()));
    }

    fn count_recursive(node: Node<'_>) -> usize {
        let mut cursor = node.walk();
        1 + node
            .children(&mut cursor)
            .map(count_recursive)
            .sum::<usize>()
    }

    #[test]
    fn test_deep_nesting_walks_on_a_small_stack() {
        let source = format!("const x = {}1{};", "(".repeat(50_000), ")".repeat(50_000));
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || {
                let tree = parse_tsx(&source).unwrap();
                let mut visited = 0usize;
                walk(tree.root_node(), &mut |_| {
                    visited += 1;
                    true
                });
                (visited, nesting_depth(tree.root_node()))
            })
            .unwrap();
        let (visited, depth) = handle.join().unwrap();
        assert!(visited > 50_000);
        assert!(depth > 50_000);
    }

    #[test]
    fn test_nesting_depth() {
        let tree = parse_tsx("a;").unwrap();
        let shallow = nesting_depth(tree.root_node());
        let tree = parse_tsx("((((a))));").unwrap();
        assert_eq!(nesting_depth(tree.root_node()), shallow + 4);
    }
}
