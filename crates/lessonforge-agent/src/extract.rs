//! Pull component source out of raw model output

use lazy_static::lazy_static;
use regex::Regex;

const CODE_LANGUAGES: &[&str] = &["tsx", "jsx", "typescript", "ts", "javascript", "js", "react"];

lazy_static! {
    static ref FENCED_BLOCK: Regex = Regex::new(r"(?s)```([\w+-]*)[ \t]*\r?\n(.*?)```").unwrap();
    static ref OPEN_FENCE: Regex = Regex::new(r"```[\w+-]*[ \t]*\r?\n").unwrap();
    static ref CODE_START: Regex =
        Regex::new(r#"(?m)^[ \t]*(?:'use client'|"use client"|import\s|export\s+default\b)"#).unwrap();
}

/// Extract the component source from model output.
///
/// Fenced blocks win: the first one tagged with a code language, else the
/// largest. A fence left open by a truncated response runs to the end.
/// Unfenced output is cut at the first directive, import or default export so
/// leading prose is dropped.
pub fn extract_source(raw: &str) -> String {
    let blocks: Vec<(&str, &str)> = FENCED_BLOCK
        .captures_iter(raw)
        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
        .collect();

    if !blocks.is_empty() {
        let tagged = blocks
            .iter()
            .find(|(lang, _)| CODE_LANGUAGES.contains(&lang.to_ascii_lowercase().as_str()));
        let chosen = tagged
            .or_else(|| blocks.iter().max_by_key(|(_, body)| body.len()))
            .map_or("", |(_, body)| *body);
        return finish(chosen);
    }

    if let Some(open) = OPEN_FENCE.find(raw) {
        return finish(&raw[open.end()..]);
    }

    match CODE_START.find(raw) {
        Some(start) => finish(&raw[start.start()..]),
        None => finish(raw),
    }
}

fn finish(code: &str) -> String {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{}\n", trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_tagged_fence() {
        let raw = "Here is your lesson:\n```bash\nnpm i\n```\n```tsx\n'use client';\nexport default function A() {}\n```\nEnjoy!";
        assert_eq!(extract_source(raw), "'use client';\nexport default function A() {}\n");
    }

    #[test]
    fn test_untagged_fence_falls_back_to_largest() {
        let raw = "```\nshort\n```\ntext\n```\nthe longer block\n```";
        assert_eq!(extract_source(raw), "the longer block\n");
    }

    #[test]
    fn test_truncated_fence() {
        let raw = "```tsx\n'use client';\nexport default function A() {";
        assert_eq!(extract_source(raw), "'use client';\nexport default function A() {\n");
    }

    #[test]
    fn test_unfenced_prose_is_dropped() {
        let raw = "Sure! Below is the component.\n\n'use client';\nimport React from 'react';\n";
        assert_eq!(extract_source(raw), "'use client';\nimport React from 'react';\n");
    }

    #[test]
    fn test_plain_source_is_kept() {
        assert_eq!(extract_source("  const a = 1;  "), "const a = 1;\n");
        assert_eq!(extract_source("   "), "");
    }
}
