//! Prompt construction for initial generation and repair

use lessonforge_core::GenerationRequest;

use crate::generator::RepairContext;

/// System prompt shared by every attempt. The constraints mirror the static
/// validator's rule set.
pub const SYSTEM_PROMPT: &str = "You are an expert educator and React developer. \
You write a single self-contained interactive lesson as one TSX React component.

Hard requirements:
1. The first line is the directive 'use client';
2. Import only from 'react'. Import every hook you call by name, for example: import React, { useState, useEffect } from 'react';
3. Declare exactly one entry point: export default function LessonName() { ... } with a capitalized name.
4. The component returns JSX markup. Close every tag.
5. Never use eval, new Function, innerHTML, dangerouslySetInnerHTML, __proto__ or document.write.
6. Declare every data array (steps, questions, slides, ...) before any code that reads it.
7. No network requests, no external assets beyond inline SVG, no other libraries.
8. A global function navigateHome() exists; call it from a final \"Back to lessons\" button.

Style the lesson with inline styles or a <style> element. Make it interactive: \
quizzes, step-through explanations, sliders or simulations where they help understanding.

Reply with the component source only, in a single ```tsx code block.";

/// User prompt for the first attempt
pub fn initial_prompt(request: &GenerationRequest) -> String {
    format!(
        "Create an interactive lesson for the following outline.\n\nOutline:\n{}\n",
        request.outline.trim()
    )
}

/// User prompt for a repair attempt: the previous draft plus its numbered
/// violations, verbatim.
pub fn repair_prompt(request: &GenerationRequest, repair: &RepairContext) -> String {
    let violations = repair
        .violations
        .iter()
        .enumerate()
        .map(|(i, v)| format!("{}. [{}] {}", i + 1, v.rule, v.message))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Your previous lesson for this outline failed validation.\n\n\
         Outline:\n{outline}\n\n\
         Problems to fix:\n{violations}\n\n\
         Previous source:\n```tsx\n{source}\n```\n\n\
         Return the complete corrected component. Fix every listed problem \
         without removing working features. (attempt {attempt})\n",
        outline = request.outline.trim(),
        violations = violations,
        source = repair.previous_source.trim_end(),
        attempt = request.attempt + 1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonforge_core::{RuleId, Uuid, Violation};

    #[test]
    fn test_repair_prompt_lists_violations_in_order() {
        let request = GenerationRequest::new(Uuid::new_v4(), "Explain photosynthesis").at_attempt(1);
        let repair = RepairContext::new(
            "function lesson() {}",
            vec![
                Violation::new(RuleId::DefaultExport, "Missing export"),
                Violation::new(RuleId::ClientDirective, "Missing 'use client' directive"),
            ],
        );
        let prompt = repair_prompt(&request, &repair);
        assert!(prompt.contains("1. [default-export] Missing export\n2. [client-directive]"));
        assert!(prompt.contains("```tsx\nfunction lesson() {}\n```"));
        assert!(prompt.contains("(attempt 2)"));
    }

    #[test]
    fn test_initial_prompt_carries_outline() {
        let request = GenerationRequest::new(Uuid::new_v4(), "  Teach fractions  ");
        assert!(initial_prompt(&request).contains("Outline:\nTeach fractions\n"));
    }
}
