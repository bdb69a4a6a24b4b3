//! Property tests for the admission filter and the static validator

use lessonforge_core::admission::{AdmissionStage, MAX_OUTLINE_CHARS, MIN_OUTLINE_CHARS};
use lessonforge_core::{AdmissionFilter, RuleId, StaticValidator};
use proptest::prelude::*;

const LESSON: &str = r#"'use client';
import React, { useState } from 'react';

export default function FractionsLesson() {
  const [slice, setSlice] = useState(1);
  return (
    <div>
      <p>{slice} / 8 of the pizza</p>
      <button onClick={() => setSlice(slice + 1)}>Add slice</button>
    </div>
  );
}
"#;

proptest! {
    #[test]
    fn short_outlines_are_rejected(text in "[a-z]{1,9}", pad in "[ \t\n]{0,4}") {
        let input = format!("{}{}{}", pad, text, pad);
        prop_assume!(input.trim().chars().count() < MIN_OUTLINE_CHARS);
        let decision = AdmissionFilter::check(&input);
        prop_assert!(!decision.is_valid);
        prop_assert_eq!(decision.error.unwrap().stage, AdmissionStage::Length);
    }

    #[test]
    fn long_outlines_are_rejected(extra in 1usize..200) {
        let input = "learn ".repeat((MAX_OUTLINE_CHARS + extra) / 6 + 1);
        prop_assume!(input.trim().chars().count() > MAX_OUTLINE_CHARS);
        let decision = AdmissionFilter::check(&input);
        prop_assert!(!decision.is_valid);
        prop_assert_eq!(decision.error.unwrap().stage, AdmissionStage::Length);
    }

    #[test]
    fn unequal_delimiters_always_violate(
        open in 0usize..6,
        close in 0usize..6,
        pair in 0usize..3,
    ) {
        prop_assume!(open != close);
        let (o, c) = [('{', '}'), ('(', ')'), ('[', ']')][pair];
        let source = format!(
            "{}\n// {}{}",
            LESSON,
            o.to_string().repeat(open),
            c.to_string().repeat(close)
        );
        let verdict = StaticValidator::new().validate(&source);
        prop_assert!(!verdict.is_valid());
        prop_assert!(verdict
            .violations()
            .iter()
            .any(|v| v.rule == RuleId::UnbalancedDelimiters));
    }

    #[test]
    fn validation_is_idempotent(noise in "[a-zA-Z0-9 {}()<>/;=]{0,80}") {
        let source = format!("{}{}", LESSON, noise);
        let validator = StaticValidator::new();
        let first = validator.validate(&source);
        let second = validator.validate(&source);
        prop_assert_eq!(first, second);
    }
}

#[test]
fn reference_lesson_is_valid() {
    let verdict = StaticValidator::new().validate(LESSON);
    assert!(verdict.is_valid(), "{}", verdict.describe());
}

#[test]
fn spam_outline_is_rejected_as_spam() {
    let decision = AdmissionFilter::check("aaaaaaaaaaaaa");
    assert_eq!(decision.error.unwrap().stage, AdmissionStage::Spam);
}

#[test]
fn non_latin_outline_without_keyword_is_admitted() {
    // no lexicon keyword, admitted through the script fallback
    let decision = AdmissionFilter::check("Фотосинтез у растений и водорослей");
    assert!(decision.is_valid, "{:?}", decision.error);
}

fn with_statement(statement: &str) -> String {
    LESSON.replacen(
        "  const [slice, setSlice] = useState(1);\n",
        &format!("  const [slice, setSlice] = useState(1);\n  {}\n", statement),
        1,
    )
}

#[test]
fn function_constructor_reached_through_a_global_is_forbidden() {
    for statement in [
        "const run = window.Function('return document.cookie'); run();",
        "globalThis.Function('return 1')();",
    ] {
        let verdict = StaticValidator::new().validate(&with_statement(statement));
        assert!(
            verdict
                .violations()
                .iter()
                .any(|v| v.rule == RuleId::ForbiddenConstruct && v.message.contains("Function")),
            "{}: {}",
            statement,
            verdict.describe()
        );
    }
}

#[test]
fn bracket_inner_html_assignment_is_forbidden() {
    let source = with_statement(
        "const el = document.body; el['innerHTML'] = '<img src=x onerror=alert(1)>';",
    );
    let verdict = StaticValidator::new().validate(&source);
    assert!(verdict
        .violations()
        .iter()
        .any(|v| v.rule == RuleId::ForbiddenConstruct));
}

#[test]
fn deeply_nested_source_validates_on_a_small_stack() {
    let source = with_statement(&format!(
        "const depth = {}1{};",
        "(".repeat(50_000),
        ")".repeat(50_000)
    ));
    let handle = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(move || StaticValidator::new().validate(&source).is_valid())
        .unwrap();
    assert!(handle.join().is_ok());
}
