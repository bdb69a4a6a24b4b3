//! Accepted lesson -> compiled JavaScript -> sandboxed host page

use lessonforge_core::StaticValidator;
use lessonforge_sandbox::{compile, CompileError, SandboxExecutor, ENTRY_BINDING};
use proptest::prelude::*;

const ACCEPTED: &str = r#"'use client';
import React, { useState } from 'react';

type Card = { front: string; back: string };

const cards: Card[] = [
  { front: 'Chlorophyll', back: 'Pigment that absorbs light' },
  { front: 'Stomata', back: 'Pores that let CO2 in' },
];

export default function PhotosynthesisFlashcards() {
  const [index, setIndex] = useState<number>(0);
  const [flipped, setFlipped] = useState(false);
  const card = cards[index];

  return (
    <main className="deck">
      <h1>Photosynthesis flashcards</h1>
      <button onClick={() => setFlipped(!flipped)}>
        {flipped ? card.back : card.front}
      </button>
      <button onClick={() => setIndex((index + 1) % cards.length)}>Next card</button>
      <button onClick={() => navigateHome()}>Done</button>
    </main>
  );
}
"#;

#[test]
fn accepted_lesson_compiles_to_plain_javascript() {
    assert!(StaticValidator::new().validate(ACCEPTED).is_valid());

    let compiled = compile(ACCEPTED).expect("accepted lesson should compile");
    let code = &compiled.code;

    assert!(!code.contains("use client"));
    assert!(!code.contains("import "));
    assert!(!code.contains("export "));
    assert!(!code.contains("type Card"));
    assert!(!code.contains("Card[]"));
    assert!(!code.contains("<main"));
    assert!(code.contains("React.createElement(\"main\""));
    assert!(code.contains(&format!("var {} = PhotosynthesisFlashcards;", ENTRY_BINDING)));
}

#[test]
fn compiled_lesson_renders_inside_sandboxed_frame() {
    let compiled = compile(ACCEPTED).unwrap();
    let page = SandboxExecutor::default().host_page(&compiled, "Photosynthesis flashcards", "/");

    assert!(page.contains(r#"sandbox="allow-scripts""#));
    assert!(page.contains("srcdoc=\""));
    assert!(!page.contains("allow-same-origin"));
}

#[test]
fn compiler_refuses_dynamic_import_without_validation() {
    let source = format!(
        "{}\nconst later = () => import('react');\n",
        ACCEPTED
    );
    assert_eq!(
        compile(&source),
        Err(CompileError::DisallowedImport(vec!["import()".to_string()]))
    );
}

proptest! {
    #[test]
    fn compiler_rejects_any_non_react_module(module in "[a-z][a-z0-9-]{0,15}") {
        prop_assume!(module != "react");
        let source = format!("import helper from '{}';\n{}", module, ACCEPTED);
        prop_assert_eq!(
            compile(&source),
            Err(CompileError::DisallowedImport(vec![module.clone()]))
        );
    }
}
