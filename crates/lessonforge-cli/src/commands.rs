//! `lessonforge admit | validate | compile`
//!
//! Each command prints a human report (or JSON with `--json`) and returns
//! whether the input passed.

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use std::path::{Path, PathBuf};

use lessonforge_core::{AdmissionFilter, StaticValidator};
use lessonforge_sandbox::{CompileError, CompiledLesson, LessonCompiler, SandboxExecutor};

/// Options for `lessonforge compile`
pub struct CompileOptions {
    pub sandbox: bool,
    pub output: Option<PathBuf>,
    pub json: bool,
}

pub fn admit(outline: &str, json: bool) -> Result<bool> {
    let report = admission_report(outline);
    let passed = report["is_valid"].as_bool().unwrap_or(false);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if passed {
        println!("{} Outline admitted", "✓".green().bold());
    } else {
        println!(
            "{} Rejected at stage {}: {}",
            "✗".red().bold(),
            report["stage"].as_str().unwrap_or("unknown").yellow(),
            report["message"].as_str().unwrap_or_default()
        );
        println!("  {}", report["suggestion"].as_str().unwrap_or_default().dimmed());
    }
    Ok(passed)
}

fn admission_report(outline: &str) -> serde_json::Value {
    match AdmissionFilter::check(outline).error {
        None => json!({ "is_valid": true }),
        Some(rejection) => json!({
            "is_valid": false,
            "stage": rejection.stage,
            "message": rejection.message,
            "suggestion": rejection.suggestion(),
        }),
    }
}

pub fn validate(file: &Path, json: bool) -> Result<bool> {
    let source = read_source(file)?;
    let verdict = StaticValidator::new().validate(&source);

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else if verdict.is_valid() {
        println!("{} {} passed validation", "✓".green().bold(), file.display());
    } else {
        println!(
            "{} {} has {} violation(s):",
            "✗".red().bold(),
            file.display(),
            verdict.violations().len()
        );
        for (i, violation) in verdict.violations().iter().enumerate() {
            println!(
                "  {}. {} {}",
                i + 1,
                format!("[{}]", violation.rule).yellow(),
                violation.message
            );
        }
    }
    Ok(verdict.is_valid())
}

pub fn compile(file: &Path, opts: CompileOptions) -> Result<bool> {
    let source = read_source(file)?;
    let compiled = match LessonCompiler::new().compile(&source) {
        Ok(compiled) => compiled,
        Err(e) => {
            report_compile_error(&e, opts.json);
            return Ok(false);
        }
    };

    for diagnostic in &compiled.diagnostics {
        tracing::warn!("{}: {}", file.display(), diagnostic);
    }

    let rendered = render(&compiled, file, opts.sandbox)?;
    match &opts.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if opts.json {
                println!(
                    "{}",
                    json!({ "ok": true, "output": path, "bytes": rendered.len() })
                );
            } else {
                println!(
                    "{} Compiled {} -> {} ({} bytes)",
                    "✓".green().bold(),
                    file.display(),
                    path.display(),
                    rendered.len()
                );
            }
        }
        None if opts.json => {
            let mut report = json!({
                "ok": true,
                "diagnostics": compiled.diagnostics,
                "source_bytes": compiled.source_bytes,
            });
            let key = if opts.sandbox { "html" } else { "code" };
            report[key] = json!(rendered);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        None => print!("{}", rendered),
    }
    Ok(true)
}

fn render(compiled: &CompiledLesson, file: &Path, sandbox: bool) -> Result<String> {
    if !sandbox {
        return Ok(compiled.code.clone());
    }
    let title = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Lesson");
    Ok(SandboxExecutor::default().host_page(compiled, title, "/"))
}

fn report_compile_error(err: &CompileError, json: bool) {
    if json {
        println!("{}", json!({ "ok": false, "error": err.to_string() }));
    } else {
        println!("{} {}", "✗".red().bold(), err);
    }
}

fn read_source(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LESSON: &str = r#"'use client';
import React, { useState } from 'react';

export default function CountingLesson() {
  const [count, setCount] = useState(0);
  return (
    <div>
      <p>You counted {count} apples</p>
      <button onClick={() => setCount(count + 1)}>Add an apple</button>
    </div>
  );
}
"#;

    fn lesson_file(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counting.tsx");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_admission_report_carries_suggestion() {
        let report = admission_report("aaaaaaaaaaaaa");
        assert_eq!(report["is_valid"], false);
        assert_eq!(report["stage"], "spam");
        assert!(report["suggestion"].as_str().is_some());

        assert_eq!(admission_report("Explain how magnets work")["is_valid"], true);
    }

    #[test]
    fn test_validate_file() {
        let (_dir, path) = lesson_file(LESSON);
        assert!(validate(&path, true).unwrap());

        let (_dir, broken) = lesson_file(&LESSON.replace("'use client';", ""));
        assert!(!validate(&broken, false).unwrap());
    }

    #[test]
    fn test_compile_to_sandbox_page() {
        let (dir, path) = lesson_file(LESSON);
        let output = dir.path().join("counting.html");
        let passed = compile(
            &path,
            CompileOptions {
                sandbox: true,
                output: Some(output.clone()),
                json: false,
            },
        )
        .unwrap();

        assert!(passed);
        let html = std::fs::read_to_string(output).unwrap();
        assert!(html.contains(r#"sandbox="allow-scripts""#));
        assert!(html.contains("<title>counting</title>"));
    }

    #[test]
    fn test_compile_rejects_foreign_import() {
        let (_dir, path) = lesson_file(&LESSON.replace(
            "import React, { useState } from 'react';",
            "import React, { useState } from 'react';\nimport _ from 'lodash';",
        ));
        let passed = compile(
            &path,
            CompileOptions {
                sandbox: false,
                output: None,
                json: true,
            },
        )
        .unwrap();
        assert!(!passed);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(validate(Path::new("/definitely/not/here.tsx"), false).is_err());
    }
}
