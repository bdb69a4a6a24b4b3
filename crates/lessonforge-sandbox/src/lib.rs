//! LessonForge Sandbox - compilation and isolated execution of accepted lessons
//!
//! Accepted TSX is translated by [`LessonCompiler`] into plain JavaScript that
//! binds its entry component to `LessonComponent`, then wrapped by
//! [`SandboxExecutor`] into a document that runs inside a sandboxed frame with
//! an opaque origin and a narrow capability surface.

pub mod compiler;
pub mod executor;

pub use compiler::{
    compile, CompileError, CompiledLesson, LessonCompiler, ENTRY_BINDING, MAX_NESTING_DEPTH,
};
pub use executor::{
    escape_html, RuntimeBundle, SandboxError, SandboxExecutor, NAVIGATION_SIGNAL,
};
