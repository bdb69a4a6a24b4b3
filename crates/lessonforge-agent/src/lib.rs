//! LessonForge Agent - generation and bounded self-repair
//!
//! Model output is untrusted. This crate asks a [`LessonGenerator`] for a
//! draft, validates it with the core [`StaticValidator`](lessonforge_core::StaticValidator),
//! and feeds violations back to the model until the draft is clean or the
//! attempt budget is spent.
//!
//! # Architecture
//!
//! 1. **Generator** (`generator`, `providers`): the model seam and its
//!    OpenRouter implementation
//! 2. **Extraction** (`extract`): pulls component source out of Markdown
//! 3. **Repair loop** (`orchestrator`): draft, validate, repair, final gate
//! 4. **Pipeline** (`pipeline`): admission, timeout and the terminal write
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lessonforge_agent::{GeneratorConfig, LessonPipeline, OpenRouterGenerator};
//! use lessonforge_core::MemoryLessonStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let generator = OpenRouterGenerator::from_config(&GeneratorConfig::default())?;
//! let pipeline = Arc::new(LessonPipeline::new(
//!     Arc::new(generator),
//!     Arc::new(MemoryLessonStore::new()),
//! ));
//! let record = pipeline.submit("Explain photosynthesis for 7th graders").await?;
//! println!("lesson {} is {}", record.id, record.status());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, clippy::all)]

pub mod error;
pub mod extract;
pub mod generator;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod providers;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::GenerationError;
pub use extract::extract_source;
pub use generator::{LessonGenerator, RepairContext};
pub use orchestrator::{RejectionReason, RepairOrchestrator, RepairOutcome, DEFAULT_MAX_ATTEMPTS};
pub use pipeline::{LessonPipeline, DEFAULT_DUPLICATE_WINDOW, DEFAULT_TIMEOUT};
pub use providers::{GeneratorConfig, OpenRouterGenerator};
