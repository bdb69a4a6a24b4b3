//! LessonForge Core - admission control and static validation for generated lessons
//!
//! LessonForge turns a free-form lesson outline into a single React component
//! produced by a generative model. Model output is untrusted: it only reaches
//! storage or execution after passing the gates in this crate.
//!
//! # Architecture
//!
//! 1. **Admission** (`admission`): rejects malformed, abusive or off-topic outlines
//!    before any generation cost is incurred
//! 2. **Static validation** (`validator`): ordered rule engine over candidate TSX
//! 3. **Lesson records** (`lesson`): the persisted unit of work and its lifecycle
//! 4. **Storage** (`storage`): `LessonStore` with SQLite and in-memory backends
//!
//! Generation, repair and compilation live in `lessonforge-agent` and
//! `lessonforge-sandbox`.
//!
//! # Quick Start
//!
//! ```
//! use lessonforge_core::{AdmissionFilter, StaticValidator};
//!
//! let decision = AdmissionFilter::check("Explain photosynthesis for 7th graders");
//! assert!(decision.is_valid);
//!
//! let verdict = StaticValidator::new().validate("function lesson() {}");
//! assert!(!verdict.is_valid());
//! for violation in verdict.violations() {
//!     println!("{}", violation);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, clippy::all)]

pub mod admission;
pub mod error;
pub mod lesson;
pub mod storage;
pub mod syntax;
pub mod validator;

// Re-export commonly used types for convenience
pub use admission::{AdmissionDecision, AdmissionFilter, AdmissionRejection, AdmissionStage};
pub use error::{FailureKind, ForgeError, Result, ResultExt, StorageError};
pub use lesson::{derive_title, outline_fingerprint, GenerationRequest, LessonRecord, LessonStatus};
pub use storage::{LessonStore, MemoryLessonStore, SqliteLessonStore};
pub use validator::{RuleId, StaticValidator, ValidationRule, ValidationVerdict, Violation};

pub use uuid::Uuid;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
