//! The generation seam
//!
//! [`LessonGenerator`] is the only way the pipeline talks to a model. A call
//! with a [`RepairContext`] asks the model to fix its previous draft.

use async_trait::async_trait;
use lessonforge_core::{GenerationRequest, Violation};

use crate::error::GenerationError;

/// The previous draft and everything wrong with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairContext {
    pub previous_source: String,
    pub violations: Vec<Violation>,
}

impl RepairContext {
    pub fn new(previous_source: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            previous_source: previous_source.into(),
            violations,
        }
    }
}

/// A model that writes lesson components
#[async_trait]
pub trait LessonGenerator: Send + Sync + std::fmt::Debug {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Produce raw model output for one attempt. The output may still be
    /// wrapped in Markdown; the orchestrator extracts the code.
    async fn generate(
        &self,
        request: &GenerationRequest,
        repair: Option<&RepairContext>,
    ) -> Result<String, GenerationError>;
}
