//! Lesson pipeline: admission, background generation and the terminal write
//!
//! [`LessonPipeline::admit`] runs synchronously inside the request handler.
//! [`LessonPipeline::run`] is the body of the spawned task: it bounds the
//! repair loop with a wall-clock timeout and then writes the record's
//! terminal status exactly once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lessonforge_core::{
    AdmissionFilter, ForgeError, GenerationRequest, LessonRecord, LessonStore, Result,
};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::generator::LessonGenerator;
use crate::orchestrator::{RepairOrchestrator, RepairOutcome};

/// Default wall-clock budget for one lesson, repair attempts included
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default window in which a generated lesson blocks the same outline
pub const DEFAULT_DUPLICATE_WINDOW: Duration = Duration::from_secs(300);

pub struct LessonPipeline {
    orchestrator: RepairOrchestrator,
    generator: Arc<dyn LessonGenerator>,
    store: Arc<dyn LessonStore>,
    timeout: Duration,
    duplicate_window: Duration,
}

impl LessonPipeline {
    pub fn new(generator: Arc<dyn LessonGenerator>, store: Arc<dyn LessonStore>) -> Self {
        Self {
            orchestrator: RepairOrchestrator::new(),
            generator,
            store,
            timeout: DEFAULT_TIMEOUT,
            duplicate_window: DEFAULT_DUPLICATE_WINDOW,
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: RepairOrchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_duplicate_window(mut self, window: Duration) -> Self {
        self.duplicate_window = window;
        self
    }

    pub fn store(&self) -> &Arc<dyn LessonStore> {
        &self.store
    }

    pub fn generator(&self) -> &Arc<dyn LessonGenerator> {
        &self.generator
    }

    pub fn orchestrator(&self) -> &RepairOrchestrator {
        &self.orchestrator
    }

    /// Admission filter, duplicate check, then a new `generating` record
    pub async fn admit(&self, outline: &str) -> Result<LessonRecord> {
        AdmissionFilter::check(outline).into_result()?;

        let outline = outline.trim();
        let window = chrono::Duration::from_std(self.duplicate_window)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let since = Utc::now() - window;
        let record = LessonRecord::generating(outline);
        if let Some(existing) = self.store.create_unless_duplicate(&record, since).await? {
            info!(lesson_id = %existing.id, "duplicate outline refused");
            return Err(ForgeError::DuplicateRequest(existing.id));
        }
        info!(lesson_id = %record.id, title = %record.title, "lesson admitted");
        Ok(record)
    }

    /// Generate, repair and persist the outcome for an admitted record
    pub async fn run(&self, record: &LessonRecord) -> Result<LessonRecord> {
        let request = GenerationRequest::new(record.id, record.outline.clone());
        let outcome = tokio::time::timeout(
            self.timeout,
            self.orchestrator.run(self.generator.as_ref(), &request),
        )
        .await;

        let written = match outcome {
            Ok(RepairOutcome::Accepted { source, attempts }) => {
                info!(lesson_id = %record.id, attempts, "lesson generated");
                self.store.mark_generated(record.id, &record.title, &source).await
            }
            Ok(RepairOutcome::Rejected { reason, attempts }) => {
                warn!(lesson_id = %record.id, attempts, "lesson failed");
                self.store.mark_failed(record.id, &reason.describe()).await
            }
            Err(_) => {
                warn!(lesson_id = %record.id, timeout = ?self.timeout, "lesson generation timed out");
                let message = format!("Lesson generation timed out after {:?}", self.timeout);
                self.store.mark_failed(record.id, &message).await
            }
        };

        written.map_err(|e| {
            error!(lesson_id = %record.id, "terminal write failed: {}", e);
            e
        })
    }

    /// Run the pipeline for `record` on its own task
    pub fn spawn(self: &Arc<Self>, record: LessonRecord) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            // errors are already logged by run()
            let _ = pipeline.run(&record).await;
        })
    }

    /// [`admit`](Self::admit) then [`spawn`](Self::spawn)
    pub async fn submit(self: &Arc<Self>, outline: &str) -> Result<LessonRecord> {
        let record = self.admit(outline).await?;
        self.spawn(record.clone());
        Ok(record)
    }
}

impl std::fmt::Debug for LessonPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LessonPipeline")
            .field("generator", &self.generator.name())
            .field("max_attempts", &self.orchestrator.max_attempts())
            .field("timeout", &self.timeout)
            .field("duplicate_window", &self.duplicate_window)
            .finish()
    }
}
