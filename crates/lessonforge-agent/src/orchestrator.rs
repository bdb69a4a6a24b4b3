//! Repair Orchestrator - Generate -> Validate -> Repair -> Verify
//!
//! Drives one lesson request through a bounded number of generation attempts.
//! Every call to the generator consumes an attempt, whether it returns a
//! draft or fails in transport. A draft with violations is sent back to the
//! model together with its exact violation list.
//!
//! ```text
//! Draft ─► Validating ─► Accepted ─► final gate ─► success
//!              │
//!              ├─► Repairing ─► Validating ─► ...
//!              └─► Rejected (budget spent)
//! ```

use lessonforge_core::{ForgeError, GenerationRequest, StaticValidator, ValidationVerdict, Violation};
use tracing::{debug, error, info, warn};

use crate::error::GenerationError;
use crate::extract::extract_source;
use crate::generator::{LessonGenerator, RepairContext};

/// Default attempt ceiling, including the first draft
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Why a request ended without an accepted draft
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    /// The last draft still had violations
    Validation(Vec<Violation>),
    /// The last generation call failed
    Transport(GenerationError),
    /// A draft marked accepted failed re-validation
    InvariantBreach(Vec<Violation>),
}

impl RejectionReason {
    /// Human-readable reason, persisted as the record's error message
    pub fn describe(&self) -> String {
        match self {
            RejectionReason::Validation(violations) => format!(
                "Generated code failed validation:\n{}",
                ValidationVerdict::from_violations(violations.clone()).describe()
            ),
            RejectionReason::Transport(err) => format!("Lesson generation failed: {}", err),
            RejectionReason::InvariantBreach(violations) => format!(
                "Accepted code failed final validation:\n{}",
                ValidationVerdict::from_violations(violations.clone()).describe()
            ),
        }
    }
}

/// Result of a full orchestration run
#[derive(Debug, Clone, PartialEq)]
pub enum RepairOutcome {
    Accepted { source: String, attempts: u32 },
    Rejected { reason: RejectionReason, attempts: u32 },
}

impl RepairOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RepairOutcome::Accepted { .. })
    }

    /// Generation calls made
    pub fn attempts(&self) -> u32 {
        match self {
            RepairOutcome::Accepted { attempts, .. } | RepairOutcome::Rejected { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn into_result(self) -> lessonforge_core::Result<String> {
        match self {
            RepairOutcome::Accepted { source, .. } => Ok(source),
            RepairOutcome::Rejected { reason, .. } => Err(match reason {
                RejectionReason::Validation(v) | RejectionReason::InvariantBreach(v) => {
                    ForgeError::ValidationRejected(v)
                }
                RejectionReason::Transport(e) => ForgeError::TransportFailure(e.to_string()),
            }),
        }
    }
}

/// Bounded self-repair loop around a [`LessonGenerator`]
#[derive(Debug)]
pub struct RepairOrchestrator {
    validator: StaticValidator,
    max_attempts: u32,
}

impl RepairOrchestrator {
    pub fn new() -> Self {
        Self {
            validator: StaticValidator::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Custom attempt ceiling (at least one)
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            validator: StaticValidator::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn with_validator(mut self, validator: StaticValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn validator(&self) -> &StaticValidator {
        &self.validator
    }

    /// Run the loop for one request
    pub async fn run(
        &self,
        generator: &dyn LessonGenerator,
        request: &GenerationRequest,
    ) -> RepairOutcome {
        let mut last_draft: Option<RepairContext> = None;
        let mut last_failure: Option<GenerationError> = None;
        let mut attempts = 0;
        let mut accepted: Option<String> = None;

        while attempts < self.max_attempts {
            let attempt_request = request.at_attempt(attempts);
            attempts += 1;

            let raw = match generator.generate(&attempt_request, last_draft.as_ref()).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(
                        lesson_id = %request.lesson_id,
                        attempt = attempts,
                        generator = generator.name(),
                        "generation call failed: {}",
                        e
                    );
                    last_failure = Some(e);
                    continue;
                }
            };
            last_failure = None;

            let source = extract_source(&raw);
            let verdict = self.validator.validate(&source);
            if verdict.is_valid() {
                info!(lesson_id = %request.lesson_id, attempts, "draft accepted");
                accepted = Some(source);
                break;
            }

            debug!(
                lesson_id = %request.lesson_id,
                attempt = attempts,
                "draft rejected:\n{}",
                verdict.describe()
            );
            warn!(
                lesson_id = %request.lesson_id,
                attempt = attempts,
                violations = verdict.violations().len(),
                "draft failed validation"
            );
            last_draft = Some(RepairContext::new(source, verdict.into_violations()));
        }

        if let Some(source) = accepted {
            return self.final_gate(request, source, attempts);
        }

        let reason = match (last_failure, last_draft) {
            (Some(err), _) => RejectionReason::Transport(err),
            (None, Some(draft)) => RejectionReason::Validation(draft.violations),
            (None, None) => RejectionReason::Transport(GenerationError::EmptyResponse),
        };
        warn!(lesson_id = %request.lesson_id, attempts, "repair budget exhausted");
        RepairOutcome::Rejected { reason, attempts }
    }

    /// Re-validate an accepted draft right before reporting success
    fn final_gate(&self, request: &GenerationRequest, source: String, attempts: u32) -> RepairOutcome {
        let verdict = self.validator.validate(&source);
        if verdict.is_valid() {
            return RepairOutcome::Accepted { source, attempts };
        }
        error!(
            lesson_id = %request.lesson_id,
            "invariant breach: accepted draft failed final validation:\n{}",
            verdict.describe()
        );
        RepairOutcome::Rejected {
            reason: RejectionReason::InvariantBreach(verdict.into_violations()),
            attempts,
        }
    }
}

impl Default for RepairOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedGenerator, SAMPLE_LESSON};
    use lessonforge_core::{RuleId, Uuid};

    fn request() -> GenerationRequest {
        GenerationRequest::new(Uuid::new_v4(), "Explain photosynthesis")
    }

    fn without_export() -> String {
        SAMPLE_LESSON.replace("export default function", "function")
    }

    #[tokio::test]
    async fn test_first_draft_accepted() {
        let generator = ScriptedGenerator::always(format!("```tsx\n{}```", SAMPLE_LESSON));
        let outcome = RepairOrchestrator::new().run(&generator, &request()).await;

        assert!(outcome.is_accepted());
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(generator.call_count(), 1);
        assert_eq!(generator.repair_contexts(), vec![None]);
    }

    #[tokio::test]
    async fn test_repair_receives_previous_draft_and_violations() {
        let broken = without_export();
        let generator = ScriptedGenerator::new(vec![Ok(broken.clone()), Ok(SAMPLE_LESSON.to_string())]);
        let outcome = RepairOrchestrator::new().run(&generator, &request()).await;

        assert_eq!(outcome.attempts(), 2);
        let contexts = generator.repair_contexts();
        let repair = contexts[1].as_ref().expect("second call is a repair");
        assert_eq!(repair.previous_source, broken);
        assert_eq!(repair.violations[0].rule, RuleId::DefaultExport);
    }

    #[tokio::test]
    async fn test_budget_exhausted_reports_last_violations() {
        let generator = ScriptedGenerator::always(without_export());
        let outcome = RepairOrchestrator::new().run(&generator, &request()).await;

        assert_eq!(generator.call_count(), DEFAULT_MAX_ATTEMPTS);
        match outcome {
            RepairOutcome::Rejected {
                reason: RejectionReason::Validation(violations),
                attempts,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(violations[0].rule, RuleId::DefaultExport);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_trailing_transport_failure_wins() {
        let generator = ScriptedGenerator::new(vec![
            Ok(without_export()),
            Err(GenerationError::Transport("connection reset".into())),
        ]);
        let outcome = RepairOrchestrator::with_max_attempts(2)
            .run(&generator, &request())
            .await;

        assert!(matches!(
            outcome,
            RepairOutcome::Rejected {
                reason: RejectionReason::Transport(_),
                attempts: 2
            }
        ));
        let err = outcome.into_result().unwrap_err();
        assert_eq!(err.kind(), lessonforge_core::FailureKind::TransportFailure);
    }

    #[tokio::test]
    async fn test_transport_failure_consumes_attempt_then_recovers() {
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationError::Api {
                status: 502,
                body: "bad gateway".into(),
            }),
            Ok(SAMPLE_LESSON.to_string()),
        ]);
        let outcome = RepairOrchestrator::new().run(&generator, &request()).await;

        assert!(outcome.is_accepted());
        assert_eq!(outcome.attempts(), 2);
        // no draft yet, so the retry is not a repair
        assert_eq!(generator.repair_contexts(), vec![None, None]);
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RepairOrchestrator::with_max_attempts(0).max_attempts(), 1);
    }

    #[test]
    fn test_rejection_description_numbers_violations() {
        let reason = RejectionReason::Validation(vec![
            Violation::new(RuleId::DefaultExport, "Missing export"),
            Violation::new(RuleId::ClientDirective, "Missing 'use client' directive"),
        ]);
        assert_eq!(
            reason.describe(),
            "Generated code failed validation:\n1. [default-export] Missing export\n2. [client-directive] Missing 'use client' directive"
        );
    }
}
