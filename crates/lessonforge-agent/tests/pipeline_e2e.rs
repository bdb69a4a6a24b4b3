//! End-to-end: outline -> admission -> repair loop -> persisted record

use std::sync::Arc;
use std::time::Duration;

use lessonforge_agent::testing::{ScriptedGenerator, SAMPLE_LESSON};
use lessonforge_agent::{GenerationError, LessonPipeline, RepairOrchestrator};
use lessonforge_core::{
    AdmissionStage, FailureKind, ForgeError, LessonStatus, LessonStore, MemoryLessonStore,
    SqliteLessonStore, StaticValidator,
};

fn setup(generator: ScriptedGenerator) -> (Arc<LessonPipeline>, Arc<ScriptedGenerator>, Arc<MemoryLessonStore>) {
    let generator = Arc::new(generator);
    let store = Arc::new(MemoryLessonStore::new());
    let pipeline = Arc::new(LessonPipeline::new(generator.clone(), store.clone()));
    (pipeline, generator, store)
}

fn without_export() -> String {
    SAMPLE_LESSON.replace("export default function", "function")
}

#[tokio::test]
async fn photosynthesis_outline_becomes_generated_lesson() {
    let fenced = format!("Here is your lesson:\n\n```tsx\n{}```\n", SAMPLE_LESSON);
    let (pipeline, generator, store) = setup(ScriptedGenerator::always(fenced));

    let record = pipeline
        .admit("Explain photosynthesis for 7th graders with an interactive diagram")
        .await
        .unwrap();
    assert_eq!(record.status(), LessonStatus::Generating);

    let done = pipeline.run(&record).await.unwrap();
    assert_eq!(done.status(), LessonStatus::Generated);
    assert_eq!(generator.call_count(), 1);

    let stored = store.get(record.id).await.unwrap().unwrap();
    let content = stored.generated_content().unwrap();
    assert!(content.contains("export default function PhotosynthesisLesson"));
    assert!(!content.contains("```"));
    assert!(stored.error_message().is_none());
    // accepted output re-validates clean
    assert!(StaticValidator::new().validate(content).is_valid());
}

#[tokio::test]
async fn spam_outline_is_rejected_before_generation() {
    let (pipeline, generator, store) = setup(ScriptedGenerator::always(SAMPLE_LESSON));

    let err = pipeline.admit("aaaaaaaaaaaaa").await.unwrap_err();
    match err {
        ForgeError::AdmissionRejected(rejection) => assert_eq!(rejection.stage, AdmissionStage::Spam),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(generator.call_count(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn missing_export_on_every_attempt_fails_after_three_calls() {
    let (pipeline, generator, store) = setup(ScriptedGenerator::always(without_export()));

    let record = pipeline.admit("Explain the causes of the French Revolution").await.unwrap();
    let done = pipeline.run(&record).await.unwrap();

    assert_eq!(done.status(), LessonStatus::Failed);
    assert_eq!(generator.call_count(), 3);
    let stored = store.get(record.id).await.unwrap().unwrap();
    assert!(stored.generated_content().is_none());
    assert!(stored.error_message().unwrap().contains("[default-export]"));

    // the two repair calls each carried the previous draft
    let contexts = generator.repair_contexts();
    assert!(contexts[0].is_none());
    assert!(contexts[1..].iter().all(|c| c.is_some()));
}

#[tokio::test]
async fn transport_failure_then_success() {
    let (pipeline, generator, _store) = setup(ScriptedGenerator::new(vec![
        Err(GenerationError::Transport("connection reset by peer".into())),
        Ok(SAMPLE_LESSON.to_string()),
    ]));

    let record = pipeline.admit("Teach the basics of fractions with pizza slices").await.unwrap();
    let done = pipeline.run(&record).await.unwrap();
    assert_eq!(done.status(), LessonStatus::Generated);
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn transport_failure_on_every_attempt_is_persisted() {
    let (pipeline, generator, _store) = setup(ScriptedGenerator::new(vec![Err(
        GenerationError::Api {
            status: 503,
            body: "upstream unavailable".into(),
        },
    )]));

    let record = pipeline.admit("Explain how vaccines train the immune system").await.unwrap();
    let done = pipeline.run(&record).await.unwrap();
    assert_eq!(done.status(), LessonStatus::Failed);
    assert!(done.error_message().unwrap().contains("upstream unavailable"));
    assert_eq!(generator.call_count(), 3);
}

#[tokio::test]
async fn timeout_writes_failed_record() {
    let generator = Arc::new(
        ScriptedGenerator::always(SAMPLE_LESSON).with_delay(Duration::from_secs(10)),
    );
    let store = Arc::new(MemoryLessonStore::new());
    let pipeline = LessonPipeline::new(generator.clone(), store.clone())
        .with_timeout(Duration::from_millis(20));

    let record = pipeline.admit("Explain plate tectonics and earthquakes").await.unwrap();
    let done = pipeline.run(&record).await.unwrap();

    assert_eq!(done.status(), LessonStatus::Failed);
    assert!(done.error_message().unwrap().contains("timed out"));
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn non_latin_outline_is_generated() {
    let (pipeline, _generator, _store) = setup(ScriptedGenerator::always(SAMPLE_LESSON));

    let record = pipeline.admit("Фотосинтез у растений и водорослей").await.unwrap();
    let done = pipeline.run(&record).await.unwrap();
    assert_eq!(done.status(), LessonStatus::Generated);
}

#[tokio::test]
async fn spawned_pipeline_reaches_terminal_state() {
    let (pipeline, _generator, store) = setup(ScriptedGenerator::always(SAMPLE_LESSON));

    let record = pipeline.admit("Explain the water cycle for 5th graders").await.unwrap();
    pipeline.spawn(record.clone()).await.unwrap();

    let stored = store.get(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status(), LessonStatus::Generated);
}

#[tokio::test]
async fn never_more_calls_than_attempts() {
    for max in 1..=4u32 {
        let generator = Arc::new(ScriptedGenerator::always("still not a component"));
        let pipeline = LessonPipeline::new(generator.clone(), Arc::new(MemoryLessonStore::new()))
            .with_orchestrator(RepairOrchestrator::with_max_attempts(max));

        let record = pipeline.admit("Explain how rainbows form in the sky").await.unwrap();
        let done = pipeline.run(&record).await.unwrap();
        assert_eq!(done.status(), LessonStatus::Failed);
        assert_eq!(generator.call_count(), max);
    }
}

#[tokio::test]
async fn duplicate_of_generating_lesson_is_a_conflict() {
    let (pipeline, _generator, _store) = setup(ScriptedGenerator::always(SAMPLE_LESSON));
    pipeline.admit("Explain the Pythagorean theorem visually").await.unwrap();

    let err = pipeline
        .admit("Explain the Pythagorean theorem visually")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::DuplicateRequest);
}

async fn race_admissions(store: Arc<dyn LessonStore>) {
    let generator = Arc::new(ScriptedGenerator::always(SAMPLE_LESSON));
    let pipeline = Arc::new(LessonPipeline::new(generator, store.clone()));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.admit("Explain how volcanoes erupt").await })
        })
        .collect();

    let mut admitted = Vec::new();
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(record) => admitted.push(record.id),
            Err(ForgeError::DuplicateRequest(_)) => conflicts += 1,
            Err(e) => panic!("unexpected admission error: {}", e),
        }
    }

    assert_eq!(admitted.len(), 1);
    assert_eq!(conflicts, 15);
    assert_eq!(store.list(100).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admissions_create_one_record_in_memory() {
    race_admissions(Arc::new(MemoryLessonStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_admissions_create_one_record_in_sqlite() {
    let store = SqliteLessonStore::open(":memory:").unwrap();
    race_admissions(Arc::new(store)).await;
}
