//! Test support: a scripted [`LessonGenerator`]
//!
//! Compiled for this crate's tests and behind the `test-support` feature,
//! which the gateway enables for its handler tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lessonforge_core::GenerationRequest;
use parking_lot::Mutex;

use crate::error::GenerationError;
use crate::generator::{LessonGenerator, RepairContext};

/// A lesson that passes every validation rule
pub const SAMPLE_LESSON: &str = r#"'use client';
import React, { useState } from 'react';

const steps = ['Light is absorbed', 'Water is split', 'Sugar is built'];

export default function PhotosynthesisLesson() {
  const [index, setIndex] = useState(0);
  return (
    <div className="lesson">
      <h1>Photosynthesis</h1>
      <p>{steps[index]}</p>
      <button onClick={() => setIndex((index + 1) % steps.length)}>Next step</button>
      <button onClick={() => navigateHome()}>Back to lessons</button>
    </div>
  );
}
"#;

/// Replays a fixed list of responses. Once the script runs out, the last
/// response repeats.
#[derive(Debug)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: AtomicU32,
    repairs: Mutex<Vec<Option<RepairContext>>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
            repairs: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Every call returns `raw`
    pub fn always(raw: impl Into<String>) -> Self {
        Self::new(vec![Ok(raw.into())])
    }

    /// Sleep before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Repair context seen by each call, in call order
    pub fn repair_contexts(&self) -> Vec<Option<RepairContext>> {
        self.repairs.lock().clone()
    }

    fn next_response(&self) -> Result<String, GenerationError> {
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front().unwrap_or(Err(GenerationError::EmptyResponse))
        } else {
            script.front().cloned().unwrap_or(Err(GenerationError::EmptyResponse))
        }
    }
}

#[async_trait]
impl LessonGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        _request: &GenerationRequest,
        repair: Option<&RepairContext>,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.repairs.lock().push(repair.cloned());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_response()
    }
}
