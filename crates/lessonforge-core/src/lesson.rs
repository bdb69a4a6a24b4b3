//! Lesson records and generation requests
//!
//! A [`LessonRecord`] is created in the `generating` state when an outline is
//! admitted and moves exactly once to `generated` or `failed`. The fields that
//! depend on the status are private so the pairing between status, content and
//! error message can only change through [`LessonRecord::complete`] and
//! [`LessonRecord::fail`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageError;

/// Maximum length of a derived lesson title, in characters
pub const MAX_TITLE_CHARS: usize = 80;

/// Lifecycle status of a lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    Generating,
    Generated,
    Failed,
}

impl LessonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LessonStatus::Generating => "generating",
            LessonStatus::Generated => "generated",
            LessonStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LessonStatus::Generating)
    }
}

impl std::fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LessonStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "generating" => Ok(LessonStatus::Generating),
            "generated" => Ok(LessonStatus::Generated),
            "failed" => Ok(LessonStatus::Failed),
            other => Err(format!("unknown lesson status '{}'", other)),
        }
    }
}

/// The persisted unit of work
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonRecord {
    pub id: Uuid,
    pub title: String,
    pub outline: String,
    status: LessonStatus,
    generated_content: Option<String>,
    error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LessonRecord {
    /// Create a new record in the `generating` state
    pub fn generating(outline: impl Into<String>) -> Self {
        let outline = outline.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: derive_title(&outline),
            outline,
            status: LessonStatus::Generating,
            generated_content: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a record from stored columns, refusing combinations that break
    /// the status/content pairing.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        title: String,
        outline: String,
        status: LessonStatus,
        generated_content: Option<String>,
        error_message: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> std::result::Result<Self, StorageError> {
        let consistent = match status {
            LessonStatus::Generating => generated_content.is_none() && error_message.is_none(),
            LessonStatus::Generated => generated_content.is_some() && error_message.is_none(),
            LessonStatus::Failed => generated_content.is_none() && error_message.is_some(),
        };
        if !consistent {
            return Err(StorageError::CorruptRecord {
                id: id.to_string(),
                reason: format!("status '{}' does not match stored content/error columns", status),
            });
        }

        Ok(Self {
            id,
            title,
            outline,
            status,
            generated_content,
            error_message,
            created_at,
            updated_at,
        })
    }

    pub fn status(&self) -> LessonStatus {
        self.status
    }

    pub fn generated_content(&self) -> Option<&str> {
        self.generated_content.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Transition `generating -> generated`
    pub fn complete(
        &mut self,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> std::result::Result<(), StorageError> {
        self.ensure_generating(LessonStatus::Generated)?;
        self.title = title.into();
        self.status = LessonStatus::Generated;
        self.generated_content = Some(content.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transition `generating -> failed`
    pub fn fail(&mut self, message: impl Into<String>) -> std::result::Result<(), StorageError> {
        self.ensure_generating(LessonStatus::Failed)?;
        self.status = LessonStatus::Failed;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    fn ensure_generating(&self, to: LessonStatus) -> std::result::Result<(), StorageError> {
        if self.status.is_terminal() {
            return Err(StorageError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        Ok(())
    }
}

/// Input to one generation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Lesson this request belongs to
    pub lesson_id: Uuid,
    /// Raw outline text
    pub outline: String,
    /// 0-based attempt counter
    pub attempt: u32,
}

impl GenerationRequest {
    pub fn new(lesson_id: Uuid, outline: impl Into<String>) -> Self {
        Self {
            lesson_id,
            outline: outline.into(),
            attempt: 0,
        }
    }

    /// The same unit of work at the given attempt number
    pub fn at_attempt(&self, attempt: u32) -> Self {
        Self {
            lesson_id: self.lesson_id,
            outline: self.outline.clone(),
            attempt,
        }
    }
}

/// Normalized key used to detect duplicate outlines
pub fn outline_fingerprint(outline: &str) -> String {
    let normalized = outline
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    blake3::hash(normalized.as_bytes()).to_hex().to_string()
}

/// Derive a display title from the outline's first sentence or line
pub fn derive_title(outline: &str) -> String {
    let first = outline
        .trim()
        .split(|c| matches!(c, '\n' | '.' | '!' | '?' | '。'))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("Untitled lesson");

    let collapsed = first.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut title: String = if collapsed.chars().count() > MAX_TITLE_CHARS {
        let cut: String = collapsed.chars().take(MAX_TITLE_CHARS - 1).collect();
        format!("{}…", cut.trim_end())
    } else {
        collapsed
    };

    if let Some(first_char) = title.chars().next() {
        if first_char.is_lowercase() {
            let upper: String = first_char.to_uppercase().collect();
            title.replace_range(..first_char.len_utf8(), &upper);
        }
    }
    title
}
