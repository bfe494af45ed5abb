//! Core data model types for examline.
//!
//! An [`Assessment`] is immutable once loaded; everything that changes while
//! a learner works through it lives in the attempt controller.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::EntityId;

/// Default exam length in minutes when the payload does not carry one.
pub const DEFAULT_DURATION_MINUTES: u32 = 60;
/// Default maximum marks.
pub const DEFAULT_TOTAL_MARKS: u32 = 100;
/// Default pass threshold in marks.
pub const DEFAULT_PASSING_MARKS: u32 = 50;

/// Immutable definition of an exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: EntityId,
    pub title: String,
    /// Time limit in minutes.
    pub duration_minutes: u32,
    /// Ordered questions; never empty for a loaded assessment.
    pub questions: Vec<Question>,
    pub total_marks: u32,
    pub passing_marks: u32,
}

impl Assessment {
    /// Countdown length in seconds.
    pub fn duration_secs(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    pub fn question(&self, id: &EntityId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == *id)
    }

    pub fn question_ids(&self) -> Vec<EntityId> {
        self.questions.iter().map(|q| q.id.clone()).collect()
    }
}

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: EntityId,
    pub text: String,
    pub choices: Vec<Choice>,
}

impl Question {
    pub fn has_choice(&self, id: &EntityId) -> bool {
        self.choices.iter().any(|c| c.id == *id)
    }
}

/// A selectable answer. Correctness never reaches the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: EntityId,
    pub text: String,
}

/// One `{question_id, choice_id}` pair as sent to the grading service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub question_id: EntityId,
    pub choice_id: EntityId,
}

/// Lifecycle of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    NotStarted,
    InProgress,
    Submitting,
    Finished,
    Failed,
}

impl AttemptState {
    /// Finished and Failed end the attempt view; Failed can still be retried.
    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptState::Finished | AttemptState::Failed)
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptState::NotStarted => write!(f, "not_started"),
            AttemptState::InProgress => write!(f, "in_progress"),
            AttemptState::Submitting => write!(f, "submitting"),
            AttemptState::Finished => write!(f, "finished"),
            AttemptState::Failed => write!(f, "failed"),
        }
    }
}

/// What caused a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    /// The learner pressed submit.
    Manual,
    /// The countdown reached zero.
    Timeout,
}

impl fmt::Display for SubmitTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitTrigger::Manual => write!(f, "manual"),
            SubmitTrigger::Timeout => write!(f, "timeout"),
        }
    }
}

/// Read-only view of a live attempt.
#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    /// Correlation id for logs.
    pub attempt_id: Uuid,
    pub assessment_id: EntityId,
    pub answers: Vec<AnswerEntry>,
    pub remaining_seconds: u64,
    pub current_index: usize,
    pub state: AttemptState,
    pub started_at: DateTime<Utc>,
}

/// Reconciled grading verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub correct_answers: u32,
    pub total_questions: u32,
    pub normalized_score: u32,
    pub total_marks: u32,
    /// Whole-number percentage, 0..=100.
    pub percentage: u32,
    pub passed: bool,
}
