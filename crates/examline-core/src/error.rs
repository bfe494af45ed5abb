//! Error types.
//!
//! [`ExamError`] is what the engine hands back to callers. [`BackendError`]
//! describes transport failures of the boundary calls; it is defined here so
//! the loader and controller can downcast the `anyhow::Error`s returned by
//! [`crate::traits`] implementations and classify them without string
//! matching.

use thiserror::Error;

use crate::ids::EntityId;
use crate::model::AttemptState;

/// Errors surfaced by the exam engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExamError {
    /// No source knows the requested assessment.
    #[error("assessment {0} not found in any source")]
    NotFound(EntityId),

    /// The credential is missing or was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A candidate payload failed structural validation.
    #[error("invalid assessment payload: {0}")]
    InvalidSchema(String),

    /// The payload validated but no question survived filtering.
    #[error("assessment {0} has no usable questions")]
    NoValidQuestions(EntityId),

    /// Grading failed; the answer snapshot is kept for a retry.
    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    /// An operation was called from a state that does not allow it.
    #[error("`{operation}` is not allowed while the attempt is {state}")]
    GuardViolation {
        operation: &'static str,
        state: AttemptState,
    },

    /// The question or choice is not part of the assessment.
    #[error("choice {choice_id} is not a valid answer to question {question_id}")]
    InvalidAnswer {
        question_id: EntityId,
        choice_id: EntityId,
    },

    /// The session already holds a live attempt for this assessment.
    #[error("an attempt for assessment {0} is already live in this session")]
    AlreadyLive(EntityId),

    /// The grading value cannot be reconciled with the assessment.
    #[error("raw score {raw} is outside 0..={max}")]
    InconsistentScore { raw: f64, max: f64 },
}

impl ExamError {
    /// Whether the learner should be offered a retry.
    ///
    /// Every load failure qualifies, as does any failure that leaves the
    /// attempt `Failed` with its answers kept. Caller misuse does not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExamError::NotFound(_)
            | ExamError::Unauthorized(_)
            | ExamError::InvalidSchema(_)
            | ExamError::NoValidQuestions(_)
            | ExamError::SubmissionFailed(_)
            | ExamError::InconsistentScore { .. } => true,
            ExamError::GuardViolation { .. }
            | ExamError::InvalidAnswer { .. }
            | ExamError::AlreadyLive(_) => false,
        }
    }
}

/// Errors that can occur when talking to the assessment or grading backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend answered 401/403.
    #[error("credential rejected (HTTP {0})")]
    Unauthorized(u16),

    /// The backend answered 404.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The backend returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The body did not have the documented shape.
    #[error("malformed response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Find a `BackendError` anywhere in an anyhow chain.
    pub fn find(err: &anyhow::Error) -> Option<&BackendError> {
        err.chain().find_map(|cause| cause.downcast_ref::<BackendError>())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::Unauthorized(_))
    }
}
