//! Mock grader for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use examline_core::error::BackendError;
use examline_core::ids::{Credential, EntityId};
use examline_core::model::AnswerEntry;
use examline_core::traits::GradingService;

enum Reply {
    Score(f64),
    Fail(u16, String),
}

/// A grading service that answers from memory.
///
/// Records every call so tests can assert how many submissions reached the
/// boundary and what they carried. A gated mock holds each call open until
/// [`MockGrader::release`] is called.
pub struct MockGrader {
    reply: Mutex<Reply>,
    gate: Option<Semaphore>,
    call_count: AtomicU32,
    last_answers: Mutex<Option<Vec<AnswerEntry>>>,
    last_assessment: Mutex<Option<EntityId>>,
}

impl MockGrader {
    /// Create a mock that always returns the same raw score.
    pub fn with_fixed_score(score: f64) -> Self {
        Self {
            reply: Mutex::new(Reply::Score(score)),
            gate: None,
            call_count: AtomicU32::new(0),
            last_answers: Mutex::new(None),
            last_assessment: Mutex::new(None),
        }
    }

    /// Create a mock whose calls fail with an API error.
    pub fn failing(status: u16, message: &str) -> Self {
        let mock = Self::with_fixed_score(0.0);
        *mock.reply.lock().unwrap_or_else(|e| e.into_inner()) =
            Reply::Fail(status, message.to_string());
        mock
    }

    /// Hold every call until a permit is released.
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    /// Let `n` held calls complete.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Change the reply for subsequent calls.
    pub fn set_score(&self, score: f64) {
        *self.reply.lock().unwrap_or_else(|e| e.into_inner()) = Reply::Score(score);
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_answers(&self) -> Option<Vec<AnswerEntry>> {
        self.last_answers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn last_assessment(&self) -> Option<EntityId> {
        self.last_assessment
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl GradingService for MockGrader {
    async fn submit_attempt(
        &self,
        assessment_id: &EntityId,
        answers: &[AnswerEntry],
        _credential: &Credential,
    ) -> anyhow::Result<f64> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_answers.lock().unwrap_or_else(|e| e.into_inner()) = Some(answers.to_vec());
        *self.last_assessment.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(assessment_id.clone());

        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }

        match &*self.reply.lock().unwrap_or_else(|e| e.into_inner()) {
            Reply::Score(score) => Ok(*score),
            Reply::Fail(status, message) => Err(BackendError::ApiError {
                status: *status,
                message: message.clone(),
            }
            .into()),
        }
    }
}
