//! Boundary traits between the engine and its collaborators.
//!
//! The HTTP implementations live in `examline-backend`; the scheduler
//! implementations live in [`crate::scheduler`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::ids::{Credential, EntityId};
use crate::model::AnswerEntry;

// ---------------------------------------------------------------------------
// Assessment sources
// ---------------------------------------------------------------------------

/// One place an assessment definition may come from.
///
/// Sources are tried in priority order by [`crate::loader::ExamLoader`].
#[async_trait]
pub trait AssessmentSource: Send + Sync {
    /// Short name used in logs (e.g. "learner-context").
    fn name(&self) -> &str;

    /// Fetch the raw payload for `id`.
    ///
    /// `Ok(None)` means this source does not know the assessment. Errors are
    /// transport failures; a [`crate::error::BackendError`] in the chain lets
    /// the loader tell a rejected credential apart from a flaky network.
    async fn fetch(&self, id: &EntityId, credential: &Credential)
        -> anyhow::Result<Option<Value>>;
}

// ---------------------------------------------------------------------------
// Grading authority
// ---------------------------------------------------------------------------

/// The external service that grades a submitted answer set.
#[async_trait]
pub trait GradingService: Send + Sync {
    /// Submit the frozen answers and return the raw score.
    ///
    /// By contract the raw score is the number of correctly answered
    /// questions; see [`crate::reconcile::ScoreInterpretation`].
    async fn submit_attempt(
        &self,
        assessment_id: &EntityId,
        answers: &[AnswerEntry],
        credential: &Credential,
    ) -> anyhow::Result<f64>;
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Callback run on every scheduled tick.
pub type TickFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Recurring timer capability owned by the attempt controller.
pub trait Scheduler: Send + Sync {
    /// Run `task` every `period` until the returned guard is dropped.
    ///
    /// The first run happens one full period after registration.
    fn every(&self, period: Duration, task: TickFn) -> TimerGuard;
}

/// Scoped handle to a recurring timer. Dropping it cancels the timer.
pub struct TimerGuard {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerGuard {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Cancel now instead of at drop.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerGuard")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}
