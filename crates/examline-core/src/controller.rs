//! Attempt controller.
//!
//! Finite-state machine for one learner's run through an assessment:
//!
//! ```text
//! NotStarted -> InProgress -> Submitting -> Finished
//!                                       \-> Failed -> (retry) Submitting
//! ```
//!
//! The controller owns the countdown timer, the answer ledger and the
//! navigator. Every entry into submission goes through one state check under
//! the progress lock, so a timeout-forced submit racing a manual one results
//! in exactly one grading call.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::ExamError;
use crate::ids::{Credential, EntityId};
use crate::ledger::AnswerLedger;
use crate::model::{
    AnswerEntry, Assessment, Attempt, AttemptState, Question, SubmissionResult, SubmitTrigger,
};
use crate::navigator::Navigator;
use crate::reconcile::{ScoreInterpretation, ScoreReconciler};
use crate::traits::{GradingService, Scheduler, TickFn, TimerGuard};

/// Configuration for the attempt controller.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wall-clock length of one countdown second.
    pub tick_interval: Duration,
    /// Upper bound on a single grading call.
    pub submit_timeout: Duration,
    /// How the grading service's raw score is read.
    pub score_interpretation: ScoreInterpretation,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            submit_timeout: Duration::from_secs(30),
            score_interpretation: ScoreInterpretation::CorrectCount,
        }
    }
}

/// Lifecycle notifications for the presentation layer.
///
/// Forced submissions happen without any caller on the stack, so this is how
/// a view learns that the attempt ended.
pub trait AttemptObserver: Send + Sync {
    fn on_started(&self, attempt: &Attempt);
    fn on_tick(&self, remaining_seconds: u64);
    fn on_submitted(&self, result: &SubmissionResult, trigger: SubmitTrigger);
    fn on_failed(&self, error: &ExamError, trigger: SubmitTrigger);
}

/// No-op observer.
pub struct NoopObserver;

impl AttemptObserver for NoopObserver {
    fn on_started(&self, _: &Attempt) {}
    fn on_tick(&self, _: u64) {}
    fn on_submitted(&self, _: &SubmissionResult, _: SubmitTrigger) {}
    fn on_failed(&self, _: &ExamError, _: SubmitTrigger) {}
}

/// Result of a `submit()` call that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// This call performed the submission.
    Graded(SubmissionResult),
    /// Another submission is in flight; nothing was sent.
    AlreadySubmitting,
    /// A forced submit arrived after the attempt had already ended.
    AlreadyEnded,
}

/// Result of one countdown tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The attempt is not running; the tick did nothing.
    Idle,
    /// Seconds left after this tick.
    Counting(u64),
    /// The countdown reached zero and forced a submission.
    Expired(SubmitOutcome),
}

struct Progress {
    state: AttemptState,
    started_at: Option<DateTime<Utc>>,
    remaining: u64,
    navigator: Navigator,
    ledger: AnswerLedger,
    /// Frozen answers, kept after a failed submission for the retry path.
    snapshot: Option<Vec<AnswerEntry>>,
    trigger: Option<SubmitTrigger>,
    result: Option<SubmissionResult>,
    last_error: Option<ExamError>,
    grading_calls: u32,
    timer: Option<TimerGuard>,
}

struct Shared {
    attempt_id: Uuid,
    assessment: Arc<Assessment>,
    grader: Arc<dyn GradingService>,
    scheduler: Arc<dyn Scheduler>,
    observer: Arc<dyn AttemptObserver>,
    credential: Credential,
    config: EngineConfig,
    reconciler: ScoreReconciler,
    progress: Mutex<Progress>,
}

/// Builder for [`AttemptController`].
pub struct AttemptBuilder {
    assessment: Arc<Assessment>,
    grader: Arc<dyn GradingService>,
    scheduler: Arc<dyn Scheduler>,
    credential: Credential,
    observer: Arc<dyn AttemptObserver>,
    config: EngineConfig,
    on_release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl AttemptBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run `release` when the controller is dropped.
    pub(crate) fn on_release(mut self, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_release = Some(Box::new(release));
        self
    }

    pub fn build(self) -> AttemptController {
        let question_ids = self.assessment.question_ids();
        let navigator = Navigator::new(question_ids.len());
        let reconciler = ScoreReconciler::new(self.config.score_interpretation);
        let remaining = self.assessment.duration_secs();

        AttemptController {
            shared: Arc::new(Shared {
                attempt_id: Uuid::new_v4(),
                assessment: self.assessment,
                grader: self.grader,
                scheduler: self.scheduler,
                observer: self.observer,
                credential: self.credential,
                config: self.config,
                reconciler,
                progress: Mutex::new(Progress {
                    state: AttemptState::NotStarted,
                    started_at: None,
                    remaining,
                    navigator,
                    ledger: AnswerLedger::new(question_ids),
                    snapshot: None,
                    trigger: None,
                    result: None,
                    last_error: None,
                    grading_calls: 0,
                    timer: None,
                }),
            }),
            on_release: self.on_release,
        }
    }
}

/// Public lifecycle API of one attempt.
///
/// Dropping the controller cancels its countdown.
pub struct AttemptController {
    shared: Arc<Shared>,
    on_release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl AttemptController {
    pub fn builder(
        assessment: Arc<Assessment>,
        grader: Arc<dyn GradingService>,
        scheduler: Arc<dyn Scheduler>,
        credential: Credential,
    ) -> AttemptBuilder {
        AttemptBuilder {
            assessment,
            grader,
            scheduler,
            credential,
            observer: Arc::new(NoopObserver),
            config: EngineConfig::default(),
            on_release: None,
        }
    }

    pub fn new(
        assessment: Arc<Assessment>,
        grader: Arc<dyn GradingService>,
        scheduler: Arc<dyn Scheduler>,
        credential: Credential,
    ) -> Self {
        Self::builder(assessment, grader, scheduler, credential).build()
    }

    pub fn attempt_id(&self) -> Uuid {
        self.shared.attempt_id
    }

    pub fn assessment(&self) -> &Assessment {
        &self.shared.assessment
    }

    /// Begin the attempt and arm the countdown.
    pub fn start(&self) -> Result<(), ExamError> {
        let shared = &self.shared;
        let attempt = {
            let mut p = shared.progress();
            if p.state != AttemptState::NotStarted {
                return Err(ExamError::GuardViolation {
                    operation: "start",
                    state: p.state,
                });
            }
            if shared.assessment.questions.is_empty() {
                return Err(ExamError::NoValidQuestions(shared.assessment.id.clone()));
            }

            p.state = AttemptState::InProgress;
            p.remaining = shared.assessment.duration_secs();
            p.started_at = Some(Utc::now());
            p.timer = Some(
                shared
                    .scheduler
                    .every(shared.config.tick_interval, tick_task(Arc::downgrade(shared))),
            );
            shared.view(&p)
        };

        tracing::info!(
            attempt = %shared.attempt_id,
            assessment = %shared.assessment.id,
            remaining = attempt.remaining_seconds,
            "attempt started"
        );
        shared.observer.on_started(&attempt);
        Ok(())
    }

    /// Advance the countdown by one second.
    ///
    /// Normally driven by the scheduler; exposed so hosts with their own
    /// clock can drive it. At zero the attempt is submitted with
    /// [`SubmitTrigger::Timeout`]; that cannot be cancelled.
    pub async fn tick(&self) -> Result<TickOutcome, ExamError> {
        self.shared.tick().await
    }

    /// Submit the attempt on the learner's behalf.
    pub async fn submit(&self) -> Result<SubmitOutcome, ExamError> {
        self.shared.submit(SubmitTrigger::Manual).await
    }

    /// Resend the preserved answers after a failed submission.
    ///
    /// This is the only retry path and it is never taken automatically.
    pub async fn retry_submission(&self) -> Result<SubmissionResult, ExamError> {
        let shared = &self.shared;
        let (answers, trigger) = {
            let mut p = shared.progress();
            if p.state != AttemptState::Failed {
                return Err(ExamError::GuardViolation {
                    operation: "retry_submission",
                    state: p.state,
                });
            }
            p.state = AttemptState::Submitting;
            let answers = match p.snapshot.clone() {
                Some(snapshot) => snapshot,
                None => p.ledger.freeze(),
            };
            (answers, p.trigger.unwrap_or(SubmitTrigger::Manual))
        };

        tracing::info!(attempt = %shared.attempt_id, "retrying submission");
        shared.grade(answers, trigger).await
    }

    /// Record `choice_id` as the answer to `question_id`.
    ///
    /// Returns `Ok(false)` without changing anything when the attempt is not
    /// in progress. Ids that are not part of the assessment are rejected.
    pub fn record(
        &self,
        question_id: impl Into<EntityId>,
        choice_id: impl Into<EntityId>,
    ) -> Result<bool, ExamError> {
        let (question_id, choice_id) = (question_id.into(), choice_id.into());
        let mut p = self.shared.progress();
        if p.state != AttemptState::InProgress {
            tracing::debug!(state = %p.state, %question_id, "answer ignored");
            return Ok(false);
        }

        let valid = self
            .shared
            .assessment
            .question(&question_id)
            .is_some_and(|q| q.has_choice(&choice_id));
        if !valid {
            return Err(ExamError::InvalidAnswer {
                question_id,
                choice_id,
            });
        }

        Ok(p.ledger.record(question_id, choice_id))
    }

    pub fn answer(&self, question_id: impl Into<EntityId>) -> Option<EntityId> {
        self.shared
            .progress()
            .ledger
            .get(&question_id.into())
            .cloned()
    }

    pub fn answered_count(&self) -> usize {
        self.shared.progress().ledger.answered_count()
    }

    pub fn completion_percent(&self) -> u32 {
        self.shared.progress().ledger.completion_percent()
    }

    pub fn next(&self) -> usize {
        self.navigate(Navigator::next)
    }

    pub fn prev(&self) -> usize {
        self.navigate(Navigator::prev)
    }

    pub fn go_to(&self, index: usize) -> usize {
        self.navigate(|nav| nav.go_to(index))
    }

    pub fn current_index(&self) -> usize {
        self.shared.progress().navigator.index()
    }

    pub fn current_question(&self) -> Option<Question> {
        let index = self.current_index();
        self.shared.assessment.questions.get(index).cloned()
    }

    pub fn state(&self) -> AttemptState {
        self.shared.progress().state
    }

    /// Seconds left on the countdown.
    pub fn remaining(&self) -> u64 {
        self.shared.progress().remaining
    }

    pub fn result(&self) -> Option<SubmissionResult> {
        self.shared.progress().result.clone()
    }

    pub fn last_error(&self) -> Option<ExamError> {
        self.shared.progress().last_error.clone()
    }

    /// What triggered the submission, once there has been one.
    pub fn trigger(&self) -> Option<SubmitTrigger> {
        self.shared.progress().trigger
    }

    /// The answers frozen at submission time.
    pub fn submitted_answers(&self) -> Option<Vec<AnswerEntry>> {
        self.shared.progress().snapshot.clone()
    }

    /// Number of grading calls made so far (retries included).
    pub fn grading_calls(&self) -> u32 {
        self.shared.progress().grading_calls
    }

    pub fn is_timer_armed(&self) -> bool {
        self.shared.progress().timer.is_some()
    }

    /// Snapshot of the live attempt; `None` before `start()`.
    pub fn attempt(&self) -> Option<Attempt> {
        let p = self.shared.progress();
        if p.state == AttemptState::NotStarted {
            return None;
        }
        Some(self.shared.view(&p))
    }

    fn navigate(&self, step: impl FnOnce(&mut Navigator) -> usize) -> usize {
        let mut p = self.shared.progress();
        if p.state.is_terminal() {
            return p.navigator.index();
        }
        step(&mut p.navigator)
    }
}

impl Drop for AttemptController {
    fn drop(&mut self) {
        let timer = self.shared.progress().timer.take();
        if timer.is_some() {
            tracing::debug!(attempt = %self.shared.attempt_id, "controller dropped, cancelling countdown");
        }
        drop(timer);
        if let Some(release) = self.on_release.take() {
            release();
        }
    }
}

fn tick_task(shared: Weak<Shared>) -> TickFn {
    Arc::new(move || {
        let shared = shared.clone();
        async move {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            if let Err(e) = shared.tick().await {
                tracing::warn!(attempt = %shared.attempt_id, "scheduled tick failed: {e}");
            }
        }
        .boxed()
    })
}

impl Shared {
    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn view(&self, p: &Progress) -> Attempt {
        Attempt {
            attempt_id: self.attempt_id,
            assessment_id: self.assessment.id.clone(),
            answers: p.ledger.snapshot(),
            remaining_seconds: p.remaining,
            current_index: p.navigator.index(),
            state: p.state,
            started_at: p.started_at.unwrap_or_else(Utc::now),
        }
    }

    async fn tick(&self) -> Result<TickOutcome, ExamError> {
        let remaining = {
            let mut p = self.progress();
            if p.state != AttemptState::InProgress {
                return Ok(TickOutcome::Idle);
            }
            p.remaining = p.remaining.saturating_sub(1);
            p.remaining
        };

        tracing::trace!(attempt = %self.attempt_id, remaining, "tick");
        self.observer.on_tick(remaining);

        if remaining > 0 {
            return Ok(TickOutcome::Counting(remaining));
        }

        tracing::info!(attempt = %self.attempt_id, "time is up, forcing submission");
        self.submit(SubmitTrigger::Timeout)
            .await
            .map(TickOutcome::Expired)
    }

    async fn submit(&self, trigger: SubmitTrigger) -> Result<SubmitOutcome, ExamError> {
        let answers = {
            let mut p = self.progress();
            match p.state {
                AttemptState::InProgress => {}
                AttemptState::Submitting => {
                    tracing::debug!(attempt = %self.attempt_id, %trigger, "submission already in flight");
                    return Ok(SubmitOutcome::AlreadySubmitting);
                }
                state if state.is_terminal() && trigger == SubmitTrigger::Timeout => {
                    return Ok(SubmitOutcome::AlreadyEnded);
                }
                state => {
                    return Err(ExamError::GuardViolation {
                        operation: "submit",
                        state,
                    });
                }
            }

            p.state = AttemptState::Submitting;
            p.trigger = Some(trigger);
            let answers = p.ledger.freeze();
            p.snapshot = Some(answers.clone());
            if let Some(timer) = p.timer.take() {
                timer.cancel();
            }
            answers
        };

        self.grade(answers, trigger)
            .await
            .map(SubmitOutcome::Graded)
    }

    async fn grade(
        &self,
        answers: Vec<AnswerEntry>,
        trigger: SubmitTrigger,
    ) -> Result<SubmissionResult, ExamError> {
        let span = tracing::info_span!(
            "grade",
            attempt = %self.attempt_id,
            assessment = %self.assessment.id,
            %trigger,
            answers = answers.len()
        );

        async {
            self.progress().grading_calls += 1;

            let call = self
                .grader
                .submit_attempt(&self.assessment.id, &answers, &self.credential);
            let outcome = match tokio::time::timeout(self.config.submit_timeout, call).await {
                Err(_) => Err(ExamError::SubmissionFailed(format!(
                    "grading timed out after {}s",
                    self.config.submit_timeout.as_secs()
                ))),
                Ok(Err(e)) => Err(ExamError::SubmissionFailed(format!("{e:#}"))),
                Ok(Ok(raw)) => self.reconciler.normalize(raw, &self.assessment),
            };

            {
                let mut p = self.progress();
                match &outcome {
                    Ok(result) => {
                        p.state = AttemptState::Finished;
                        p.result = Some(result.clone());
                        p.last_error = None;
                    }
                    Err(e) => {
                        p.state = AttemptState::Failed;
                        p.last_error = Some(e.clone());
                    }
                }
            }

            match &outcome {
                Ok(result) => {
                    tracing::info!(
                        correct = result.correct_answers,
                        percentage = result.percentage,
                        passed = result.passed,
                        "attempt graded"
                    );
                    self.observer.on_submitted(result, trigger);
                }
                Err(e) => {
                    tracing::warn!("submission failed, answers kept for retry: {e}");
                    self.observer.on_failed(e, trigger);
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }
}
