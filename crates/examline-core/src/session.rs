//! Per-learner session façade.
//!
//! Holds the loader, grader and credential for one signed-in learner and
//! makes sure at most one attempt per assessment is live at a time. A slot
//! is released when its controller is dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::controller::{AttemptController, AttemptObserver, EngineConfig, NoopObserver};
use crate::error::ExamError;
use crate::ids::{Credential, EntityId};
use crate::loader::ExamLoader;
use crate::model::Assessment;
use crate::traits::{GradingService, Scheduler};

type LiveSet = Arc<Mutex<HashSet<EntityId>>>;

pub struct ExamSession {
    loader: ExamLoader,
    grader: Arc<dyn GradingService>,
    scheduler: Arc<dyn Scheduler>,
    credential: Credential,
    config: EngineConfig,
    observer: Arc<dyn AttemptObserver>,
    live: LiveSet,
}

impl ExamSession {
    pub fn new(
        loader: ExamLoader,
        grader: Arc<dyn GradingService>,
        scheduler: Arc<dyn Scheduler>,
        credential: Credential,
    ) -> Self {
        Self {
            loader,
            grader,
            scheduler,
            credential,
            config: EngineConfig::default(),
            observer: Arc::new(NoopObserver),
            live: Arc::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Resolve an assessment without opening an attempt.
    pub async fn load(&self, id: impl Into<EntityId>) -> Result<Assessment, ExamError> {
        self.loader.resolve(&id.into(), &self.credential).await
    }

    /// Resolve `id` and hand out a controller for a fresh attempt.
    ///
    /// The attempt is not started; call [`AttemptController::start`] when the
    /// learner is ready.
    pub async fn open(&self, id: impl Into<EntityId>) -> Result<AttemptController, ExamError> {
        let id = id.into();
        self.reserve(&id)?;

        match self.loader.resolve(&id, &self.credential).await {
            Ok(assessment) => Ok(self.controller(Arc::new(assessment), id)),
            Err(e) => {
                release(&self.live, &id);
                Err(e)
            }
        }
    }

    /// Open an attempt for an assessment the caller already resolved.
    pub fn open_loaded(&self, assessment: Arc<Assessment>) -> Result<AttemptController, ExamError> {
        let id = assessment.id.clone();
        self.reserve(&id)?;
        Ok(self.controller(assessment, id))
    }

    pub fn is_live(&self, id: &EntityId) -> bool {
        lock(&self.live).contains(id)
    }

    pub fn live_attempts(&self) -> usize {
        lock(&self.live).len()
    }

    fn reserve(&self, id: &EntityId) -> Result<(), ExamError> {
        if !lock(&self.live).insert(id.clone()) {
            return Err(ExamError::AlreadyLive(id.clone()));
        }
        Ok(())
    }

    fn controller(&self, assessment: Arc<Assessment>, id: EntityId) -> AttemptController {
        let live = Arc::clone(&self.live);
        AttemptController::builder(
            assessment,
            Arc::clone(&self.grader),
            Arc::clone(&self.scheduler),
            self.credential.clone(),
        )
        .config(self.config.clone())
        .observer(Arc::clone(&self.observer))
        .on_release(move || release(&live, &id))
        .build()
    }
}

fn lock(live: &LiveSet) -> std::sync::MutexGuard<'_, HashSet<EntityId>> {
    live.lock().unwrap_or_else(|e| e.into_inner())
}

fn release(live: &LiveSet, id: &EntityId) {
    lock(live).remove(id);
}
