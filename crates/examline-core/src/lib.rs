//! examline-core: Timed assessment engine.
//!
//! This crate loads exams from unreliable sources, runs the countdown that
//! can force submission, records and freezes answers, and reconciles the
//! grading service's raw score into a consistent verdict. Transport lives in
//! `examline-backend`.

pub mod controller;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod loader;
pub mod model;
pub mod navigator;
pub mod parser;
pub mod reconcile;
pub mod scheduler;
pub mod session;
pub mod traits;

pub use controller::{
    AttemptController, AttemptObserver, EngineConfig, NoopObserver, SubmitOutcome, TickOutcome,
};
pub use error::{BackendError, ExamError};
pub use ids::{Credential, EntityId};
pub use loader::{ContextSource, ExamLoader};
pub use model::{Assessment, Attempt, AttemptState, SubmissionResult, SubmitTrigger};
pub use reconcile::{ScoreInterpretation, ScoreReconciler};
pub use session::ExamSession;
