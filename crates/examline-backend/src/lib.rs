//! examline-backend: HTTP transport for the examline engine.
//!
//! Implements `AssessmentSource` and `GradingService` over the marketplace
//! REST API, loads `examline.toml`, and ships a mock grader for tests.

pub mod client;
pub mod config;
pub mod grader;
pub mod mock;
pub mod sources;

pub use client::BackendClient;
pub use config::{create_backend, load_config, load_config_from, ExamlineConfig};
pub use examline_core::error::BackendError;
pub use grader::HttpGrader;
pub use mock::MockGrader;
pub use sources::HttpAssessmentSource;
