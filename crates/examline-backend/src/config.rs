//! Backend configuration and factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use examline_core::controller::EngineConfig;
use examline_core::loader::{ContextSource, ExamLoader};
use examline_core::reconcile::ScoreInterpretation;
use examline_core::traits::{AssessmentSource, GradingService};

use crate::client::{BackendClient, DEFAULT_TIMEOUT_SECS};
use crate::grader::HttpGrader;
use crate::sources::HttpAssessmentSource;

/// Top-level examline configuration.
///
/// Credentials are deliberately absent: the signed-in learner's token is
/// handed to the session at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamlineConfig {
    /// Backend root, e.g. `https://learn.example.com`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Primary assessment endpoint; `{id}` is replaced by the assessment id.
    #[serde(default = "default_assessment_path")]
    pub assessment_path: String,
    /// Older exam endpoint tried after the primary one. Empty disables it.
    #[serde(default = "default_legacy_path")]
    pub legacy_assessment_path: Option<String>,
    /// Grading endpoint.
    #[serde(default = "default_submit_path")]
    pub submit_path: String,
    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Upper bound on one grading call, enforced by the engine.
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_secs: u64,
    /// Length of one countdown second in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub score_interpretation: ScoreInterpretation,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_assessment_path() -> String {
    "/api/assessments/{id}".to_string()
}
fn default_legacy_path() -> Option<String> {
    Some("/api/exams/{id}".to_string())
}
fn default_submit_path() -> String {
    "/api/assessments/{id}/submit".to_string()
}
fn default_request_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_submit_timeout() -> u64 {
    30
}
fn default_tick_interval() -> u64 {
    1000
}

impl Default for ExamlineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            assessment_path: default_assessment_path(),
            legacy_assessment_path: default_legacy_path(),
            submit_path: default_submit_path(),
            request_timeout_secs: default_request_timeout(),
            submit_timeout_secs: default_submit_timeout(),
            tick_interval_ms: default_tick_interval(),
            score_interpretation: ScoreInterpretation::default(),
        }
    }
}

impl ExamlineConfig {
    /// Engine settings derived from this file.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
            submit_timeout: Duration::from_secs(self.submit_timeout_secs.max(1)),
            score_interpretation: self.score_interpretation,
        }
    }

    fn resolve_env(&mut self) {
        self.base_url = resolve_env_vars(&self.base_url);
        self.assessment_path = resolve_env_vars(&self.assessment_path);
        self.submit_path = resolve_env_vars(&self.submit_path);
        self.legacy_assessment_path = self
            .legacy_assessment_path
            .as_deref()
            .map(resolve_env_vars)
            .filter(|p| !p.trim().is_empty());
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are copied verbatim and never re-expanded.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + 2 + len];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + 2 + len + 1..];
    }
    result.push_str(rest);
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examline.toml` in the current directory
/// 2. `~/.config/examline/config.toml`
///
/// `EXAMLINE_BASE_URL` overrides `base_url`.
pub fn load_config() -> Result<ExamlineConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamlineConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examline.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExamlineConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamlineConfig::default(),
    };

    if let Ok(url) = std::env::var("EXAMLINE_BASE_URL") {
        if !url.trim().is_empty() {
            config.base_url = url;
        }
    }

    config.resolve_env();
    tracing::debug!(base_url = %config.base_url, "configuration loaded");
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examline"))
}

/// Build the loader and grader described by `config`.
///
/// When the host page supplies a learner context, it is consulted before
/// the HTTP endpoints.
pub fn create_backend(
    config: &ExamlineConfig,
    context: Option<Value>,
) -> Result<(ExamLoader, Arc<dyn GradingService>)> {
    let client = Arc::new(BackendClient::new(
        &config.base_url,
        Duration::from_secs(config.request_timeout_secs.max(1)),
    )?);

    let mut sources: Vec<Arc<dyn AssessmentSource>> = Vec::new();
    if let Some(context) = context {
        sources.push(Arc::new(ContextSource::new(context)));
    }
    sources.push(Arc::new(HttpAssessmentSource::primary(
        config.assessment_path.clone(),
        Arc::clone(&client),
    )));
    if let Some(legacy) = &config.legacy_assessment_path {
        sources.push(Arc::new(HttpAssessmentSource::legacy(
            legacy.clone(),
            Arc::clone(&client),
        )));
    }

    let grader: Arc<dyn GradingService> =
        Arc::new(HttpGrader::new(config.submit_path.clone(), client));
    Ok((ExamLoader::new(sources), grader))
}
