//! HTTP grading client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use examline_core::error::BackendError;
use examline_core::ids::{Credential, EntityId};
use examline_core::model::AnswerEntry;
use examline_core::traits::GradingService;

use crate::client::BackendClient;

#[derive(Serialize)]
struct SubmitBody<'a> {
    answers: &'a [AnswerEntry],
}

/// Posts `{answers: [...]}` to the submit endpoint and reads
/// `{result, message: {score}}` back.
pub struct HttpGrader {
    path: String,
    client: Arc<BackendClient>,
}

impl HttpGrader {
    pub fn new(path: impl Into<String>, client: Arc<BackendClient>) -> Self {
        Self {
            path: path.into(),
            client,
        }
    }
}

#[async_trait]
impl GradingService for HttpGrader {
    #[instrument(skip(self, answers, credential), fields(answers = answers.len()))]
    async fn submit_attempt(
        &self,
        assessment_id: &EntityId,
        answers: &[AnswerEntry],
        credential: &Credential,
    ) -> anyhow::Result<f64> {
        let url = self.client.url(&self.path, assessment_id);
        let body = self
            .client
            .post_json(&url, &SubmitBody { answers }, credential)
            .await?;

        let score = parse_score(&body)?;
        debug!(score, "grading response received");
        Ok(score)
    }
}

/// Extract the raw score from a grading response.
///
/// Some deployments put the payload under `data` instead of `message`; both
/// are accepted. A numeric string is read as a number. The value is returned
/// as sent; whether a fraction is acceptable depends on the configured
/// `ScoreInterpretation`, so the engine's reconciler makes that call.
pub fn parse_score(body: &Value) -> Result<f64, BackendError> {
    if body.get("result").and_then(Value::as_bool) == Some(false) {
        let reason = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("grading rejected the submission");
        return Err(BackendError::InvalidResponse(reason.to_string()));
    }

    let score = ["message", "data"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|payload| payload.get("score"))
        .ok_or_else(|| BackendError::InvalidResponse("response has no score".into()))?;

    match score {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
    .ok_or_else(|| BackendError::InvalidResponse(format!("score is not a number: {score}")))
}
