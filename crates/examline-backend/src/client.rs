//! Shared HTTP client for the marketplace backend.

use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;

use examline_core::error::BackendError;
use examline_core::ids::{Credential, EntityId};

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Thin wrapper over `reqwest::Client` that knows the base URL, attaches the
/// bearer credential, and maps HTTP failures onto [`BackendError`].
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs: timeout.as_secs(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Expand a path template such as `/api/assessments/{id}`.
    pub fn url(&self, template: &str, id: &EntityId) -> String {
        let path = template.replace("{id}", &id.key());
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// GET a JSON body. A 404 is `Ok(None)`.
    pub async fn get_json(
        &self,
        url: &str,
        credential: &Credential,
    ) -> Result<Option<Value>, BackendError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        self.read_json(response).await.map(Some)
    }

    /// POST a JSON body and read the JSON reply.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        credential: &Credential,
    ) -> Result<Value, BackendError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(credential.expose())
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status().as_u16() == 404 {
            return Err(BackendError::NotFound(url.to_string()));
        }
        self.read_json(response).await
    }

    async fn read_json(&self, response: reqwest::Response) -> Result<Value, BackendError> {
        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(BackendError::Unauthorized(status));
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(BackendError::ApiError { status, message });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(self.timeout_secs)
            } else {
                BackendError::InvalidResponse(format!("body is not JSON: {e}"))
            }
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout(self.timeout_secs)
        } else {
            BackendError::Network(e.to_string())
        }
    }
}
