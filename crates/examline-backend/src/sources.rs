//! Assessment sources served over HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use examline_core::ids::{Credential, EntityId};
use examline_core::parser::unwrap_envelope;
use examline_core::traits::AssessmentSource;

use crate::client::BackendClient;

/// One `GET {base_url}{path}` endpoint returning a `{result, data|message}`
/// envelope. A 404 means the assessment is not served here.
pub struct HttpAssessmentSource {
    name: String,
    path: String,
    client: Arc<BackendClient>,
}

impl HttpAssessmentSource {
    pub fn new(name: impl Into<String>, path: impl Into<String>, client: Arc<BackendClient>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            client,
        }
    }

    /// The current assessment endpoint.
    pub fn primary(path: impl Into<String>, client: Arc<BackendClient>) -> Self {
        Self::new("http-primary", path, client)
    }

    /// The older exam endpoint some deployments still serve.
    pub fn legacy(path: impl Into<String>, client: Arc<BackendClient>) -> Self {
        Self::new("http-legacy", path, client)
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl AssessmentSource for HttpAssessmentSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, credential), fields(source = %self.name))]
    async fn fetch(&self, id: &EntityId, credential: &Credential) -> anyhow::Result<Option<Value>> {
        let url = self.client.url(&self.path, id);
        debug!(%url, "fetching assessment");

        match self.client.get_json(&url, credential).await? {
            Some(body) => Ok(Some(unwrap_envelope(body))),
            None => Ok(None),
        }
    }
}
