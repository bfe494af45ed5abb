//! Assessment resolution across fallback sources.
//!
//! Sources are tried in priority order and the first structurally valid
//! candidate wins; later sources are not consulted.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{BackendError, ExamError};
use crate::ids::{Credential, EntityId};
use crate::model::Assessment;
use crate::parser::{find_in_context, parse_assessment};
use crate::traits::AssessmentSource;

/// Serves assessments embedded in a learner context payload that the host
/// already has in memory. Cheapest source: no round trip.
#[derive(Debug, Clone)]
pub struct ContextSource {
    context: Value,
}

impl ContextSource {
    pub fn new(context: Value) -> Self {
        Self { context }
    }
}

#[async_trait]
impl AssessmentSource for ContextSource {
    fn name(&self) -> &str {
        "learner-context"
    }

    async fn fetch(
        &self,
        id: &EntityId,
        _credential: &Credential,
    ) -> anyhow::Result<Option<Value>> {
        Ok(find_in_context(&self.context, id).cloned())
    }
}

/// What went wrong across the whole chain, kept to pick the final error.
#[derive(Debug, Default)]
struct Misses {
    unauthorized: Option<String>,
    no_questions: Option<ExamError>,
    invalid: Option<ExamError>,
}

/// Resolves an [`Assessment`] from an ordered list of sources.
pub struct ExamLoader {
    sources: Vec<Arc<dyn AssessmentSource>>,
}

impl ExamLoader {
    pub fn new(sources: Vec<Arc<dyn AssessmentSource>>) -> Self {
        Self { sources }
    }

    /// Append a lower-priority source.
    pub fn with_source(mut self, source: Arc<dyn AssessmentSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Resolve and validate the assessment `id`.
    ///
    /// When no source produces a valid assessment the error is chosen in this
    /// order: `Unauthorized` if any source rejected the credential,
    /// `NoValidQuestions` if a candidate got as far as question filtering,
    /// `InvalidSchema` if a candidate was structurally broken, otherwise
    /// `NotFound`.
    pub async fn resolve(
        &self,
        id: &EntityId,
        credential: &Credential,
    ) -> Result<Assessment, ExamError> {
        if credential.is_blank() {
            return Err(ExamError::Unauthorized(
                "a credential is required to load an assessment".into(),
            ));
        }

        let mut misses = Misses::default();

        for source in &self.sources {
            let payload = match source.fetch(id, credential).await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    tracing::debug!(source = source.name(), assessment = %id, "not in source");
                    continue;
                }
                Err(e) => {
                    match BackendError::find(&e) {
                        Some(backend) if backend.is_unauthorized() => {
                            misses.unauthorized = Some(format!("{}: {backend}", source.name()));
                        }
                        _ => {}
                    }
                    tracing::warn!(
                        source = source.name(),
                        assessment = %id,
                        "source failed, trying next: {e:#}"
                    );
                    continue;
                }
            };

            match parse_assessment(&payload) {
                Ok(assessment) if assessment.id != *id => {
                    tracing::warn!(
                        source = source.name(),
                        requested = %id,
                        received = %assessment.id,
                        "source returned a different assessment"
                    );
                    misses.invalid.get_or_insert(ExamError::InvalidSchema(format!(
                        "{} returned assessment {} for {id}",
                        source.name(),
                        assessment.id
                    )));
                }
                Ok(assessment) => {
                    tracing::info!(
                        source = source.name(),
                        assessment = %assessment.id,
                        questions = assessment.questions.len(),
                        "assessment resolved"
                    );
                    return Ok(assessment);
                }
                Err(e @ ExamError::NoValidQuestions(_)) => {
                    tracing::warn!(source = source.name(), "{e}");
                    misses.no_questions.get_or_insert(e);
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), "{e}");
                    misses.invalid.get_or_insert(e);
                }
            }
        }

        if let Some(reason) = misses.unauthorized {
            return Err(ExamError::Unauthorized(reason));
        }
        Err(misses
            .no_questions
            .or(misses.invalid)
            .unwrap_or_else(|| ExamError::NotFound(id.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Source returning a canned outcome and counting calls.
    struct Fixed {
        name: &'static str,
        outcome: fn() -> anyhow::Result<Option<Value>>,
        calls: AtomicU32,
    }

    impl Fixed {
        fn new(name: &'static str, outcome: fn() -> anyhow::Result<Option<Value>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                outcome,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AssessmentSource for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _: &EntityId, _: &Credential) -> anyhow::Result<Option<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn valid() -> anyhow::Result<Option<Value>> {
        Ok(Some(json!({
            "id": 1,
            "title": "From fixed source",
            "questions": [{"id": 1, "text": "q", "choices": [{"id": 10, "text": "a"}]}]
        })))
    }

    fn missing() -> anyhow::Result<Option<Value>> {
        Ok(None)
    }

    fn bare_string() -> anyhow::Result<Option<Value>> {
        Ok(Some(json!("Assessment fetched")))
    }

    fn empty_questions() -> anyhow::Result<Option<Value>> {
        Ok(Some(json!({"id": 1, "title": "empty", "questions": []})))
    }

    fn rejected() -> anyhow::Result<Option<Value>> {
        Err(BackendError::Unauthorized(401).into())
    }

    fn offline() -> anyhow::Result<Option<Value>> {
        Err(BackendError::Network("connection refused".into()).into())
    }

    fn credential() -> Credential {
        Credential::new("token")
    }

    fn loader(sources: &[Arc<Fixed>]) -> ExamLoader {
        ExamLoader::new(
            sources
                .iter()
                .map(|s| Arc::clone(s) as Arc<dyn AssessmentSource>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn first_valid_source_wins() {
        let first = Fixed::new("first", missing);
        let second = Fixed::new("second", valid);
        let third = Fixed::new("third", valid);
        let loader = loader(&[first.clone(), second.clone(), third.clone()]);

        let assessment = loader.resolve(&1.into(), &credential()).await.unwrap();
        assert_eq!(assessment.title, "From fixed source");
        assert_eq!((first.calls(), second.calls(), third.calls()), (1, 1, 0));
    }

    #[tokio::test]
    async fn appended_source_is_tried_last() {
        let fallback = Fixed::new("fallback", valid);
        let loader = loader(&[Fixed::new("primary", missing)])
            .with_source(fallback.clone() as Arc<dyn AssessmentSource>);
        assert_eq!(loader.source_names(), vec!["primary", "fallback"]);

        loader.resolve(&1.into(), &credential()).await.unwrap();
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn invalid_candidates_fall_through() {
        let loader = loader(&[
            Fixed::new("string", bare_string),
            Fixed::new("offline", offline),
            Fixed::new("good", valid),
        ]);
        assert!(loader.resolve(&1.into(), &credential()).await.is_ok());
    }

    #[tokio::test]
    async fn blank_credential_is_rejected_before_any_source() {
        let source = Fixed::new("good", valid);
        let loader = loader(&[source.clone()]);

        let err = loader
            .resolve(&1.into(), &Credential::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, ExamError::Unauthorized(_)));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn final_error_classification() {
        let err = loader(&[Fixed::new("a", missing), Fixed::new("b", offline)])
            .resolve(&1.into(), &credential())
            .await
            .unwrap_err();
        assert_eq!(err, ExamError::NotFound(EntityId::from(1)));

        let err = loader(&[Fixed::new("a", bare_string)])
            .resolve(&1.into(), &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, ExamError::InvalidSchema(_)));

        let err = loader(&[Fixed::new("a", bare_string), Fixed::new("b", empty_questions)])
            .resolve(&1.into(), &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, ExamError::NoValidQuestions(_)));

        let err = loader(&[Fixed::new("a", empty_questions), Fixed::new("b", rejected)])
            .resolve(&1.into(), &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, ExamError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn mismatched_id_is_not_accepted() {
        let err = loader(&[Fixed::new("a", valid)])
            .resolve(&2.into(), &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, ExamError::InvalidSchema(_)));
    }

    #[tokio::test]
    async fn context_source_serves_embedded_exam() {
        let context = json!({
            "enrollments": [{
                "course": {"id": 3, "exams": [{
                    "id": 3,
                    "title": "Embedded",
                    "questions": [{"id": 1, "text": "q", "choices": [{"id": 2, "text": "a"}]}]
                }]}
            }]
        });
        let loader = ExamLoader::new(vec![Arc::new(ContextSource::new(context))]);
        assert_eq!(loader.source_names(), vec!["learner-context"]);

        let assessment = loader.resolve(&3.into(), &credential()).await.unwrap();
        assert_eq!(assessment.title, "Embedded");
    }
}
