use futures::future::BoxFuture;
use reqwest::Client;

use crate::{
    config::ClassifierConfig,
    domain::{ClassificationOutcome, Decision},
};

use super::inference::{build_request, parse_response, ClassifyError};

/// Maps a title and the current preferences to an outcome. Never fails: errors become
/// [`ClassificationOutcome::Failed`].
pub trait Classifier: Send + Sync {
    fn classify<'a>(
        &'a self,
        title: &'a str,
        preferences: &'a str,
    ) -> BoxFuture<'a, ClassificationOutcome>;
}

#[derive(Clone)]
pub struct FilterClient {
    http: Client,
    config: ClassifierConfig,
}

impl FilterClient {
    pub fn new(http: Client, config: ClassifierConfig) -> Self {
        Self { http, config }
    }

    pub async fn request_decision(
        &self,
        title: &str,
        preferences: &str,
    ) -> Result<Decision, ClassifyError> {
        let mut request = self
            .http
            .post(&self.config.endpoint_url)
            .json(&build_request(title, preferences));
        if let Some(timeout) = self.config.request_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?.error_for_status()?;
        parse_response(response).await
    }
}

impl Classifier for FilterClient {
    fn classify<'a>(
        &'a self,
        title: &'a str,
        preferences: &'a str,
    ) -> BoxFuture<'a, ClassificationOutcome> {
        Box::pin(async move {
            match self.request_decision(title, preferences).await {
                Ok(decision) => {
                    tracing::info!(target: "classifier", title, ?decision, "decision received");
                    ClassificationOutcome::Decided(decision)
                }
                Err(err) => {
                    tracing::warn!(target: "classifier", title, error = %err, "classification failed");
                    ClassificationOutcome::Failed(err.to_string())
                }
            }
        })
    }
}
