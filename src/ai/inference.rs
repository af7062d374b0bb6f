use reqwest::Response;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Decision;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("unexpected decision value: {0:?}")]
    UnknownDecision(Option<String>),
}

#[derive(Debug, Serialize)]
pub struct FilterRequest<'a> {
    pub title: &'a str,
    pub preferences: &'a str,
}

pub fn build_request<'a>(title: &'a str, preferences: &'a str) -> FilterRequest<'a> {
    FilterRequest { title, preferences }
}

#[derive(Debug, Deserialize)]
pub struct FilterResponse {
    #[serde(default)]
    pub decision: Option<String>,
}

pub async fn parse_response(response: Response) -> Result<Decision, ClassifyError> {
    let body = response.text().await?;
    parse_decision(&body)
}

/// Only the exact strings `keep` and `remove` are decisions.
pub fn parse_decision(body: &str) -> Result<Decision, ClassifyError> {
    let parsed: FilterResponse =
        serde_json::from_str(body).map_err(|err| ClassifyError::Malformed(err.to_string()))?;
    match parsed.decision.as_deref() {
        Some("keep") => Ok(Decision::Keep),
        Some("remove") => Ok(Decision::Remove),
        other => Err(ClassifyError::UnknownDecision(other.map(str::to_string))),
    }
}
