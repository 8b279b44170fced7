//! Outbound embedding generation via Cohere.
//!
//! This is a thin proxy, not part of the indexing core: callers bring their
//! own vectors everywhere else. Without a configured credential the client
//! is absent and the endpoint reports `EmbeddingUnavailable`. Transient
//! upstream failures are retried with exponential backoff and jitter
//! (3 attempts, base 0.5 s, factor 2, ±20 %).

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::{
    COHERE_EMBED_MODEL, COHERE_EMBED_URL, EMBED_RETRY_ATTEMPTS, EMBED_RETRY_BASE_MS,
    EMBED_RETRY_FACTOR, EMBED_RETRY_JITTER,
};
use crate::error::{Error, Result};

/// Cohere distinguishes document and query embeddings; the two sides of a
/// search must use matching input types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    SearchDocument,
    SearchQuery,
}

impl InputType {
    fn as_str(&self) -> &'static str {
        match self {
            InputType::SearchDocument => "search_document",
            InputType::SearchQuery => "search_query",
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
    input_type: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct EmbeddingClient {
    http: reqwest::Client,
    api_key: String,
}

impl EmbeddingClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// Build a client when a credential is configured, `None` otherwise.
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .cohere_api_key
            .clone()
            .map(EmbeddingClient::new)
    }

    /// Embed a batch of texts, retrying transient upstream failures.
    pub async fn embed(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut delay = Duration::from_millis(EMBED_RETRY_BASE_MS);
        let mut attempt = 1;
        loop {
            match self.attempt(texts, input_type).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(Attempt::Fatal(err)) => return Err(err),
                Err(Attempt::Transient(err)) => {
                    if attempt >= EMBED_RETRY_ATTEMPTS {
                        return Err(err);
                    }
                    let pause = delay.mul_f64(jitter_factor());
                    warn!(attempt, "embedding call failed, retrying in {pause:?}: {err}");
                    tokio::time::sleep(pause).await;
                    delay = delay.mul_f64(EMBED_RETRY_FACTOR);
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> std::result::Result<Vec<Vec<f32>>, Attempt> {
        let request = EmbedRequest {
            model: COHERE_EMBED_MODEL,
            texts,
            input_type: input_type.as_str(),
        };
        let response = self
            .http
            .post(COHERE_EMBED_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                Attempt::Transient(Error::EmbeddingUnavailable(format!(
                    "upstream unreachable: {e}"
                )))
            })?;

        let status = response.status();
        if !status.is_success() {
            let err = Error::EmbeddingUnavailable(format!("upstream returned {status}"));
            return Err(if is_retryable(status) {
                Attempt::Transient(err)
            } else {
                Attempt::Fatal(err)
            });
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            Attempt::Fatal(Error::EmbeddingUnavailable(format!(
                "upstream response malformed: {e}"
            )))
        })?;
        debug!(count = parsed.embeddings.len(), "embeddings generated");
        Ok(parsed.embeddings)
    }
}

enum Attempt {
    Transient(Error),
    Fatal(Error),
}

/// Rate limits and server-side failures are worth retrying; other client
/// errors (bad key, bad request) are not.
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn jitter_factor() -> f64 {
    1.0 + EMBED_RETRY_JITTER * (rand::thread_rng().gen::<f64>() * 2.0 - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_types_match_upstream_contract() {
        assert_eq!(InputType::SearchDocument.as_str(), "search_document");
        assert_eq!(InputType::SearchQuery.as_str(), "search_query");
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn jitter_stays_within_twenty_percent() {
        for _ in 0..100 {
            let factor = jitter_factor();
            assert!((0.8..=1.2).contains(&factor));
        }
    }

    #[test]
    fn missing_credential_disables_the_client() {
        let config = Config::default();
        assert!(EmbeddingClient::from_config(&config).is_none());
    }
}
