//! HTTP summary source.
//!
//! `GET {base}/{entity}/{id}/summary` returning `{success, data}`. One
//! attempt with a short timeout; no retry.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::ColdStartSource;
use crate::config::ColdStartConfig;
use crate::error::ImportError;

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// Summary source backed by a REST endpoint.
#[derive(Debug, Clone)]
pub struct HttpSummarySource {
    base_url: reqwest::Url,
    entity: String,
    client: reqwest::Client,
}

impl HttpSummarySource {
    pub fn new(config: &ColdStartConfig) -> Result<Self, ImportError> {
        let base_url = reqwest::Url::parse(&config.base_url)
            .map_err(|e| ImportError::Request(format!("invalid base URL {}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ImportError::Request(format!(
                "base URL {} cannot carry a path",
                config.base_url
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("userprofile/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ImportError::Request(e.to_string()))?;

        Ok(Self {
            base_url,
            entity: config.entity.clone(),
            client,
        })
    }

    /// Summary URL for `user_id`, with each segment percent-encoded.
    pub fn summary_url(&self, user_id: &str) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend([self.entity.as_str(), user_id, "summary"]);
        }
        url
    }
}

#[async_trait]
impl ColdStartSource for HttpSummarySource {
    async fn fetch_summary(&self, user_id: &str) -> Result<Map<String, Value>, ImportError> {
        let url = self.summary_url(user_id);
        tracing::info!(user_id, %url, "Fetching cold start summary");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                tracing::warn!(user_id, "Cold start summary request timed out");
            }
            ImportError::Request(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::Status(status.as_u16()));
        }

        let envelope: SummaryEnvelope = response
            .json()
            .await
            .map_err(|e| ImportError::Malformed(e.to_string()))?;

        if !envelope.success {
            tracing::debug!(
                user_id,
                message = envelope.message.as_deref().unwrap_or(""),
                "Summary source reported failure"
            );
            return Err(ImportError::Rejected);
        }

        match envelope.data {
            None | Some(Value::Null) => Err(ImportError::MissingData),
            Some(Value::Object(data)) => Ok(data),
            Some(_) => Err(ImportError::Malformed("data is not an object".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn source(base: &str) -> HttpSummarySource {
        HttpSummarySource::new(&ColdStartConfig {
            base_url: base.to_string(),
            entity: "child".to_string(),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn url_joins_segments() {
        assert_eq!(
            source("http://localhost:8099/pal/").summary_url("42").as_str(),
            "http://localhost:8099/pal/child/42/summary"
        );
        assert_eq!(
            source("http://localhost:8099/pal").summary_url("a b/c").as_str(),
            "http://localhost:8099/pal/child/a%20b%2Fc/summary"
        );
    }

    #[test]
    fn rejects_unusable_base() {
        let config = ColdStartConfig {
            base_url: "not a url".to_string(),
            entity: "child".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(matches!(
            HttpSummarySource::new(&config),
            Err(ImportError::Request(_))
        ));
    }
}
