use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::ingest::page::PageQuery;
use crate::ingest::paginator::QueryExecutor;
use crate::ingest::rate_limit::{backoff_sleep, is_rate_limited, MAX_RETRIES};

pub const DEFAULT_API_URL: &str = "https://api.linear.app/graphql";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// [`QueryExecutor`] for the Linear GraphQL API.
pub struct LinearClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl LinearClient {
    pub fn new(api_key: impl Into<String>, api_url: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("Linear API key is empty".into()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("linearflow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl QueryExecutor for LinearClient {
    async fn execute(&self, query: &PageQuery) -> Result<Value> {
        let body = query.to_request_body();
        let mut attempt: u32 = 0;
        loop {
            let response = self
                .http
                .post(&self.api_url)
                .header(AUTHORIZATION, self.api_key.as_str())
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if is_rate_limited(status) && attempt < MAX_RETRIES {
                backoff_sleep(attempt).await;
                attempt += 1;
                continue;
            }
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(Error::Api(format!("HTTP {status}: {}", text.trim())));
            }

            let envelope: Value = response.json().await?;
            return decode_envelope(envelope);
        }
    }
}

/// Unwrap a GraphQL response: `data` on success, an error if the server
/// reported any `errors`.
fn decode_envelope(envelope: Value) -> Result<Value> {
    let envelope: GraphQlEnvelope = serde_json::from_value(envelope)?;
    if !envelope.errors.is_empty() {
        let messages: Vec<String> = envelope.errors.into_iter().map(|e| e.message).collect();
        return Err(Error::Api(messages.join("; ")));
    }
    Ok(envelope.data.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_data() {
        let data = decode_envelope(json!({"data": {"issues": {"nodes": []}}})).unwrap();
        assert!(data["issues"]["nodes"].is_array());
    }

    #[test]
    fn test_decode_errors() {
        let err = decode_envelope(json!({
            "data": null,
            "errors": [{"message": "Authentication required"}, {"message": "second"}]
        }))
        .unwrap_err();
        assert_eq!(err.to_string(), "Linear API error: Authentication required; second");
    }

    #[test]
    fn test_decode_missing_data_is_null() {
        assert_eq!(decode_envelope(json!({})).unwrap(), Value::Null);
    }

    #[test]
    fn test_empty_api_key_rejected() {
        assert!(matches!(
            LinearClient::new("  ", DEFAULT_API_URL),
            Err(Error::Config(_))
        ));
        let client = LinearClient::new("lin_api_x", "http://localhost:9/graphql").unwrap();
        assert_eq!(client.api_url(), "http://localhost:9/graphql");
    }
}
