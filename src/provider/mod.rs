//! Upstream provider layer
//!
//! This module provides:
//! - The `Fetcher` capability used by every collector
//! - The explicit outcome type replacing silent nulls
//! - The reqwest backed HTTP implementation
//! - The endpoint catalog
//!
//! Collectors never talk to reqwest directly; they receive an
//! `Arc<dyn Fetcher>` so tests can script responses.

pub mod http;
pub mod resources;

use serde_json::Value;

/// Why a provider call produced no data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// 429 from the provider
    #[error("rate limit exceeded")]
    RateLimited,

    /// 400 / 401 / 403 / 404 / 408
    #[error("request rejected by provider with status {0}")]
    Rejected(u16),

    /// 503 from the provider
    #[error("provider unavailable (503)")]
    Unavailable,

    /// Any other non-success status
    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    /// Transport failure that is not retried
    #[error("network error: {0}")]
    Network(String),

    /// Retryable transport failure after every attempt was used.
    /// Carries the error-shaped string of the last failure.
    #[error("transport retries exhausted: {0}")]
    Exhausted(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    /// Success status with an error body (`{"Error Message": ...}`)
    #[error("provider error: {0}")]
    Provider(String),
}

impl FetchError {
    /// True for failures that happened below HTTP.
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::Exhausted(_))
    }
}

/// Result of one provider call.
///
/// - `Data`: usable payload
/// - `Empty`: legitimate absence (`null`, `[]`, `{}`)
/// - `Failed`: the call did not succeed
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Data(Value),
    Empty,
    Failed(FetchError),
}

impl FetchOutcome {
    /// Classifies a decoded success body.
    pub fn from_body(body: Value) -> Self {
        match &body {
            Value::Null => FetchOutcome::Empty,
            Value::Array(items) if items.is_empty() => FetchOutcome::Empty,
            Value::Object(map) if map.is_empty() => FetchOutcome::Empty,
            Value::Object(map) => match map.get("Error Message") {
                Some(msg) => FetchOutcome::Failed(FetchError::Provider(
                    msg.as_str().unwrap_or_default().to_string(),
                )),
                None => FetchOutcome::Data(body),
            },
            _ => FetchOutcome::Data(body),
        }
    }
}

/// Read-only access to an upstream data provider.
///
/// CONTRACT:
/// - `resource` is a path relative to the provider base URL
/// - `path` segments are appended in order, one URL segment each
/// - `query` pairs are appended to the query string; the
///   implementation adds its own credential
/// - never panics, never returns a transport error as `Data`
///
/// THREAD SAFETY:
/// - Shared across concurrent entity tasks through `Arc`
///
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Provider name used in logs (e.g. "fmp", "eod")
    fn name(&self) -> &str;

    async fn fetch(
        &self,
        resource: &str,
        path: &[String],
        query: &[(String, String)],
    ) -> FetchOutcome;
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_bodies_are_absence_not_failure() {
        assert_eq!(FetchOutcome::from_body(json!(null)), FetchOutcome::Empty);
        assert_eq!(FetchOutcome::from_body(json!([])), FetchOutcome::Empty);
        assert_eq!(FetchOutcome::from_body(json!({})), FetchOutcome::Empty);
    }

    #[test]
    fn provider_error_body_is_failure() {
        let outcome = FetchOutcome::from_body(json!({"Error Message": "Invalid API KEY."}));
        assert_eq!(
            outcome,
            FetchOutcome::Failed(FetchError::Provider("Invalid API KEY.".into()))
        );
    }

    #[test]
    fn regular_bodies_are_data() {
        let body = json!([{"symbol": "AAPL"}]);
        assert_eq!(FetchOutcome::from_body(body.clone()), FetchOutcome::Data(body));
        assert!(FetchError::Exhausted("x".into()).is_transport());
        assert!(!FetchError::RateLimited.is_transport());
    }
}
