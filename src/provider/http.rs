use std::error::Error as StdError;
use std::time::Duration;

use log::{debug, error};
use reqwest::{Client, Url};
use serde_json::Value;

use super::{FetchError, FetchOutcome, Fetcher};
use crate::collector::retry::{self, RetryPolicy};
use crate::config::ProviderConfig;

// ------------------------------------------------------------
// Status classification
// ------------------------------------------------------------
//
// Every non-success status is terminal for the call. Only the
// log line and the resulting `FetchError` differ.
//
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 400 / 401 / 403 / 404 / 408 / 429
    Client,

    /// 503
    Server,

    Unknown,
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            400 | 401 | 403 | 404 | 408 | 429 => StatusClass::Client,
            503 => StatusClass::Server,
            _ => StatusClass::Unknown,
        }
    }
}

fn status_error(status: u16) -> FetchError {
    match status {
        429 => FetchError::RateLimited,
        503 => FetchError::Unavailable,
        400 | 401 | 403 | 404 | 408 => FetchError::Rejected(status),
        other => FetchError::UnexpectedStatus(other),
    }
}

// ------------------------------------------------------------
// Transport classification
// ------------------------------------------------------------
//
// Only three transport failure classes are retried:
// - connection aborted (includes request timeouts)
// - host not found
// - temporary DNS failure
//
// Refused connections, TLS errors etc. are terminal.
//
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    ConnectionAborted,
    HostNotFound,
    DnsTemporary,
    Other,
}

impl TransportKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, TransportKind::Other)
    }

    /// Classifies from the flattened error chain text.
    pub fn classify(chain: &str, timed_out: bool) -> Self {
        let text = chain.to_ascii_lowercase();

        if timed_out
            || text.contains("connection aborted")
            || text.contains("connection reset")
            || text.contains("econnaborted")
        {
            return TransportKind::ConnectionAborted;
        }

        if text.contains("temporary failure in name resolution")
            || text.contains("eai_again")
        {
            return TransportKind::DnsTemporary;
        }

        if text.contains("dns error")
            || text.contains("failed to lookup address")
            || text.contains("name or service not known")
            || text.contains("nodename nor servname")
            || text.contains("no such host")
            || text.contains("enotfound")
        {
            return TransportKind::HostNotFound;
        }

        TransportKind::Other
    }
}

/// Failure of a single GET.
#[derive(Debug, thiserror::Error)]
enum RequestError {
    #[error("status {0}")]
    Status(u16),

    #[error("{1} ({0:?})")]
    Transport(TransportKind, String),

    #[error("decode: {0}")]
    Decode(String),
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

/// How the credential travels on the query string.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Query parameter name ("apikey", "api_token", ...)
    pub param: &'static str,
    pub value: String,
}

/// reqwest backed `Fetcher`.
///
/// URL layout:
///     <base_url><resource>/<path[0]>/<path[1]>...?<query>&<credential>
///
/// RESPONSIBILITIES:
/// - URL construction and encoding
/// - Status classification
/// - Exponential retry of transient transport failures
///
/// NOT RESPONSIBLE FOR:
/// - Interpreting payloads (collectors do that)
///
pub struct HttpFetcher {
    name: &'static str,
    client: Client,
    base_url: Url,
    credential: Credential,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(
        name: &'static str,
        provider: &ProviderConfig,
        credential_param: &'static str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let base_url = Url::parse(&provider.base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("provider '{}' base url cannot be a base: {}", name, base_url);
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            name,
            client,
            base_url,
            credential: Credential {
                param: credential_param,
                value: provider.api_key.clone(),
            },
            retry,
        })
    }

    /// Builds the full request URL.
    pub fn url(
        &self,
        resource: &str,
        path: &[String],
        query: &[(String, String)],
    ) -> anyhow::Result<Url> {
        let mut url = self.base_url.join(resource.trim_start_matches('/'))?;

        if !path.is_empty() {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("url cannot be a base: {}", resource))?;
            segments.pop_if_empty().extend(path);
        }

        let with_credential = !self.credential.value.is_empty();
        if !query.is_empty() || with_credential {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
            if with_credential {
                pairs.append_pair(self.credential.param, &self.credential.value);
            }
        }

        Ok(url)
    }

    // reqwest errors carry the request url, credential included;
    // it is stripped before the text reaches logs or outcomes.
    async fn get_once(&self, url: &Url) -> Result<Value, RequestError> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            let timed_out = e.is_timeout();
            let chain = error_chain(&e.without_url());
            RequestError::Transport(TransportKind::classify(&chain, timed_out), chain)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RequestError::Status(status.as_u16()));
        }

        response.json::<Value>().await.map_err(|e| {
            let timed_out = e.is_timeout();
            let e = e.without_url();
            if timed_out {
                RequestError::Transport(TransportKind::ConnectionAborted, error_chain(&e))
            } else {
                RequestError::Decode(e.to_string())
            }
        })
    }

    fn terminal(&self, url: &Url, err: RequestError) -> FetchOutcome {
        match err {
            RequestError::Status(status) => {
                match StatusClass::of(status) {
                    StatusClass::Client => error!(
                        "[{}] GET failed on client side with status {}. Url: {}",
                        self.name, status, redacted(url)
                    ),
                    StatusClass::Server => error!(
                        "[{}] GET failed on server side with status {}. Url: {}",
                        self.name, status, redacted(url)
                    ),
                    StatusClass::Unknown => error!(
                        "[{}] GET failed with unknown status {}. Url: {}",
                        self.name, status, redacted(url)
                    ),
                }
                FetchOutcome::Failed(status_error(status))
            }
            RequestError::Transport(_, msg) => {
                error!("[{}] GET failed with a network error: {}", self.name, msg);
                FetchOutcome::Failed(FetchError::Network(msg))
            }
            RequestError::Decode(msg) => {
                error!("[{}] GET returned an invalid body: {}", self.name, msg);
                FetchOutcome::Failed(FetchError::Decode(msg))
            }
        }
    }
}

/// Url without the credential, for logs.
fn redacted(url: &Url) -> String {
    let mut clean = url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "apikey" && k != "api_token")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    clean.set_query(None);
    if !kept.is_empty() {
        clean.query_pairs_mut().extend_pairs(kept);
    }
    clean.to_string()
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(
        &self,
        resource: &str,
        path: &[String],
        query: &[(String, String)],
    ) -> FetchOutcome {
        let url = match self.url(resource, path, query) {
            Ok(url) => url,
            Err(e) => {
                error!("[{}] invalid request for {}: {}", self.name, resource, e);
                return FetchOutcome::Failed(FetchError::Network(e.to_string()));
            }
        };

        debug!("[{}] GET {}", self.name, redacted(&url));

        match self.get_once(&url).await {
            Ok(body) => FetchOutcome::from_body(body),

            Err(RequestError::Transport(kind, msg)) if kind.is_retryable() => {
                error!(
                    "[{}] GET failed with {:?}: {}. Retrying with backoff",
                    self.name, kind, msg
                );

                // Only transient transport errors are retried; anything
                // else ends the loop as a terminal outcome.
                let (this, target) = (self, &url);
                let retried = retry::with_backoff(
                    move || async move {
                        match this.get_once(target).await {
                            Err(RequestError::Transport(kind, msg)) if kind.is_retryable() => {
                                Err(msg)
                            }
                            other => Ok(other),
                        }
                    },
                    &self.retry,
                )
                .await;

                match retried {
                    Ok(Ok(body)) => FetchOutcome::from_body(body),
                    Ok(Err(err)) => self.terminal(&url, err),
                    Err(shaped) => {
                        error!("[{}] retries exhausted: {}", self.name, shaped);
                        FetchOutcome::Failed(FetchError::Exhausted(shaped))
                    }
                }
            }

            Err(err) => self.terminal(&url, err),
        }
    }
}
