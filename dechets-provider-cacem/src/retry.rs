//! GET requests with bounded retry and exponential backoff.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use dechets_core::ports::PortError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Status codes retried by default.
pub const DEFAULT_STATUS_FORCELIST: [u16; 3] = [500, 502, 504];

/// Strategy for retrying failed requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first request.
    pub retries: u32,
    /// Delay before the first retry, doubled on every following one.
    pub backoff_factor: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
    /// Response statuses treated as transient.
    pub status_forcelist: Vec<u16>,
}

impl RetryPolicy {
    /// Creates a policy allowing `retries` retries with the default backoff.
    #[must_use]
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            backoff_factor: Duration::from_millis(500),
            max_backoff: Duration::from_secs(120),
            status_forcelist: DEFAULT_STATUS_FORCELIST.to_vec(),
        }
    }

    /// Disables retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn with_backoff_factor(mut self, backoff_factor: Duration) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    /// Sets the statuses treated as transient.
    #[must_use]
    pub fn with_status_forcelist(mut self, statuses: &[u16]) -> Self {
        self.status_forcelist = statuses.to_vec();
        self
    }

    /// Delay to wait before retry number `retry` (starting at 1).
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.backoff_factor
            .saturating_mul(multiplier)
            .min(self.max_backoff)
    }

    /// Whether a response with `status` should be retried.
    #[must_use]
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.status_forcelist.contains(&status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Class of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection could not be established.
    Connect,
    /// Request timed out.
    Timeout,
    /// Connection dropped or reset while the request was in flight.
    Request,
    /// Response body could not be read.
    Read,
    /// Anything else, such as an invalid URL.
    Other,
}

/// Failure below the HTTP status level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Failure class.
    pub kind: TransportErrorKind,
    /// Description.
    pub message: String,
}

impl TransportError {
    /// Creates a transport error.
    #[must_use]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether retrying may help.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self.kind, TransportErrorKind::Other)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:?}: {}", self.kind, self.message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_builder() {
            TransportErrorKind::Other
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_request() {
            TransportErrorKind::Request
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Read
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body decoded as UTF-8.
    pub body: String,
}

impl RawResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
/// Single GET request without retry.
pub trait Transport: Send + Sync {
    /// Send one GET request to `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no response could be read.
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Wrap a client; clones share its connection pool.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

/// Client retrying transient failures according to a [`RetryPolicy`].
///
/// Retry state lives in each call, so concurrent calls do not share backoff.
#[derive(Debug, Clone)]
pub struct RetryingClient<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingClient<T> {
    /// Creates a client sending requests through `transport`.
    #[must_use]
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    /// GET `url` until it succeeds, fails permanently, or retries run out.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::RetriesExhausted`] when transient failures outlast
    /// the policy, [`PortError::Http`] for a status that is not retried, and
    /// [`PortError::Transport`] for a transport failure that is not retried.
    pub async fn get(&self, url: &str) -> Result<RawResponse, PortError> {
        let mut retry = 0;
        loop {
            let attempt = retry + 1;
            let reason = match self.transport.get(url).await {
                Ok(response) if response.is_success() => {
                    debug!(url, attempt, status = response.status, "request succeeded");
                    return Ok(response);
                }
                Ok(response) if self.policy.should_retry_status(response.status) => {
                    format!("HTTP status {}", response.status)
                }
                Ok(response) => {
                    return Err(PortError::Http {
                        url: url.to_owned(),
                        status: response.status,
                    });
                }
                Err(err) if err.is_transient() => err.to_string(),
                Err(err) => {
                    return Err(PortError::Transport {
                        url: url.to_owned(),
                        reason: err.to_string(),
                    });
                }
            };

            if retry >= self.policy.retries {
                return Err(PortError::RetriesExhausted {
                    url: url.to_owned(),
                    attempts: attempt,
                    reason,
                });
            }

            retry += 1;
            let delay = self.policy.delay_for_retry(retry);
            warn!(url, attempt, %reason, ?delay, "request failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }

    /// GET `url` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::get`], or [`PortError::Schema`] when the
    /// body does not match `D`.
    pub async fn get_json<D: DeserializeOwned>(&self, url: &str) -> Result<D, PortError> {
        let response = self.get(url).await?;
        serde_json::from_str(&response.body).map_err(|source| PortError::Schema {
            url: url.to_owned(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read as _;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use serde::Deserialize;

    use super::*;
    use crate::scripted::{ScriptedTransport, ok, status, transient};

    const URL: &str = "http://localhost/get/communes";

    fn fast(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries).with_backoff_factor(Duration::ZERO)
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: i64,
    }

    #[test]
    fn backoff_doubles_from_half_a_second() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.retries, 10);
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_retry(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for_retry(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for_retry(4), Duration::from_secs(4));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for_retry(10), Duration::from_secs(120));
        assert_eq!(policy.delay_for_retry(u32::MAX), Duration::from_secs(120));
    }

    #[test]
    fn default_forcelist() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry_status(500));
        assert!(policy.should_retry_status(502));
        assert!(policy.should_retry_status(504));
        assert!(!policy.should_retry_status(503));
        assert!(!policy.should_retry_status(404));
    }

    #[tokio::test]
    async fn custom_forcelist_retries_listed_statuses() {
        let client = RetryingClient::new(
            ScriptedTransport::new([status(503), status(429), ok("[]")]),
            fast(3).with_status_forcelist(&[429, 503]),
        );

        let items: Vec<Item> = client.get_json(URL).await.unwrap();

        assert!(items.is_empty());
        assert_eq!(client.policy.status_forcelist, vec![429, 503]);
        assert_eq!(client.transport.calls(), 3);
    }

    #[tokio::test]
    async fn transient_failures_then_success_match_immediate_success() {
        let immediate = RetryingClient::new(ScriptedTransport::new([ok(r#"[{"id": 1}]"#)]), fast(3));
        let flaky = RetryingClient::new(
            ScriptedTransport::new([
                status(502),
                transient("connection refused"),
                status(504),
                ok(r#"[{"id": 1}]"#),
            ]),
            fast(3),
        );

        let expected: Vec<Item> = immediate.get_json(URL).await.unwrap();
        let actual: Vec<Item> = flaky.get_json(URL).await.unwrap();

        assert_eq!(actual, expected);
        assert_eq!(flaky.transport.calls(), 4);
    }

    #[tokio::test]
    async fn exhausting_retries_is_terminal() {
        let client = RetryingClient::new(
            ScriptedTransport::new([status(500), status(500), status(500), status(500)]),
            fast(2),
        );

        let err = client.get(URL).await.unwrap_err();

        assert!(matches!(err, PortError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(client.transport.calls(), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let client = RetryingClient::new(ScriptedTransport::new([status(404), ok("[]")]), fast(5));

        let err = client.get(URL).await.unwrap_err();

        assert!(matches!(err, PortError::Http { status: 404, .. }));
        assert_eq!(client.transport.calls(), 1);
    }

    #[tokio::test]
    async fn unlisted_server_errors_are_not_retried() {
        let client = RetryingClient::new(ScriptedTransport::new([status(503), ok("[]")]), fast(5));

        let err = client.get(URL).await.unwrap_err();

        assert!(matches!(err, PortError::Http { status: 503, .. }));
        assert_eq!(client.transport.calls(), 1);
    }

    #[tokio::test]
    async fn permanent_transport_errors_are_not_retried() {
        let client = RetryingClient::new(
            ScriptedTransport::new([Err(TransportError::new(TransportErrorKind::Other, "bad url"))]),
            fast(5),
        );

        let err = client.get(URL).await.unwrap_err();

        assert!(matches!(err, PortError::Transport { .. }));
        assert_eq!(client.transport.calls(), 1);
    }

    #[tokio::test]
    async fn no_retry_sends_a_single_request() {
        let client = RetryingClient::new(ScriptedTransport::new([status(500), ok("[]")]), RetryPolicy::no_retry());

        let err = client.get(URL).await.unwrap_err();

        assert!(matches!(err, PortError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(client.transport.calls(), 1);
    }

    #[tokio::test]
    async fn unexpected_shape_is_a_schema_error() {
        let client = RetryingClient::new(ScriptedTransport::new([ok(r#"[{"name": "x"}]"#)]), fast(3));

        let err = client.get_json::<Vec<Item>>(URL).await.unwrap_err();

        assert!(matches!(err, PortError::Schema { .. }));
        assert_eq!(client.transport.calls(), 1);
    }

    /// Accepts connections, reads the request, and closes without answering.
    fn hang_up_server() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/get/communes", listener.local_addr().unwrap());
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buffer = [0_u8; 1024];
                stream.read(&mut buffer).ok();
            }
        });
        (url, accepted)
    }

    fn http_transport() -> HttpTransport {
        HttpTransport::new(Client::builder().no_proxy().build().unwrap())
    }

    #[tokio::test]
    async fn dropped_connections_are_retried() {
        let (url, accepted) = hang_up_server();
        let client = RetryingClient::new(http_transport(), fast(3));

        let err = client.get(&url).await.unwrap_err();

        assert!(
            matches!(err, PortError::RetriesExhausted { attempts: 4, .. }),
            "unexpected error: {err}"
        );
        assert_eq!(accepted.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn dropped_connection_is_a_request_error() {
        let (url, _accepted) = hang_up_server();

        let err = http_transport().get(&url).await.unwrap_err();

        assert_eq!(err.kind, TransportErrorKind::Request);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn malformed_urls_fail_without_retry() {
        let client = RetryingClient::new(http_transport(), fast(3));

        let err = client.get("not a url").await.unwrap_err();

        assert!(matches!(err, PortError::Transport { .. }), "unexpected error: {err}");
    }
}
