//! HTTP transport, retry policy and client configuration.
//!
//! [`Transport`] is the single place where requests leave the process: it
//! serializes the body, attaches the session credential, sends the request and
//! re-sends it on retryable failures according to a [`RetryPolicy`].

use crate::config::OpcConfig;
use crate::session::{Authenticator, Credential, Identity, Session};
use crate::{Error, Result};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

// Service-specific timeout configurations (in seconds)

/// Default request timeout when a sub-API does not override it
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

/// Default timeout for compute requests
pub const COMPUTE_DEFAULT_TIMEOUT: u64 = 30;

/// Default timeout for database requests (provisioning calls are slow)
pub const DATABASE_DEFAULT_TIMEOUT: u64 = 60;

// Connection pool settings

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

// Retry settings

/// Default total number of attempts for one request
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial retry delay in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Default maximum retry delay in milliseconds (for exponential backoff)
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5000;

/// Media type used when a sub-API does not declare its own
pub const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// Retry policy with exponential backoff.
///
/// `max_retries` is the total number of attempts made for one logical
/// request, the first one included. A value of zero behaves like one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts
    pub max_retries: u32,

    /// Delay before the second attempt
    pub initial_delay: Duration,

    /// Maximum delay between attempts (cap for exponential backoff)
    pub max_delay: Duration,

    /// Backoff multiplier (typically 2 for exponential backoff)
    pub backoff_multiplier: u32,

    /// Randomize each delay between zero and its computed value
    pub jitter: bool,
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            backoff_multiplier: 2,
            jitter: true,
        }
    }

    /// Create a retry policy that sends each request exactly once.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 1,
            initial_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            backoff_multiplier: 1,
            jitter: false,
        }
    }

    /// Set the total number of attempts.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Number of attempts actually made, never less than one.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        if self.max_retries == 0 {
            1
        } else {
            self.max_retries
        }
    }

    /// Upper bound of the delay after `attempt` failed attempts.
    ///
    /// Uses exponential backoff: delay = min(initial_delay * multiplier^(attempt - 1), max_delay)
    #[must_use]
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let multiplier = self.backoff_multiplier.saturating_pow(attempt - 1);
        let delay = self.initial_delay.saturating_mul(multiplier);

        std::cmp::min(delay, self.max_delay)
    }

    /// Delay to sleep after `attempt` failed attempts, jitter applied.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for_attempt(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }

        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
    }

    /// Check if more than one attempt is made.
    #[must_use]
    pub const fn has_retries(&self) -> bool {
        self.attempts() > 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client configuration.
///
/// Configures HTTP client behavior including timeouts, retries, and connection pooling.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Retry policy
    pub retry_policy: RetryPolicy,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Log every outgoing request at `info` level
    pub enable_logging: bool,

    /// Enable response compression
    pub enable_compression: bool,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT),
            retry_policy: RetryPolicy::new(),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            enable_logging: true,
            enable_compression: true,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Disable retries.
    #[must_use]
    pub const fn without_retries(mut self) -> Self {
        self.retry_policy = RetryPolicy::no_retry();
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Enable or disable logging.
    #[must_use]
    pub const fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`Transport`].
#[derive(Clone)]
pub struct TransportBuilder {
    config: OpcConfig,
    http_config: ClientConfig,
    authenticator: Arc<dyn Authenticator>,
    service: &'static str,
    media_type: String,
    headers: HeaderMap,
    user_agent: String,
    freshness_window: Option<Option<Duration>>,
}

impl TransportBuilder {
    /// Start a builder for one sub-API.
    ///
    /// `service` only labels log records.
    #[must_use]
    pub fn new(
        service: &'static str,
        config: OpcConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let http_config = ClientConfig::new()
            .with_timeout(config.timeout())
            .with_retry_policy(RetryPolicy::new().with_max_retries(config.max_retries));

        Self {
            config,
            http_config,
            authenticator,
            service,
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
            headers: HeaderMap::new(),
            user_agent: concat!("opc-core/", env!("CARGO_PKG_VERSION")).to_string(),
            freshness_window: None,
        }
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.http_config.retry_policy = retry;
        self
    }

    /// Media type sent as `Accept` and, with a body, as `Content-Type`.
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    /// Add a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not a valid header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| Error::ConfigError(format!("Invalid header name `{name}`: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| Error::ConfigError(format!("Invalid header value: {err}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Override how long a credential is reused before re-authenticating.
    ///
    /// `None` keeps credentials forever.
    #[must_use]
    pub fn with_freshness_window(mut self, window: Option<Duration>) -> Self {
        self.freshness_window = Some(window);
        self
    }

    /// Build the HTTP client, the session and the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid or the HTTP client cannot
    /// be created.
    pub fn build(self) -> Result<Transport> {
        let endpoint = self.config.parse_endpoint()?;
        let http = self.build_http_client()?;

        let media_type = HeaderValue::from_str(&self.media_type)
            .map_err(|err| Error::ConfigError(format!("Invalid media type: {err}")))?;

        let identity = Identity::new(
            self.config.identity_domain.clone(),
            self.config.username.clone(),
            self.config.password.clone(),
        );
        let mut session = Session::new(identity, endpoint, http, self.authenticator);
        if let Some(window) = self.freshness_window {
            session = session.with_freshness_window(window);
        }

        Ok(Transport {
            session: Arc::new(session),
            retry_policy: self.http_config.retry_policy,
            service: self.service,
            media_type,
            headers: self.headers,
            log_requests: self.http_config.enable_logging,
        })
    }

    fn build_http_client(&self) -> Result<Client> {
        let http_config = &self.http_config;
        let mut builder = ClientBuilder::new()
            .user_agent(self.user_agent.as_str())
            .timeout(http_config.timeout)
            .pool_idle_timeout(http_config.pool_idle_timeout)
            .pool_max_idle_per_host(http_config.pool_max_idle_per_host)
            .gzip(http_config.enable_compression)
            .connect_timeout(Duration::from_secs(10));

        if !self.config.tls_verify {
            warn!(service = self.service, "TLS verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ca_cert) = &self.config.tls_ca_cert {
            debug!("loading CA certificate from {}", ca_cert.display());
            let bytes = std::fs::read(ca_cert).map_err(|err| {
                Error::ConfigError(format!(
                    "Failed to read CA certificate {}: {err}",
                    ca_cert.display()
                ))
            })?;
            let cert = reqwest::Certificate::from_pem(&bytes)
                .map_err(|err| Error::ConfigError(format!("Invalid CA certificate: {err}")))?;
            builder = builder.add_root_certificate(cert);
        }

        builder
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))
    }
}

/// Authenticated HTTP transport with bounded retry.
#[derive(Clone)]
pub struct Transport {
    session: Arc<Session>,
    retry_policy: RetryPolicy,
    service: &'static str,
    media_type: HeaderValue,
    headers: HeaderMap,
    log_requests: bool,
}

impl Transport {
    /// Session shared by every request of this transport.
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Base URL of the sub-API.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        self.session.endpoint()
    }

    /// Retry policy applied to each request.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Resolve an absolute API path against the endpoint.
    ///
    /// Paths are appended verbatim so that qualified names, which contain
    /// slashes, keep their hierarchy.
    ///
    /// # Errors
    ///
    /// Returns an error if the result is not a valid URL.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        let base = self.endpoint().as_str().trim_end_matches('/');
        let joined = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        Url::parse(&joined)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid path `{path}`: {err}")))
    }

    /// Send a request and return the raw successful response.
    ///
    /// The body is serialized once; every attempt re-sends the same prepared
    /// request. Non-retryable failures are returned immediately, retryable
    /// ones after the last attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] for provider error responses, a transport error
    /// when the request never got a response, or [`Error::Encode`] if the
    /// body cannot be serialized.
    pub async fn execute<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url_for(path)?;
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|err| Error::Encode(format!("request body for `{path}`: {err}")))?;

        if self.log_requests {
            info!(service = self.service, %method, path, "Sending request");
        } else {
            debug!(service = self.service, %method, path, "Sending request");
        }

        let credential = self.session.ensure_fresh().await?;

        let mut request = Request::new(method, url);
        let headers = request.headers_mut();
        headers.insert(ACCEPT, self.media_type.clone());
        if payload.is_some() {
            headers.insert(CONTENT_TYPE, self.media_type.clone());
        }
        headers.extend(self.headers.clone());
        headers.extend(credential.headers().clone());
        if let Some(payload) = payload {
            *request.body_mut() = Some(payload.into());
        }

        self.send_with_retry(&request, &credential, path).await
    }

    /// Send a request and decode its JSON response.
    ///
    /// # Errors
    ///
    /// Same as [`Transport::execute`], plus [`Error::Decode`] when the body
    /// does not match `R`.
    pub async fn execute_json<B, R>(&self, method: Method, path: &str, body: Option<&B>) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.execute(method, path, body).await?;
        decode_json(response, path).await
    }

    async fn send_with_retry(
        &self,
        request: &Request,
        credential: &Credential,
        path: &str,
    ) -> Result<Response> {
        let attempts = self.retry_policy.attempts();
        let mut last_error: Option<Error> = None;

        for attempt in 1..=attempts {
            let Some(prepared) = request.try_clone() else {
                return Err(Error::HttpError(format!(
                    "request for `{path}` cannot be replayed"
                )));
            };

            let error = match self.session.http().execute(prepared).await {
                Ok(response) if is_success(response.status()) => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    if status == StatusCode::UNAUTHORIZED {
                        self.session.invalidate_if_current(credential).await;
                    }
                    Error::from_response(status, &text)
                }
                Err(err) => Error::from(err),
            };

            debug!(
                service = self.service,
                path,
                attempt,
                attempts,
                error = %error,
                "Request attempt failed"
            );

            if !error.is_retryable() {
                return Err(error);
            }
            last_error = Some(error);

            if attempt < attempts {
                let delay = self.retry_policy.delay_for_attempt(attempt);
                if !delay.is_zero() {
                    debug!("Retrying request after {:?}", delay);
                    sleep(delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::ServiceUnavailable(format!("request for `{path}` failed after retries"))
        }))
    }
}

fn is_success(status: StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

/// Decode a JSON response body, reporting mismatches as [`Error::Decode`].
pub(crate) async fn decode_json<R>(response: Response, path: &str) -> Result<R>
where
    R: DeserializeOwned,
{
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|err| Error::Decode(format!("response for `{path}`: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::BasicAuthenticator;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer, retry: RetryPolicy) -> Transport {
        let config = OpcConfig::new("mydomain", "jane", "pw", server.uri()).unwrap();
        TransportBuilder::new("test", config, Arc::new(BasicAuthenticator::new()))
            .with_retry_policy(retry)
            .with_media_type("application/vnd.test+json")
            .build()
            .unwrap()
    }

    fn immediate(attempts: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(attempts)
            .with_initial_delay(Duration::ZERO)
    }

    #[test]
    fn test_retry_policy_new() {
        let policy = RetryPolicy::new();
        assert_eq!(policy.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(
            policy.initial_delay,
            Duration::from_millis(DEFAULT_RETRY_DELAY_MS)
        );
        assert_eq!(policy.backoff_multiplier, 2);
        assert!(policy.jitter);
    }

    #[test]
    fn test_retry_policy_no_retry() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.attempts(), 1);
        assert!(!policy.has_retries());
    }

    #[test]
    fn test_retry_policy_zero_means_one_attempt() {
        assert_eq!(RetryPolicy::new().with_max_retries(0).attempts(), 1);
    }

    #[test]
    fn test_retry_policy_exponential_backoff() {
        let policy = RetryPolicy::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2)
            .with_max_delay(Duration::from_secs(1))
            .with_jitter(false);

        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(1));
    }

    #[test]
    fn test_retry_policy_jitter_is_bounded() {
        let policy = RetryPolicy::new().with_initial_delay(Duration::from_millis(100));
        for attempt in 1..6 {
            let delay = policy.delay_for_attempt(attempt);
            assert!(delay <= policy.base_delay_for_attempt(attempt));
        }
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_retry_policy(RetryPolicy::no_retry())
            .with_pool_idle_timeout(Duration::from_secs(120))
            .with_pool_max_idle(20)
            .with_logging(false)
            .with_compression(false);

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retry_policy.attempts(), 1);
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(120));
        assert_eq!(config.pool_max_idle_per_host, 20);
        assert!(!config.enable_logging);
        assert!(!config.enable_compression);
    }

    #[tokio::test]
    async fn url_for_keeps_qualified_hierarchy() {
        let server = MockServer::start().await;
        let transport = transport(&server, immediate(1));
        let url = transport.url_for("/sshkey/Compute-d/u/key").unwrap();
        assert!(url.as_str().ends_with("/sshkey/Compute-d/u/key"));
    }

    #[tokio::test]
    async fn always_failing_responder_is_tried_exactly_k_times() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/things/a"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})),
            )
            .expect(4)
            .mount(&server)
            .await;

        let err = transport(&server, immediate(4))
            .execute::<()>(Method::GET, "/things/a", None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            Error::Api {
                status: 500,
                message: "boom".to_string()
            }
        );
    }

    #[tokio::test]
    async fn connection_failures_are_retried_until_attempts_run_out() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = OpcConfig::new("mydomain", "jane", "pw", format!("http://127.0.0.1:{port}"))
            .unwrap();
        let retry = RetryPolicy::new()
            .with_max_retries(3)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(1)
            .with_jitter(false);
        let transport = TransportBuilder::new("test", config, Arc::new(BasicAuthenticator::new()))
            .with_retry_policy(retry)
            .build()
            .unwrap();

        let started = std::time::Instant::now();
        let err = transport
            .execute::<()>(Method::GET, "/things/a", None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ServiceUnavailable(_)), "got {err:?}");
        // Two delays of 100ms separate three attempts.
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn single_attempt_connection_failure_does_not_wait() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = OpcConfig::new("mydomain", "jane", "pw", format!("http://127.0.0.1:{port}"))
            .unwrap();
        let transport = TransportBuilder::new("test", config, Arc::new(BasicAuthenticator::new()))
            .with_retry_policy(RetryPolicy::no_retry().with_initial_delay(Duration::from_secs(5)))
            .build()
            .unwrap();

        let started = std::time::Instant::now();
        let err = transport
            .execute::<()>(Method::GET, "/things/a", None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ServiceUnavailable(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn retry_stops_at_first_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/things/a"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/things/a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "a"})))
            .expect(1)
            .mount(&server)
            .await;

        let value: serde_json::Value = transport(&server, immediate(3))
            .execute_json::<(), _>(Method::GET, "/things/a", None)
            .await
            .unwrap();
        assert_eq!(value["name"], "a");
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/things/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "nope"})))
            .expect(1)
            .mount(&server)
            .await;

        let err = transport(&server, immediate(5))
            .execute::<()>(Method::GET, "/things/missing", None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn body_is_serialized_with_media_type_and_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/things/"))
            .and(header("content-type", "application/vnd.test+json"))
            .and(header("accept", "application/vnd.test+json"))
            .and(header("x-id-tenant-name", "mydomain"))
            .and(header_exists("authorization"))
            .and(body_json(json!({"name": "a", "enabled": false})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "a"})))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport(&server, immediate(1))
            .execute(
                Method::POST,
                "/things/",
                Some(&json!({"name": "a", "enabled": false})),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/things/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .expect(1)
            .mount(&server)
            .await;

        let err = transport(&server, immediate(3))
            .execute_json::<(), serde_json::Value>(Method::GET, "/things/a", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
