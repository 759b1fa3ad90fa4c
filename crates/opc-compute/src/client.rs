//! Asynchronous compute client and its cookie-session authenticator.

use crate::instances::Instances;
use crate::security_rules::SecurityRules;
use crate::ssh_keys::SshKeys;
use crate::Result;
use async_trait::async_trait;
use opc_core::client::{
    ClientConfig, RetryPolicy, Transport, TransportBuilder, COMPUTE_DEFAULT_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT,
};
use opc_core::config::OpcConfig;
use opc_core::naming::NameQualifier;
use opc_core::session::{Authenticator, Identity, DEFAULT_FRESHNESS_WINDOW};
use opc_core::wait::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
use opc_core::Error;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("opc-compute/", env!("CARGO_PKG_VERSION"));

/// Media type of every compute request and response.
pub const COMPUTE_MEDIA_TYPE: &str = "application/oracle-compute-v3+json";

/// Namespace segment of compute object names (`/Compute-{domain}/...`).
pub const COMPUTE_NAMESPACE: &str = "Compute";

/// Path of the login exchange.
pub const AUTHENTICATE_PATH: &str = "/authenticate/";

#[derive(Serialize)]
struct AuthenticateRequest<'a> {
    user: String,
    password: &'a str,
}

/// Logs in with `POST /authenticate/` and replays the returned session cookie.
///
/// The cookie lives for thirty minutes on the provider side; it is refreshed
/// after [`DEFAULT_FRESHNESS_WINDOW`].
#[derive(Debug, Clone, Copy)]
pub struct CookieAuthenticator {
    window: Option<Duration>,
}

impl CookieAuthenticator {
    /// Create the authenticator with the default freshness window.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            window: Some(DEFAULT_FRESHNESS_WINDOW),
        }
    }

    /// Override the freshness window.
    #[must_use]
    pub const fn with_window(mut self, window: Option<Duration>) -> Self {
        self.window = window;
        self
    }
}

impl Default for CookieAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for CookieAuthenticator {
    async fn authenticate(
        &self,
        http: &Client,
        endpoint: &Url,
        identity: &Identity,
    ) -> Result<HeaderMap> {
        let base = endpoint.as_str().trim_end_matches('/');
        let url = Url::parse(&format!("{base}{AUTHENTICATE_PATH}"))?;

        let request = AuthenticateRequest {
            user: format!(
                "/{COMPUTE_NAMESPACE}-{}/{}",
                identity.identity_domain(),
                identity.username()
            ),
            password: identity.password().expose_secret(),
        };
        let body = serde_json::to_vec(&request)
            .map_err(|err| Error::Encode(format!("authentication request: {err}")))?;

        debug!(user = %request.user, "authenticating compute session");
        let response = http
            .post(url)
            .header(CONTENT_TYPE, COMPUTE_MEDIA_TYPE)
            .header(ACCEPT, COMPUTE_MEDIA_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Authentication(
                Error::from_response(status, &text).to_string(),
            ));
        }

        let cookie = session_cookie(response.headers())
            .ok_or_else(|| Error::Authentication("login returned no session cookie".to_string()))?;
        let value = HeaderValue::from_str(&cookie)
            .map_err(|err| Error::Authentication(format!("unusable session cookie: {err}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, value);
        Ok(headers)
    }

    fn freshness_window(&self) -> Option<Duration> {
        self.window
    }
}

/// Join the `name=value` parts of every `Set-Cookie` header.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// Builder for [`ComputeClient`].
#[derive(Clone)]
pub struct ComputeClientBuilder {
    inner: TransportBuilder,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl ComputeClientBuilder {
    /// Create a builder for the compute endpoint named in `config`.
    #[must_use]
    pub fn new(config: OpcConfig) -> Self {
        Self::with_authenticator(config, Arc::new(CookieAuthenticator::new()))
    }

    /// Create a builder using a custom authentication exchange.
    #[must_use]
    pub fn with_authenticator(config: OpcConfig, authenticator: Arc<dyn Authenticator>) -> Self {
        let timeout = if config.request_timeout_secs == DEFAULT_REQUEST_TIMEOUT {
            Duration::from_secs(COMPUTE_DEFAULT_TIMEOUT)
        } else {
            config.timeout()
        };
        let http_config = ClientConfig::new()
            .with_timeout(timeout)
            .with_retry_policy(RetryPolicy::new().with_max_retries(config.max_retries));

        let inner = TransportBuilder::new("compute", config, authenticator)
            .with_http_config(http_config)
            .with_media_type(COMPUTE_MEDIA_TYPE)
            .with_user_agent(USER_AGENT);

        Self {
            inner,
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.inner = self.inner.with_retry_policy(retry);
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.inner = self.inner.with_http_config(config);
        self
    }

    /// Override how long the session cookie is reused.
    #[must_use]
    pub fn with_freshness_window(mut self, window: Option<Duration>) -> Self {
        self.inner = self.inner.with_freshness_window(window);
        self
    }

    /// Delay between two polls of an instance wait.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Budget of an instance wait.
    #[must_use]
    pub const fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or TLS settings are invalid.
    pub fn build(self) -> Result<ComputeClient> {
        let transport = self.inner.build()?;
        let qualifier = transport.session().qualifier(COMPUTE_NAMESPACE);
        Ok(ComputeClient {
            transport,
            qualifier,
            poll_interval: self.poll_interval,
            wait_timeout: self.wait_timeout,
        })
    }
}

/// Asynchronous compute client.
#[derive(Clone)]
pub struct ComputeClient {
    transport: Transport,
    qualifier: NameQualifier,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl ComputeClient {
    /// Construct a client with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or TLS settings are invalid.
    pub fn new(config: OpcConfig) -> Result<Self> {
        ComputeClientBuilder::new(config).build()
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.transport.endpoint()
    }

    /// Shared transport.
    #[must_use]
    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Qualifier for `/Compute-{domain}/{user}/` names.
    #[must_use]
    pub const fn qualifier(&self) -> &NameQualifier {
        &self.qualifier
    }

    /// SSH public keys.
    #[must_use]
    pub fn ssh_keys(&self) -> SshKeys {
        SshKeys::new(self.transport.clone(), self.qualifier.clone())
    }

    /// Security rules.
    #[must_use]
    pub fn security_rules(&self) -> SecurityRules {
        SecurityRules::new(self.transport.clone(), self.qualifier.clone())
    }

    /// Instances.
    #[must_use]
    pub fn instances(&self) -> Instances {
        Instances::new(self.transport.clone(), self.qualifier.clone())
            .with_poll_interval(self.poll_interval)
            .with_timeout(self.wait_timeout)
    }
}
