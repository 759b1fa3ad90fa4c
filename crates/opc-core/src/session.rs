//! Session and credential management.
//!
//! A [`Session`] owns the caller's identity and a short-lived [`Credential`]
//! obtained through an [`Authenticator`]. The credential is reused until it is
//! older than the freshness window and then refreshed before the next request.
//! Refreshes are serialized: concurrent callers wait for the one in flight and
//! share its result.

use crate::naming::NameQualifier;
use crate::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};
use url::Url;

/// How long a session credential is reused before re-authenticating.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(25 * 60);

/// Header naming the identity domain on tenant-scoped APIs.
pub const TENANT_HEADER: &str = "x-id-tenant-name";

/// Login path of header-token APIs.
pub const TOKEN_AUTH_PATH: &str = "/auth/v1.0";

/// Login header carrying `Storage-{domain}:{user}`.
pub const STORAGE_USER_HEADER: &str = "x-storage-user";

/// Login header carrying the password.
pub const STORAGE_PASS_HEADER: &str = "x-storage-pass";

/// Header carrying the issued token, on the login response and on every
/// later request.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Who the client acts as.
#[derive(Debug)]
pub struct Identity {
    identity_domain: String,
    username: String,
    password: SecretString,
}

impl Identity {
    /// Create an identity.
    #[must_use]
    pub fn new(
        identity_domain: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            identity_domain: identity_domain.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Identity domain (tenant).
    #[must_use]
    pub fn identity_domain(&self) -> &str {
        &self.identity_domain
    }

    /// Account username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Account password.
    #[must_use]
    pub fn password(&self) -> &SecretString {
        &self.password
    }
}

/// Authentication artifact attached to every request.
#[derive(Debug, Clone)]
pub struct Credential {
    headers: HeaderMap,
    issued_at: Instant,
}

impl Credential {
    /// Wrap freshly issued headers. Values are marked sensitive.
    #[must_use]
    pub fn new(mut headers: HeaderMap) -> Self {
        for value in headers.values_mut() {
            value.set_sensitive(true);
        }
        Self {
            headers,
            issued_at: Instant::now(),
        }
    }

    /// Headers to attach to a request.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// When the credential was obtained.
    #[must_use]
    pub const fn issued_at(&self) -> Instant {
        self.issued_at
    }

    /// Time elapsed since the credential was obtained.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.issued_at.elapsed()
    }

    /// Returns true if both values come from the same authentication.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.issued_at == other.issued_at && self.headers == other.headers
    }

    /// Returns true once the credential is at least `window` old.
    #[must_use]
    pub fn is_stale(&self, window: Option<Duration>) -> bool {
        window.is_some_and(|window| self.age() >= window)
    }
}

/// Performs the authentication exchange for one sub-API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Obtain the headers that authenticate subsequent requests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if the provider rejects the identity.
    async fn authenticate(
        &self,
        http: &Client,
        endpoint: &Url,
        identity: &Identity,
    ) -> Result<HeaderMap>;

    /// How long the returned credential stays valid, `None` for forever.
    fn freshness_window(&self) -> Option<Duration>;
}

/// HTTP Basic authentication plus the tenant header.
///
/// No exchange with the provider is needed, so the credential never expires.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAuthenticator;

impl BasicAuthenticator {
    /// Create the authenticator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Authenticator for BasicAuthenticator {
    async fn authenticate(
        &self,
        _http: &Client,
        _endpoint: &Url,
        identity: &Identity,
    ) -> Result<HeaderMap> {
        let token = STANDARD.encode(format!(
            "{}:{}",
            identity.username(),
            identity.password().expose_secret()
        ));

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {token}"))
                .map_err(|err| Error::Authentication(format!("invalid credentials: {err}")))?,
        );
        headers.insert(
            HeaderName::from_static(TENANT_HEADER),
            HeaderValue::from_str(identity.identity_domain())
                .map_err(|err| Error::Authentication(format!("invalid identity domain: {err}")))?,
        );
        Ok(headers)
    }

    fn freshness_window(&self) -> Option<Duration> {
        None
    }
}

/// Header-token login: `GET /auth/v1.0` with the storage user and password
/// headers, then `X-Auth-Token` on every request.
#[derive(Debug, Clone, Copy)]
pub struct TokenAuthenticator {
    window: Option<Duration>,
}

impl TokenAuthenticator {
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

impl Default for TokenAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn authenticate(
        &self,
        http: &Client,
        endpoint: &Url,
        identity: &Identity,
    ) -> Result<HeaderMap> {
        let base = endpoint.as_str().trim_end_matches('/');
        let url = Url::parse(&format!("{base}{TOKEN_AUTH_PATH}"))?;
        let user = format!(
            "Storage-{}:{}",
            identity.identity_domain(),
            identity.username()
        );

        debug!(user = %user, "requesting auth token");
        let response = http
            .get(url)
            .header(STORAGE_USER_HEADER, user.as_str())
            .header(STORAGE_PASS_HEADER, identity.password().expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Authentication(
                Error::from_response(status, &text).to_string(),
            ));
        }

        let token = response
            .headers()
            .get(AUTH_TOKEN_HEADER)
            .cloned()
            .ok_or_else(|| Error::Authentication("login returned no auth token".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(AUTH_TOKEN_HEADER), token);
        Ok(headers)
    }

    fn freshness_window(&self) -> Option<Duration> {
        self.window
    }
}

/// Identity, endpoint, HTTP client and current credential of one client.
pub struct Session {
    identity: Identity,
    endpoint: Url,
    http: Client,
    authenticator: Arc<dyn Authenticator>,
    freshness_window: Option<Duration>,
    credential: Mutex<Option<Credential>>,
}

impl Session {
    /// Create a session; no request is made until the first call.
    #[must_use]
    pub fn new(
        identity: Identity,
        endpoint: Url,
        http: Client,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let freshness_window = authenticator.freshness_window();
        Self {
            identity,
            endpoint,
            http,
            authenticator,
            freshness_window,
            credential: Mutex::new(None),
        }
    }

    /// Override the authenticator's freshness window.
    #[must_use]
    pub fn with_freshness_window(mut self, window: Option<Duration>) -> Self {
        self.freshness_window = window;
        self
    }

    /// Identity this session acts as.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Base URL of the sub-API.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Shared HTTP client.
    #[must_use]
    pub const fn http(&self) -> &Client {
        &self.http
    }

    /// Freshness window in effect.
    #[must_use]
    pub const fn freshness_window(&self) -> Option<Duration> {
        self.freshness_window
    }

    /// Name qualifier bound to this session's identity.
    #[must_use]
    pub fn qualifier(&self, namespace: &str) -> NameQualifier {
        NameQualifier::new(
            namespace,
            self.identity.identity_domain(),
            self.identity.username(),
        )
    }

    /// Return a credential that is not stale, authenticating if needed.
    ///
    /// The lock is held across the exchange, so only one refresh runs at a
    /// time.
    ///
    /// # Errors
    ///
    /// Propagates the authenticator's error; the previous credential is kept
    /// out of use.
    pub async fn ensure_fresh(&self) -> Result<Credential> {
        let mut current = self.credential.lock().await;

        if let Some(credential) = current.as_ref() {
            if !credential.is_stale(self.freshness_window) {
                return Ok(credential.clone());
            }
            debug!(age = ?credential.age(), "credential is stale, re-authenticating");
        }

        *current = None;
        let headers = self
            .authenticator
            .authenticate(&self.http, &self.endpoint, &self.identity)
            .await?;
        let credential = Credential::new(headers);
        *current = Some(credential.clone());

        info!(
            identity_domain = self.identity.identity_domain(),
            user = self.identity.username(),
            "authenticated session"
        );
        Ok(credential)
    }

    /// Drop the cached credential so the next request re-authenticates.
    pub async fn invalidate(&self) {
        *self.credential.lock().await = None;
    }

    /// Drop the cached credential only if it is still `rejected`.
    ///
    /// A credential refreshed by another caller in the meantime is kept.
    /// Returns true if the cache was cleared.
    pub async fn invalidate_if_current(&self, rejected: &Credential) -> bool {
        let mut current = self.credential.lock().await;
        match current.as_ref() {
            Some(credential) if credential.same_as(rejected) => {
                debug!("credential rejected, dropping it");
                *current = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{RetryPolicy, Transport, TransportBuilder};
    use crate::config::OpcConfig;
    use reqwest::header::COOKIE;
    use reqwest::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint() -> Url {
        Url::parse("https://api.example.com").unwrap()
    }

    fn cookie_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("nimbula=abc"));
        headers
    }

    fn session(authenticator: MockAuthenticator) -> Session {
        Session::new(
            Identity::new("mydomain", "jane", "pw"),
            endpoint(),
            Client::new(),
            Arc::new(authenticator),
        )
    }

    #[tokio::test]
    async fn fresh_credential_is_reused() {
        let mut auth = MockAuthenticator::new();
        auth.expect_freshness_window()
            .return_const(Some(DEFAULT_FRESHNESS_WINDOW));
        auth.expect_authenticate()
            .times(1)
            .returning(|_, _, _| Ok(cookie_headers()));

        let session = session(auth);
        let first = session.ensure_fresh().await.unwrap();
        let second = session.ensure_fresh().await.unwrap();
        assert_eq!(first.headers(), second.headers());
        assert_eq!(first.issued_at(), second.issued_at());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_credential_triggers_exactly_one_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut auth = MockAuthenticator::new();
        auth.expect_freshness_window()
            .return_const(Some(DEFAULT_FRESHNESS_WINDOW));
        auth.expect_authenticate().returning(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(cookie_headers())
        });

        let session = session(auth);
        session.ensure_fresh().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(DEFAULT_FRESHNESS_WINDOW - Duration::from_secs(1)).await;
        session.ensure_fresh().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        session.ensure_fresh().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        session.ensure_fresh().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let mut auth = MockAuthenticator::new();
        auth.expect_freshness_window()
            .return_const(Some(DEFAULT_FRESHNESS_WINDOW));
        auth.expect_authenticate()
            .times(1)
            .returning(|_, _, _| Ok(cookie_headers()));

        let session = Arc::new(session(auth));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.ensure_fresh().await })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn failed_authentication_is_propagated_and_retried_next_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut auth = MockAuthenticator::new();
        auth.expect_freshness_window().return_const(None::<Duration>);
        auth.expect_authenticate().returning(move |_, _, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::Authentication("bad password".to_string()))
            } else {
                Ok(cookie_headers())
            }
        });

        let session = session(auth);
        let err = session.ensure_fresh().await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert!(session.ensure_fresh().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_reauthentication() {
        let mut auth = MockAuthenticator::new();
        auth.expect_freshness_window().return_const(None::<Duration>);
        auth.expect_authenticate()
            .times(2)
            .returning(|_, _, _| Ok(cookie_headers()));

        let session = session(auth);
        session.ensure_fresh().await.unwrap();
        session.invalidate().await;
        session.ensure_fresh().await.unwrap();
    }

    #[tokio::test]
    async fn rejecting_a_replaced_credential_keeps_the_new_one() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut auth = MockAuthenticator::new();
        auth.expect_freshness_window().return_const(None::<Duration>);
        auth.expect_authenticate().returning(move |_, _, _| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let mut headers = HeaderMap::new();
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&format!("nimbula=session-{n}")).unwrap(),
            );
            Ok(headers)
        });

        let session = session(auth);
        let first = session.ensure_fresh().await.unwrap();
        assert!(session.invalidate_if_current(&first).await);

        let second = session.ensure_fresh().await.unwrap();
        assert!(!second.same_as(&first));

        // A late 401 for the first credential must not discard the second.
        assert!(!session.invalidate_if_current(&first).await);
        let reused = session.ensure_fresh().await.unwrap();
        assert!(reused.same_as(&second));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn basic_authenticator_sets_auth_and_tenant_headers() {
        let identity = Identity::new("mydomain", "jane", "pw");
        let headers = BasicAuthenticator::new()
            .authenticate(&Client::new(), &endpoint(), &identity)
            .await
            .unwrap();

        assert_eq!(headers[AUTHORIZATION], "Basic amFuZTpwdw==");
        assert_eq!(headers[TENANT_HEADER], "mydomain");
        assert!(BasicAuthenticator::new().freshness_window().is_none());
    }

    async fn mount_token_login(server: &MockServer, expected_logins: u64) {
        Mock::given(method("GET"))
            .and(path(TOKEN_AUTH_PATH))
            .and(header(STORAGE_USER_HEADER, "Storage-mydomain:jane"))
            .and(header(STORAGE_PASS_HEADER, "pw"))
            .respond_with(ResponseTemplate::new(200).insert_header(AUTH_TOKEN_HEADER, "tok"))
            .expect(expected_logins)
            .mount(server)
            .await;
    }

    fn token_transport(server: &MockServer, window: Option<Duration>) -> Transport {
        let config = OpcConfig::new("mydomain", "jane", "pw", server.uri()).unwrap();
        TransportBuilder::new("storage", config, Arc::new(TokenAuthenticator::new()))
            .with_retry_policy(RetryPolicy::no_retry())
            .with_freshness_window(window)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn token_authenticator_logs_in_with_storage_headers() {
        let server = MockServer::start().await;
        mount_token_login(&server, 1).await;

        let endpoint = Url::parse(&server.uri()).unwrap();
        let identity = Identity::new("mydomain", "jane", "pw");
        let headers = TokenAuthenticator::new()
            .authenticate(&Client::new(), &endpoint, &identity)
            .await
            .unwrap();

        assert_eq!(headers[AUTH_TOKEN_HEADER], "tok");
        assert_eq!(headers.len(), 1);
        assert_eq!(
            TokenAuthenticator::new().freshness_window(),
            Some(DEFAULT_FRESHNESS_WINDOW)
        );
    }

    #[tokio::test]
    async fn token_is_replayed_on_requests() {
        let server = MockServer::start().await;
        mount_token_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/things/a"))
            .and(header(AUTH_TOKEN_HEADER, "tok"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let transport = token_transport(&server, Some(DEFAULT_FRESHNESS_WINDOW));
        for _ in 0..2 {
            transport
                .execute::<()>(Method::GET, "/things/a", None)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn stale_token_is_fetched_again() {
        let server = MockServer::start().await;
        mount_token_login(&server, 2).await;
        Mock::given(method("GET"))
            .and(path("/things/a"))
            .and(header(AUTH_TOKEN_HEADER, "tok"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let transport = token_transport(&server, Some(Duration::ZERO));
        for _ in 0..2 {
            transport
                .execute::<()>(Method::GET, "/things/a", None)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn rejected_token_login_is_an_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TOKEN_AUTH_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let endpoint = Url::parse(&server.uri()).unwrap();
        let identity = Identity::new("mydomain", "jane", "wrong");
        let err = TokenAuthenticator::new()
            .authenticate(&Client::new(), &endpoint, &identity)
            .await
            .unwrap_err();

        match err {
            Error::Authentication(message) => assert!(message.contains("bad credentials")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_without_token_header_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TOKEN_AUTH_PATH))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let endpoint = Url::parse(&server.uri()).unwrap();
        let identity = Identity::new("mydomain", "jane", "pw");
        let err = TokenAuthenticator::new()
            .authenticate(&Client::new(), &endpoint, &identity)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn credential_marks_headers_sensitive() {
        let credential = Credential::new(cookie_headers());
        assert!(credential.headers()[COOKIE].is_sensitive());
        assert!(!credential.is_stale(None));
        assert!(!credential.is_stale(Some(DEFAULT_FRESHNESS_WINDOW)));
        assert!(credential.is_stale(Some(Duration::ZERO)));
    }

    #[test]
    fn identity_debug_hides_password() {
        let identity = Identity::new("mydomain", "jane", "hunter2");
        assert!(!format!("{identity:?}").contains("hunter2"));
    }
}
