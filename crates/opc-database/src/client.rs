//! Asynchronous database client.

use crate::service_instances::ServiceInstances;
use crate::Result;
use opc_core::client::{
    ClientConfig, RetryPolicy, Transport, TransportBuilder, DATABASE_DEFAULT_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT,
};
use opc_core::config::OpcConfig;
use opc_core::session::BasicAuthenticator;
use opc_core::wait::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("opc-database/", env!("CARGO_PKG_VERSION"));

/// Media type of database requests and responses.
pub const DATABASE_MEDIA_TYPE: &str = "application/json";

/// Root of the service-instance collection.
pub const SERVICE_INSTANCES_ROOT: &str = "/paas/service/dbcs/api/v1.1/instances";

/// Builder for [`DatabaseClient`].
#[derive(Clone)]
pub struct DatabaseClientBuilder {
    inner: TransportBuilder,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl DatabaseClientBuilder {
    /// Create a builder for the database endpoint named in `config`.
    #[must_use]
    pub fn new(config: OpcConfig) -> Self {
        let timeout = if config.request_timeout_secs == DEFAULT_REQUEST_TIMEOUT {
            Duration::from_secs(DATABASE_DEFAULT_TIMEOUT)
        } else {
            config.timeout()
        };
        let http_config = ClientConfig::new()
            .with_timeout(timeout)
            .with_retry_policy(RetryPolicy::new().with_max_retries(config.max_retries));

        let inner = TransportBuilder::new("database", config, Arc::new(BasicAuthenticator::new()))
            .with_http_config(http_config)
            .with_media_type(DATABASE_MEDIA_TYPE)
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

    /// Delay between two polls of a provisioning wait.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Budget of a provisioning wait.
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
    pub fn build(self) -> Result<DatabaseClient> {
        let transport = self.inner.build()?;
        Ok(DatabaseClient {
            transport,
            poll_interval: self.poll_interval,
            wait_timeout: self.wait_timeout,
        })
    }
}

/// Asynchronous database client.
#[derive(Clone)]
pub struct DatabaseClient {
    transport: Transport,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl DatabaseClient {
    /// Construct a client with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or TLS settings are invalid.
    pub fn new(config: OpcConfig) -> Result<Self> {
        DatabaseClientBuilder::new(config).build()
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

    /// Service instances of the caller's identity domain.
    #[must_use]
    pub fn service_instances(&self) -> ServiceInstances {
        let domain = self.transport.session().identity().identity_domain();
        let root = format!("{SERVICE_INSTANCES_ROOT}/{domain}");
        ServiceInstances::new(self.transport.clone(), root)
            .with_poll_interval(self.poll_interval)
            .with_timeout(self.wait_timeout)
    }
}
