//! Database service instances.

use crate::models::{CreateServiceInstanceInput, ServiceInstance};
use crate::Result;
use opc_core::client::Transport;
use opc_core::resource::ResourceClient;
use opc_core::wait::{Outcome, StatusTable, WaitSpec, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use validator::Validate;

/// Statuses while waiting for provisioning.
pub const SERVICE_RUNNING: StatusTable = StatusTable::new(&[
    ("Running", Outcome::Ready),
    ("In Progress", Outcome::Pending),
    ("Configuring", Outcome::Pending),
    ("Starting", Outcome::Pending),
    ("Failed", Outcome::Failed),
    ("Terminating", Outcome::Failed),
]);

/// Statuses while waiting for deletion.
pub const SERVICE_DELETED: StatusTable = StatusTable::new(&[
    ("Terminating", Outcome::Pending),
    ("In Progress", Outcome::Pending),
    ("Failed", Outcome::Failed),
]);

/// Provision, read and delete service instances.
#[derive(Clone)]
pub struct ServiceInstances {
    resource: ResourceClient,
    poll_interval: Duration,
    timeout: Duration,
    cancel: Option<CancellationToken>,
}

impl ServiceInstances {
    pub(crate) fn new(transport: Transport, root: String) -> Self {
        Self {
            resource: ResourceClient::new(transport, "service instance", root.clone(), root),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_WAIT_TIMEOUT,
            cancel: None,
        }
    }

    /// Delay between two polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Budget of each wait.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Abort waits when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Submit a provisioning request and wait until the instance is running.
    ///
    /// # Errors
    ///
    /// [`opc_core::Error::ValidationError`] for invalid input, transport and
    /// provider errors, [`opc_core::Error::OperationFailed`] for failure
    /// statuses, or the wait's timeout or cancellation.
    pub async fn create(&self, input: &CreateServiceInstanceInput) -> Result<ServiceInstance> {
        input.validate()?;
        self.resource.create_accepted(input).await?;
        info!(service = %input.service_name, "service instance provisioning accepted");

        let spec = self.wait_spec(format!("service instance {} to be running", input.service_name));
        self.resource
            .wait_for_status(&input.service_name, &SERVICE_RUNNING, &spec)
            .await
    }

    /// Fetch an instance.
    ///
    /// # Errors
    ///
    /// Transport, provider and decode errors.
    pub async fn get(&self, name: &str) -> Result<ServiceInstance> {
        self.resource.get(name).await
    }

    /// Delete an instance and wait until the provider no longer knows it.
    ///
    /// # Errors
    ///
    /// Transport and provider errors, [`opc_core::Error::OperationFailed`]
    /// for failure statuses, or the wait's timeout or cancellation.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let spec = self.wait_spec(format!("service instance {name} to be deleted"));
        self.resource
            .delete_and_wait::<ServiceInstance>(name, &SERVICE_DELETED, &spec)
            .await
    }

    fn wait_spec(&self, description: String) -> WaitSpec {
        let spec = WaitSpec::new(description)
            .with_poll_interval(self.poll_interval)
            .with_timeout(self.timeout);
        match &self.cancel {
            Some(token) => spec.with_cancellation(token.clone()),
            None => spec,
        }
    }
}
