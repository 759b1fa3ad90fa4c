//! Instances: launch through a launch plan, wait for `running`, delete and
//! wait for disappearance.

use crate::models::{CreateInstanceInput, Instance, LaunchPlan};
use crate::Result;
use opc_core::client::Transport;
use opc_core::naming::NameQualifier;
use opc_core::resource::{ResourceClient, ResourcePath};
use opc_core::wait::{Outcome, StatusTable, WaitSpec, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};
use opc_core::Error;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Instance states while waiting for a launch.
pub const INSTANCE_RUNNING: StatusTable = StatusTable::new(&[
    ("running", Outcome::Ready),
    ("queued", Outcome::Pending),
    ("initializing", Outcome::Pending),
    ("preparing", Outcome::Pending),
    ("starting", Outcome::Pending),
    ("error", Outcome::Failed),
]);

/// Instance states while waiting for a deletion.
pub const INSTANCE_DELETED: StatusTable = StatusTable::new(&[
    ("stopping", Outcome::Pending),
    ("deleting", Outcome::Pending),
    ("error", Outcome::Failed),
]);

struct InstancePaths;

impl ResourcePath for InstancePaths {
    const KIND: &'static str = "instance";

    fn container_path(&self) -> String {
        "/launchplan/".to_string()
    }

    fn resource_root_path(&self) -> String {
        "/instance".to_string()
    }
}

/// Launch, read and delete instances by `{name}/{id}`.
#[derive(Clone)]
pub struct Instances {
    resource: ResourceClient,
    qualifier: NameQualifier,
    poll_interval: Duration,
    timeout: Duration,
    cancel: Option<CancellationToken>,
}

impl Instances {
    pub(crate) fn new(transport: Transport, qualifier: NameQualifier) -> Self {
        Self {
            resource: ResourceClient::for_path(transport, &InstancePaths)
                .with_qualifier(qualifier.clone()),
            qualifier,
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

    /// Launch an instance and wait until it is running.
    ///
    /// If the instance enters `error` or does not start in time it is deleted
    /// before the wait's error is returned. A cancelled wait leaves the
    /// instance in place.
    ///
    /// # Errors
    ///
    /// Transport, provider and decode errors, [`Error::OperationFailed`] when
    /// the instance enters `error`, or the wait's timeout or cancellation.
    pub async fn create(&self, input: &CreateInstanceInput) -> Result<Instance> {
        let mut body = input.clone();
        body.qualify(&self.qualifier);

        let plan: LaunchPlan<Instance> = self
            .resource
            .create(&LaunchPlan {
                instances: vec![body],
            })
            .await?;
        let launched = plan.instances.into_iter().next().ok_or_else(|| {
            Error::Decode(format!("launch plan for `{}` returned no instance", input.name))
        })?;

        let name = self.qualifier.unqualify(&launched.name);
        info!(instance = %name, "instance launched");

        match self.wait_until_running(&name).await {
            Ok(instance) => Ok(instance),
            Err(err @ (Error::OperationFailed(_) | Error::Timeout(_))) => {
                warn!(instance = %name, error = %err, "instance failed to start, deleting it");
                if let Err(cleanup) = self.resource.delete(&self.qualifier.qualify(&name)).await {
                    warn!(instance = %name, error = %cleanup, "failed to delete instance");
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Fetch an instance by `{name}/{id}`.
    ///
    /// # Errors
    ///
    /// Transport, provider and decode errors.
    pub async fn get(&self, name: &str) -> Result<Instance> {
        let instance: Instance = self.resource.get(&self.qualifier.qualify(name)).await?;
        Ok(self.finish(instance))
    }

    /// Fetch an instance by name and identifier.
    ///
    /// # Errors
    ///
    /// Transport, provider and decode errors.
    pub async fn get_by_id(&self, name: &str, id: Uuid) -> Result<Instance> {
        self.get(&format!("{name}/{id}")).await
    }

    /// Delete an instance and wait until the provider no longer knows it.
    ///
    /// # Errors
    ///
    /// Transport and provider errors, [`Error::OperationFailed`] when the
    /// instance enters `error`, or the wait's timeout or cancellation.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let spec = self.wait_spec(format!("instance {name} to be deleted"));
        self.resource
            .delete_and_wait::<Instance>(&self.qualifier.qualify(name), &INSTANCE_DELETED, &spec)
            .await
    }

    /// Wait until an existing instance is running.
    ///
    /// # Errors
    ///
    /// Same as the wait phase of [`Instances::create`].
    pub async fn wait_until_running(&self, name: &str) -> Result<Instance> {
        let spec = self.wait_spec(format!("instance {name} to be running"));
        let instance: Instance = self
            .resource
            .wait_for_status(&self.qualifier.qualify(name), &INSTANCE_RUNNING, &spec)
            .await?;
        Ok(self.finish(instance))
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

    fn finish(&self, mut instance: Instance) -> Instance {
        instance.unqualify(&self.qualifier);
        instance
    }
}
