//! Generic create/get/update/delete client for one resource collection.
//!
//! Resource wrappers hold a [`ResourceClient`] bound to their collection's
//! paths and add name qualification and status tables on top.

use crate::client::{decode_json, Transport};
use crate::naming::NameQualifier;
use crate::wait::{StatusTable, WaitSpec};
use crate::{Error, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Mutex;
use tracing::debug;

/// Path layout of a resource collection.
pub trait ResourcePath {
    /// Short label used in logs and wait descriptions, e.g. `"instance"`.
    const KIND: &'static str;

    /// Path accepting `POST` to create a resource.
    fn container_path(&self) -> String;

    /// Prefix of per-resource `GET`/`PUT`/`DELETE` paths.
    fn resource_root_path(&self) -> String;
}

/// A resource that reports the progress of asynchronous operations.
pub trait HasStatus {
    /// Provider status string, e.g. `"running"`.
    fn status(&self) -> &str;

    /// Provider explanation accompanying an error status.
    fn status_detail(&self) -> Option<&str> {
        None
    }
}

/// Uniform verbs over a `(container, root)` path pair.
#[derive(Clone)]
pub struct ResourceClient {
    transport: Transport,
    kind: &'static str,
    container_path: String,
    resource_root_path: String,
    qualifier: Option<NameQualifier>,
}

impl ResourceClient {
    /// Bind a transport to explicit paths.
    #[must_use]
    pub fn new(
        transport: Transport,
        kind: &'static str,
        container_path: impl Into<String>,
        resource_root_path: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            kind,
            container_path: container_path.into(),
            resource_root_path: resource_root_path.into(),
            qualifier: None,
        }
    }

    /// Bind a transport to the paths of a [`ResourcePath`] type.
    #[must_use]
    pub fn for_path<P: ResourcePath>(transport: Transport, paths: &P) -> Self {
        Self::new(
            transport,
            P::KIND,
            paths.container_path(),
            paths.resource_root_path(),
        )
    }

    /// Name resources by their short form in wait errors and logs.
    #[must_use]
    pub fn with_qualifier(mut self, qualifier: NameQualifier) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    /// `kind name` label of one resource, with the name unqualified.
    #[must_use]
    pub fn subject(&self, name: &str) -> String {
        match &self.qualifier {
            Some(qualifier) => format!("{} {}", self.kind, qualifier.unqualify(name)),
            None => format!("{} {name}", self.kind),
        }
    }

    /// Label of the collection.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Path accepting creations.
    #[must_use]
    pub fn container_path(&self) -> &str {
        &self.container_path
    }

    /// Path prefix of single resources.
    #[must_use]
    pub fn resource_root_path(&self) -> &str {
        &self.resource_root_path
    }

    /// Path of one resource under the root.
    #[must_use]
    pub fn resource_path(&self, name: &str) -> String {
        let root = self.resource_root_path.trim_end_matches('/');
        if name.starts_with('/') {
            format!("{root}{name}")
        } else {
            format!("{root}/{name}")
        }
    }

    /// `POST` to the container and decode the created resource.
    ///
    /// # Errors
    ///
    /// Transport and provider errors, or [`Error::Decode`].
    pub async fn create<B, R>(&self, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(kind = self.kind, "creating resource");
        self.transport
            .execute_json(Method::POST, &self.container_path, Some(body))
            .await
    }

    /// `POST` to the container for APIs that only acknowledge the request.
    ///
    /// # Errors
    ///
    /// Transport and provider errors.
    pub async fn create_accepted<B>(&self, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        debug!(kind = self.kind, "submitting resource creation");
        self.transport
            .execute(Method::POST, &self.container_path, Some(body))
            .await?;
        Ok(())
    }

    /// `GET` one resource.
    ///
    /// # Errors
    ///
    /// Transport and provider errors (see [`Error::is_not_found`]), or
    /// [`Error::Decode`].
    pub async fn get<R>(&self, name: &str) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let path = self.resource_path(name);
        let response = self
            .transport
            .execute::<()>(Method::GET, &path, None)
            .await?;
        decode_json(response, &path).await
    }

    /// `PUT` one resource and decode the result.
    ///
    /// # Errors
    ///
    /// Transport and provider errors, or [`Error::Decode`].
    pub async fn update<B, R>(&self, name: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(kind = self.kind, name, "updating resource");
        let path = self.resource_path(name);
        self.transport
            .execute_json(Method::PUT, &path, Some(body))
            .await
    }

    /// `DELETE` one resource, discarding any response body.
    ///
    /// # Errors
    ///
    /// Transport and provider errors, including not-found.
    pub async fn delete(&self, name: &str) -> Result<()> {
        debug!(kind = self.kind, name, "deleting resource");
        let path = self.resource_path(name);
        self.transport
            .execute::<()>(Method::DELETE, &path, None)
            .await?;
        Ok(())
    }

    /// Re-read a resource until `table` classifies its status as ready.
    ///
    /// Returns the resource as last read.
    ///
    /// # Errors
    ///
    /// [`Error::OperationFailed`] for failure statuses, [`Error::Timeout`] or
    /// [`Error::Cancelled`] from the wait, or any read error.
    pub async fn wait_for_status<R>(
        &self,
        name: &str,
        table: &StatusTable,
        spec: &WaitSpec,
    ) -> Result<R>
    where
        R: DeserializeOwned + HasStatus + Send,
    {
        let subject = self.subject(name);
        let last: Mutex<Option<R>> = Mutex::new(None);

        {
            let subject = subject.as_str();
            let last = &last;
            spec.wait(move || async move {
                let resource: R = self.get(name).await?;
                let ready = table.classify(subject, resource.status(), resource.status_detail())?;
                if ready {
                    if let Ok(mut slot) = last.lock() {
                        *slot = Some(resource);
                    }
                }
                Ok(ready)
            })
            .await?;
        }

        last.into_inner().ok().flatten().ok_or_else(|| {
            Error::OperationFailed(format!("{subject} finished without a readable state"))
        })
    }

    /// Re-read a resource until the provider reports it as not found.
    ///
    /// A failure status in `table` stops the wait; any other status keeps
    /// polling.
    ///
    /// # Errors
    ///
    /// [`Error::OperationFailed`] for failure statuses, [`Error::Timeout`] or
    /// [`Error::Cancelled`] from the wait, or any read error other than
    /// not-found.
    pub async fn wait_for_deletion<R>(
        &self,
        name: &str,
        table: &StatusTable,
        spec: &WaitSpec,
    ) -> Result<()>
    where
        R: DeserializeOwned + HasStatus,
    {
        let subject = self.subject(name);
        let subject = subject.as_str();

        spec.wait(move || async move {
            match self.get::<R>(name).await {
                Ok(resource) => table
                    .classify(subject, resource.status(), resource.status_detail())
                    .map(|_| false),
                Err(err) if err.is_not_found() => Ok(true),
                Err(err) => Err(err),
            }
        })
        .await
    }

    /// Delete a resource and wait until it is gone.
    ///
    /// A resource that is already absent counts as deleted.
    ///
    /// # Errors
    ///
    /// Same as [`ResourceClient::delete`] and
    /// [`ResourceClient::wait_for_deletion`].
    pub async fn delete_and_wait<R>(
        &self,
        name: &str,
        table: &StatusTable,
        spec: &WaitSpec,
    ) -> Result<()>
    where
        R: DeserializeOwned + HasStatus,
    {
        match self.delete(name).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        }
        self.wait_for_deletion::<R>(name, table, spec).await
    }
}
