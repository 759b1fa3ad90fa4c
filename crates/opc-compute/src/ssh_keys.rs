//! SSH public keys.

use crate::models::{CreateSshKeyInput, SshKey, UpdateSshKeyInput};
use crate::Result;
use opc_core::client::Transport;
use opc_core::naming::NameQualifier;
use opc_core::resource::{ResourceClient, ResourcePath};

struct SshKeyPaths;

impl ResourcePath for SshKeyPaths {
    const KIND: &'static str = "ssh key";

    fn container_path(&self) -> String {
        "/sshkey/".to_string()
    }

    fn resource_root_path(&self) -> String {
        "/sshkey".to_string()
    }
}

/// Create, read, update and delete SSH keys by short name.
#[derive(Clone)]
pub struct SshKeys {
    resource: ResourceClient,
    qualifier: NameQualifier,
}

impl SshKeys {
    pub(crate) fn new(transport: Transport, qualifier: NameQualifier) -> Self {
        Self {
            resource: ResourceClient::for_path(transport, &SshKeyPaths)
                .with_qualifier(qualifier.clone()),
            qualifier,
        }
    }

    /// Upload a key.
    ///
    /// # Errors
    ///
    /// Transport, provider and decode errors.
    pub async fn create(&self, input: &CreateSshKeyInput) -> Result<SshKey> {
        let mut body = input.clone();
        body.qualify(&self.qualifier);
        let key: SshKey = self.resource.create(&body).await?;
        Ok(self.finish(key))
    }

    /// Fetch a key.
    ///
    /// # Errors
    ///
    /// Transport, provider and decode errors.
    pub async fn get(&self, name: &str) -> Result<SshKey> {
        let key: SshKey = self.resource.get(&self.qualifier.qualify(name)).await?;
        Ok(self.finish(key))
    }

    /// Replace a key's material or enablement.
    ///
    /// # Errors
    ///
    /// Transport, provider and decode errors.
    pub async fn update(&self, input: &UpdateSshKeyInput) -> Result<SshKey> {
        let mut body = input.clone();
        body.qualify(&self.qualifier);
        let key: SshKey = self.resource.update(&body.name, &body).await?;
        Ok(self.finish(key))
    }

    /// Delete a key.
    ///
    /// # Errors
    ///
    /// Transport and provider errors, including not-found.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.resource.delete(&self.qualifier.qualify(name)).await
    }

    fn finish(&self, mut key: SshKey) -> SshKey {
        key.unqualify(&self.qualifier);
        key
    }
}
