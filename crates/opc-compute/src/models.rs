//! Compute resource models.
//!
//! Models carry short names. The `qualify`/`unqualify` helpers rewrite every
//! embedded object name between the caller's form and the provider's
//! canonical form.

use opc_core::naming::NameQualifier;
use opc_core::resource::HasStatus;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// NAT entry type for shared-network interfaces.
pub const IP_RESERVATION_PREFIX: &str = "ipreservation";

/// NAT entry type for IP-network interfaces.
pub const IP_NETWORK_RESERVATION_PREFIX: &str = "network/v1/ipreservation";

/// An SSH public key as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SshKey {
    /// Key name.
    pub name: String,
    /// Public key material.
    pub key: String,
    /// Whether instances may use the key.
    pub enabled: bool,
    /// Canonical URI of the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl SshKey {
    pub(crate) fn unqualify(&mut self, qualifier: &NameQualifier) {
        qualifier.unqualify_in_place(&mut self.name);
    }
}

/// Request payload for creating an SSH key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateSshKeyInput {
    /// Key name.
    pub name: String,
    /// Public key material.
    pub key: String,
    /// Whether instances may use the key.
    pub enabled: bool,
}

impl CreateSshKeyInput {
    pub(crate) fn qualify(&mut self, qualifier: &NameQualifier) {
        qualifier.qualify_in_place(&mut self.name);
    }
}

/// Request payload for updating an SSH key.
pub type UpdateSshKeyInput = CreateSshKeyInput;

/// Whether a security rule admits or drops matching traffic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityRuleAction {
    /// Allow the traffic.
    #[default]
    Permit,
    /// Drop the traffic.
    Deny,
}

/// A security rule between two lists of endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityRule {
    /// Rule name.
    pub name: String,
    /// Rule action.
    pub action: SecurityRuleAction,
    /// Security application (protocol and port) the rule covers.
    pub application: String,
    /// Source, as `seclist:name` or `seciplist:name`.
    pub src_list: String,
    /// Destination, as `seclist:name` or `seciplist:name`.
    pub dst_list: String,
    /// Whether the rule is inactive.
    #[serde(default)]
    pub disabled: bool,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Canonical URI of the rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl SecurityRule {
    pub(crate) fn unqualify(&mut self, qualifier: &NameQualifier) {
        qualifier.unqualify_in_place(&mut self.name);
        qualifier.unqualify_in_place(&mut self.application);
        self.src_list = qualifier.unqualify_compound(&self.src_list);
        self.dst_list = qualifier.unqualify_compound(&self.dst_list);
    }
}

/// Request payload for creating a security rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateSecurityRuleInput {
    /// Rule name.
    pub name: String,
    /// Rule action.
    pub action: SecurityRuleAction,
    /// Security application (protocol and port) the rule covers.
    pub application: String,
    /// Source, as `seclist:name` or `seciplist:name`.
    pub src_list: String,
    /// Destination, as `seclist:name` or `seciplist:name`.
    pub dst_list: String,
    /// Whether the rule is inactive.
    #[serde(default)]
    pub disabled: bool,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CreateSecurityRuleInput {
    pub(crate) fn qualify(&mut self, qualifier: &NameQualifier) {
        qualifier.qualify_in_place(&mut self.name);
        qualifier.qualify_in_place(&mut self.application);
        self.src_list = qualifier.qualify_compound(&self.src_list);
        self.dst_list = qualifier.qualify_compound(&self.dst_list);
    }
}

/// Request payload for updating a security rule.
pub type UpdateSecurityRuleInput = CreateSecurityRuleInput;

/// Interface descriptor of an instance, keyed by device name (`eth0`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkingInfo {
    /// IP network the interface is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipnetwork: Option<String>,
    /// Static private address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Virtual NIC model, e.g. `e1000`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// NAT entries: IP reservations or the vendor IP pool.
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub nat: Vec<String>,
    /// Security lists of a shared-network interface.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seclists: Vec<String>,
    /// Virtual NIC name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnic: Option<String>,
    /// Virtual NIC sets the NIC joins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vnicsets: Vec<String>,
    /// DNS names of the interface.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,
    /// Name servers pushed to the interface.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_servers: Vec<String>,
    /// DNS search domains.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_domains: Vec<String>,
}

impl NetworkingInfo {
    fn nat_prefix(&self) -> &'static str {
        if self.ipnetwork.is_some() {
            IP_NETWORK_RESERVATION_PREFIX
        } else {
            IP_RESERVATION_PREFIX
        }
    }

    pub(crate) fn qualify(&mut self, qualifier: &NameQualifier) {
        let prefix = self.nat_prefix();
        self.nat = self
            .nat
            .iter()
            .map(|entry| qualifier.qualify_with_prefix(prefix, entry))
            .collect();
        qualifier.qualify_opt(&mut self.ipnetwork);
        qualifier.qualify_opt(&mut self.vnic);
        self.seclists = qualifier.qualify_all(&self.seclists);
        self.vnicsets = qualifier.qualify_all(&self.vnicsets);
    }

    pub(crate) fn unqualify(&mut self, qualifier: &NameQualifier) {
        self.nat = self
            .nat
            .iter()
            .map(|entry| qualifier.unqualify_with_prefix(entry))
            .collect();
        qualifier.unqualify_opt(&mut self.ipnetwork);
        qualifier.unqualify_opt(&mut self.vnic);
        self.seclists = qualifier.unqualify_all(&self.seclists);
        self.vnicsets = qualifier.unqualify_all(&self.vnicsets);
    }
}

/// A compute instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    /// Instance name, `{name}/{id}` once unqualified.
    pub name: String,
    /// Provider-assigned identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Shape (CPU and memory class).
    pub shape: String,
    /// Machine image list the instance boots from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imagelist: Option<String>,
    /// Lifecycle state, e.g. `running`.
    #[serde(default)]
    pub state: String,
    /// Reason reported alongside the `error` state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Primary private address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Hostname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// SSH keys installed on the instance.
    #[serde(default)]
    pub sshkeys: Vec<String>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Interfaces keyed by device name.
    #[serde(default)]
    pub networking: HashMap<String, NetworkingInfo>,
    /// Canonical URI of the instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl Instance {
    /// Name without the trailing identifier segment.
    #[must_use]
    pub fn short_name(&self) -> &str {
        match self.id {
            Some(_) => self
                .name
                .rsplit_once('/')
                .map_or(self.name.as_str(), |(name, _)| name),
            None => &self.name,
        }
    }

    pub(crate) fn unqualify(&mut self, qualifier: &NameQualifier) {
        qualifier.unqualify_in_place(&mut self.name);
        self.sshkeys = qualifier.unqualify_all(&self.sshkeys);
        for interface in self.networking.values_mut() {
            interface.unqualify(qualifier);
        }
    }
}

impl HasStatus for Instance {
    fn status(&self) -> &str {
        &self.state
    }

    fn status_detail(&self) -> Option<&str> {
        self.error_reason.as_deref()
    }
}

/// Request payload for launching an instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateInstanceInput {
    /// Instance name.
    pub name: String,
    /// Shape (CPU and memory class).
    pub shape: String,
    /// Machine image list to boot from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imagelist: Option<String>,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Hostname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// SSH keys to install.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sshkeys: Vec<String>,
    /// Tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Interfaces keyed by device name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub networking: HashMap<String, NetworkingInfo>,
    /// Opaque user attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
}

impl CreateInstanceInput {
    pub(crate) fn qualify(&mut self, qualifier: &NameQualifier) {
        qualifier.qualify_in_place(&mut self.name);
        qualifier.qualify_opt(&mut self.imagelist);
        self.sshkeys = qualifier.qualify_all(&self.sshkeys);
        for interface in self.networking.values_mut() {
            interface.qualify(qualifier);
        }
    }
}

/// Launch-plan envelope for instance creation.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct LaunchPlan<T> {
    pub(crate) instances: Vec<T>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}
