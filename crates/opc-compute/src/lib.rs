//! Compute sub-API client.
//!
//! Provides the cookie-session authenticator and name-qualified wrappers for
//! SSH keys, security rules and instances on top of `opc-core`.

#![deny(missing_docs)]

pub mod client;
pub mod instances;
pub mod models;
pub mod security_rules;
pub mod ssh_keys;

pub use client::{ComputeClient, ComputeClientBuilder, CookieAuthenticator};
pub use instances::Instances;
pub use models::{
    CreateInstanceInput, CreateSecurityRuleInput, CreateSshKeyInput, Instance, NetworkingInfo,
    SecurityRule, SecurityRuleAction, SshKey, UpdateSecurityRuleInput, UpdateSshKeyInput,
};
pub use security_rules::SecurityRules;
pub use ssh_keys::SshKeys;

/// Convenient result alias that reuses the shared OPC error type.
pub type Result<T> = opc_core::Result<T>;
