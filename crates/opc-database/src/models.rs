//! Database service-instance models.

use opc_core::resource::HasStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// A database service instance as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInstance {
    /// Instance name.
    pub service_name: String,
    /// Provisioning status, e.g. `Running` or `In Progress`.
    #[serde(default)]
    pub status: String,
    /// Database version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Software edition, e.g. `EE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    /// Service level, e.g. `PAAS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Compute shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Identity domain owning the instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_domain: Option<String>,
    /// Creation timestamp as reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    /// Account that created the instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl HasStatus for ServiceInstance {
    fn status(&self) -> &str {
        &self.status
    }
}

/// Request payload for provisioning a service instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceInstanceInput {
    /// Instance name.
    #[validate(length(min = 1, max = 50))]
    pub service_name: String,
    /// Database version, e.g. `12.2.0.1`.
    #[validate(length(min = 1))]
    pub version: String,
    /// Software edition, e.g. `EE`.
    #[validate(length(min = 1))]
    pub edition: String,
    /// Service level, e.g. `PAAS`.
    #[validate(length(min = 1))]
    pub level: String,
    /// Compute shape.
    #[validate(length(min = 1))]
    pub shape: String,
    /// Billing frequency, e.g. `HOURLY`.
    #[validate(length(min = 1))]
    pub subscription_type: String,
    /// SSH public key installed on the database VM.
    #[validate(length(min = 1))]
    pub vm_public_key_text: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Database settings.
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub parameters: Vec<DatabaseParameter>,
}

/// Settings of the database created inside the instance.
#[derive(Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseParameter {
    /// Parameter block type, `db` for the database itself.
    #[serde(rename = "type")]
    pub kind: String,
    /// Database SID.
    #[validate(length(min = 1, max = 8))]
    pub sid: String,
    /// Administrator password.
    #[validate(length(min = 8, max = 30))]
    pub admin_password: String,
    /// Usable storage in GB.
    #[validate(range(min = 15, max = 2048))]
    pub usable_storage: u32,
    /// Backup destination, e.g. `NONE` or `BOTH`.
    pub backup_destination: String,
}

impl fmt::Debug for DatabaseParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseParameter")
            .field("kind", &self.kind)
            .field("sid", &self.sid)
            .field("admin_password", &"[REDACTED]")
            .field("usable_storage", &self.usable_storage)
            .field("backup_destination", &self.backup_destination)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input() -> CreateServiceInstanceInput {
        CreateServiceInstanceInput {
            service_name: "orders".to_string(),
            version: "12.2.0.1".to_string(),
            edition: "EE".to_string(),
            level: "PAAS".to_string(),
            shape: "oc3".to_string(),
            subscription_type: "HOURLY".to_string(),
            vm_public_key_text: "ssh-rsa AAAA".to_string(),
            description: None,
            parameters: vec![DatabaseParameter {
                kind: "db".to_string(),
                sid: "ORCL".to_string(),
                admin_password: "Welcome_1#".to_string(),
                usable_storage: 25,
                backup_destination: "NONE".to_string(),
            }],
        }
    }

    #[test]
    fn create_input_uses_camel_case() {
        let body = serde_json::to_value(input()).unwrap();
        assert_eq!(body["serviceName"], "orders");
        assert_eq!(body["subscriptionType"], "HOURLY");
        assert_eq!(body["parameters"][0]["type"], "db");
        assert_eq!(body["parameters"][0]["usableStorage"], 25);
        assert!(body.get("description").is_none());
    }

    #[test]
    fn validation_rejects_short_password_and_empty_name() {
        assert!(input().validate().is_ok());

        let mut bad = input();
        bad.parameters[0].admin_password = "short".to_string();
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.service_name = String::new();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn parameter_debug_hides_password() {
        let rendered = format!("{:?}", input().parameters[0]);
        assert!(!rendered.contains("Welcome_1#"));
    }

    #[test]
    fn service_instance_reports_status() {
        let instance: ServiceInstance = serde_json::from_value(json!({
            "service_name": "orders",
            "status": "In Progress",
            "identity_domain": "acme"
        }))
        .unwrap();
        assert_eq!(instance.status(), "In Progress");
        assert_eq!(instance.identity_domain.as_deref(), Some("acme"));
    }
}
