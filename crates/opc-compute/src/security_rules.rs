//! Security rules between security lists and IP lists.

use crate::models::{CreateSecurityRuleInput, SecurityRule, UpdateSecurityRuleInput};
use crate::Result;
use opc_core::client::Transport;
use opc_core::naming::NameQualifier;
use opc_core::resource::{ResourceClient, ResourcePath};

struct SecurityRulePaths;

impl ResourcePath for SecurityRulePaths {
    const KIND: &'static str = "security rule";

    fn container_path(&self) -> String {
        "/secrule/".to_string()
    }

    fn resource_root_path(&self) -> String {
        "/secrule".to_string()
    }
}

/// Create, read, update and delete security rules by short name.
#[derive(Clone)]
pub struct SecurityRules {
    resource: ResourceClient,
    qualifier: NameQualifier,
}

impl SecurityRules {
    pub(crate) fn new(transport: Transport, qualifier: NameQualifier) -> Self {
        Self {
            resource: ResourceClient::for_path(transport, &SecurityRulePaths)
                .with_qualifier(qualifier.clone()),
            qualifier,
        }
    }

    /// Create a rule.
    ///
    /// # Errors
    ///
    /// Transport, provider and decode errors.
    pub async fn create(&self, input: &CreateSecurityRuleInput) -> Result<SecurityRule> {
        let mut body = input.clone();
        body.qualify(&self.qualifier);
        let rule: SecurityRule = self.resource.create(&body).await?;
        Ok(self.finish(rule))
    }

    /// Fetch a rule.
    ///
    /// # Errors
    ///
    /// Transport, provider and decode errors.
    pub async fn get(&self, name: &str) -> Result<SecurityRule> {
        let rule: SecurityRule = self.resource.get(&self.qualifier.qualify(name)).await?;
        Ok(self.finish(rule))
    }

    /// Replace a rule.
    ///
    /// # Errors
    ///
    /// Transport, provider and decode errors.
    pub async fn update(&self, input: &UpdateSecurityRuleInput) -> Result<SecurityRule> {
        let mut body = input.clone();
        body.qualify(&self.qualifier);
        let rule: SecurityRule = self.resource.update(&body.name, &body).await?;
        Ok(self.finish(rule))
    }

    /// Delete a rule.
    ///
    /// # Errors
    ///
    /// Transport and provider errors, including not-found.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.resource.delete(&self.qualifier.qualify(name)).await
    }

    fn finish(&self, mut rule: SecurityRule) -> SecurityRule {
        rule.unqualify(&self.qualifier);
        rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ComputeClientBuilder;
    use crate::models::SecurityRuleAction;
    use opc_core::client::RetryPolicy;
    use opc_core::config::OpcConfig;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn create_sends_qualified_lists_and_returns_short_names() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/authenticate/"))
            .respond_with(ResponseTemplate::new(204).insert_header("set-cookie", "nimbula=abc"))
            .mount(&server)
            .await;

        let wire = json!({
            "name": "/Compute-acme/jane/allow-ssh",
            "action": "PERMIT",
            "application": "/oracle/public/ssh",
            "src_list": "seciplist:/oracle/public/public-internet",
            "dst_list": "seclist:/Compute-acme/jane/webservers",
            "disabled": true
        });
        Mock::given(method("POST"))
            .and(path("/secrule/"))
            .and(body_json(wire.clone()))
            .respond_with(ResponseTemplate::new(201).set_body_json(wire))
            .expect(1)
            .mount(&server)
            .await;

        let config = OpcConfig::new("acme", "jane", "secret", server.uri()).unwrap();
        let rules = ComputeClientBuilder::new(config)
            .with_retry_policy(RetryPolicy::no_retry())
            .build()
            .unwrap()
            .security_rules();

        let rule = rules
            .create(&CreateSecurityRuleInput {
                name: "allow-ssh".to_string(),
                action: SecurityRuleAction::Permit,
                application: "/oracle/public/ssh".to_string(),
                src_list: "seciplist:/oracle/public/public-internet".to_string(),
                dst_list: "seclist:webservers".to_string(),
                disabled: true,
                description: None,
            })
            .await
            .unwrap();

        assert_eq!(rule.name, "allow-ssh");
        assert_eq!(rule.dst_list, "seclist:webservers");
        assert_eq!(rule.src_list, "seciplist:/oracle/public/public-internet");
        assert!(rule.disabled);
    }
}
