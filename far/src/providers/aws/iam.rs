//! Identity/policy adapter (IAM)

use async_trait::async_trait;
use aws_sdk_iam::Client;

use super::wrap;
use crate::providers::{IdentityStore, ProviderError};

pub struct IamIdentity {
    client: Client,
}

impl IamIdentity {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl IdentityStore for IamIdentity {
    async fn create_role(
        &self,
        name: &str,
        description: &str,
        trust_policy: &str,
    ) -> Result<(), ProviderError> {
        self.client
            .create_role()
            .role_name(name)
            .description(description)
            .assume_role_policy_document(trust_policy)
            .send()
            .await
            .map_err(wrap)?;
        Ok(())
    }

    async fn attach_policy(&self, role: &str, policy_arn: &str) -> Result<(), ProviderError> {
        self.client
            .attach_role_policy()
            .role_name(role)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(wrap)?;
        Ok(())
    }
}
