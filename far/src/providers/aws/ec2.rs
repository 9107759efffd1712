//! Network adapter (EC2)

use async_trait::async_trait;
use aws_sdk_ec2::types::{Filter, SubnetState};
use aws_sdk_ec2::Client;

use super::wrap;
use crate::providers::{NetworkStore, ProviderError, Subnet};

pub struct Ec2Network {
    client: Client,
}

impl Ec2Network {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn to_subnet(subnet: &aws_sdk_ec2::types::Subnet) -> Option<Subnet> {
    Some(Subnet {
        id: subnet.subnet_id()?.to_string(),
        default_for_az: subnet.default_for_az().unwrap_or(false),
        available: matches!(subnet.state(), Some(SubnetState::Available)),
    })
}

#[async_trait]
impl NetworkStore for Ec2Network {
    async fn describe_subnets(&self) -> Result<Vec<Subnet>, ProviderError> {
        let resp = self.client.describe_subnets().send().await.map_err(wrap)?;
        Ok(resp.subnets().iter().filter_map(to_subnet).collect())
    }

    async fn subnets_by_tag(&self, tag: &str, value: &str) -> Result<Vec<Subnet>, ProviderError> {
        let resp = self
            .client
            .describe_subnets()
            .filters(
                Filter::builder()
                    .name(format!("tag:{tag}"))
                    .values(value)
                    .build(),
            )
            .send()
            .await
            .map_err(wrap)?;
        Ok(resp.subnets().iter().filter_map(to_subnet).collect())
    }

    async fn security_groups_by_tag(
        &self,
        tag: &str,
        value: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let resp = self
            .client
            .describe_security_groups()
            .filters(
                Filter::builder()
                    .name(format!("tag:{tag}"))
                    .values(value)
                    .build(),
            )
            .send()
            .await
            .map_err(wrap)?;
        Ok(resp
            .security_groups()
            .iter()
            .filter_map(|g| g.group_id().map(str::to_string))
            .collect())
    }
}
