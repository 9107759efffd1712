//! Secret store adapter (Secrets Manager)

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;

use super::wrap;
use crate::providers::{ProviderError, SecretInfo, SecretStore};

pub struct SecretsManager {
    client: Client,
}

impl SecretsManager {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl SecretStore for SecretsManager {
    async fn create_secret(&self, id: &str, value: &str) -> Result<(), ProviderError> {
        self.client
            .create_secret()
            .name(id)
            .secret_string(value)
            .send()
            .await
            .map_err(wrap)?;
        Ok(())
    }

    async fn put_secret_value(&self, id: &str, value: &str) -> Result<(), ProviderError> {
        self.client
            .put_secret_value()
            .secret_id(id)
            .secret_string(value)
            .send()
            .await
            .map_err(wrap)?;
        Ok(())
    }

    async fn describe_secret(&self, id: &str) -> Result<SecretInfo, ProviderError> {
        let resp = self
            .client
            .describe_secret()
            .secret_id(id)
            .send()
            .await
            .map_err(wrap)?;
        Ok(SecretInfo {
            soft_deleted: resp.deleted_date().is_some(),
        })
    }

    async fn restore_secret(&self, id: &str) -> Result<(), ProviderError> {
        self.client
            .restore_secret()
            .secret_id(id)
            .send()
            .await
            .map_err(wrap)?;
        Ok(())
    }

    async fn delete_secret(&self, id: &str, recovery_days: i64) -> Result<(), ProviderError> {
        self.client
            .delete_secret()
            .secret_id(id)
            .recovery_window_in_days(recovery_days)
            .send()
            .await
            .map_err(wrap)?;
        Ok(())
    }
}
