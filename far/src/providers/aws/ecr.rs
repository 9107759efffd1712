//! Image registry adapter (ECR)

use async_trait::async_trait;
use aws_sdk_ecr::types::ImageIdentifier;
use aws_sdk_ecr::Client;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use super::wrap;
use crate::providers::{ProviderError, RegistryAuth, RegistryStore, Repository};

pub struct EcrRegistry {
    client: Client,
}

impl EcrRegistry {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl RegistryStore for EcrRegistry {
    async fn describe_repository(&self, name: &str) -> Result<Repository, ProviderError> {
        let resp = self
            .client
            .describe_repositories()
            .repository_names(name)
            .send()
            .await
            .map_err(wrap)?;
        let repo = resp
            .repositories()
            .first()
            .ok_or_else(|| ProviderError::NotFound(format!("repository {name}")))?;
        Ok(Repository {
            name: repo.repository_name().unwrap_or(name).to_string(),
            uri: repo
                .repository_uri()
                .ok_or_else(|| ProviderError::Other(format!("repository {name} has no URI")))?
                .to_string(),
        })
    }

    async fn create_repository(&self, name: &str) -> Result<Repository, ProviderError> {
        let resp = self
            .client
            .create_repository()
            .repository_name(name)
            .send()
            .await
            .map_err(wrap)?;
        let repo = resp
            .repository()
            .ok_or_else(|| ProviderError::Other(format!("repository {name} was not created")))?;
        Ok(Repository {
            name: repo.repository_name().unwrap_or(name).to_string(),
            uri: repo
                .repository_uri()
                .ok_or_else(|| ProviderError::Other(format!("repository {name} has no URI")))?
                .to_string(),
        })
    }

    async fn delete_repository(&self, name: &str) -> Result<(), ProviderError> {
        self.client
            .delete_repository()
            .repository_name(name)
            .force(true)
            .send()
            .await
            .map_err(wrap)?;
        Ok(())
    }

    async fn tag_exists(&self, repository: &str, tag: &str) -> Result<bool, ProviderError> {
        let resp = self
            .client
            .describe_images()
            .repository_name(repository)
            .image_ids(ImageIdentifier::builder().image_tag(tag).build())
            .send()
            .await;
        match resp {
            Ok(out) => Ok(!out.image_details().is_empty()),
            Err(err) => match wrap(err) {
                ProviderError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn auth_token(&self) -> Result<RegistryAuth, ProviderError> {
        let resp = self
            .client
            .get_authorization_token()
            .send()
            .await
            .map_err(wrap)?;
        let data = resp
            .authorization_data()
            .first()
            .ok_or_else(|| ProviderError::Other("registry returned no authorization data".into()))?;
        let token = data
            .authorization_token()
            .ok_or_else(|| ProviderError::Other("registry returned no authorization token".into()))?;
        let decoded = BASE64
            .decode(token)
            .map_err(|e| ProviderError::Other(format!("malformed authorization token: {e}")))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|e| ProviderError::Other(format!("malformed authorization token: {e}")))?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| ProviderError::Other("authorization token is not user:pass".into()))?;
        Ok(RegistryAuth {
            username: username.to_string(),
            password: password.to_string(),
            endpoint: data.proxy_endpoint().map(str::to_string),
        })
    }
}
