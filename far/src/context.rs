//! Reconciliation context: the resolved spec plus remote store clients.
//!
//! Credentials are resolved once into an `SdkConfig` and handed to every
//! client constructor; no process-wide credential state.

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region};

use crate::config::FarConfig;
use crate::errors::FarError;
use crate::providers::aws::{
    CloudWatchLogs, Ec2Network, EcrRegistry, EcsCluster, IamIdentity, SecretsManager,
};
use crate::providers::{
    ClusterStore, IdentityStore, LogStore, NetworkStore, RegistryStore, SecretStore,
};
use crate::spec::DeploymentSpec;

/// Credential selection from configuration. Absent fields defer to the
/// default provider chain (environment, shared config, instance metadata).
#[derive(Debug, Clone, Default)]
pub struct AwsCredentials {
    pub profile: Option<String>,
    pub access_key: Option<String>,
    pub access_secret: Option<String>,
}

impl AwsCredentials {
    pub fn from_config(config: &FarConfig) -> Self {
        Self {
            profile: config.profile.clone(),
            access_key: config.access_key.clone(),
            access_secret: config.access_secret.clone(),
        }
    }
}

/// Remote store clients shared by every pipeline stage.
pub struct ReconciliationContext {
    pub spec: DeploymentSpec,
    pub registry: Arc<dyn RegistryStore>,
    pub cluster: Arc<dyn ClusterStore>,
    pub network: Arc<dyn NetworkStore>,
    pub identity: Arc<dyn IdentityStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub logs: Arc<dyn LogStore>,
}

impl ReconciliationContext {
    /// Resolve credentials and construct one client per control plane.
    pub async fn connect(
        spec: DeploymentSpec,
        credentials: &AwsCredentials,
    ) -> Result<Self, FarError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(spec.region.clone()));
        if let (Some(key), Some(secret)) = (&credentials.access_key, &credentials.access_secret) {
            loader = loader.credentials_provider(aws_sdk_ecs::config::Credentials::new(
                key.clone(),
                secret.clone(),
                None,
                None,
                "farconfig",
            ));
        } else if let Some(profile) = &credentials.profile {
            loader = loader.profile_name(profile);
        }
        let sdk = loader.load().await;

        Ok(Self {
            spec,
            registry: Arc::new(EcrRegistry::new(&sdk)),
            cluster: Arc::new(EcsCluster::new(&sdk)),
            network: Arc::new(Ec2Network::new(&sdk)),
            identity: Arc::new(IamIdentity::new(&sdk)),
            secrets: Arc::new(SecretsManager::new(&sdk)),
            logs: Arc::new(CloudWatchLogs::new(&sdk)),
        })
    }

    /// Assemble a context from pre-built stores (used by tests with in-memory
    /// fakes).
    pub fn with_stores(
        spec: DeploymentSpec,
        registry: Arc<dyn RegistryStore>,
        cluster: Arc<dyn ClusterStore>,
        network: Arc<dyn NetworkStore>,
        identity: Arc<dyn IdentityStore>,
        secrets: Arc<dyn SecretStore>,
        logs: Arc<dyn LogStore>,
    ) -> Self {
        Self {
            spec,
            registry,
            cluster,
            network,
            identity,
            secrets,
            logs,
        }
    }
}
