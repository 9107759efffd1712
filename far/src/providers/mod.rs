//! Remote store interfaces.
//!
//! Every AWS control plane the pipeline touches is reached through one of the
//! traits below. The adapters in [`aws`] translate provider-specific error
//! codes into the closed [`ProviderError`] classification so the reconciliation
//! logic never matches on error strings itself.

pub mod aws;

use async_trait::async_trait;
use thiserror::Error;

/// Closed classification of remote store failures.
///
/// `AlreadyExists` is swallowed wherever idempotent ensure-semantics apply;
/// `InvalidRequest` triggers the soft-deleted-secret restore path; everything
/// else is fatal and re-running the pipeline is the recovery mechanism.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Other(String),
}

/// A container registry repository.
#[derive(Debug, Clone)]
pub struct Repository {
    pub name: String,
    pub uri: String,
}

/// Registry credentials decoded from a short-lived authorization token.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
    pub endpoint: Option<String>,
}

/// Image registry control plane (ECR).
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn describe_repository(&self, name: &str) -> Result<Repository, ProviderError>;
    async fn create_repository(&self, name: &str) -> Result<Repository, ProviderError>;
    async fn delete_repository(&self, name: &str) -> Result<(), ProviderError>;
    /// Whether `tag` is already present in `repository`.
    async fn tag_exists(&self, repository: &str, tag: &str) -> Result<bool, ProviderError>;
    /// Issue a short-lived `username:password` authorization token.
    async fn auth_token(&self) -> Result<RegistryAuth, ProviderError>;
}

/// A compute cluster as reported by the control plane.
#[derive(Debug, Clone)]
pub struct ClusterInfo {
    pub name: String,
    pub status: String,
}

/// An immutable, versioned task specification.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub family: String,
    pub revision: i32,
    pub image: Option<String>,
}

impl TaskSpec {
    /// `family:revision` reference used by service create/update calls.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.family, self.revision)
    }
}

/// A rollout of one task specification within a service.
#[derive(Debug, Clone)]
pub struct ServiceDeployment {
    pub status: String,
    pub task_spec: String,
    pub desired: i32,
    pub pending: i32,
    pub running: i32,
}

/// An informational event attached to a service.
#[derive(Debug, Clone)]
pub struct ServiceEvent {
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub message: String,
}

/// Mutable remote service state keyed by (cluster, service name).
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub name: String,
    pub status: String,
    pub launch_type: Option<String>,
    pub cluster_arn: Option<String>,
    pub task_spec: Option<String>,
    pub desired: i32,
    pub pending: i32,
    pub running: i32,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub deployments: Vec<ServiceDeployment>,
    pub events: Vec<ServiceEvent>,
    pub failures: Vec<String>,
}

/// Fields for a new task specification revision.
#[derive(Debug, Clone)]
pub struct TaskSpecRequest {
    pub family: String,
    pub container_name: String,
    pub image: String,
    pub cpu: u32,
    pub memory: u32,
    pub environment: Vec<(String, String)>,
    pub ports: Vec<(u16, u16)>,
    pub fargate: bool,
    pub task_role: String,
    pub execution_role: Option<String>,
    pub log_group: String,
    pub log_stream_prefix: String,
    pub region: String,
}

/// Fields for creating a service.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub cluster: String,
    pub name: String,
    pub task_spec: String,
    pub desired_count: i32,
    pub fargate: bool,
    /// `Some` only for fargate: (subnets, security groups, assign public ip).
    pub network: Option<(Vec<String>, Vec<String>, bool)>,
}

/// Compute-cluster control plane (ECS).
#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterInfo>, ProviderError>;
    async fn create_cluster(&self, name: &str) -> Result<ClusterInfo, ProviderError>;
    async fn describe_service(
        &self,
        cluster: &str,
        name: &str,
    ) -> Result<Option<ServiceInfo>, ProviderError>;
    async fn create_service(&self, request: &ServiceRequest) -> Result<(), ProviderError>;
    async fn update_service(
        &self,
        cluster: &str,
        name: &str,
        task_spec: Option<&str>,
        desired_count: i32,
    ) -> Result<(), ProviderError>;
    async fn delete_service(&self, cluster: &str, name: &str) -> Result<(), ProviderError>;
    async fn register_task_spec(&self, request: &TaskSpecRequest) -> Result<TaskSpec, ProviderError>;
    async fn describe_task_spec(&self, family: &str) -> Result<TaskSpec, ProviderError>;
}

/// A VPC subnet as reported by the network control plane.
#[derive(Debug, Clone)]
pub struct Subnet {
    pub id: String,
    pub default_for_az: bool,
    pub available: bool,
}

/// Network control plane (EC2).
#[async_trait]
pub trait NetworkStore: Send + Sync {
    /// All subnets of the account/region, unfiltered.
    async fn describe_subnets(&self) -> Result<Vec<Subnet>, ProviderError>;
    /// Subnets carrying the given `tag` = `value`.
    async fn subnets_by_tag(&self, tag: &str, value: &str) -> Result<Vec<Subnet>, ProviderError>;
    /// Security group ids carrying the given `tag` = `value`.
    async fn security_groups_by_tag(
        &self,
        tag: &str,
        value: &str,
    ) -> Result<Vec<String>, ProviderError>;
}

/// Identity/policy store (IAM).
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn create_role(
        &self,
        name: &str,
        description: &str,
        trust_policy: &str,
    ) -> Result<(), ProviderError>;
    async fn attach_policy(&self, role: &str, policy_arn: &str) -> Result<(), ProviderError>;
}

/// Metadata for an existing secret.
#[derive(Debug, Clone)]
pub struct SecretInfo {
    pub soft_deleted: bool,
}

/// Secret store (Secrets Manager).
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn create_secret(&self, id: &str, value: &str) -> Result<(), ProviderError>;
    async fn put_secret_value(&self, id: &str, value: &str) -> Result<(), ProviderError>;
    async fn describe_secret(&self, id: &str) -> Result<SecretInfo, ProviderError>;
    async fn restore_secret(&self, id: &str) -> Result<(), ProviderError>;
    async fn delete_secret(&self, id: &str, recovery_days: i64) -> Result<(), ProviderError>;
}

/// A single log event.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub event_id: String,
    pub timestamp: i64,
    pub stream: String,
    pub message: String,
}

/// One page of filtered log events.
#[derive(Debug, Clone)]
pub struct LogPage {
    pub events: Vec<LogEvent>,
    pub next_token: Option<String>,
}

/// An existing log export subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionFilter {
    pub name: String,
    pub destination: String,
}

/// Log store (CloudWatch Logs).
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn create_log_group(&self, group: &str) -> Result<(), ProviderError>;
    async fn put_retention_policy(&self, group: &str, days: i32) -> Result<(), ProviderError>;
    async fn describe_subscription_filters(
        &self,
        group: &str,
    ) -> Result<Vec<SubscriptionFilter>, ProviderError>;
    async fn put_subscription_filter(
        &self,
        group: &str,
        name: &str,
        destination: &str,
    ) -> Result<(), ProviderError>;
    async fn delete_subscription_filter(&self, group: &str, name: &str)
        -> Result<(), ProviderError>;
    async fn filter_log_events(
        &self,
        group: &str,
        start: i64,
        end: Option<i64>,
        next_token: Option<&str>,
    ) -> Result<LogPage, ProviderError>;
}
