//! Prerequisite infrastructure: repository, cluster, roles, log group.
//!
//! Every ensure-operation follows the same pattern: attempt creation and
//! treat an `AlreadyExists` classification as success. Anything else is
//! fatal; re-running the pipeline is the recovery mechanism.

use tracing::debug;

use crate::errors::FarError;
use crate::providers::{
    ClusterStore, IdentityStore, LogStore, ProviderError, RegistryStore, Repository,
};
use crate::spec::{DeploymentSpec, DEFAULT_TASK_ROLE};
use crate::terminal::Reporter;

pub const EXECUTION_ROLE: &str = "ecsTaskExecutionRole";
const EXECUTION_ROLE_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";
const TASK_ROLE_POLICY: &str = "arn:aws:iam::aws:policy/SecretsManagerReadWrite";

/// Trust policy allowing the container orchestration service to assume a
/// role.
fn assume_role_policy() -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Sid": "",
                "Effect": "Allow",
                "Principal": { "Service": "ecs-tasks.amazonaws.com" },
                "Action": "sts:AssumeRole"
            }
        ]
    })
    .to_string()
}

/// Ensure the image repository exists, creating it under the qualified
/// service name when absent.
pub async fn ensure_repository(
    registry: &dyn RegistryStore,
    spec: &DeploymentSpec,
    reporter: &mut Reporter,
) -> Result<Repository, FarError> {
    match registry.describe_repository(&spec.qualified_name).await {
        Ok(repository) => Ok(repository),
        Err(ProviderError::NotFound(_)) => {
            reporter.progress_start(&format!("Creating repository for {}", spec.qualified_name));
            let repository = match registry.create_repository(&spec.qualified_name).await {
                Ok(repository) => repository,
                // lost a race with a concurrent run; the repository is there
                Err(ProviderError::AlreadyExists(_)) => {
                    registry.describe_repository(&spec.qualified_name).await?
                }
                Err(e) => return Err(e.into()),
            };
            reporter.progress_end();
            Ok(repository)
        }
        Err(e) => Err(e.into()),
    }
}

/// Ensure the compute cluster exists and is active.
pub async fn ensure_cluster(
    cluster: &dyn ClusterStore,
    spec: &DeploymentSpec,
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    if let Some(existing) = cluster.describe_cluster(&spec.qualified_cluster).await? {
        if existing.status != "ACTIVE" {
            return Err(ProviderError::Other(format!(
                "cluster {} is {}",
                existing.name, existing.status
            ))
            .into());
        }
        debug!("cluster {} already active", existing.name);
        return Ok(());
    }

    reporter.progress_start(&format!("Creating cluster {}", spec.qualified_cluster));
    match cluster.create_cluster(&spec.qualified_cluster).await {
        Ok(_) | Err(ProviderError::AlreadyExists(_)) => {}
        Err(e) => return Err(e.into()),
    }
    reporter.progress_end();
    Ok(())
}

/// Ensure the execution role and (when it is the default) the task role
/// exist with their required policies attached. Attachment repeats on every
/// run; it is itself idempotent.
pub async fn ensure_roles(
    identity: &dyn IdentityStore,
    spec: &DeploymentSpec,
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    ensure_role(
        identity,
        EXECUTION_ROLE,
        "Allows ECS task execution to pull container images and write logs",
        EXECUTION_ROLE_POLICY,
        reporter,
    )
    .await?;

    if spec.role == DEFAULT_TASK_ROLE {
        ensure_role(
            identity,
            &spec.role,
            "Allows ECS tasks launched by far to read secrets",
            TASK_ROLE_POLICY,
            reporter,
        )
        .await?;
    }
    Ok(())
}

async fn ensure_role(
    identity: &dyn IdentityStore,
    name: &str,
    description: &str,
    policy_arn: &str,
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    reporter.progress_start(&format!("Ensuring role {name}"));
    match identity
        .create_role(name, description, &assume_role_policy())
        .await
    {
        Ok(()) | Err(ProviderError::AlreadyExists(_)) => {}
        Err(e) => return Err(e.into()),
    }
    identity.attach_policy(name, policy_arn).await?;
    reporter.progress_end();
    Ok(())
}

/// Ensure the log group exists, upsert its retention policy, and keep at
/// most one export subscription pointed at the configured destination.
pub async fn ensure_log_group(
    logs: &dyn LogStore,
    spec: &DeploymentSpec,
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    let group = spec.log_group();
    match logs.create_log_group(&group).await {
        Ok(()) | Err(ProviderError::AlreadyExists(_)) => {}
        Err(e) => return Err(e.into()),
    }

    // retention is an upsert, applied on every deployment
    logs.put_retention_policy(&group, spec.log_retention_days)
        .await?;

    if let Some(destination) = &spec.log_export {
        reporter.progress_start(&format!("Subscribing {group} to {destination}"));
        let mut subscribed = false;
        for filter in logs.describe_subscription_filters(&group).await? {
            if &filter.destination == destination {
                subscribed = true;
            } else {
                logs.delete_subscription_filter(&group, &filter.name).await?;
            }
        }
        if !subscribed {
            let name = format!("far-{}", spec.qualified_name);
            logs.put_subscription_filter(&group, &name, destination)
                .await?;
        }
        reporter.progress_end();
    }
    Ok(())
}
