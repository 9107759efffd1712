//! Service reconciliation.
//!
//! Routes the service to create or update from its current remote state:
//! an `ACTIVE` service is updated in place with a forced rollout, anything
//! else (absent, draining, inactive) is created fresh. Subnets resolve as
//! explicit list → default-VPC query → tag discovery.

use tracing::info;

use crate::context::ReconciliationContext;
use crate::errors::FarError;
use crate::providers::{NetworkStore, ServiceInfo, ServiceRequest, TaskSpec};
use crate::spec::{DeploymentSpec, SecurityGroupSelection, SubnetSelection};
use crate::terminal::Reporter;

pub const SUBNET_TAG: &str = "far:subnet";
pub const SECURITY_GROUP_TAG: &str = "far:security-group";

/// Where the reconciliation must go from the observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRoute {
    Create,
    Update,
}

/// Only an `ACTIVE` service is updated in place; a draining or otherwise
/// transitional service is replaced.
pub fn route_for_state(service: Option<&ServiceInfo>) -> ServiceRoute {
    match service {
        Some(service) if service.status == "ACTIVE" => ServiceRoute::Update,
        _ => ServiceRoute::Create,
    }
}

/// Resolve service subnets per the configured selection mode.
pub async fn resolve_subnets(
    network: &dyn NetworkStore,
    spec: &DeploymentSpec,
) -> Result<Vec<String>, FarError> {
    match &spec.subnets {
        SubnetSelection::Explicit(subnets) => Ok(subnets.clone()),
        SubnetSelection::DefaultVpc => {
            let subnets = network.describe_subnets().await?;
            Ok(subnets
                .into_iter()
                .filter(|s| s.default_for_az && s.available)
                .map(|s| s.id)
                .collect())
        }
        SubnetSelection::Tagged => {
            let subnets = network.subnets_by_tag(SUBNET_TAG, "true").await?;
            if subnets.is_empty() {
                // not fatal; the control plane rejects the request itself if
                // it actually needs subnets
                info!("no subnets tagged {SUBNET_TAG}=true; proceeding without");
            }
            Ok(subnets.into_iter().map(|s| s.id).collect())
        }
    }
}

/// Resolve service security groups: explicit list or tag discovery.
pub async fn resolve_security_groups(
    network: &dyn NetworkStore,
    spec: &DeploymentSpec,
) -> Result<Vec<String>, FarError> {
    match &spec.security_groups {
        SecurityGroupSelection::Explicit(groups) => Ok(groups.clone()),
        SecurityGroupSelection::Tagged => Ok(network
            .security_groups_by_tag(SECURITY_GROUP_TAG, "true")
            .await?),
    }
}

/// Converge the service onto `task_spec`.
pub async fn reconcile_service(
    ctx: &ReconciliationContext,
    task_spec: &TaskSpec,
    security_groups: &[String],
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    let spec = &ctx.spec;
    let reference = task_spec.reference();
    let existing = ctx
        .cluster
        .describe_service(&spec.qualified_cluster, &spec.qualified_name)
        .await?;

    match route_for_state(existing.as_ref()) {
        ServiceRoute::Update => {
            reporter.progress_start(&format!(
                "Updating service {} to use {reference}",
                spec.qualified_name
            ));
            ctx.cluster
                .update_service(
                    &spec.qualified_cluster,
                    &spec.qualified_name,
                    Some(&reference),
                    spec.count,
                )
                .await?;
        }
        ServiceRoute::Create => {
            let subnets = resolve_subnets(ctx.network.as_ref(), spec).await?;
            reporter.progress_start(&format!(
                "Creating service {} with subnets {}",
                spec.qualified_name,
                subnets.join(",")
            ));
            let request = ServiceRequest {
                cluster: spec.qualified_cluster.clone(),
                name: spec.qualified_name.clone(),
                task_spec: reference,
                desired_count: spec.count,
                fargate: spec.launch.is_fargate(),
                network: spec.launch.is_fargate().then(|| {
                    (
                        subnets,
                        security_groups.to_vec(),
                        spec.assign_public_ip,
                    )
                }),
            };
            ctx.cluster.create_service(&request).await?;
        }
    }
    reporter.progress_end();
    Ok(())
}
