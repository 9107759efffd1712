//! Read-only and lifecycle operations on an existing service.

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::context::ReconciliationContext;
use crate::errors::FarError;
use crate::providers::ProviderError;
use crate::terminal::{colored_status, Reporter};

/// Print the current service state: counts, rollouts, recent events.
pub async fn status(
    ctx: &ReconciliationContext,
    events: usize,
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    let spec = &ctx.spec;
    let service = ctx
        .cluster
        .describe_service(&spec.qualified_cluster, &spec.qualified_name)
        .await?
        .ok_or_else(|| {
            ProviderError::NotFound(format!(
                "service {} in cluster {}",
                spec.qualified_name, spec.qualified_cluster
            ))
        })?;

    reporter.log(&format!("Status:    {}", colored_status(&service.status)));
    reporter.log(&format!(
        "Type:      {}",
        service.launch_type.as_deref().unwrap_or("unknown")
    ));
    if let Some(created_at) = service.created_at {
        reporter.log(&format!("Created:   {created_at}"));
    }
    reporter.log(&format!(
        "Cluster:   {}",
        service.cluster_arn.as_deref().unwrap_or(&spec.qualified_cluster)
    ));
    reporter.log(&format!("Desired:   {}", service.desired));
    reporter.log(&format!("Pending:   {}", service.pending));
    reporter.log(&format!("Running:   {}", service.running));
    reporter.log(&format!(
        "Task Def.: {}",
        service.task_spec.as_deref().unwrap_or("none")
    ));

    if !service.deployments.is_empty() {
        reporter.log("Deployments:");
        for deployment in &service.deployments {
            reporter.log(&format!(
                "  {} {} {}/{}/{}",
                colored_status(&deployment.status),
                deployment.task_spec,
                deployment.desired,
                deployment.pending,
                deployment.running
            ));
        }
    }

    if !service.events.is_empty() && events > 0 {
        let shown = service.events.len().min(events);
        let more = if service.events.len() > shown {
            format!(" (showing {shown} out of {} total)", service.events.len())
        } else {
            String::new()
        };
        reporter.log(&format!("Events{more}:"));
        for event in service.events.iter().take(shown) {
            let when = event
                .created_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            reporter.log(&format!("  [{when}] {}", event.message));
        }
    }

    if !service.failures.is_empty() {
        reporter.log("Failures:");
        for failure in &service.failures {
            reporter.log(&format!("  {failure}"));
        }
    }
    Ok(())
}

/// Set the service desired count.
pub async fn scale(
    ctx: &ReconciliationContext,
    count: i32,
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    let spec = &ctx.spec;
    reporter.progress_start(&format!(
        "Scaling service {} to {count}",
        spec.qualified_name
    ));
    ctx.cluster
        .update_service(&spec.qualified_cluster, &spec.qualified_name, None, count)
        .await?;
    reporter.progress_end();
    Ok(())
}

/// Tear the service down: scale to zero and delete it, force-delete the
/// repository, soft-delete the secrets. Requires the service name to be
/// typed back; each sub-step tolerates failure so a partial teardown can be
/// re-run.
pub async fn terminate(
    ctx: &ReconciliationContext,
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    let spec = &ctx.spec;

    reporter.log_inline(&format!(
        "Type the name of the service (\"{}\"): ",
        spec.qualified_name
    ));
    let answer = BufReader::new(tokio::io::stdin())
        .lines()
        .next_line()
        .await?
        .unwrap_or_default();
    if answer.trim() != spec.qualified_name {
        return Err(FarError::ConfigError(
            "service name mismatch, operation aborted".into(),
        ));
    }

    reporter.progress_start(&format!("Terminating service {}", spec.qualified_name));
    let stopped = async {
        ctx.cluster
            .update_service(&spec.qualified_cluster, &spec.qualified_name, None, 0)
            .await?;
        ctx.cluster
            .delete_service(&spec.qualified_cluster, &spec.qualified_name)
            .await
    }
    .await;
    match stopped {
        Ok(()) => reporter.progress_end(),
        Err(e) => reporter.progress_end_with(&e.to_string()),
    }

    reporter.progress_start(&format!("Deleting repository {}", spec.qualified_name));
    match ctx.registry.delete_repository(&spec.qualified_name).await {
        Ok(()) => reporter.progress_end(),
        Err(e) => reporter.progress_end_with(&e.to_string()),
    }

    if !spec.secrets.is_empty() {
        reporter.progress_start(&format!("Deleting {} secrets", spec.qualified_name));
        for secret in &spec.secrets {
            let _ = ctx
                .secrets
                .delete_secret(&spec.secret_id(&secret.name), 7)
                .await;
        }
        reporter.progress_end();
    }
    Ok(())
}
