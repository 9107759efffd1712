//! The reconciliation and publication pipeline.
//!
//! Stages run strictly sequentially; each is idempotent, so a deployment
//! interrupted at any point is safe to re-run. A fatal error aborts the
//! remaining stages and leaves completed remote changes in place.

pub mod build;
pub mod infra;
pub mod publish;
pub mod secrets;
pub mod service;
pub mod taskdef;

use crate::context::ReconciliationContext;
use crate::engine::ContainerEngine;
use crate::errors::FarError;
use crate::pipeline::build::BuiltImage;
use crate::terminal::Reporter;

/// Full deployment: build and push the image, then converge the remote
/// environment onto it. With a pre-built `repository` reference configured,
/// the build and push stages are skipped entirely.
pub async fn deploy(
    ctx: &ReconciliationContext,
    engine: &dyn ContainerEngine,
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    let built = if ctx.spec.repository.is_none() {
        let repository =
            infra::ensure_repository(ctx.registry.as_ref(), &ctx.spec, reporter).await?;
        let image =
            build::build_image(engine, ctx.registry.as_ref(), &ctx.spec, &repository, reporter)
                .await?;
        publish::push_image(engine, ctx.registry.as_ref(), &image, reporter).await?;
        Some(image)
    } else {
        None
    };
    converge(ctx, built.as_ref(), reporter).await
}

/// Redeploy without building: converge onto the configured repository
/// reference or the currently registered image.
pub async fn update(
    ctx: &ReconciliationContext,
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    converge(ctx, None, reporter).await
}

/// The reconciliation half of the pipeline: infrastructure, secrets, task
/// specification, service.
pub async fn converge(
    ctx: &ReconciliationContext,
    built: Option<&BuiltImage>,
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    let spec = &ctx.spec;

    infra::ensure_cluster(ctx.cluster.as_ref(), spec, reporter).await?;
    secrets::sync_secrets(ctx.secrets.as_ref(), spec, reporter).await?;
    infra::ensure_roles(ctx.identity.as_ref(), spec, reporter).await?;
    infra::ensure_log_group(ctx.logs.as_ref(), spec, reporter).await?;

    let security_groups = service::resolve_security_groups(ctx.network.as_ref(), spec).await?;
    let task_spec = taskdef::register_task_spec(
        ctx.cluster.as_ref(),
        spec,
        built,
        &security_groups,
        reporter,
    )
    .await?;
    service::reconcile_service(ctx, &task_spec, &security_groups, reporter).await?;
    Ok(())
}
