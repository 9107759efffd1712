//! Task specification registration.
//!
//! Derives environment variables, port mappings and log routing, resolves
//! the image to run, and registers a new immutable revision. The remote
//! store assigns the monotonically increasing revision number.

use crate::errors::FarError;
use crate::pipeline::build::BuiltImage;
use crate::pipeline::infra::EXECUTION_ROLE;
use crate::providers::{ClusterStore, ProviderError, TaskSpec, TaskSpecRequest};
use crate::spec::{parse_variable, DeploymentSpec};
use crate::terminal::Reporter;

/// Implicit entries first, then user-declared `NAME=VALUE` pairs.
pub fn derive_environment(spec: &DeploymentSpec) -> Result<Vec<(String, String)>, FarError> {
    let mut environment = vec![
        ("AWS_REGION".to_string(), spec.region.clone()),
        ("AWS_CLUSTER".to_string(), spec.qualified_cluster.clone()),
        ("MS_NAME".to_string(), spec.base_name.clone()),
    ];
    for assignment in &spec.variables {
        environment.push(parse_variable(assignment)?);
    }
    Ok(environment)
}

/// Resolve the image to register: build output, explicit repository
/// reference, or the image of the current task specification.
async fn resolve_image(
    cluster: &dyn ClusterStore,
    spec: &DeploymentSpec,
    built: Option<&BuiltImage>,
) -> Result<String, FarError> {
    if let Some(built) = built {
        return Ok(built.reference());
    }
    if let Some(repository) = &spec.repository {
        let tag = spec.tag.as_ref().ok_or_else(|| {
            FarError::ConfigError("image repository specified but missing the tag value".into())
        })?;
        return Ok(format!("{repository}:{tag}"));
    }
    // nothing new to run; redeploy whatever the current revision runs
    match cluster.describe_task_spec(&spec.qualified_name).await {
        Ok(current) => current.image.ok_or_else(|| {
            FarError::ConfigError("existing task specification has no image".into())
        }),
        Err(ProviderError::NotFound(_)) => Err(FarError::ConfigError(
            "no existing task specification to redeploy".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn register_task_spec(
    cluster: &dyn ClusterStore,
    spec: &DeploymentSpec,
    built: Option<&BuiltImage>,
    security_groups: &[String],
    reporter: &mut Reporter,
) -> Result<TaskSpec, FarError> {
    let environment = derive_environment(spec)?;
    reporter.log(&format!(
        "Environment variables for task specification: {}",
        environment
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    ));

    if !spec.ports.is_empty() {
        if security_groups.is_empty() {
            return Err(FarError::ConfigError(
                "cannot expose container ports without specifying a security group".into(),
            ));
        }
        reporter.log(&format!(
            "Exposing ports {}",
            spec.ports
                .iter()
                .map(|(container, host)| format!("{container}:{host}"))
                .collect::<Vec<_>>()
                .join(",")
        ));
    }

    let image = resolve_image(cluster, spec, built).await?;

    reporter.progress_start(&format!(
        "Registering task specification {}",
        spec.qualified_name
    ));
    let request = TaskSpecRequest {
        family: spec.qualified_name.clone(),
        container_name: spec.qualified_name.clone(),
        image,
        cpu: spec.cpu,
        memory: spec.memory,
        environment,
        ports: spec.ports.clone(),
        fargate: spec.launch.is_fargate(),
        task_role: spec.role.clone(),
        execution_role: spec
            .launch
            .is_fargate()
            .then(|| EXECUTION_ROLE.to_string()),
        log_group: spec.log_group(),
        log_stream_prefix: spec.log_stream_prefix(),
        region: spec.region.clone(),
    };
    let task_spec = cluster.register_task_spec(&request).await?;
    reporter.progress_end();
    Ok(task_spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FarConfig;

    fn spec_with_variables(variables: Vec<&str>) -> DeploymentSpec {
        let config = FarConfig {
            name: Some("api".to_string()),
            region: Some("eu-west-1".to_string()),
            variables: variables.into_iter().map(str::to_string).collect(),
            ..Default::default()
        };
        DeploymentSpec::resolve(&config, "prod").unwrap()
    }

    #[test]
    fn test_implicit_environment_comes_first() {
        let spec = spec_with_variables(vec!["FOO=bar"]);
        let environment = derive_environment(&spec).unwrap();
        assert_eq!(
            environment,
            vec![
                ("AWS_REGION".to_string(), "eu-west-1".to_string()),
                ("AWS_CLUSTER".to_string(), "api-prod".to_string()),
                ("MS_NAME".to_string(), "api".to_string()),
                ("FOO".to_string(), "bar".to_string()),
            ]
        );
    }

    #[test]
    fn test_variable_value_may_contain_equals() {
        let spec = spec_with_variables(vec!["FOO=bar=baz"]);
        let environment = derive_environment(&spec).unwrap();
        assert_eq!(
            environment.last().unwrap(),
            &("FOO".to_string(), "bar=baz".to_string())
        );
    }

    #[test]
    fn test_malformed_variable_fails_registration() {
        let spec = spec_with_variables(vec!["FOO"]);
        let err = derive_environment(&spec).unwrap_err();
        assert!(matches!(err, FarError::ConfigError(_)));
    }
}
