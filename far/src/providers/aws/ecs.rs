//! Compute-cluster adapter (ECS)

use async_trait::async_trait;
use aws_sdk_ecs::types::{
    AssignPublicIp, AwsVpcConfiguration, Compatibility, ContainerDefinition, KeyValuePair,
    LaunchType, LogConfiguration, LogDriver, NetworkConfiguration, NetworkMode, PortMapping,
};
use aws_sdk_ecs::Client;

use super::wrap;
use crate::providers::{
    ClusterInfo, ClusterStore, ProviderError, ServiceDeployment, ServiceEvent, ServiceInfo,
    ServiceRequest, TaskSpec, TaskSpecRequest,
};

pub struct EcsCluster {
    client: Client,
}

impl EcsCluster {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

fn to_chrono(ts: Option<&aws_sdk_ecs::primitives::DateTime>) -> Option<chrono::DateTime<chrono::Utc>> {
    ts.and_then(|t| t.to_millis().ok())
        .and_then(chrono::DateTime::from_timestamp_millis)
}

fn launch_type(fargate: bool) -> LaunchType {
    if fargate {
        LaunchType::Fargate
    } else {
        LaunchType::Ec2
    }
}

fn task_spec_from(task_def: Option<&aws_sdk_ecs::types::TaskDefinition>) -> Result<TaskSpec, ProviderError> {
    let task_def =
        task_def.ok_or_else(|| ProviderError::Other("no task definition in response".into()))?;
    Ok(TaskSpec {
        family: task_def
            .family()
            .ok_or_else(|| ProviderError::Other("task definition has no family".into()))?
            .to_string(),
        revision: task_def.revision(),
        image: task_def
            .container_definitions()
            .first()
            .and_then(|c| c.image())
            .map(str::to_string),
    })
}

#[async_trait]
impl ClusterStore for EcsCluster {
    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterInfo>, ProviderError> {
        let resp = self
            .client
            .describe_clusters()
            .clusters(name)
            .send()
            .await
            .map_err(wrap)?;
        Ok(resp.clusters().first().map(|c| ClusterInfo {
            name: c.cluster_name().unwrap_or(name).to_string(),
            status: c.status().unwrap_or_default().to_string(),
        }))
    }

    async fn create_cluster(&self, name: &str) -> Result<ClusterInfo, ProviderError> {
        let resp = self
            .client
            .create_cluster()
            .cluster_name(name)
            .send()
            .await
            .map_err(wrap)?;
        let cluster = resp
            .cluster()
            .ok_or_else(|| ProviderError::Other(format!("cluster {name} was not created")))?;
        Ok(ClusterInfo {
            name: cluster.cluster_name().unwrap_or(name).to_string(),
            status: cluster.status().unwrap_or_default().to_string(),
        })
    }

    async fn describe_service(
        &self,
        cluster: &str,
        name: &str,
    ) -> Result<Option<ServiceInfo>, ProviderError> {
        let resp = self
            .client
            .describe_services()
            .cluster(cluster)
            .services(name)
            .send()
            .await
            .map_err(wrap)?;
        let failures: Vec<String> = resp
            .failures()
            .iter()
            .map(|f| {
                format!(
                    "{}: {}",
                    f.arn().unwrap_or("unknown"),
                    f.reason().unwrap_or("unknown")
                )
            })
            .collect();
        Ok(resp.services().first().map(|s| ServiceInfo {
            name: s.service_name().unwrap_or(name).to_string(),
            status: s.status().unwrap_or_default().to_string(),
            launch_type: s.launch_type().map(|t| t.as_str().to_string()),
            cluster_arn: s.cluster_arn().map(str::to_string),
            task_spec: s.task_definition().map(str::to_string),
            desired: s.desired_count(),
            pending: s.pending_count(),
            running: s.running_count(),
            created_at: to_chrono(s.created_at()),
            deployments: s
                .deployments()
                .iter()
                .map(|d| ServiceDeployment {
                    status: d.status().unwrap_or_default().to_string(),
                    task_spec: d.task_definition().unwrap_or_default().to_string(),
                    desired: d.desired_count(),
                    pending: d.pending_count(),
                    running: d.running_count(),
                })
                .collect(),
            events: s
                .events()
                .iter()
                .map(|e| ServiceEvent {
                    created_at: to_chrono(e.created_at()),
                    message: e.message().unwrap_or_default().to_string(),
                })
                .collect(),
            failures,
        }))
    }

    async fn create_service(&self, request: &ServiceRequest) -> Result<(), ProviderError> {
        let mut call = self
            .client
            .create_service()
            .cluster(&request.cluster)
            .service_name(&request.name)
            .task_definition(&request.task_spec)
            .desired_count(request.desired_count)
            .launch_type(launch_type(request.fargate));
        if let Some((subnets, security_groups, public_ip)) = &request.network {
            let vpc = AwsVpcConfiguration::builder()
                .set_subnets(Some(subnets.clone()))
                .set_security_groups(Some(security_groups.clone()))
                .assign_public_ip(if *public_ip {
                    AssignPublicIp::Enabled
                } else {
                    AssignPublicIp::Disabled
                })
                .build()
                .map_err(|e| ProviderError::Other(e.to_string()))?;
            call = call.network_configuration(
                NetworkConfiguration::builder().awsvpc_configuration(vpc).build(),
            );
        }
        call.send().await.map_err(wrap)?;
        Ok(())
    }

    async fn update_service(
        &self,
        cluster: &str,
        name: &str,
        task_spec: Option<&str>,
        desired_count: i32,
    ) -> Result<(), ProviderError> {
        let mut call = self
            .client
            .update_service()
            .cluster(cluster)
            .service(name)
            .desired_count(desired_count);
        // a new task specification always forces a fresh rollout; plain
        // desired-count changes (scale/stop) do not
        if let Some(task_spec) = task_spec {
            call = call.task_definition(task_spec).force_new_deployment(true);
        }
        call.send().await.map_err(wrap)?;
        Ok(())
    }

    async fn delete_service(&self, cluster: &str, name: &str) -> Result<(), ProviderError> {
        self.client
            .delete_service()
            .cluster(cluster)
            .service(name)
            .send()
            .await
            .map_err(wrap)?;
        Ok(())
    }

    async fn register_task_spec(&self, request: &TaskSpecRequest) -> Result<TaskSpec, ProviderError> {
        let mut container = ContainerDefinition::builder()
            .name(&request.container_name)
            .essential(true)
            .image(&request.image)
            .memory_reservation(128)
            .log_configuration(
                LogConfiguration::builder()
                    .log_driver(LogDriver::Awslogs)
                    .options("awslogs-region", &request.region)
                    .options("awslogs-group", &request.log_group)
                    .options("awslogs-stream-prefix", &request.log_stream_prefix)
                    .build()
                    .map_err(|e| ProviderError::Other(e.to_string()))?,
            );
        for (name, value) in &request.environment {
            container = container.environment(
                KeyValuePair::builder().name(name).value(value).build(),
            );
        }
        for (container_port, host_port) in &request.ports {
            container = container.port_mappings(
                PortMapping::builder()
                    .container_port(i32::from(*container_port))
                    .host_port(i32::from(*host_port))
                    .build(),
            );
        }

        let mut call = self
            .client
            .register_task_definition()
            .family(&request.family)
            .container_definitions(container.build())
            .network_mode(if request.fargate {
                NetworkMode::Awsvpc
            } else {
                NetworkMode::Bridge
            })
            .requires_compatibilities(if request.fargate {
                Compatibility::Fargate
            } else {
                Compatibility::Ec2
            })
            .cpu(request.cpu.to_string())
            .memory(request.memory.to_string())
            .task_role_arn(&request.task_role);
        if let Some(execution_role) = &request.execution_role {
            call = call.execution_role_arn(execution_role);
        }
        let resp = call.send().await.map_err(wrap)?;
        task_spec_from(resp.task_definition())
    }

    async fn describe_task_spec(&self, family: &str) -> Result<TaskSpec, ProviderError> {
        let resp = self
            .client
            .describe_task_definition()
            .task_definition(family)
            .send()
            .await
            .map_err(wrap)?;
        task_spec_from(resp.task_definition())
    }
}
