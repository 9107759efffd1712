//! Deployment specification: resolution and validation.
//!
//! A [`DeploymentSpec`] is resolved once from the merged configuration and
//! passed by reference through every pipeline stage; nothing mutates it
//! afterwards.

use std::path::PathBuf;

use regex::Regex;

use crate::config::FarConfig;
use crate::errors::FarError;

/// vCPU values the control plane accepts for task sizing.
pub const VALID_CPUS: [u32; 5] = [256, 512, 1024, 2048, 4096];

/// Default IAM role assumed by deployed tasks.
pub const DEFAULT_TASK_ROLE: &str = "far-tasks";

const NAME_PATTERN: &str = "^[a-zA-Z0-9_-]+$";

/// Launch type of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchKind {
    Fargate,
    Ec2,
}

impl LaunchKind {
    pub fn is_fargate(self) -> bool {
        matches!(self, LaunchKind::Fargate)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LaunchKind::Fargate => "fargate",
            LaunchKind::Ec2 => "ec2",
        }
    }
}

impl std::str::FromStr for LaunchKind {
    type Err = FarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fargate" => Ok(LaunchKind::Fargate),
            "ec2" => Ok(LaunchKind::Ec2),
            other => Err(FarError::ConfigError(format!(
                "type \"{other}\" is not one of \"fargate\" or \"ec2\""
            ))),
        }
    }
}

/// How service subnets are selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubnetSelection {
    /// Explicit subnet ids from configuration.
    Explicit(Vec<String>),
    /// Subnets of the default VPC (default-for-AZ and available).
    DefaultVpc,
    /// Subnets discovered by the `far:subnet` tag.
    Tagged,
}

/// How service security groups are selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityGroupSelection {
    /// Explicit security group ids from configuration.
    Explicit(Vec<String>),
    /// Groups discovered by the `far:security-group` tag.
    Tagged,
}

/// A named secret and the local file its value is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretSpec {
    pub name: String,
    pub source: PathBuf,
}

/// Resolved, immutable deployment specification.
#[derive(Debug, Clone)]
pub struct DeploymentSpec {
    pub base_name: String,
    pub env: String,
    pub qualified_name: String,
    pub base_cluster: String,
    pub qualified_cluster: String,
    pub region: String,
    pub launch: LaunchKind,
    pub cpu: u32,
    pub memory: u32,
    pub count: i32,
    pub tag: Option<String>,
    pub draft: bool,
    pub dockerfile: PathBuf,
    /// Pre-built external repository URI; set means no local build.
    pub repository: Option<String>,
    /// (container, host) port pairs.
    pub ports: Vec<(u16, u16)>,
    /// Raw `NAME=VALUE` assignments, validated at registration time.
    pub variables: Vec<String>,
    pub secrets: Vec<SecretSpec>,
    pub subnets: SubnetSelection,
    pub security_groups: SecurityGroupSelection,
    pub role: String,
    pub log_retention_days: i32,
    pub log_export: Option<String>,
    pub assign_public_ip: bool,
}

impl DeploymentSpec {
    /// Resolve and validate the merged configuration for `env`.
    pub fn resolve(config: &FarConfig, env: &str) -> Result<Self, FarError> {
        if env.is_empty() {
            return Err(FarError::ConfigError("env must be specified".into()));
        }
        let name_re = Regex::new(NAME_PATTERN).expect("valid pattern");
        if !name_re.is_match(env) {
            return Err(FarError::ConfigError(format!(
                "env \"{env}\" contains invalid characters"
            )));
        }

        let base_name = config
            .name
            .clone()
            .ok_or_else(|| FarError::ConfigError("name must be specified".into()))?;
        if !name_re.is_match(&base_name) {
            return Err(FarError::ConfigError(format!(
                "name \"{base_name}\" contains invalid characters"
            )));
        }

        let base_cluster = config.cluster.clone().unwrap_or_else(|| base_name.clone());
        if !name_re.is_match(&base_cluster) {
            return Err(FarError::ConfigError(format!(
                "cluster \"{base_cluster}\" contains invalid characters"
            )));
        }

        let launch = config
            .launch_type
            .as_deref()
            .unwrap_or("fargate")
            .parse::<LaunchKind>()?;

        let cpu = config.cpu.unwrap_or(256);
        if !VALID_CPUS.contains(&cpu) {
            return Err(FarError::ConfigError(format!(
                "cpu \"{cpu}\" is not a valid vCPU value"
            )));
        }
        let memory = config.memory.unwrap_or(512);

        let ports = config
            .ports
            .iter()
            .map(|p| parse_port(p))
            .collect::<Result<Vec<_>, _>>()?;

        let secrets = config
            .secrets
            .as_ref()
            .map(|s| s.normalize())
            .unwrap_or_default();

        let subnets = if !config.subnets.is_empty() {
            SubnetSelection::Explicit(config.subnets.clone())
        } else if config.default_vpc {
            SubnetSelection::DefaultVpc
        } else {
            SubnetSelection::Tagged
        };

        let security_groups = if !config.security_groups.is_empty() {
            SecurityGroupSelection::Explicit(config.security_groups.clone())
        } else {
            SecurityGroupSelection::Tagged
        };

        Ok(Self {
            qualified_name: format!("{base_name}-{env}"),
            qualified_cluster: format!("{base_cluster}-{env}"),
            base_name,
            env: env.to_string(),
            base_cluster,
            region: config
                .region
                .clone()
                .unwrap_or_else(|| "us-west-2".to_string()),
            launch,
            cpu,
            memory,
            count: config.count.unwrap_or(1),
            tag: config.tag.clone(),
            draft: config.draft,
            dockerfile: PathBuf::from(config.dockerfile.as_deref().unwrap_or("Dockerfile")),
            repository: config.repository.clone(),
            ports,
            variables: config.variables.clone(),
            secrets,
            subnets,
            security_groups,
            role: config
                .role
                .clone()
                .unwrap_or_else(|| DEFAULT_TASK_ROLE.to_string()),
            log_retention_days: config.log_retention_days.unwrap_or(90),
            log_export: config.log_export.clone(),
            assign_public_ip: config.assign_public_ip.unwrap_or(true),
        })
    }

    /// Log group owned by this service.
    pub fn log_group(&self) -> String {
        format!("awslogs-far-{}", self.qualified_name)
    }

    /// Stream prefix used inside the log group.
    pub fn log_stream_prefix(&self) -> String {
        format!("awslogs-{}", self.qualified_name)
    }

    /// Secret store identity for a secret name.
    pub fn secret_id(&self, name: &str) -> String {
        format!("{}/{}", self.qualified_name, name)
    }
}

/// Parse a `container[:host]` port mapping; host defaults to container.
fn parse_port(value: &str) -> Result<(u16, u16), FarError> {
    let (container, host) = match value.split_once(':') {
        Some((container, host)) => (container, host),
        None => (value, value),
    };
    let container = container
        .parse::<u16>()
        .map_err(|_| FarError::ConfigError(format!("port \"{value}\" is not a valid mapping")))?;
    let host = host
        .parse::<u16>()
        .map_err(|_| FarError::ConfigError(format!("port \"{value}\" is not a valid mapping")))?;
    Ok((container, host))
}

/// Split a `NAME=VALUE` assignment; the value may itself contain `=`.
pub fn parse_variable(assignment: &str) -> Result<(String, String), FarError> {
    match assignment.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(FarError::ConfigError(format!(
            "environment variable \"{assignment}\" is not a valid format"
        ))),
    }
}
