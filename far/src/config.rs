//! On-disk configuration (`farconfig.{env}`) and CLI merging.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::FarError;
use crate::logs::LogLevel;
use crate::spec::SecretSpec;

/// Declared secrets: a single name, a list of names, or a mapping of
/// name → source path.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SecretsConfig {
    One(String),
    Many(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl SecretsConfig {
    /// Normalize to `(name, source)` pairs; a bare name doubles as its own
    /// relative source path.
    pub fn normalize(&self) -> Vec<SecretSpec> {
        match self {
            SecretsConfig::One(name) => vec![SecretSpec {
                name: name.clone(),
                source: PathBuf::from(name),
            }],
            SecretsConfig::Many(names) => names
                .iter()
                .map(|name| SecretSpec {
                    name: name.clone(),
                    source: PathBuf::from(name),
                })
                .collect(),
            SecretsConfig::Map(map) => map
                .iter()
                .map(|(name, source)| SecretSpec {
                    name: name.clone(),
                    source: PathBuf::from(source),
                })
                .collect(),
        }
    }
}

/// Raw configuration as written in `farconfig.{env}`, before resolution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FarConfig {
    pub name: Option<String>,
    pub cluster: Option<String>,
    pub region: Option<String>,

    #[serde(rename = "type")]
    pub launch_type: Option<String>,

    pub cpu: Option<u32>,
    pub memory: Option<u32>,
    pub count: Option<i32>,
    pub tag: Option<String>,

    #[serde(default)]
    pub draft: bool,

    pub dockerfile: Option<String>,
    pub repository: Option<String>,

    #[serde(default)]
    pub ports: Vec<String>,

    #[serde(default)]
    pub variables: Vec<String>,

    pub secrets: Option<SecretsConfig>,

    #[serde(default)]
    pub subnets: Vec<String>,

    #[serde(default)]
    pub default_vpc: bool,

    #[serde(default)]
    pub security_groups: Vec<String>,

    pub role: Option<String>,
    pub log_retention_days: Option<i32>,
    pub log_export: Option<String>,
    pub assign_public_ip: Option<bool>,

    // credential selection, consumed by the context constructor
    pub profile: Option<String>,
    pub access_key: Option<String>,
    pub access_secret: Option<String>,

    pub log_level: Option<LogLevel>,
}

impl FarConfig {
    /// Load `farconfig.{env}` from the working directory. A missing file is
    /// an empty configuration.
    pub fn load(env: &str) -> Result<Self, FarError> {
        Self::load_from(Path::new(&format!("farconfig.{env}")))
    }

    pub fn load_from(path: &Path) -> Result<Self, FarError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_yaml::from_str(&contents).map_err(|e| {
                FarError::ConfigError(format!("{}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Overlay `overrides` (typically CLI flags) on this configuration;
    /// override fields win where present.
    pub fn merge(self, overrides: FarConfig) -> FarConfig {
        FarConfig {
            name: overrides.name.or(self.name),
            cluster: overrides.cluster.or(self.cluster),
            region: overrides.region.or(self.region),
            launch_type: overrides.launch_type.or(self.launch_type),
            cpu: overrides.cpu.or(self.cpu),
            memory: overrides.memory.or(self.memory),
            count: overrides.count.or(self.count),
            tag: overrides.tag.or(self.tag),
            draft: overrides.draft || self.draft,
            dockerfile: overrides.dockerfile.or(self.dockerfile),
            repository: overrides.repository.or(self.repository),
            ports: if overrides.ports.is_empty() {
                self.ports
            } else {
                overrides.ports
            },
            variables: if overrides.variables.is_empty() {
                self.variables
            } else {
                overrides.variables
            },
            secrets: overrides.secrets.or(self.secrets),
            subnets: if overrides.subnets.is_empty() {
                self.subnets
            } else {
                overrides.subnets
            },
            default_vpc: overrides.default_vpc || self.default_vpc,
            security_groups: if overrides.security_groups.is_empty() {
                self.security_groups
            } else {
                overrides.security_groups
            },
            role: overrides.role.or(self.role),
            log_retention_days: overrides.log_retention_days.or(self.log_retention_days),
            log_export: overrides.log_export.or(self.log_export),
            assign_public_ip: overrides.assign_public_ip.or(self.assign_public_ip),
            profile: overrides.profile.or(self.profile),
            access_key: overrides.access_key.or(self.access_key),
            access_secret: overrides.access_secret.or(self.access_secret),
            log_level: overrides.log_level.or(self.log_level),
        }
    }
}
