//! Pipeline tests against in-memory fake providers.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use far::config::FarConfig;
use far::context::ReconciliationContext;
use far::errors::FarError;
use far::pipeline::service::{resolve_subnets, route_for_state, ServiceRoute};
use far::pipeline::{converge, infra, secrets::sync_secrets};
use far::providers::*;
use far::spec::DeploymentSpec;
use far::terminal::Reporter;

// ---------------------------------------------------------------------------
// fakes

#[derive(Default)]
struct FakeRegistry {
    repositories: Mutex<HashMap<String, Repository>>,
    creates: AtomicUsize,
}

#[async_trait]
impl RegistryStore for FakeRegistry {
    async fn describe_repository(&self, name: &str) -> Result<Repository, ProviderError> {
        self.repositories
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("repository {name}")))
    }

    async fn create_repository(&self, name: &str) -> Result<Repository, ProviderError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut repositories = self.repositories.lock().unwrap();
        if repositories.contains_key(name) {
            return Err(ProviderError::AlreadyExists(format!("repository {name}")));
        }
        let repository = Repository {
            name: name.to_string(),
            uri: format!("123.dkr.ecr.us-west-2.amazonaws.com/{name}"),
        };
        repositories.insert(name.to_string(), repository.clone());
        Ok(repository)
    }

    async fn delete_repository(&self, name: &str) -> Result<(), ProviderError> {
        self.repositories.lock().unwrap().remove(name);
        Ok(())
    }

    async fn tag_exists(&self, _repository: &str, _tag: &str) -> Result<bool, ProviderError> {
        Ok(false)
    }

    async fn auth_token(&self) -> Result<RegistryAuth, ProviderError> {
        Ok(RegistryAuth {
            username: "AWS".to_string(),
            password: "token".to_string(),
            endpoint: None,
        })
    }
}

#[derive(Default)]
struct FakeCluster {
    cluster_status: Mutex<Option<String>>,
    cluster_creates: AtomicUsize,
    service: Mutex<Option<ServiceInfo>>,
    service_creates: Mutex<Vec<ServiceRequest>>,
    service_updates: Mutex<Vec<(Option<String>, i32)>>,
    registered: Mutex<Vec<TaskSpecRequest>>,
    current_task_spec: Mutex<Option<TaskSpec>>,
}

impl FakeCluster {
    fn with_cluster(status: &str) -> Self {
        let fake = Self::default();
        *fake.cluster_status.lock().unwrap() = Some(status.to_string());
        fake
    }
}

fn service_info(status: &str) -> ServiceInfo {
    ServiceInfo {
        name: "api-prod".to_string(),
        status: status.to_string(),
        launch_type: Some("FARGATE".to_string()),
        cluster_arn: None,
        task_spec: Some("api-prod:1".to_string()),
        desired: 1,
        pending: 0,
        running: 1,
        created_at: None,
        deployments: Vec::new(),
        events: Vec::new(),
        failures: Vec::new(),
    }
}

#[async_trait]
impl ClusterStore for FakeCluster {
    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterInfo>, ProviderError> {
        Ok(self
            .cluster_status
            .lock()
            .unwrap()
            .clone()
            .map(|status| ClusterInfo {
                name: name.to_string(),
                status,
            }))
    }

    async fn create_cluster(&self, name: &str) -> Result<ClusterInfo, ProviderError> {
        self.cluster_creates.fetch_add(1, Ordering::SeqCst);
        *self.cluster_status.lock().unwrap() = Some("ACTIVE".to_string());
        Ok(ClusterInfo {
            name: name.to_string(),
            status: "ACTIVE".to_string(),
        })
    }

    async fn describe_service(
        &self,
        _cluster: &str,
        _name: &str,
    ) -> Result<Option<ServiceInfo>, ProviderError> {
        Ok(self.service.lock().unwrap().clone())
    }

    async fn create_service(&self, request: &ServiceRequest) -> Result<(), ProviderError> {
        self.service_creates.lock().unwrap().push(request.clone());
        *self.service.lock().unwrap() = Some(service_info("ACTIVE"));
        Ok(())
    }

    async fn update_service(
        &self,
        _cluster: &str,
        _name: &str,
        task_spec: Option<&str>,
        desired_count: i32,
    ) -> Result<(), ProviderError> {
        self.service_updates
            .lock()
            .unwrap()
            .push((task_spec.map(str::to_string), desired_count));
        Ok(())
    }

    async fn delete_service(&self, _cluster: &str, _name: &str) -> Result<(), ProviderError> {
        *self.service.lock().unwrap() = None;
        Ok(())
    }

    async fn register_task_spec(
        &self,
        request: &TaskSpecRequest,
    ) -> Result<TaskSpec, ProviderError> {
        let mut registered = self.registered.lock().unwrap();
        registered.push(request.clone());
        Ok(TaskSpec {
            family: request.family.clone(),
            revision: registered.len() as i32,
            image: Some(request.image.clone()),
        })
    }

    async fn describe_task_spec(&self, family: &str) -> Result<TaskSpec, ProviderError> {
        self.current_task_spec
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ProviderError::NotFound(format!("task definition {family}")))
    }
}

#[derive(Default)]
struct FakeNetwork {
    subnets: Vec<Subnet>,
    tagged_subnets: Vec<Subnet>,
    security_groups: Vec<String>,
}

#[async_trait]
impl NetworkStore for FakeNetwork {
    async fn describe_subnets(&self) -> Result<Vec<Subnet>, ProviderError> {
        Ok(self.subnets.clone())
    }

    async fn subnets_by_tag(&self, _tag: &str, _value: &str) -> Result<Vec<Subnet>, ProviderError> {
        Ok(self.tagged_subnets.clone())
    }

    async fn security_groups_by_tag(
        &self,
        _tag: &str,
        _value: &str,
    ) -> Result<Vec<String>, ProviderError> {
        Ok(self.security_groups.clone())
    }
}

#[derive(Default)]
struct FakeIdentity {
    roles: Mutex<Vec<String>>,
    role_creates: AtomicUsize,
    attaches: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl IdentityStore for FakeIdentity {
    async fn create_role(
        &self,
        name: &str,
        _description: &str,
        _trust_policy: &str,
    ) -> Result<(), ProviderError> {
        self.role_creates.fetch_add(1, Ordering::SeqCst);
        let mut roles = self.roles.lock().unwrap();
        if roles.iter().any(|r| r == name) {
            return Err(ProviderError::AlreadyExists(format!("role {name}")));
        }
        roles.push(name.to_string());
        Ok(())
    }

    async fn attach_policy(&self, role: &str, policy_arn: &str) -> Result<(), ProviderError> {
        self.attaches
            .lock()
            .unwrap()
            .push((role.to_string(), policy_arn.to_string()));
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
enum SecretState {
    Active(String),
    Deleted(String),
}

#[derive(Default)]
struct FakeSecrets {
    state: Mutex<HashMap<String, SecretState>>,
    puts: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SecretStore for FakeSecrets {
    async fn create_secret(&self, id: &str, value: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        match state.get(id) {
            None => {
                state.insert(id.to_string(), SecretState::Active(value.to_string()));
                Ok(())
            }
            Some(SecretState::Active(_)) => {
                Err(ProviderError::AlreadyExists(format!("secret {id}")))
            }
            // creating over a secret in its recovery window
            Some(SecretState::Deleted(_)) => {
                Err(ProviderError::InvalidRequest(format!("secret {id} is scheduled for deletion")))
            }
        }
    }

    async fn put_secret_value(&self, id: &str, value: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.insert(id.to_string(), SecretState::Active(value.to_string()));
        self.puts
            .lock()
            .unwrap()
            .push((id.to_string(), value.to_string()));
        Ok(())
    }

    async fn describe_secret(&self, id: &str) -> Result<SecretInfo, ProviderError> {
        let state = self.state.lock().unwrap();
        match state.get(id) {
            Some(SecretState::Deleted(_)) => Ok(SecretInfo { soft_deleted: true }),
            Some(SecretState::Active(_)) => Ok(SecretInfo {
                soft_deleted: false,
            }),
            None => Err(ProviderError::NotFound(format!("secret {id}"))),
        }
    }

    async fn restore_secret(&self, id: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        if let Some(SecretState::Deleted(value)) = state.get(id).cloned() {
            state.insert(id.to_string(), SecretState::Active(value));
        }
        Ok(())
    }

    async fn delete_secret(&self, id: &str, _recovery_days: i64) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        if let Some(SecretState::Active(value)) = state.get(id).cloned() {
            state.insert(id.to_string(), SecretState::Deleted(value));
        }
        Ok(())
    }
}

#[derive(Default)]
struct FakeLogStore {
    groups: Mutex<Vec<String>>,
    group_creates: AtomicUsize,
    retentions: Mutex<Vec<(String, i32)>>,
    filters: Mutex<Vec<SubscriptionFilter>>,
    filter_deletes: AtomicUsize,
}

#[async_trait]
impl LogStore for FakeLogStore {
    async fn create_log_group(&self, group: &str) -> Result<(), ProviderError> {
        self.group_creates.fetch_add(1, Ordering::SeqCst);
        let mut groups = self.groups.lock().unwrap();
        if groups.iter().any(|g| g == group) {
            return Err(ProviderError::AlreadyExists(format!("log group {group}")));
        }
        groups.push(group.to_string());
        Ok(())
    }

    async fn put_retention_policy(&self, group: &str, days: i32) -> Result<(), ProviderError> {
        self.retentions
            .lock()
            .unwrap()
            .push((group.to_string(), days));
        Ok(())
    }

    async fn describe_subscription_filters(
        &self,
        _group: &str,
    ) -> Result<Vec<SubscriptionFilter>, ProviderError> {
        Ok(self.filters.lock().unwrap().clone())
    }

    async fn put_subscription_filter(
        &self,
        _group: &str,
        name: &str,
        destination: &str,
    ) -> Result<(), ProviderError> {
        self.filters.lock().unwrap().push(SubscriptionFilter {
            name: name.to_string(),
            destination: destination.to_string(),
        });
        Ok(())
    }

    async fn delete_subscription_filter(
        &self,
        _group: &str,
        name: &str,
    ) -> Result<(), ProviderError> {
        self.filter_deletes.fetch_add(1, Ordering::SeqCst);
        self.filters.lock().unwrap().retain(|f| f.name != name);
        Ok(())
    }

    async fn filter_log_events(
        &self,
        _group: &str,
        _start: i64,
        _end: Option<i64>,
        _next_token: Option<&str>,
    ) -> Result<LogPage, ProviderError> {
        Ok(LogPage {
            events: Vec::new(),
            next_token: None,
        })
    }
}

// ---------------------------------------------------------------------------
// harness

struct World {
    registry: Arc<FakeRegistry>,
    cluster: Arc<FakeCluster>,
    network: Arc<FakeNetwork>,
    identity: Arc<FakeIdentity>,
    secrets: Arc<FakeSecrets>,
    logs: Arc<FakeLogStore>,
}

impl World {
    fn new(cluster: FakeCluster, network: FakeNetwork) -> Self {
        Self {
            registry: Arc::new(FakeRegistry::default()),
            cluster: Arc::new(cluster),
            network: Arc::new(network),
            identity: Arc::new(FakeIdentity::default()),
            secrets: Arc::new(FakeSecrets::default()),
            logs: Arc::new(FakeLogStore::default()),
        }
    }

    fn context(&self, config: FarConfig) -> ReconciliationContext {
        let spec = DeploymentSpec::resolve(&config, "prod").unwrap();
        ReconciliationContext::with_stores(
            spec,
            self.registry.clone(),
            self.cluster.clone(),
            self.network.clone(),
            self.identity.clone(),
            self.secrets.clone(),
            self.logs.clone(),
        )
    }
}

fn base_config() -> FarConfig {
    FarConfig {
        name: Some("api".to_string()),
        ..Default::default()
    }
}

fn spec_of(config: &FarConfig) -> DeploymentSpec {
    DeploymentSpec::resolve(config, "prod").unwrap()
}

// ---------------------------------------------------------------------------
// infrastructure idempotency

#[tokio::test]
async fn test_ensure_cluster_creates_once() {
    let cluster = FakeCluster::default();
    let spec = spec_of(&base_config());
    let mut reporter = Reporter::new();

    infra::ensure_cluster(&cluster, &spec, &mut reporter)
        .await
        .unwrap();
    infra::ensure_cluster(&cluster, &spec, &mut reporter)
        .await
        .unwrap();

    assert_eq!(cluster.cluster_creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ensure_cluster_rejects_inactive_cluster() {
    let cluster = FakeCluster::with_cluster("DEPROVISIONING");
    let spec = spec_of(&base_config());
    let mut reporter = Reporter::new();

    let err = infra::ensure_cluster(&cluster, &spec, &mut reporter)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("DEPROVISIONING"));
    assert_eq!(cluster.cluster_creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ensure_repository_creates_once() {
    let registry = FakeRegistry::default();
    let spec = spec_of(&base_config());
    let mut reporter = Reporter::new();

    let first = infra::ensure_repository(&registry, &spec, &mut reporter)
        .await
        .unwrap();
    let second = infra::ensure_repository(&registry, &spec, &mut reporter)
        .await
        .unwrap();

    assert_eq!(first.uri, second.uri);
    assert_eq!(registry.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ensure_roles_reattaches_policies_every_run() {
    let identity = FakeIdentity::default();
    let spec = spec_of(&base_config());
    let mut reporter = Reporter::new();

    infra::ensure_roles(&identity, &spec, &mut reporter)
        .await
        .unwrap();
    infra::ensure_roles(&identity, &spec, &mut reporter)
        .await
        .unwrap();

    // both roles survive the duplicate create; attachment repeats
    assert_eq!(identity.roles.lock().unwrap().len(), 2);
    assert_eq!(identity.attaches.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_custom_task_role_is_not_created() {
    let identity = FakeIdentity::default();
    let mut config = base_config();
    config.role = Some("my-existing-role".to_string());
    let spec = spec_of(&config);
    let mut reporter = Reporter::new();

    infra::ensure_roles(&identity, &spec, &mut reporter)
        .await
        .unwrap();

    let roles = identity.roles.lock().unwrap();
    assert_eq!(roles.as_slice(), ["ecsTaskExecutionRole"]);
}

#[tokio::test]
async fn test_log_retention_upserts_on_every_run() {
    let logs = FakeLogStore::default();
    let spec = spec_of(&base_config());
    let mut reporter = Reporter::new();

    infra::ensure_log_group(&logs, &spec, &mut reporter)
        .await
        .unwrap();
    infra::ensure_log_group(&logs, &spec, &mut reporter)
        .await
        .unwrap();

    assert_eq!(logs.groups.lock().unwrap().len(), 1);
    let retentions = logs.retentions.lock().unwrap();
    assert_eq!(retentions.len(), 2);
    assert_eq!(retentions[0], ("awslogs-far-api-prod".to_string(), 90));
}

#[tokio::test]
async fn test_log_export_replaces_foreign_destination() {
    let logs = FakeLogStore::default();
    logs.filters.lock().unwrap().push(SubscriptionFilter {
        name: "old-filter".to_string(),
        destination: "arn:aws:lambda:us-west-2:123:function:old".to_string(),
    });

    let mut config = base_config();
    config.log_export = Some("arn:aws:lambda:us-west-2:123:function:new".to_string());
    let spec = spec_of(&config);
    let mut reporter = Reporter::new();

    infra::ensure_log_group(&logs, &spec, &mut reporter)
        .await
        .unwrap();

    let filters = logs.filters.lock().unwrap();
    assert_eq!(logs.filter_deletes.load(Ordering::SeqCst), 1);
    assert_eq!(filters.len(), 1);
    assert_eq!(
        filters[0].destination,
        "arn:aws:lambda:us-west-2:123:function:new"
    );
}

#[tokio::test]
async fn test_log_export_keeps_matching_destination() {
    let logs = FakeLogStore::default();
    logs.filters.lock().unwrap().push(SubscriptionFilter {
        name: "far-api-prod".to_string(),
        destination: "arn:aws:lambda:us-west-2:123:function:ship".to_string(),
    });

    let mut config = base_config();
    config.log_export = Some("arn:aws:lambda:us-west-2:123:function:ship".to_string());
    let spec = spec_of(&config);
    let mut reporter = Reporter::new();

    infra::ensure_log_group(&logs, &spec, &mut reporter)
        .await
        .unwrap();

    assert_eq!(logs.filters.lock().unwrap().len(), 1);
    assert_eq!(logs.filter_deletes.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// secrets

fn secret_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("far-secret-{}-{}", name, std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

fn config_with_secret(name: &str, source: &PathBuf) -> FarConfig {
    let yaml = format!(
        "name: api\nsecrets:\n  {name}: {}\n",
        source.to_string_lossy()
    );
    serde_yaml::from_str(&yaml).unwrap()
}

#[tokio::test]
async fn test_sync_secrets_creates_then_updates() {
    let source = secret_file("create", "hunter2");
    let spec = spec_of(&config_with_secret("db-password", &source));
    let secrets = FakeSecrets::default();
    let mut reporter = Reporter::new();

    sync_secrets(&secrets, &spec, &mut reporter).await.unwrap();
    assert_eq!(
        secrets.state.lock().unwrap().get("api-prod/db-password"),
        Some(&SecretState::Active("hunter2".to_string()))
    );

    // second run hits AlreadyExists and falls through to a value update
    std::fs::write(&source, "hunter3").unwrap();
    sync_secrets(&secrets, &spec, &mut reporter).await.unwrap();
    assert_eq!(
        secrets.state.lock().unwrap().get("api-prod/db-password"),
        Some(&SecretState::Active("hunter3".to_string()))
    );
    assert_eq!(secrets.puts.lock().unwrap().len(), 1);

    std::fs::remove_file(&source).unwrap();
}

#[tokio::test]
async fn test_sync_secrets_restores_soft_deleted() {
    let source = secret_file("restore", "fresh");
    let spec = spec_of(&config_with_secret("db-password", &source));
    let secrets = FakeSecrets::default();
    secrets.state.lock().unwrap().insert(
        "api-prod/db-password".to_string(),
        SecretState::Deleted("stale".to_string()),
    );
    let mut reporter = Reporter::new();

    sync_secrets(&secrets, &spec, &mut reporter).await.unwrap();

    assert_eq!(
        secrets.state.lock().unwrap().get("api-prod/db-password"),
        Some(&SecretState::Active("fresh".to_string()))
    );

    std::fs::remove_file(&source).unwrap();
}

#[tokio::test]
async fn test_sync_secrets_missing_source_is_fatal() {
    let missing = PathBuf::from("/nonexistent/far-secret");
    let spec = spec_of(&config_with_secret("db-password", &missing));
    let secrets = FakeSecrets::default();
    let mut reporter = Reporter::new();

    let err = sync_secrets(&secrets, &spec, &mut reporter)
        .await
        .unwrap_err();
    assert!(matches!(err, FarError::SecretError(_)));
}

// ---------------------------------------------------------------------------
// subnets

#[tokio::test]
async fn test_default_vpc_subnets_filtered() {
    let network = FakeNetwork {
        subnets: vec![
            Subnet {
                id: "subnet-default".to_string(),
                default_for_az: true,
                available: true,
            },
            Subnet {
                id: "subnet-pending".to_string(),
                default_for_az: true,
                available: false,
            },
            Subnet {
                id: "subnet-custom".to_string(),
                default_for_az: false,
                available: true,
            },
        ],
        ..Default::default()
    };
    let mut config = base_config();
    config.default_vpc = true;
    let spec = spec_of(&config);

    let subnets = resolve_subnets(&network, &spec).await.unwrap();
    assert_eq!(subnets, vec!["subnet-default".to_string()]);
}

#[tokio::test]
async fn test_empty_tag_discovery_is_not_fatal() {
    // no explicit subnets, not default-vpc: tag discovery runs and returns
    // nothing, and the deployment proceeds with an empty list
    let network = FakeNetwork::default();
    let spec = spec_of(&base_config());

    let subnets = resolve_subnets(&network, &spec).await.unwrap();
    assert!(subnets.is_empty());
}

// ---------------------------------------------------------------------------
// service reconciliation

#[tokio::test]
async fn test_absent_service_is_created() {
    let world = World::new(FakeCluster::with_cluster("ACTIVE"), FakeNetwork::default());
    world
        .cluster
        .current_task_spec
        .lock()
        .unwrap()
        .replace(TaskSpec {
            family: "api-prod".to_string(),
            revision: 3,
            image: Some("123.dkr.ecr.us-west-2.amazonaws.com/api-prod:1.0".to_string()),
        });
    let ctx = world.context(base_config());
    let mut reporter = Reporter::new();

    converge(&ctx, None, &mut reporter).await.unwrap();

    let creates = world.cluster.service_creates.lock().unwrap();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].task_spec, "api-prod:1");
    assert!(world.cluster.service_updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_active_service_is_updated_in_place() {
    let world = World::new(FakeCluster::with_cluster("ACTIVE"), FakeNetwork::default());
    *world.cluster.service.lock().unwrap() = Some(service_info("ACTIVE"));
    world
        .cluster
        .current_task_spec
        .lock()
        .unwrap()
        .replace(TaskSpec {
            family: "api-prod".to_string(),
            revision: 3,
            image: Some("123.dkr.ecr.us-west-2.amazonaws.com/api-prod:1.0".to_string()),
        });
    let ctx = world.context(base_config());
    let mut reporter = Reporter::new();

    converge(&ctx, None, &mut reporter).await.unwrap();

    assert!(world.cluster.service_creates.lock().unwrap().is_empty());
    let updates = world.cluster.service_updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0], (Some("api-prod:1".to_string()), 1));
}

#[tokio::test]
async fn test_draining_service_is_replaced() {
    let world = World::new(FakeCluster::with_cluster("ACTIVE"), FakeNetwork::default());
    *world.cluster.service.lock().unwrap() = Some(service_info("DRAINING"));
    world
        .cluster
        .current_task_spec
        .lock()
        .unwrap()
        .replace(TaskSpec {
            family: "api-prod".to_string(),
            revision: 3,
            image: Some("123.dkr.ecr.us-west-2.amazonaws.com/api-prod:1.0".to_string()),
        });
    let ctx = world.context(base_config());
    let mut reporter = Reporter::new();

    converge(&ctx, None, &mut reporter).await.unwrap();

    assert_eq!(world.cluster.service_creates.lock().unwrap().len(), 1);
    assert!(world.cluster.service_updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_proceeds_with_empty_subnets() {
    let world = World::new(FakeCluster::with_cluster("ACTIVE"), FakeNetwork::default());
    world
        .cluster
        .current_task_spec
        .lock()
        .unwrap()
        .replace(TaskSpec {
            family: "api-prod".to_string(),
            revision: 1,
            image: Some("image:1".to_string()),
        });
    let ctx = world.context(base_config());
    let mut reporter = Reporter::new();

    converge(&ctx, None, &mut reporter).await.unwrap();

    let creates = world.cluster.service_creates.lock().unwrap();
    let (subnets, _, public_ip) = creates[0].network.clone().unwrap();
    assert!(subnets.is_empty());
    assert!(public_ip);
}

#[tokio::test]
async fn test_route_helper_matches_reconciler() {
    assert_eq!(route_for_state(None), ServiceRoute::Create);
    assert_eq!(
        route_for_state(Some(&service_info("ACTIVE"))),
        ServiceRoute::Update
    );
    assert_eq!(
        route_for_state(Some(&service_info("DRAINING"))),
        ServiceRoute::Create
    );
}

// ---------------------------------------------------------------------------
// task specification through the pipeline

#[tokio::test]
async fn test_converge_uses_existing_image_when_nothing_to_build() {
    let world = World::new(FakeCluster::with_cluster("ACTIVE"), FakeNetwork::default());
    world
        .cluster
        .current_task_spec
        .lock()
        .unwrap()
        .replace(TaskSpec {
            family: "api-prod".to_string(),
            revision: 7,
            image: Some("123.dkr.ecr.us-west-2.amazonaws.com/api-prod:2.4.0".to_string()),
        });
    let ctx = world.context(base_config());
    let mut reporter = Reporter::new();

    converge(&ctx, None, &mut reporter).await.unwrap();

    let registered = world.cluster.registered.lock().unwrap();
    assert_eq!(registered.len(), 1);
    assert_eq!(
        registered[0].image,
        "123.dkr.ecr.us-west-2.amazonaws.com/api-prod:2.4.0"
    );
    // implicit environment is derived for every registration
    assert_eq!(registered[0].environment[0].0, "AWS_REGION");
    assert_eq!(
        registered[0].environment[1],
        ("AWS_CLUSTER".to_string(), "api-prod".to_string())
    );
    assert_eq!(
        registered[0].environment[2],
        ("MS_NAME".to_string(), "api".to_string())
    );
}

#[tokio::test]
async fn test_converge_fails_with_nothing_to_redeploy() {
    let world = World::new(FakeCluster::with_cluster("ACTIVE"), FakeNetwork::default());
    let ctx = world.context(base_config());
    let mut reporter = Reporter::new();

    let err = converge(&ctx, None, &mut reporter).await.unwrap_err();
    assert!(matches!(err, FarError::ConfigError(_)));
    assert!(world.cluster.registered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_repository_reference_requires_tag() {
    let world = World::new(FakeCluster::with_cluster("ACTIVE"), FakeNetwork::default());
    let mut config = base_config();
    config.repository = Some("ghcr.io/acme/api".to_string());
    let ctx = world.context(config);
    let mut reporter = Reporter::new();

    let err = converge(&ctx, None, &mut reporter).await.unwrap_err();
    assert!(err.to_string().contains("missing the tag value"));
}

#[tokio::test]
async fn test_ports_require_security_groups() {
    let world = World::new(FakeCluster::with_cluster("ACTIVE"), FakeNetwork::default());
    let mut config = base_config();
    config.ports = vec!["8080".to_string()];
    let ctx = world.context(config);
    let mut reporter = Reporter::new();

    // no explicit groups and tag discovery finds none
    let err = converge(&ctx, None, &mut reporter).await.unwrap_err();
    assert!(err.to_string().contains("security group"));
}

#[tokio::test]
async fn test_ports_allowed_with_discovered_security_groups() {
    let network = FakeNetwork {
        security_groups: vec!["sg-tagged".to_string()],
        ..Default::default()
    };
    let world = World::new(FakeCluster::with_cluster("ACTIVE"), network);
    world
        .cluster
        .current_task_spec
        .lock()
        .unwrap()
        .replace(TaskSpec {
            family: "api-prod".to_string(),
            revision: 1,
            image: Some("image:1".to_string()),
        });
    let mut config = base_config();
    config.ports = vec!["8080:80".to_string()];
    let ctx = world.context(config);
    let mut reporter = Reporter::new();

    converge(&ctx, None, &mut reporter).await.unwrap();

    let registered = world.cluster.registered.lock().unwrap();
    assert_eq!(registered[0].ports, vec![(8080, 80)]);
    let creates = world.cluster.service_creates.lock().unwrap();
    let (_, groups, _) = creates[0].network.clone().unwrap();
    assert_eq!(groups, vec!["sg-tagged".to_string()]);
}

#[tokio::test]
async fn test_converge_twice_registers_two_revisions() {
    let world = World::new(FakeCluster::default(), FakeNetwork::default());
    world
        .cluster
        .current_task_spec
        .lock()
        .unwrap()
        .replace(TaskSpec {
            family: "api-prod".to_string(),
            revision: 1,
            image: Some("image:1".to_string()),
        });
    let ctx = world.context(base_config());
    let mut reporter = Reporter::new();

    converge(&ctx, None, &mut reporter).await.unwrap();
    converge(&ctx, None, &mut reporter).await.unwrap();

    // every deployment registers a new immutable revision; the service is
    // created once then updated
    assert_eq!(world.cluster.registered.lock().unwrap().len(), 2);
    assert_eq!(world.cluster.cluster_creates.load(Ordering::SeqCst), 1);
    assert_eq!(world.cluster.service_creates.lock().unwrap().len(), 1);
    assert_eq!(world.cluster.service_updates.lock().unwrap().len(), 1);
}
