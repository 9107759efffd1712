//! far - Entry Point
//!
//! One repeatable command from source to running service: parses the
//! command line, merges it over `farconfig.{env}`, and dispatches to the
//! deployment pipeline or a service operation.

use std::env;
use std::str::FromStr;

use chrono::Utc;

use far::config::FarConfig;
use far::context::{AwsCredentials, ReconciliationContext};
use far::engine::docker::DockerClient;
use far::errors::FarError;
use far::logs::{init_logging, LogLevel};
use far::ops;
use far::pipeline;
use far::spec::DeploymentSpec;
use far::tail;
use far::terminal::Reporter;

#[tokio::main]
async fn main() {
    // Parse command line arguments: first bare word is the command, the
    // rest are --key=value flags (a bare --flag means "true")
    let args: Vec<String> = env::args().collect();
    let mut command: Option<String> = None;
    let mut flags: Vec<(String, String)> = Vec::new();

    for arg in args.iter().skip(1) {
        if let Some(rest) = arg.strip_prefix("--") {
            if let Some((key, value)) = rest.split_once('=') {
                flags.push((key.to_string(), value.to_string()));
            } else {
                flags.push((rest.to_string(), "true".to_string()));
            }
        } else if command.is_none() {
            command = Some(arg.clone());
        }
    }

    if flag(&flags, "version").is_some() {
        println!("far {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let Some(command) = command else {
        usage();
        std::process::exit(2);
    };

    let mut reporter = Reporter::new();
    if let Err(e) = run(&command, &flags, &mut reporter).await {
        reporter.progress_abort();
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}

async fn run(
    command: &str,
    flags: &[(String, String)],
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    let env_name = flag(flags, "env")
        .map(str::to_string)
        .ok_or_else(|| FarError::ConfigError("env must be specified".into()))?;

    let config = FarConfig::load(&env_name)?.merge(overrides(flags)?);
    init_logging(config.log_level.as_ref().unwrap_or(&LogLevel::Warn))?;

    let credentials = AwsCredentials::from_config(&config);
    let spec = DeploymentSpec::resolve(&config, &env_name)?;
    let ctx = ReconciliationContext::connect(spec, &credentials).await?;

    match command {
        "deploy" => {
            let engine = DockerClient::from_env()?;
            pipeline::deploy(&ctx, &engine, reporter).await
        }
        "update" => pipeline::update(&ctx, reporter).await,
        "status" => {
            let events = parse_flag::<usize>(flags, "events")?.unwrap_or(5);
            ops::status(&ctx, events, reporter).await
        }
        "logs" => {
            let start = parse_flag::<i64>(flags, "start")?
                .unwrap_or_else(|| Utc::now().timestamp_millis());
            let end = parse_flag::<i64>(flags, "end")?;
            let group = ctx.spec.log_group();
            tail::tail(ctx.logs.as_ref(), &group, start, end, |event| {
                println!("{}", tail::format_event(event));
            })
            .await
        }
        "scale" => {
            let count = parse_flag::<i32>(flags, "count")?
                .ok_or_else(|| FarError::ConfigError("count must be specified".into()))?;
            ops::scale(&ctx, count, reporter).await
        }
        "stop" => ops::scale(&ctx, 0, reporter).await,
        "terminate" => ops::terminate(&ctx, reporter).await,
        other => {
            usage();
            Err(FarError::ConfigError(format!("unknown command \"{other}\"")))
        }
    }
}

fn usage() {
    println!("Usage: far <command> --env=<env> [flags]");
    println!();
    println!("Commands:");
    println!("  deploy      build, push and roll out the service");
    println!("  update      roll out without building an image");
    println!("  status      show service state [--events=N]");
    println!("  logs        tail service logs [--start=ms] [--end=ms]");
    println!("  scale       set desired count --count=N");
    println!("  stop        scale to zero");
    println!("  terminate   delete service, repository and secrets");
    println!();
    println!("Flags override farconfig.<env>: --name --cluster --region --type");
    println!("--cpu --memory --count --tag --draft --dockerfile --repository");
    println!("--ports=a,b --variables=NAME=VALUE (repeatable) --subnets=a,b");
    println!("--default-vpc --security-groups=a,b --role --log-retention-days");
    println!("--log-export --assign-public-ip=<bool> --profile --access-key");
    println!("--access-secret --log-level");
}

/// Last occurrence of a flag wins.
fn flag<'a>(flags: &'a [(String, String)], key: &str) -> Option<&'a str> {
    flags
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// All occurrences of a flag, comma-split.
fn flag_list(flags: &[(String, String)], key: &str) -> Vec<String> {
    flags
        .iter()
        .filter(|(k, _)| k == key)
        .flat_map(|(_, v)| v.split(','))
        .map(str::to_string)
        .collect()
}

fn parse_flag<T: FromStr>(flags: &[(String, String)], key: &str) -> Result<Option<T>, FarError> {
    match flag(flags, key) {
        Some(value) => value.parse::<T>().map(Some).map_err(|_| {
            FarError::ConfigError(format!("invalid value \"{value}\" for --{key}"))
        }),
        None => Ok(None),
    }
}

/// Build the CLI override layer in `FarConfig` shape.
fn overrides(flags: &[(String, String)]) -> Result<FarConfig, FarError> {
    Ok(FarConfig {
        name: flag(flags, "name").map(str::to_string),
        cluster: flag(flags, "cluster").map(str::to_string),
        region: flag(flags, "region").map(str::to_string),
        launch_type: flag(flags, "type").map(str::to_string),
        cpu: parse_flag(flags, "cpu")?,
        memory: parse_flag(flags, "memory")?,
        count: parse_flag(flags, "count")?,
        tag: flag(flags, "tag").map(str::to_string),
        draft: flag(flags, "draft").is_some(),
        dockerfile: flag(flags, "dockerfile").map(str::to_string),
        repository: flag(flags, "repository").map(str::to_string),
        ports: flag_list(flags, "ports"),
        // values may contain '=' and ',', so repeats are kept verbatim
        variables: flags
            .iter()
            .filter(|(k, _)| k == "variables")
            .map(|(_, v)| v.clone())
            .collect(),
        secrets: None,
        subnets: flag_list(flags, "subnets"),
        default_vpc: flag(flags, "default-vpc").is_some(),
        security_groups: flag_list(flags, "security-groups"),
        role: flag(flags, "role").map(str::to_string),
        log_retention_days: parse_flag(flags, "log-retention-days")?,
        log_export: flag(flags, "log-export").map(str::to_string),
        assign_public_ip: parse_flag(flags, "assign-public-ip")?,
        profile: flag(flags, "profile").map(str::to_string),
        access_key: flag(flags, "access-key").map(str::to_string),
        access_secret: flag(flags, "access-secret").map(str::to_string),
        log_level: match flag(flags, "log-level") {
            Some(value) => Some(
                value
                    .parse::<LogLevel>()
                    .map_err(FarError::ConfigError)?,
            ),
            None => None,
        },
    })
}
