//! Image building.
//!
//! Resolves the tag, checks it is not already in the remote repository,
//! packs the build context and drives the engine's build event stream.
//! Success requires both terminal markers before the stream closes; a
//! mid-stream error is recorded but draining continues so partial progress
//! is never truncated.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::StreamExt;

use crate::engine::context::{load_ignore_file, pack_build_context};
use crate::engine::{ContainerEngine, EventStream};
use crate::errors::FarError;
use crate::providers::{RegistryStore, Repository};
use crate::spec::DeploymentSpec;
use crate::terminal::Reporter;

/// A locally built, tagged image.
#[derive(Debug, Clone)]
pub struct BuiltImage {
    pub repository: Repository,
    pub tag: String,
}

impl BuiltImage {
    /// Full `uri:tag` reference.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository.uri, self.tag)
    }
}

/// Resolve the image tag: explicit tag, then project version metadata.
/// Draft deployments get a UTC timestamp suffix so they never collide with
/// release tags at second granularity.
pub fn resolve_tag(spec: &DeploymentSpec, now: DateTime<Utc>) -> Result<String, FarError> {
    let base = match &spec.tag {
        Some(tag) => tag.clone(),
        None => project_version()
            .ok_or_else(|| FarError::ConfigError("missing tag value".into()))?,
    };
    if spec.draft {
        Ok(format!("{}-{}", base, now.format("%Y%m%d%H%M%S")))
    } else {
        Ok(base)
    }
}

/// Version from project metadata in the working directory: `Cargo.toml`
/// first, then `package.json`.
fn project_version() -> Option<String> {
    if let Ok(contents) = std::fs::read_to_string("Cargo.toml") {
        if let Ok(manifest) = contents.parse::<toml::Value>() {
            if let Some(version) = manifest
                .get("package")
                .and_then(|p| p.get("version"))
                .and_then(|v| v.as_str())
            {
                return Some(version.to_string());
            }
        }
    }
    if let Ok(contents) = std::fs::read_to_string("package.json") {
        if let Ok(manifest) = serde_json::from_str::<serde_json::Value>(&contents) {
            if let Some(version) = manifest.get("version").and_then(|v| v.as_str()) {
                return Some(version.to_string());
            }
        }
    }
    None
}

/// Build and tag the image for `repository`.
pub async fn build_image(
    engine: &dyn ContainerEngine,
    registry: &dyn RegistryStore,
    spec: &DeploymentSpec,
    repository: &Repository,
    reporter: &mut Reporter,
) -> Result<BuiltImage, FarError> {
    let tag = resolve_tag(spec, Utc::now())?;

    // best-effort duplicate-tag check; a missing repository is fine here
    if let Ok(true) = registry.tag_exists(&repository.name, &tag).await {
        return Err(FarError::BuildError(format!(
            "image {}:{} already exists in the remote repository",
            repository.uri, tag
        )));
    }

    if std::fs::File::open(&spec.dockerfile).is_err() {
        return Err(FarError::BuildError(format!(
            "{} does not exist",
            spec.dockerfile.display()
        )));
    }

    reporter.log(&format!(
        "Building image from {}",
        spec.dockerfile.display()
    ));

    // exclude secret sources and .dockerignore entries from the context
    let mut ignore: Vec<PathBuf> = spec.secrets.iter().map(|s| s.source.clone()).collect();
    ignore.extend(
        load_ignore_file(Path::new(".dockerignore"))
            .into_iter()
            .map(PathBuf::from),
    );
    let (context, excluded) = pack_build_context(Path::new("."), &ignore)?;
    for path in &excluded {
        reporter.log(&format!("Excluding {} from build context", path.display()));
    }

    let target = format!("{}:{}", repository.uri, tag);
    let stream = engine.build(context, &target).await?;
    drive_build(stream, reporter).await?;

    Ok(BuiltImage {
        repository: repository.clone(),
        tag,
    })
}

/// Drain the build event stream to close, echoing raw output. The build
/// succeeds only if both the "built" and "tagged" markers were observed.
pub(crate) async fn drive_build(
    mut stream: EventStream,
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    let mut built = false;
    let mut tagged = false;
    let mut error: Option<String> = None;

    while let Some(event) = stream.next().await {
        match event {
            Ok(event) => {
                if let Some(message) = event.error {
                    error = Some(message);
                    continue;
                }
                if let Some(text) = event.stream {
                    if text.starts_with("Successfully built") {
                        built = true;
                    }
                    if text.starts_with("Successfully tagged") {
                        tagged = true;
                    }
                    reporter.log_inline(&text);
                }
            }
            Err(e) => error = Some(e.to_string()),
        }
    }

    if built && tagged {
        Ok(())
    } else {
        Err(FarError::BuildError(format!(
            "failed to build image: {}",
            error.unwrap_or_else(|| "build did not complete".into())
        )))
    }
}
