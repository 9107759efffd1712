//! Container build/push engine interface.

pub mod context;
pub mod docker;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::Deserialize;

use crate::providers::{ProviderError, RegistryAuth};

/// One structured status frame from a build or push operation.
///
/// Build frames carry `stream` (raw output text) and occasionally `error`;
/// push frames carry `id`/`status`/`progress` per layer, and `error` on
/// failure. A single frame never carries both `stream` and `status`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineEvent {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub stream: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub progress: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

/// Stream of engine events, drained to close even after a mid-stream error.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EngineEvent, ProviderError>> + Send>>;

/// Container build/push service boundary.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Build an image from a gzipped tar build context, tagging it `tag`.
    async fn build(&self, context: Vec<u8>, tag: &str) -> Result<EventStream, ProviderError>;

    /// Push `image:tag` using registry credentials.
    async fn push(
        &self,
        image: &str,
        tag: &str,
        auth: &RegistryAuth,
    ) -> Result<EventStream, ProviderError>;
}
