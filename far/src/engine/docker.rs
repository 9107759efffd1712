//! Docker Engine API client.
//!
//! Talks to the daemon's HTTP API and exposes build/push as newline-delimited
//! JSON event streams. The endpoint comes from `DOCKER_HOST` (`tcp://` or
//! `http://`); the default is the local daemon's TCP port.

use std::collections::VecDeque;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::StreamExt;
use tracing::debug;

use crate::engine::{ContainerEngine, EngineEvent, EventStream};
use crate::errors::FarError;
use crate::providers::{ProviderError, RegistryAuth};

const DEFAULT_ENDPOINT: &str = "http://localhost:2375";
const API_VERSION: &str = "v1.43";

pub struct DockerClient {
    http: reqwest::Client,
    base: String,
}

impl DockerClient {
    /// Resolve the daemon endpoint from `DOCKER_HOST`.
    pub fn from_env() -> Result<Self, FarError> {
        let base = match std::env::var("DOCKER_HOST") {
            Ok(host) => {
                let url = url::Url::parse(&host)
                    .map_err(|e| FarError::EngineError(format!("invalid DOCKER_HOST: {e}")))?;
                match url.scheme() {
                    "tcp" | "http" => format!(
                        "http://{}:{}",
                        url.host_str().unwrap_or("localhost"),
                        url.port().unwrap_or(2375)
                    ),
                    other => {
                        return Err(FarError::EngineError(format!(
                            "unsupported DOCKER_HOST scheme \"{other}\" (use tcp:// or http://)"
                        )))
                    }
                }
            }
            Err(_) => DEFAULT_ENDPOINT.to_string(),
        };
        Ok(Self::new(base))
    }

    pub fn new(base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}{}", self.base, API_VERSION, path)
    }
}

#[async_trait]
impl ContainerEngine for DockerClient {
    async fn build(&self, context: Vec<u8>, tag: &str) -> Result<EventStream, ProviderError> {
        let url = self.url("/build");
        debug!("POST {} (t={})", url, tag);
        let resp = self
            .http
            .post(&url)
            .query(&[("t", tag)])
            .header(reqwest::header::CONTENT_TYPE, "application/x-tar")
            .body(context)
            .send()
            .await
            .map_err(|e| ProviderError::Other(format!("docker build request failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Other(format!(
                "docker build rejected: {status} {body}"
            )));
        }
        Ok(ndjson_events(resp))
    }

    async fn push(
        &self,
        image: &str,
        tag: &str,
        auth: &RegistryAuth,
    ) -> Result<EventStream, ProviderError> {
        let url = self.url(&format!("/images/{image}/push"));
        debug!("POST {} (tag={})", url, tag);
        let registry_auth = BASE64.encode(
            serde_json::json!({
                "username": auth.username,
                "password": auth.password,
                "serveraddress": auth.endpoint,
            })
            .to_string(),
        );
        let resp = self
            .http
            .post(&url)
            .query(&[("tag", tag)])
            .header("X-Registry-Auth", registry_auth)
            .send()
            .await
            .map_err(|e| ProviderError::Other(format!("docker push request failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Other(format!(
                "docker push rejected: {status} {body}"
            )));
        }
        Ok(ndjson_events(resp))
    }
}

/// Split a streaming response body into newline-delimited JSON frames.
fn ndjson_events(resp: reqwest::Response) -> EventStream {
    let body = Box::pin(resp.bytes_stream());
    let state = (body, String::new(), VecDeque::new());
    Box::pin(futures::stream::unfold(state, |(mut body, mut buf, mut ready)| async move {
        loop {
            if let Some(event) = ready.pop_front() {
                return Some((Ok(event), (body, buf, ready)));
            }
            match body.next().await {
                Some(Ok(bytes)) => {
                    buf.push_str(&String::from_utf8_lossy(&bytes));
                    while let Some(pos) = buf.find('\n') {
                        let line: String = buf.drain(..=pos).collect();
                        if let Some(event) = parse_frame(&line) {
                            ready.push_back(event);
                        }
                    }
                }
                Some(Err(e)) => {
                    return Some((
                        Err(ProviderError::Other(format!("engine stream error: {e}"))),
                        (body, buf, ready),
                    ));
                }
                None => {
                    // trailing frame without a newline
                    let line = std::mem::take(&mut buf);
                    return parse_frame(&line).map(|event| (Ok(event), (body, buf, ready)));
                }
            }
        }
    }))
}

fn parse_frame(line: &str) -> Option<EngineEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<EngineEvent>(line) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("skipping unparseable engine frame: {e}");
            None
        }
    }
}
