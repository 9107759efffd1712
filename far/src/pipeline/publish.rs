//! Image publication.
//!
//! Authenticates with a short-lived registry token, pushes the built image
//! and renders per-layer progress through the multiplexer. The event stream
//! and a stdin line reader are drained in one select loop: stdin newlines
//! only bump the renderer's distance delta so cursor math survives stray
//! user input. Failure is decided at stream close, never mid-stream.

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::engine::{ContainerEngine, EventStream};
use crate::errors::FarError;
use crate::pipeline::build::BuiltImage;
use crate::progress::{term, RenderState};
use crate::providers::RegistryStore;
use crate::terminal::Reporter;

pub async fn push_image(
    engine: &dyn ContainerEngine,
    registry: &dyn RegistryStore,
    image: &BuiltImage,
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    let auth = registry.auth_token().await?;
    reporter.log(&format!("Pushing {}...", image.reference()));
    let stream = engine
        .push(&image.repository.uri, &image.tag, &auth)
        .await?;
    drive_push(stream).await
}

/// Drain the push stream to close, rendering progress lines. Any error
/// event fails the push, but only after the stream has been fully drained.
pub(crate) async fn drive_push(mut stream: EventStream) -> Result<(), FarError> {
    let mut state = RenderState::new();
    let mut error: Option<String> = None;

    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = stream.next() => {
                match event {
                    Some(Ok(event)) => {
                        if let Some(message) = &event.error {
                            error = Some(message.clone());
                            continue;
                        }
                        term::emit(&state.apply(&event));
                    }
                    Some(Err(e)) => error = Some(e.to_string()),
                    None => break,
                }
            }
            line = stdin_lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(_)) => state.external_newline(),
                    _ => stdin_open = false,
                }
            }
        }
    }

    match error {
        None => Ok(()),
        Some(message) => Err(FarError::PushError(format!(
            "failed to push image: {message}"
        ))),
    }
}
