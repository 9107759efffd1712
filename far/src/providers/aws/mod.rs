//! Thin adapters over the AWS SDK clients.
//!
//! Each adapter maps one SDK client onto a provider trait and funnels every
//! failure through [`wrap`], so error-code strings stay confined to this
//! module.

mod ec2;
mod ecr;
mod ecs;
mod iam;
mod logs;
mod secrets;

pub use ec2::Ec2Network;
pub use ecr::EcrRegistry;
pub use ecs::EcsCluster;
pub use iam::IamIdentity;
pub use logs::CloudWatchLogs;
pub use secrets::SecretsManager;

use aws_sdk_ecs::error::{ProvideErrorMetadata, SdkError};

use crate::providers::ProviderError;

/// Map an AWS error code onto the closed [`ProviderError`] classification.
fn classify(code: Option<&str>, message: String) -> ProviderError {
    match code {
        Some(
            "ResourceAlreadyExistsException"
            | "ResourceExistsException"
            | "RepositoryAlreadyExistsException"
            | "EntityAlreadyExists",
        ) => ProviderError::AlreadyExists(message),
        Some(
            "ResourceNotFoundException"
            | "RepositoryNotFoundException"
            | "ImageNotFoundException"
            | "ClusterNotFoundException"
            | "ServiceNotFoundException"
            | "NoSuchEntity",
        ) => ProviderError::NotFound(message),
        Some("InvalidRequestException") => ProviderError::InvalidRequest(message),
        _ => ProviderError::Other(message),
    }
}

/// Classify any `SdkError`. The smithy runtime types are shared across the
/// service crates, so this single helper serves every adapter.
pub(crate) fn wrap<E, R>(err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    let message = match err.message() {
        Some(message) => message.to_string(),
        None => format!("{err:?}"),
    };
    classify(code.as_deref(), message)
}
