//! Secret synchronization.
//!
//! Each declared secret is read from its local source file and upserted into
//! the secret store. The upsert tolerates concurrent re-runs and secrets in
//! the soft-deleted recovery window: those are restored first, then always
//! updated to the local value.

use crate::errors::FarError;
use crate::providers::{ProviderError, SecretStore};
use crate::spec::DeploymentSpec;
use crate::terminal::Reporter;

pub async fn sync_secrets(
    secrets: &dyn SecretStore,
    spec: &DeploymentSpec,
    reporter: &mut Reporter,
) -> Result<(), FarError> {
    if spec.secrets.is_empty() {
        return Ok(());
    }

    reporter.progress_start("Updating service secrets");
    for secret in &spec.secrets {
        let value = tokio::fs::read_to_string(&secret.source).await.map_err(|e| {
            FarError::SecretError(format!(
                "cannot read {} for secret {}: {e}",
                secret.source.display(),
                secret.name
            ))
        })?;
        upsert(secrets, &spec.secret_id(&secret.name), &value).await?;
    }
    reporter.progress_end();
    Ok(())
}

async fn upsert(secrets: &dyn SecretStore, id: &str, value: &str) -> Result<(), FarError> {
    match secrets.create_secret(id, value).await {
        Ok(()) => Ok(()),
        Err(ProviderError::InvalidRequest(reason)) => {
            // the secret may be soft-deleted; restore it before updating
            let info = secrets.describe_secret(id).await?;
            if !info.soft_deleted {
                return Err(ProviderError::InvalidRequest(reason).into());
            }
            secrets.restore_secret(id).await?;
            secrets.put_secret_value(id, value).await?;
            Ok(())
        }
        Err(ProviderError::AlreadyExists(_)) => {
            secrets.put_secret_value(id, value).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
