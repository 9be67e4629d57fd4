//! Grows the volume of an existing resource.

use thiserror::Error;
use tracing::{error, info};

use crate::ssh::CommandRunner;

#[derive(Debug, Error)]
pub enum ResizeError {
    #[error("volume-definition set-size failed: {0}")]
    SetSize(String),
}

/// Issues the single set-size call for a resource's volume 0.
pub struct Resizer<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> Resizer<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Sets the size of volume 0. Grow-only: the reconciler never calls
    /// this with a size below the current one. Any non-zero exit is a
    /// hard failure with no retry.
    pub async fn resize(&self, resource: &str, new_size_gib: u64) -> Result<(), ResizeError> {
        info!(resource = %resource, new_size_gib, "Resizing volume");

        let output = self
            .runner
            .run(&format!(
                "linstor volume-definition set-size {} 0 {}GiB",
                resource, new_size_gib
            ))
            .await;

        if !output.success() {
            error!(
                resource = %resource,
                exit_code = output.exit_code,
                stderr = %output.stderr.trim(),
                "Resize failed"
            );
            return Err(ResizeError::SetSize(output.stderr.trim().to_string()));
        }

        info!(resource = %resource, new_size_gib, "Volume resized");
        Ok(())
    }
}
