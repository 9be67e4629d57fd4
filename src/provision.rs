//! Creates a resource definition, its volume, and per-node replicas.

use thiserror::Error;
use tracing::{error, info};

use crate::config::{RESOURCE_GROUP, STORAGE_POOL};
use crate::ssh::{CommandOutput, CommandRunner};

/// How a failed create/deploy command is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateFailure {
    /// The object is already there; creation is a no-op.
    AlreadyExists,
    /// Anything else; the current step must abort.
    Fatal,
}

/// Classifies a failed create command.
///
/// The controller reports duplicates as plain text, on stdout or stderr
/// depending on the command, so both streams are checked.
pub fn classify(output: &CommandOutput) -> CreateFailure {
    const BENIGN: [&str; 2] = ["already exists", "already deployed"];
    if BENIGN
        .iter()
        .any(|m| output.stdout.contains(m) || output.stderr.contains(m))
    {
        CreateFailure::AlreadyExists
    } else {
        CreateFailure::Fatal
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("resource-definition create failed: {0}")]
    ResourceDefinition(String),
    #[error("volume-definition create failed: {0}")]
    VolumeDefinition(String),
}

/// Result of a provisioning pass. The deployed count is informational:
/// partial placement is accepted, never fatal.
#[derive(Debug, Clone, Copy)]
pub struct ProvisionReport {
    pub deployed: usize,
    pub requested: usize,
}

/// Creates the control-plane objects for one resource.
pub struct Provisioner<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> Provisioner<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Creates the resource definition, a volume of `size_gib`, and one
    /// replica per node. Every step tolerates duplicates, so the call is
    /// safe to re-run against a half-provisioned resource.
    pub async fn provision(
        &self,
        resource: &str,
        size_gib: u64,
        nodes: &[&str],
    ) -> Result<ProvisionReport, ProvisionError> {
        info!(resource = %resource, size_gib, "Provisioning resource");

        self.create_object(
            "resource-definition create",
            &format!("linstor resource-definition create {}", resource),
        )
        .await
        .map_err(ProvisionError::ResourceDefinition)?;

        self.create_object(
            "volume-definition create",
            &format!(
                "linstor volume-definition create {} {}GiB",
                resource, size_gib
            ),
        )
        .await
        .map_err(ProvisionError::VolumeDefinition)?;

        let mut deployed = 0;
        for node in nodes {
            let output = self
                .runner
                .run(&format!(
                    "linstor resource create {} {} --storage-pool {} --resource-group {}",
                    node, resource, STORAGE_POOL, RESOURCE_GROUP
                ))
                .await;

            if output.success() {
                info!(node = %node, resource = %resource, "Replica deployed");
                deployed += 1;
            } else {
                match classify(&output) {
                    CreateFailure::AlreadyExists => {
                        info!(node = %node, resource = %resource, "Replica already deployed");
                        deployed += 1;
                    }
                    CreateFailure::Fatal => {
                        // Keep going on the remaining nodes
                        log_remote_failure(&format!("resource create on {}", node), &output);
                    }
                }
            }
        }

        info!(
            resource = %resource,
            deployed,
            requested = nodes.len(),
            "Provisioning finished"
        );

        Ok(ProvisionReport {
            deployed,
            requested: nodes.len(),
        })
    }

    /// Runs one create command, treating duplicates as success.
    async fn create_object(&self, step: &str, command: &str) -> Result<(), String> {
        let output = self.runner.run(command).await;
        if output.success() {
            info!(step = %step, "Created");
            return Ok(());
        }
        match classify(&output) {
            CreateFailure::AlreadyExists => {
                info!(step = %step, "Already exists, continuing");
                Ok(())
            }
            CreateFailure::Fatal => {
                log_remote_failure(step, &output);
                Err(remote_reason(&output))
            }
        }
    }
}

fn remote_reason(output: &CommandOutput) -> String {
    let err = output.stderr.trim();
    if err.is_empty() {
        output.stdout.trim().to_string()
    } else {
        err.to_string()
    }
}

fn log_remote_failure(step: &str, output: &CommandOutput) {
    error!(
        step = %step,
        exit_code = output.exit_code,
        stderr = %output.stderr.trim(),
        "Remote command failed"
    );
    if !output.stdout.trim().is_empty() {
        error!(step = %step, stdout = %output.stdout.trim(), "Remote command output");
    }
}
