//! The reconciliation decision procedure.
//!
//! Compares the desired size of one resource against its provisioned
//! state and drives the minimal corrective action. Sizes only ever grow:
//! a shrink request is refused here by policy rather than delegated to
//! the controller, because DRBD resizing is one-directional and a shrink
//! risks the data on the volume.

use std::fmt;

use tracing::{info, warn};

use crate::config::{REPLICA_NODES, ResourceTarget};
use crate::provision::Provisioner;
use crate::resize::Resizer;
use crate::ssh::CommandRunner;
use crate::state::{ResourceState, StateReader};

/// Corrective action chosen for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Current size matches the desired size.
    Nothing,
    /// No resource definition exists.
    Create,
    /// Definition exists but the volume size could not be read; re-run
    /// the idempotent provisioning steps to fill in whatever is missing.
    RepairVolume,
    /// Volume is smaller than desired.
    Grow,
    /// Volume is larger than desired; shrinking is unsupported.
    RefuseShrink { current_gib: u64 },
}

/// Picks the action for a detected state and desired size. Pure; the
/// dry-run path goes through exactly this function too.
pub fn decide(state: &ResourceState, desired_gib: u64) -> Action {
    match state {
        ResourceState::Absent => Action::Create,
        ResourceState::PresentSizeUnknown => Action::RepairVolume,
        ResourceState::PresentWithSize(current) if *current == desired_gib => Action::Nothing,
        ResourceState::PresentWithSize(current) if *current < desired_gib => Action::Grow,
        ResourceState::PresentWithSize(current) => Action::RefuseShrink {
            current_gib: *current,
        },
    }
}

/// Terminal result of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NoActionNeeded,
    Created,
    Resized,
    ConfigurationRepaired,
    Skipped(String),
    Failed(String),
}

impl Outcome {
    /// Whether the process should exit zero.
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::NoActionNeeded => write!(f, "no action needed"),
            Outcome::Created => write!(f, "created"),
            Outcome::Resized => write!(f, "resized"),
            Outcome::ConfigurationRepaired => write!(f, "configuration repaired"),
            Outcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            Outcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Drives one resource to its desired size.
pub struct Reconciler<'a> {
    runner: &'a dyn CommandRunner,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(runner: &'a dyn CommandRunner, dry_run: bool) -> Self {
        Self { runner, dry_run }
    }

    /// Reconciles one resource to `desired_gib`.
    ///
    /// Total: every error path collapses into [`Outcome::Failed`]; this
    /// never panics and never returns `Err`. In dry-run mode state
    /// detection and the decision are identical to a real run, only the
    /// mutating calls are suppressed.
    pub async fn reconcile(&self, target: &ResourceTarget, desired_gib: u64) -> Outcome {
        info!(
            vmid = target.vmid,
            vm = %target.vm_name,
            resource = %target.resource,
            node = %target.node,
            desired_gib,
            dry_run = self.dry_run,
            "Reconciling resource"
        );

        let state = StateReader::new(self.runner)
            .read_state(&target.resource)
            .await;
        let action = decide(&state, desired_gib);
        info!(state = ?state, action = ?action, "Detected state");

        match action {
            Action::Nothing => {
                info!(resource = %target.resource, size_gib = desired_gib, "Size already matches");
                Outcome::NoActionNeeded
            }
            Action::Create => {
                if self.dry_run {
                    info!(resource = %target.resource, desired_gib, "dry-run: would create resource");
                    return Outcome::Created;
                }
                self.provision(target, desired_gib, Outcome::Created).await
            }
            Action::RepairVolume => {
                warn!(
                    resource = %target.resource,
                    "Resource exists but size is indeterminate; re-running provisioning"
                );
                if self.dry_run {
                    info!(resource = %target.resource, desired_gib, "dry-run: would re-run provisioning");
                    return Outcome::ConfigurationRepaired;
                }
                self.provision(target, desired_gib, Outcome::ConfigurationRepaired)
                    .await
            }
            Action::Grow => {
                if self.dry_run {
                    info!(resource = %target.resource, desired_gib, "dry-run: would resize resource");
                    return Outcome::Resized;
                }
                match Resizer::new(self.runner)
                    .resize(&target.resource, desired_gib)
                    .await
                {
                    Ok(()) => Outcome::Resized,
                    Err(e) => Outcome::Failed(e.to_string()),
                }
            }
            Action::RefuseShrink { current_gib } => {
                warn!(
                    resource = %target.resource,
                    current_gib,
                    desired_gib,
                    "Desired size is below current size; shrink not supported, size retained"
                );
                Outcome::Skipped(format!(
                    "shrink not supported, size retained at {}GiB",
                    current_gib
                ))
            }
        }
    }

    async fn provision(
        &self,
        target: &ResourceTarget,
        desired_gib: u64,
        on_success: Outcome,
    ) -> Outcome {
        match Provisioner::new(self.runner)
            .provision(&target.resource, desired_gib, &REPLICA_NODES)
            .await
        {
            Ok(_) => on_success,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}
