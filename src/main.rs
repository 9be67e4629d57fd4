//! linstor-reconcile: ensures a VM's DRBD resource exists at the desired
//! size on the LINSTOR controller before the VM itself is provisioned.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use linstor_reconcile::config::{Catalog, Settings};
use linstor_reconcile::reconcile::Reconciler;
use linstor_reconcile::ssh::SshRunner;

/// DRBD resource manager for the K3s VM pool
#[derive(Parser, Debug)]
#[command(name = "linstor-reconcile", version, about)]
struct Args {
    /// VM id to reconcile (1000=acemagician, 1001=elitedesk)
    #[arg(long)]
    vmid: u32,

    /// Desired disk size in GiB
    #[arg(long)]
    size: u64,

    /// Log planned actions without touching the controller
    #[arg(long)]
    dry_run: bool,

    /// Private key for the controller ssh connection (default: $SSH_KEY_PATH)
    #[arg(long)]
    ssh_key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("linstor_reconcile=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let catalog = Catalog::builtin();
    let Some(target) = catalog.lookup(args.vmid) else {
        bail!(
            "VM id {} is not managed (known: {:?})",
            args.vmid,
            catalog.known_vmids()
        );
    };

    let ssh_key = args
        .ssh_key
        .or_else(|| std::env::var_os("SSH_KEY_PATH").map(PathBuf::from));
    let settings = Settings::from_env(ssh_key);

    info!(
        controller = %settings.controller_addr,
        user = %settings.controller_user,
        "Using LINSTOR controller"
    );

    let runner = SshRunner::new(
        settings.controller_user.clone(),
        settings.controller_addr.clone(),
        settings.ssh_key.clone(),
    );

    let outcome = Reconciler::new(&runner, args.dry_run)
        .reconcile(target, args.size)
        .await;

    if outcome.is_success() {
        info!(outcome = %outcome, "Reconciliation finished");
        Ok(())
    } else {
        error!(outcome = %outcome, "Reconciliation failed");
        std::process::exit(1);
    }
}
