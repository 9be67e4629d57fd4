//! Controller settings and the compiled-in resource catalog.

use std::env;
use std::path::PathBuf;

const DEFAULT_CONTROLLER_ADDR: &str = "192.168.100.30";
const DEFAULT_CONTROLLER_USER: &str = "root";

/// Storage pool every replica is placed into.
pub const STORAGE_POOL: &str = "linstor_storage";
/// Resource group every replica is bound to.
pub const RESOURCE_GROUP: &str = "pve-rg";
/// Nodes that carry a replica of every managed resource. The controller
/// host itself holds no storage and is not in this list.
pub const REPLICA_NODES: [&str; 2] = ["acemagician", "elitedesk"];

/// Connection settings for the LINSTOR controller.
#[derive(Debug, Clone)]
pub struct Settings {
    pub controller_user: String,
    pub controller_addr: String,
    pub ssh_key: Option<PathBuf>,
}

impl Settings {
    /// Reads `LINSTOR_CONTROLLER_IP` and `LINSTOR_CONTROLLER_USER`,
    /// falling back to the lab defaults. The key path comes from the CLI,
    /// which itself defaults to `$SSH_KEY_PATH`.
    pub fn from_env(ssh_key: Option<PathBuf>) -> Self {
        Self {
            controller_user: env::var("LINSTOR_CONTROLLER_USER")
                .unwrap_or_else(|_| DEFAULT_CONTROLLER_USER.to_string()),
            controller_addr: env::var("LINSTOR_CONTROLLER_IP")
                .unwrap_or_else(|_| DEFAULT_CONTROLLER_ADDR.to_string()),
            ssh_key,
        }
    }
}

/// One managed VM disk: maps a VM id to its DRBD resource and host.
#[derive(Debug, Clone)]
pub struct ResourceTarget {
    pub vmid: u32,
    pub resource: String,
    pub node: String,
    pub vm_name: String,
}

/// Table of managed resources, fixed at compile time.
///
/// Resource names follow the Proxmox convention `vm-{VMID}-disk-0`.
/// The table is built once in `main` and passed down; nothing mutates it.
pub struct Catalog {
    targets: Vec<ResourceTarget>,
}

impl Catalog {
    pub fn builtin() -> Self {
        Self {
            targets: vec![
                ResourceTarget {
                    vmid: 1000,
                    resource: "vm-1000-disk-0".to_string(),
                    node: "acemagician".to_string(),
                    vm_name: "k3s-server-1".to_string(),
                },
                ResourceTarget {
                    vmid: 1001,
                    resource: "vm-1001-disk-0".to_string(),
                    node: "elitedesk".to_string(),
                    vm_name: "k3s-server-2".to_string(),
                },
            ],
        }
    }

    pub fn lookup(&self, vmid: u32) -> Option<&ResourceTarget> {
        self.targets.iter().find(|t| t.vmid == vmid)
    }

    /// Known VM ids, for error messages.
    pub fn known_vmids(&self) -> Vec<u32> {
        self.targets.iter().map(|t| t.vmid).collect()
    }
}
