//! Reads the provisioned state of a resource from the controller.
//!
//! State is derived fresh on every run and never cached; the controller
//! is the only system of record.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::ssh::CommandRunner;

/// KiB per GiB. The machine-readable listing reports sizes in KiB.
pub const KIB_PER_GIB: u64 = 1024 * 1024;

/// Provisioned state of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// No resource definition on the controller.
    Absent,
    /// Definition exists but no usable volume size could be read.
    PresentSizeUnknown,
    /// Definition exists with the given volume size in GiB.
    PresentWithSize(u64),
}

/// Machine-readable resource-definition listing entry. Only the fields
/// we read are modeled; everything else is ignored.
#[derive(Debug, Deserialize)]
struct RscDfn {
    #[serde(default)]
    volume_definitions: Vec<VlmDfn>,
}

#[derive(Debug, Deserialize)]
struct VlmDfn {
    #[serde(default)]
    size_kib: u64,
}

/// Derives [`ResourceState`] from controller listings.
pub struct StateReader<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> StateReader<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Full state for one resource.
    pub async fn read_state(&self, resource: &str) -> ResourceState {
        if !self.exists(resource).await {
            return ResourceState::Absent;
        }
        match self.current_size(resource).await {
            Some(gib) => ResourceState::PresentWithSize(gib),
            None => ResourceState::PresentSizeUnknown,
        }
    }

    /// Whether a resource definition exists on the controller.
    ///
    /// The definition listing is scanned for an exact name match; if that
    /// is inconclusive, a non-empty volume-definition listing for the
    /// resource counts as existence. Neither signal means absent, not an
    /// error.
    pub async fn exists(&self, resource: &str) -> bool {
        let output = self.runner.run("linstor resource-definition list").await;
        if output.success() && listing_has_resource(&output.stdout, resource) {
            debug!(resource = %resource, "Found in resource-definition list");
            return true;
        }

        let output = self
            .runner
            .run(&format!(
                "linstor volume-definition list --resource {}",
                resource
            ))
            .await;
        if output.success()
            && !output.stdout.trim().is_empty()
            && output.stdout.contains("VolumeNr")
        {
            debug!(resource = %resource, "Found via volume-definition list");
            return true;
        }

        debug!(resource = %resource, "Not found on controller");
        false
    }

    /// Current size of the resource's sole volume, in GiB.
    ///
    /// Parser chain: machine-readable JSON listing first, then the plain
    /// text table. `None` means indeterminate — callers must not read it
    /// as zero.
    pub async fn current_size(&self, resource: &str) -> Option<u64> {
        let output = self
            .runner
            .run(&format!(
                "linstor volume-definition list --resource {} --machine-readable",
                resource
            ))
            .await;
        if output.success() {
            if let Some(gib) = size_from_json(&output.stdout) {
                debug!(resource = %resource, size_gib = gib, "Size from machine-readable listing");
                return Some(gib);
            }
            warn!(resource = %resource, "Machine-readable listing unusable, trying text table");
        }

        let output = self
            .runner
            .run(&format!(
                "linstor volume-definition list --resource {}",
                resource
            ))
            .await;
        if output.success() {
            if let Some(gib) = size_from_table(&output.stdout) {
                debug!(resource = %resource, size_gib = gib, "Size from text listing");
                return Some(gib);
            }
        }

        warn!(resource = %resource, "Could not determine current size");
        None
    }
}

/// Exact-match scan of a pipe-delimited listing for a resource name.
///
/// Whole cells only: a listing that carries "web-1" must not satisfy a
/// lookup for "web".
fn listing_has_resource(stdout: &str, resource: &str) -> bool {
    stdout
        .lines()
        .filter(|line| line.contains('|') && !line.starts_with("+-"))
        .any(|line| line.split('|').any(|cell| cell.trim() == resource))
}

fn size_from_json(stdout: &str) -> Option<u64> {
    let defs: Vec<RscDfn> = serde_json::from_str(stdout.trim()).ok()?;
    let size_kib = defs.first()?.volume_definitions.first()?.size_kib;
    Some(size_kib / KIB_PER_GIB)
}

/// Pulls a "GiB"-suffixed cell out of the plain table listing,
/// truncating fractional sizes.
fn size_from_table(stdout: &str) -> Option<u64> {
    for line in stdout.lines() {
        if !line.contains('|') || !line.contains("GiB") {
            continue;
        }
        for cell in line.split('|') {
            if let Some(number) = cell.trim().strip_suffix("GiB") {
                if let Ok(size) = number.trim().parse::<f64>() {
                    return Some(size as u64);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_size_converts_kib_to_gib() {
        let stdout = r#"[{"name":"vm-1000-disk-0","volume_definitions":[{"volume_number":0,"size_kib":10485760}]}]"#;
        assert_eq!(size_from_json(stdout), Some(10));
    }

    #[test]
    fn json_size_floors_partial_gib() {
        // 1.5 GiB worth of KiB reads back as 1
        let stdout = r#"[{"volume_definitions":[{"size_kib":1572864}]}]"#;
        assert_eq!(size_from_json(stdout), Some(1));
    }

    #[test]
    fn json_without_volumes_is_indeterminate() {
        assert_eq!(size_from_json(r#"[{"volume_definitions":[]}]"#), None);
        assert_eq!(size_from_json("[]"), None);
    }

    #[test]
    fn malformed_json_is_indeterminate() {
        assert_eq!(size_from_json("ERROR: not a controller"), None);
        assert_eq!(size_from_json(""), None);
    }

    #[test]
    fn table_size_parses_gib_cell() {
        let stdout = "\
+----------------------------------------------------+\n\
| VolumeNr | VolumeMinor | Size    | Gross | State   |\n\
|====================================================|\n\
| 0        | 1000        | 50 GiB  |       | ok      |\n\
+----------------------------------------------------+\n";
        assert_eq!(size_from_table(stdout), Some(50));
    }

    #[test]
    fn table_size_truncates_fractions() {
        let stdout = "| 0 | 1000 | 1.50 GiB | | ok |\n";
        assert_eq!(size_from_table(stdout), Some(1));
    }

    #[test]
    fn table_without_gib_cell_is_indeterminate() {
        let stdout = "\
| VolumeNr | VolumeMinor | Size | Gross | State |\n\
| 0        | 1000        |      |       | ok    |\n";
        assert_eq!(size_from_table(stdout), None);
    }

    #[test]
    fn listing_matches_exact_names_only() {
        let stdout = "\
+------------------------------------------+\n\
| ResourceName | Port | ResourceGroup | State |\n\
|==========================================|\n\
| web-1        | 7000 | pve-rg        | ok  |\n\
+------------------------------------------+\n";
        assert!(listing_has_resource(stdout, "web-1"));
        assert!(!listing_has_resource(stdout, "web"));
        assert!(!listing_has_resource(stdout, "web-10"));
    }

    #[test]
    fn listing_ignores_header_and_frame_lines() {
        let stdout = "\
+--------------------+\n\
| ResourceName | ... |\n\
+--------------------+\n";
        assert!(!listing_has_resource(stdout, "vm-1000-disk-0"));
    }
}
