// SPDX-License-Identifier: GPL-3.0-only

//! Disk attribute probing for layers that only know a kernel device name
//!
//! Size comes from `/proc/partitions`, identity from udev properties and the
//! `/dev/disk/by-id` names.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;

use procfs::{FromRead, PartitionEntry};
use serde::{Deserialize, Serialize};
use storage_types::{UNKNOWN, bytes_to_pretty};
use tracing::debug;

use crate::link::SymlinkResolver;
use crate::regular::DEFAULT_SYS_BLOCK_DIR;
use crate::resolve::DEFAULT_BY_ID_DIR;

const KNOWN_INTERFACES: &[&str] = &["nvme", "ata", "scsi", "SAS", "SATA", "md", "dm"];
const KNOWN_MEDIA: &[&str] = &["HDD", "SATA_HDD", "SSD", "NVME"];

/// Hardware identity of one disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskIdentity {
    pub serial_number: String,
    pub model: String,
    pub intf: String,
    pub medium: String,
}

impl Default for DiskIdentity {
    fn default() -> Self {
        Self {
            serial_number: UNKNOWN.to_string(),
            model: UNKNOWN.to_string(),
            intf: UNKNOWN.to_string(),
            medium: UNKNOWN.to_string(),
        }
    }
}

/// Source of size and identity for a kernel device name.
pub trait DiskProbe: Send + Sync {
    /// Human-readable size, or `Unknown`.
    fn size(&self, device: &str) -> String;

    fn identity(&self, device: &str) -> DiskIdentity;
}

/// Row of a `/proc/partitions` listing whose name is exactly `device`.
pub fn find_partition<'a>(
    entries: &'a [PartitionEntry],
    device: &str,
) -> Option<&'a PartitionEntry> {
    entries.iter().find(|entry| entry.name == device)
}

/// Read-only view of udev device properties
pub trait DeviceProperties: Send + Sync {
    fn property(&self, device: &str, key: &str) -> Option<String>;
}

/// Looks properties up through libudev, keyed by the `/sys/block` entry
#[derive(Debug, Clone)]
pub struct UdevProperties {
    sys_block_dir: PathBuf,
}

impl UdevProperties {
    pub fn new(sys_block_dir: impl Into<PathBuf>) -> Self {
        Self {
            sys_block_dir: sys_block_dir.into(),
        }
    }
}

impl Default for UdevProperties {
    fn default() -> Self {
        Self::new(DEFAULT_SYS_BLOCK_DIR)
    }
}

impl DeviceProperties for UdevProperties {
    fn property(&self, device: &str, key: &str) -> Option<String> {
        let context = libudev::Context::new()
            .map_err(|err| debug!("could not get libudev context: {err:?}"))
            .ok()?;
        let syspath = self.sys_block_dir.join(device);
        let udev_device = libudev::Device::from_syspath(&context, &syspath)
            .map_err(|err| debug!(path = %syspath.display(), "no udev device: {err:?}"))
            .ok()?;
        udev_device
            .property_value(key)
            .and_then(OsStr::to_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    }
}

/// Split a udev serial string such as `TOSHIBA_HDD_MG04ACA400N_Y7HGK0ABCDEF`
/// into identity attributes. `by_id_names` is the listing of `/dev/disk/by-id`.
pub fn identity_from_serial(raw: &str, by_id_names: &[String]) -> DiskIdentity {
    let mut identity = DiskIdentity::default();
    let raw = raw.trim().replace(' ', "_");
    if raw.is_empty() {
        return identity;
    }

    let tokens: Vec<&str> = raw.split('_').collect();
    if tokens.len() == 1 {
        identity.serial_number = raw.clone();
        return identity;
    }

    identity.serial_number = tokens
        .iter()
        .rev()
        .take(3)
        .find(|token| token.len() >= 5)
        .or_else(|| tokens.last())
        .map(|token| token.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());

    identity.model = tokens[..tokens.len() - 1].join(" ");

    identity.intf = by_id_names
        .iter()
        .find(|name| name.contains(&raw))
        .and_then(|name| name.split('-').next())
        .filter(|prefix| KNOWN_INTERFACES.contains(prefix))
        .map(ToString::to_string)
        .unwrap_or_else(|| UNKNOWN.to_string());

    identity.medium = if KNOWN_MEDIA.contains(&tokens[1]) {
        tokens[1].to_string()
    } else if identity.model.contains("NVME") || identity.model.contains("nvme") {
        "NVME".to_string()
    } else if identity.model.contains("SSD") || identity.model.contains("ssd") {
        "SSD".to_string()
    } else {
        identity.intf.clone()
    };

    identity
}

/// Reads attributes from procfs, udev and `/dev/disk/by-id`
pub struct SysDiskProbe {
    proc_partitions: PathBuf,
    by_id_dir: PathBuf,
    links: Arc<dyn SymlinkResolver>,
    properties: Arc<dyn DeviceProperties>,
}

impl SysDiskProbe {
    pub fn new(links: Arc<dyn SymlinkResolver>, properties: Arc<dyn DeviceProperties>) -> Self {
        Self {
            proc_partitions: PathBuf::from("/proc/partitions"),
            by_id_dir: PathBuf::from(DEFAULT_BY_ID_DIR),
            links,
            properties,
        }
    }

    pub fn with_proc_partitions(mut self, path: impl Into<PathBuf>) -> Self {
        self.proc_partitions = path.into();
        self
    }

    pub fn with_by_id_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.by_id_dir = path.into();
        self
    }

    fn partitions(&self) -> Vec<PartitionEntry> {
        Vec::<PartitionEntry>::from_file(&self.proc_partitions)
            .map_err(|err| debug!(path = %self.proc_partitions.display(), "unreadable: {err}"))
            .unwrap_or_default()
    }
}

impl DiskProbe for SysDiskProbe {
    fn size(&self, device: &str) -> String {
        let partitions = self.partitions();
        find_partition(&partitions, device.trim_start_matches("/dev/"))
            .map(|entry| bytes_to_pretty(&entry.blocks.saturating_mul(1024), false))
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    fn identity(&self, device: &str) -> DiskIdentity {
        let device = device.trim_start_matches("/dev/");
        let Some(raw) = self.properties.property(device, "ID_SERIAL") else {
            debug!(device, "no udev serial");
            return DiskIdentity::default();
        };

        let by_id_names = self.links.list_links(&self.by_id_dir).unwrap_or_default();
        identity_from_serial(&raw, &by_id_names)
    }
}
