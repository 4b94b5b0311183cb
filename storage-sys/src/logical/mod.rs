// SPDX-License-Identifier: GPL-3.0-only

//! Overlay subsystem collectors (software RAID, ZFS, Btrfs, LVM)
//!
//! Each collector turns its tool output into a [`SubsystemInventory`]
//! reported under the subsystem's fixed controller id. Unrecognised lines
//! are skipped.

pub mod btrfs_tools;
pub mod lvm_tools;
pub mod mdadm_tools;
pub mod zfs_tools;

use std::path::PathBuf;

use storage_types::{PhysicalDisk, Subsystem, SubsystemInventory};
use tracing::{error, info};

use crate::Result;
use crate::exec::CommandRunner;
use crate::probe::DiskProbe;

/// Collaborators shared by the collectors
pub struct CollectorContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub probe: &'a dyn DiskProbe,
    pub mdstat: PathBuf,
}

impl<'a> CollectorContext<'a> {
    pub fn new(runner: &'a dyn CommandRunner, probe: &'a dyn DiskProbe) -> Self {
        Self {
            runner,
            probe,
            mdstat: PathBuf::from("/proc/mdstat"),
        }
    }

    /// Member disk record with size and identity probed from the OS.
    pub fn probed_disk(&self, subsystem: Subsystem, dg: &str, os_device: &str, state: &str) -> PhysicalDisk {
        let identity = self.probe.identity(os_device);
        PhysicalDisk {
            state: state.to_string(),
            size: self.probe.size(os_device),
            intf: identity.intf,
            medium: identity.medium,
            model: identity.model,
            serial_number: identity.serial_number,
            ..PhysicalDisk::new(subsystem.controller_id(), dg, os_device)
        }
    }
}

/// Run one subsystem's collector. `Ok(None)` means the subsystem is not in use.
pub fn discover_subsystem(
    subsystem: Subsystem,
    ctx: &CollectorContext<'_>,
) -> Result<Option<SubsystemInventory>> {
    match subsystem {
        Subsystem::SoftRaid => mdadm_tools::discover_softraid(ctx),
        Subsystem::Zfs => zfs_tools::discover_zfs(ctx),
        Subsystem::Btrfs => btrfs_tools::discover_btrfs(ctx),
        Subsystem::Lvm => lvm_tools::discover_lvm(ctx),
    }
}

/// Run the enabled collectors in order; a failing collector is logged and
/// does not stop the others.
pub fn discover_overlay_subsystems(
    enabled: &[Subsystem],
    ctx: &CollectorContext<'_>,
) -> Vec<(Subsystem, SubsystemInventory)> {
    let mut found = Vec::new();
    for subsystem in Subsystem::ALL {
        if !enabled.contains(&subsystem) {
            continue;
        }
        match discover_subsystem(subsystem, ctx) {
            Ok(Some(inventory)) => {
                info!(%subsystem, volumes = inventory.raids.len(), "detected");
                found.push((subsystem, inventory));
            }
            Ok(None) => info!(%subsystem, "not present"),
            Err(err) => error!(%subsystem, "collector failed: {err}"),
        }
    }
    found
}

/// Digits of an LVM/btrfs byte count such as `4000787030016B`.
pub(crate) fn parse_byte_count(value: &str) -> Option<u64> {
    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}
