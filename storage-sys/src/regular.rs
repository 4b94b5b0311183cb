// SPDX-License-Identifier: GPL-3.0-only

//! Plain disks attached without any RAID layer
//!
//! Whatever `/sys/block` lists that no other layer has claimed is reported
//! under the motherboard controller.

use std::path::Path;

use storage_types::{
    Controller, Inventory, MOTHERBOARD_CONTROLLER_ID, PhysicalDisk, RaidVolume,
    SubsystemInventory,
};
use tracing::{debug, info};

use crate::Result;
use crate::link::SymlinkResolver;
use crate::probe::DiskProbe;

pub const DEFAULT_SYS_BLOCK_DIR: &str = "/sys/block";

/// Virtual and optical device families that never count as disks.
const VIRTUAL_PREFIXES: &[&str] = &["dm-", "mtdblock", "nbd", "loop", "ram", "md", "sr", "zd"];

/// `true` for names such as `loop3` or `dm-0`.
pub fn is_virtual_device(name: &str) -> bool {
    VIRTUAL_PREFIXES.iter().any(|prefix| {
        name.strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
    })
}

/// Block devices under `sys_block_dir` that are neither virtual nor already
/// owned by a record in `inventory`.
pub fn unclaimed_disks(
    links: &dyn SymlinkResolver,
    sys_block_dir: &Path,
    inventory: &Inventory,
) -> Result<Vec<String>> {
    let owned = inventory.owned_devices();
    let names = links.list_links(sys_block_dir)?;
    Ok(names
        .into_iter()
        .filter(|name| !is_virtual_device(name))
        .filter(|name| {
            let claimed = owned.contains(name);
            if claimed {
                debug!(device = %name, "already reported by another layer");
            }
            !claimed
        })
        .collect())
}

/// Report unclaimed disks under `motherBoard-0`. `Ok(None)` when every disk
/// is already accounted for.
pub fn discover_regular_disks(
    links: &dyn SymlinkResolver,
    probe: &dyn DiskProbe,
    sys_block_dir: &Path,
    inventory: &Inventory,
) -> Result<Option<SubsystemInventory>> {
    let disks = unclaimed_disks(links, sys_block_dir, inventory)?;
    if disks.is_empty() {
        return Ok(None);
    }

    let mut raid = RaidVolume::new(MOTHERBOARD_CONTROLLER_ID, "");
    raid.state = "Good".to_string();
    for device in &disks {
        let identity = probe.identity(device);
        raid.add_disk(PhysicalDisk {
            state: "ONLINE".to_string(),
            size: probe.size(device),
            intf: identity.intf,
            medium: identity.medium,
            model: identity.model,
            serial_number: identity.serial_number,
            ..PhysicalDisk::new(MOTHERBOARD_CONTROLLER_ID, "", device.as_str())
        });
    }
    info!(disks = disks.len(), "plain disks detected");

    let mut found = SubsystemInventory::new();
    found.controllers.push(Controller::new(
        MOTHERBOARD_CONTROLLER_ID,
        "motherboard",
        "MOTHERBOARD",
    ));
    found.raids.push(raid);
    Ok(Some(found))
}
