// SPDX-License-Identifier: GPL-3.0-only

//! RAID volumes and the groupings that own them

use serde::{Deserialize, Serialize};

use crate::common::UNKNOWN;
use crate::disk::PhysicalDisk;
use crate::subsystem::Consumers;

/// A RAID volume or equivalent (mdadm array, ZFS vdev, Btrfs filesystem, LVM LV)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RaidVolume {
    pub controller_id: String,

    /// Nesting depth: 0 for top-level volumes, 1 for legs of a nested RAID
    pub raid_level: u8,

    /// Controller-local volume/group identifier
    pub dg: String,

    pub raid_type: String,

    pub state: String,

    pub size: String,

    pub disks: Vec<PhysicalDisk>,

    /// Kernel device for the whole volume; empty when not independently addressable
    pub os_device: String,

    /// Overlay subsystems built directly on this volume's device
    #[serde(default)]
    pub consumers: Consumers,
}

impl RaidVolume {
    pub fn new(controller_id: impl Into<String>, dg: impl Into<String>) -> Self {
        Self {
            controller_id: controller_id.into(),
            raid_level: 0,
            dg: dg.into(),
            raid_type: UNKNOWN.to_string(),
            state: UNKNOWN.to_string(),
            size: UNKNOWN.to_string(),
            disks: Vec::new(),
            os_device: String::new(),
            consumers: Consumers::new(),
        }
    }

    pub fn add_disk(&mut self, disk: PhysicalDisk) {
        self.disks.push(disk);
    }

    /// Legacy rendering, e.g. `sdc LVM`.
    pub fn os_device_label(&self) -> String {
        self.consumers.render(&self.os_device)
    }
}

/// ZFS pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pool {
    pub controller_id: String,

    pub name: String,

    pub state: String,

    pub size: String,

    /// Mount point (e.g., "/tank")
    pub os_device: String,
}

/// LVM volume group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeGroup {
    pub controller_id: String,

    pub name: String,

    pub state: String,

    pub size: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystem::Subsystem;

    #[test]
    fn label_without_consumers_is_the_device() {
        let mut raid = RaidVolume::new("mega-0", "0");
        raid.os_device = "sdc".to_string();
        assert_eq!(raid.os_device_label(), "sdc");

        raid.consumers.insert(Subsystem::Lvm);
        raid.consumers.insert(Subsystem::Lvm);
        assert_eq!(raid.os_device_label(), "sdc LVM");
    }

    #[test]
    fn add_disk_keeps_order() {
        let mut raid = RaidVolume::new("softraid-0", "md0");
        raid.add_disk(PhysicalDisk::new("softraid-0", "md0", "sda1"));
        raid.add_disk(PhysicalDisk::new("softraid-0", "md0", "sdb1"));
        let names: Vec<_> = raid.disks.iter().map(|d| d.os_device.as_str()).collect();
        assert_eq!(names, ["sda1", "sdb1"]);
    }
}
