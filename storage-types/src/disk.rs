// SPDX-License-Identifier: GPL-3.0-only

//! Physical and passthrough disk models
//!
//! Every layer reports its disks with the same shape. Attributes a layer
//! cannot see are recorded as [`UNKNOWN`] and filled in by correlation.

use serde::{Deserialize, Serialize};

use crate::common::{JBOD_PREFIX, UNKNOWN};
use crate::subsystem::Consumers;

/// A disk as seen by one layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhysicalDisk {
    /// Owning controller id (e.g., "mega-0", "zfs-0")
    pub controller_id: String,

    /// Controller-local group the disk belongs to (empty for JBOD disks)
    pub dg: String,

    /// Enclosure:slot coordinate (empty for disks not addressed that way)
    pub eid_slot: String,

    pub state: String,

    /// Human-readable size
    pub size: String,

    /// Interface (e.g., "SAS", "ata", "nvme")
    pub intf: String,

    /// Medium (e.g., "HDD", "SSD")
    pub medium: String,

    pub model: String,

    pub serial_number: String,

    /// Kernel device name (e.g., "sdb3"); empty for members hidden by a hardware RAID
    pub os_device: String,
}

impl PhysicalDisk {
    /// Disk with every attribute unknown.
    pub fn new(controller_id: impl Into<String>, dg: impl Into<String>, os_device: impl Into<String>) -> Self {
        Self {
            controller_id: controller_id.into(),
            dg: dg.into(),
            eid_slot: String::new(),
            state: UNKNOWN.to_string(),
            size: UNKNOWN.to_string(),
            intf: UNKNOWN.to_string(),
            medium: UNKNOWN.to_string(),
            model: UNKNOWN.to_string(),
            serial_number: UNKNOWN.to_string(),
            os_device: os_device.into(),
        }
    }

    /// Any of model, interface, medium or serial number still unknown.
    pub fn has_unknown_attributes(&self) -> bool {
        [&self.model, &self.intf, &self.medium, &self.serial_number]
            .into_iter()
            .any(|value| value == UNKNOWN)
    }

    /// Any of model, interface, medium or serial number known.
    pub fn has_known_attributes(&self) -> bool {
        [&self.model, &self.intf, &self.medium, &self.serial_number]
            .into_iter()
            .any(|value| value != UNKNOWN)
    }

    /// Take model, interface and medium from the layer that owns the hardware.
    pub fn copy_hardware_attributes(&mut self, from: &PhysicalDisk) {
        self.model = from.model.clone();
        self.intf = from.intf.clone();
        self.medium = from.medium.clone();
    }

    /// Point every attribute at the volume that really holds them.
    pub fn refer_attributes_to(&mut self, volume_label: &str) {
        let note = format!("Check {} disks.", volume_label.to_uppercase());
        self.model = note.clone();
        self.intf = note.clone();
        self.medium = note.clone();
        self.serial_number = note;
    }

    /// Fill every unknown attribute from `from`; returns whether anything changed.
    pub fn backfill_from(&mut self, from: &PhysicalDisk) -> bool {
        let mut changed = false;
        for (target, source) in [
            (&mut self.model, &from.model),
            (&mut self.intf, &from.intf),
            (&mut self.medium, &from.medium),
            (&mut self.serial_number, &from.serial_number),
        ] {
            if target == UNKNOWN && source != UNKNOWN {
                target.clone_from(source);
                changed = true;
            }
        }
        changed
    }

    /// Whether `from` could fill at least one of this disk's unknown attributes.
    pub fn can_backfill_from(&self, from: &PhysicalDisk) -> bool {
        [
            (&self.model, &from.model),
            (&self.intf, &from.intf),
            (&self.medium, &from.medium),
            (&self.serial_number, &from.serial_number),
        ]
        .into_iter()
        .any(|(target, source)| target == UNKNOWN && source != UNKNOWN)
    }
}

/// A passthrough disk not assigned to any RAID volume
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnassignedDisk {
    /// `os_device` holds the bare kernel name; see [`UnassignedDisk::os_device_label`]
    #[serde(flatten)]
    pub disk: PhysicalDisk,

    /// Overlay subsystems built on this disk
    #[serde(default)]
    pub consumers: Consumers,
}

impl UnassignedDisk {
    pub fn new(disk: PhysicalDisk) -> Self {
        Self {
            disk,
            consumers: Consumers::new(),
        }
    }

    /// Legacy rendering, e.g. `JBOD-sdb ZFS Btrfs`.
    pub fn os_device_label(&self) -> String {
        self.consumers
            .render(&format!("{JBOD_PREFIX}{}", self.disk.os_device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystem::Subsystem;

    fn probed(os_device: &str) -> PhysicalDisk {
        PhysicalDisk {
            intf: "SAS".to_string(),
            medium: "HDD".to_string(),
            model: "HUS726T4TAL".to_string(),
            serial_number: "V6G1ABCD".to_string(),
            ..PhysicalDisk::new("mega-0", "", os_device)
        }
    }

    #[test]
    fn new_disk_is_fully_unknown() {
        let disk = PhysicalDisk::new("zfs-0", "tank", "sdb3");
        assert!(disk.has_unknown_attributes());
        assert!(!disk.has_known_attributes());
        assert_eq!(disk.eid_slot, "");
    }

    #[test]
    fn backfill_only_touches_unknown_fields() {
        let mut disk = PhysicalDisk::new("lvm-0", "vg0", "sdb1");
        disk.model = "Custom".to_string();

        assert!(disk.can_backfill_from(&probed("sdb")));
        assert!(disk.backfill_from(&probed("sdb")));
        assert_eq!(disk.model, "Custom");
        assert_eq!(disk.intf, "SAS");
        assert_eq!(disk.serial_number, "V6G1ABCD");
        assert!(!disk.backfill_from(&probed("sdb")));
    }

    #[test]
    fn refer_attributes_uppercases_label() {
        let mut disk = PhysicalDisk::new("lvm-0", "vg0", "sdc");
        disk.refer_attributes_to("sdc LVM");
        assert_eq!(disk.model, "Check SDC LVM disks.");
        assert_eq!(disk.intf, "Check SDC LVM disks.");
        assert_eq!(disk.medium, "Check SDC LVM disks.");
        assert_eq!(disk.serial_number, "Check SDC LVM disks.");
    }

    #[test]
    fn unassigned_label_renders_consumers() {
        let mut jbod = UnassignedDisk::new(probed("sdb"));
        assert_eq!(jbod.os_device_label(), "JBOD-sdb");
        jbod.consumers.insert(Subsystem::Zfs);
        jbod.consumers.insert(Subsystem::Btrfs);
        assert_eq!(jbod.os_device_label(), "JBOD-sdb ZFS Btrfs");
    }

    #[test]
    fn unassigned_disk_serializes_flat() {
        let mut jbod = UnassignedDisk::new(probed("sdb"));
        jbod.consumers.insert(Subsystem::Lvm);
        let json = serde_json::to_value(&jbod).unwrap();
        assert_eq!(json["os_device"], "sdb");
        assert_eq!(json["consumers"][0], "LVM");

        let back: UnassignedDisk = serde_json::from_value(json).unwrap();
        assert_eq!(back, jbod);
    }
}
