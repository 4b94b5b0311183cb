// SPDX-License-Identifier: GPL-3.0-only

//! Hardware RAID records handed over by the vendor parsers
//!
//! A manifest carries controllers, their volumes and their passthrough disks
//! as the vendor tools report them. Loading it resolves every volume and
//! passthrough disk to its kernel device name.

use std::path::Path;

use serde::{Deserialize, Serialize};
use storage_types::{
    BOGUS_DISK, Controller, ControllerStatus, HardwareVendor, PhysicalDisk, RaidVolume,
    SubsystemInventory, UNKNOWN, UnassignedDisk,
};
use tracing::{debug, error, info};

use crate::Result;
use crate::error::{ResolveError, SysError};
use crate::resolve::OsDeviceResolver;

fn unknown() -> String {
    UNKNOWN.to_string()
}

/// Every controller reported by one run of the vendor parsers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareManifest {
    #[serde(default)]
    pub controllers: Vec<ManifestController>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestController {
    /// Inventory id such as `mega-0`
    pub id: String,

    /// Tool family (`mega`, `perc`, `sas2ircu`, `adaptec`)
    pub manufacturer: String,

    pub model: String,

    #[serde(default)]
    pub status: ControllerStatus,

    #[serde(default)]
    pub volumes: Vec<ManifestVolume>,

    #[serde(default)]
    pub jbod_disks: Vec<ManifestDisk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestVolume {
    pub dg: String,

    /// Identifier handed to the resolver; `dg` when absent
    #[serde(default)]
    pub native_id: Option<String>,

    #[serde(default)]
    pub raid_level: u8,

    #[serde(default = "unknown")]
    pub raid_type: String,

    #[serde(default = "unknown")]
    pub state: String,

    #[serde(default = "unknown")]
    pub size: String,

    #[serde(default)]
    pub disks: Vec<ManifestDisk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDisk {
    #[serde(default)]
    pub eid_slot: String,

    #[serde(default = "unknown")]
    pub state: String,

    #[serde(default = "unknown")]
    pub size: String,

    #[serde(default = "unknown")]
    pub intf: String,

    #[serde(default = "unknown")]
    pub medium: String,

    #[serde(default = "unknown")]
    pub model: String,

    #[serde(default = "unknown")]
    pub serial_number: String,
}

impl ManifestDisk {
    fn to_disk(&self, controller_id: &str, dg: &str) -> PhysicalDisk {
        PhysicalDisk {
            eid_slot: self.eid_slot.clone(),
            state: self.state.clone(),
            size: self.size.clone(),
            intf: self.intf.clone(),
            medium: self.medium.clone(),
            model: self.model.clone(),
            serial_number: self.serial_number.clone(),
            ..PhysicalDisk::new(controller_id, dg, "")
        }
    }
}

impl HardwareManifest {
    pub fn from_json(path: &Path, contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|err| SysError::Manifest {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|err| SysError::Manifest {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Self::from_json(path, &contents)
    }

    /// Resolve every controller. A resolution failure only affects the
    /// controller it happened on.
    pub fn resolve(&self, resolver: &OsDeviceResolver) -> SubsystemInventory {
        let mut inventory = SubsystemInventory::new();
        for controller in &self.controllers {
            inventory.merge(resolve_controller(controller, resolver));
        }
        inventory
    }
}

/// Walks one controller's records, stopping resolution at the first failure.
struct ControllerResolution<'a> {
    resolver: &'a OsDeviceResolver,
    controller: Controller,
    fetch_serials: bool,
    failed: bool,
}

impl ControllerResolution<'_> {
    fn attempt<F>(&mut self, what: &str, resolve: F) -> String
    where
        F: FnOnce(&OsDeviceResolver) -> std::result::Result<String, ResolveError>,
    {
        if self.failed {
            return ResolveError::fallback_device();
        }
        match resolve(self.resolver) {
            Ok(value) => value,
            Err(err) => {
                error!(controller = %self.controller.id, "{what}: {err}");
                self.controller.mark_bad();
                self.failed = true;
                ResolveError::fallback_device()
            }
        }
    }

    fn fill_serial(&mut self, disk: &mut PhysicalDisk) {
        if !self.fetch_serials || disk.serial_number != UNKNOWN || disk.eid_slot.is_empty() {
            return;
        }
        let manufacturer = self.controller.manufacturer.clone();
        let id = self.controller.id.clone();
        let eid_slot = disk.eid_slot.clone();
        disk.serial_number = self.attempt("reading drive serial number", |resolver| {
            resolver.drive_serial_number(&manufacturer, &id, &eid_slot)
        });
    }
}

fn resolve_controller(record: &ManifestController, resolver: &OsDeviceResolver) -> SubsystemInventory {
    let mut controller = Controller::new(&record.id, &record.manufacturer, &record.model);
    controller.status = record.status;
    let fetch_serials = matches!(
        record.manufacturer.parse::<HardwareVendor>(),
        Ok(HardwareVendor::Mega | HardwareVendor::Perc)
    );
    let mut walk = ControllerResolution {
        resolver,
        controller,
        fetch_serials,
        failed: false,
    };
    let mut inventory = SubsystemInventory::new();

    for volume in &record.volumes {
        let mut raid = RaidVolume::new(&record.id, &volume.dg);
        raid.raid_level = volume.raid_level;
        raid.raid_type = volume.raid_type.clone();
        raid.state = volume.state.clone();
        raid.size = volume.size.clone();

        // Legs of a nested RAID have no device of their own.
        if volume.raid_level == 0 {
            let native_id = volume.native_id.as_deref().unwrap_or(&volume.dg);
            raid.os_device = walk.attempt("resolving RAID volume device", |resolver| {
                resolver.resolve_raid_volume_device(&record.manufacturer, &record.id, native_id)
            });
        }

        for member in &volume.disks {
            let mut disk = member.to_disk(&record.id, &volume.dg);
            walk.fill_serial(&mut disk);
            raid.add_disk(disk);
        }
        debug!(controller = %record.id, dg = %raid.dg, os_device = %raid.os_device, "hardware volume");
        inventory.raids.push(raid);
    }

    for jbod in &record.jbod_disks {
        let mut disk = jbod.to_disk(&record.id, "");
        walk.fill_serial(&mut disk);
        disk.os_device = walk.attempt("resolving passthrough disk device", |resolver| {
            resolver.resolve_jbod_disk_device(&record.manufacturer, &record.id, &jbod.eid_slot)
        });
        if disk.os_device == BOGUS_DISK {
            disk.state = "BogusDisk".to_string();
        }
        inventory.unassigned.push(UnassignedDisk::new(disk));
    }

    info!(
        controller = %record.id,
        volumes = inventory.raids.len(),
        jbods = inventory.unassigned.len(),
        status = %walk.controller.status,
        "hardware controller"
    );
    inventory.controllers.push(walk.controller);
    inventory
}
