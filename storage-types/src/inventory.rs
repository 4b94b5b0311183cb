// SPDX-License-Identifier: GPL-3.0-only

//! The owned inventory of one run
//!
//! Records live in plain vectors and are addressed by index, so every
//! correlation write names exactly which record it touches.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::common::is_matchable_device;
use crate::controller::{Controller, ControllerKind};
use crate::disk::{PhysicalDisk, UnassignedDisk};
use crate::raid::{Pool, RaidVolume, VolumeGroup};

/// Everything discovered in one run, or by one subsystem collector
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Inventory {
    pub controllers: Vec<Controller>,

    pub pools: Vec<Pool>,

    pub volume_groups: Vec<VolumeGroup>,

    pub raids: Vec<RaidVolume>,

    /// Passthrough (JBOD) disks
    pub unassigned: Vec<UnassignedDisk>,
}

/// Partial inventory produced by a single collector before merging.
pub type SubsystemInventory = Inventory;

/// Handle to one disk record inside an [`Inventory`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiskRef {
    /// `raids[raid].disks[disk]`
    Member { raid: usize, disk: usize },
    /// `unassigned[index]`
    Unassigned(usize),
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
            && self.pools.is_empty()
            && self.volume_groups.is_empty()
            && self.raids.is_empty()
            && self.unassigned.is_empty()
    }

    /// Append another collector's records.
    pub fn merge(&mut self, other: Inventory) {
        self.controllers.extend(other.controllers);
        self.pools.extend(other.pools);
        self.volume_groups.extend(other.volume_groups);
        self.raids.extend(other.raids);
        self.unassigned.extend(other.unassigned);
    }

    pub fn controller(&self, id: &str) -> Option<&Controller> {
        self.controllers.iter().find(|controller| controller.id == id)
    }

    pub fn controller_mut(&mut self, id: &str) -> Option<&mut Controller> {
        self.controllers
            .iter_mut()
            .find(|controller| controller.id == id)
    }

    /// Indices of the RAID volumes whose controller is of the given kind.
    pub fn raid_indices<F>(&self, mut filter: F) -> Vec<usize>
    where
        F: FnMut(ControllerKind) -> bool,
    {
        self.raids
            .iter()
            .enumerate()
            .filter(|(_, raid)| {
                ControllerKind::from_controller_id(&raid.controller_id).is_some_and(&mut filter)
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Every disk record: RAID members first, then passthrough disks.
    pub fn disk_refs(&self) -> Vec<DiskRef> {
        let members = self.raids.iter().enumerate().flat_map(|(raid, volume)| {
            (0..volume.disks.len()).map(move |disk| DiskRef::Member { raid, disk })
        });
        let unassigned = (0..self.unassigned.len()).map(DiskRef::Unassigned);
        members.chain(unassigned).collect()
    }

    pub fn disk(&self, disk_ref: DiskRef) -> Option<&PhysicalDisk> {
        match disk_ref {
            DiskRef::Member { raid, disk } => self.raids.get(raid)?.disks.get(disk),
            DiskRef::Unassigned(index) => self.unassigned.get(index).map(|jbod| &jbod.disk),
        }
    }

    pub fn disk_mut(&mut self, disk_ref: DiskRef) -> Option<&mut PhysicalDisk> {
        match disk_ref {
            DiskRef::Member { raid, disk } => self.raids.get_mut(raid)?.disks.get_mut(disk),
            DiskRef::Unassigned(index) => self
                .unassigned
                .get_mut(index)
                .map(|jbod| &mut jbod.disk),
        }
    }

    pub fn disk_count(&self) -> usize {
        self.raids.iter().map(|raid| raid.disks.len()).sum::<usize>() + self.unassigned.len()
    }

    /// Kernel device names already claimed by a volume, a member or a passthrough disk.
    pub fn owned_devices(&self) -> BTreeSet<String> {
        let volumes = self.raids.iter().map(|raid| raid.os_device.as_str());
        let members = self
            .raids
            .iter()
            .flat_map(|raid| raid.disks.iter().map(|disk| disk.os_device.as_str()));
        let jbods = self.unassigned.iter().map(|jbod| jbod.disk.os_device.as_str());

        volumes
            .chain(members)
            .chain(jbods)
            .map(|name| name.trim().trim_start_matches("/dev/"))
            .filter(|name| is_matchable_device(name))
            .map(ToString::to_string)
            .collect()
    }
}
