// SPDX-License-Identifier: GPL-3.0-only

//! Cross-layer disk correlation
//!
//! Each layer names the same physical disk in its own way. The engine runs
//! fixed passes over one [`Inventory`]:
//!
//! 1. overlay disks against passthrough (JBOD) disks,
//! 2. overlay disks against software RAID arrays,
//! 3. overlay disks against hardware RAID volumes,
//! 4. a final attribute backfill between disks sharing a base device.
//!
//! Passes 1 to 3 run once per overlay subsystem as it is collected, pass 4
//! once at the end. Every pass first gathers its matches by index and then
//! writes them, so a pass never reads its own output. Two devices match when
//! their [`base_device`] names are equal.

use storage_types::{
    ControllerKind, DiskRef, Inventory, PhysicalDisk, Subsystem, base_device, is_matchable_device,
};
use tracing::{debug, info};

/// `(raid, disk)` position of an overlay member disk.
type MemberIndex = (usize, usize);

/// Reconciles disk identity across layers of one inventory
#[derive(Debug, Default, Clone, Copy)]
pub struct CorrelationEngine;

impl CorrelationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Passes 1 to 3 for the overlay reported under `controller_id`.
    pub fn correlate_overlay(&self, inventory: &mut Inventory, controller_id: &str) {
        let jbods = self.reconcile_jbod_disks(inventory, controller_id);
        let arrays = self.reconcile_softraid_volumes(inventory, controller_id);
        let volumes = self.reconcile_hardware_volumes(inventory, controller_id);
        info!(
            controller = controller_id,
            jbods, arrays, volumes, "overlay correlated"
        );
    }

    /// Pass 1: mark passthrough disks consumed by the overlay and copy their
    /// hardware attributes down onto the overlay's member records.
    pub fn reconcile_jbod_disks(&self, inventory: &mut Inventory, controller_id: &str) -> usize {
        let Some(subsystem) = Subsystem::from_controller_id(controller_id) else {
            debug!(controller = controller_id, "not an overlay subsystem, skipping JBOD pass");
            return 0;
        };

        let mut matches: Vec<(MemberIndex, usize)> = Vec::new();
        for member in overlay_members(inventory, subsystem) {
            let Some(base) = member_base(inventory, member) else {
                continue;
            };
            let found = inventory.unassigned.iter().position(|jbod| {
                is_matchable_device(&jbod.disk.os_device) && base_device(&jbod.disk.os_device) == base
            });
            if let Some(jbod) = found {
                matches.push((member, jbod));
            }
        }

        for &((raid, disk), jbod) in &matches {
            let source = &mut inventory.unassigned[jbod];
            source.consumers.insert(subsystem);
            let target = &mut inventory.raids[raid].disks[disk];
            target.copy_hardware_attributes(&source.disk);
            debug!(
                %subsystem,
                member = %target.os_device,
                jbod = %source.os_device_label(),
                "overlay member is a passthrough disk"
            );
        }
        matches.len()
    }

    /// Pass 2: overlays built on a software RAID array.
    pub fn reconcile_softraid_volumes(&self, inventory: &mut Inventory, controller_id: &str) -> usize {
        self.reconcile_volumes(inventory, controller_id, |kind, _| {
            kind == ControllerKind::Overlay(Subsystem::SoftRaid)
        })
    }

    /// Pass 3: overlays built directly on a hardware RAID volume.
    pub fn reconcile_hardware_volumes(&self, inventory: &mut Inventory, controller_id: &str) -> usize {
        self.reconcile_volumes(inventory, controller_id, |kind, raid_level| {
            matches!(kind, ControllerKind::Hardware(_)) && raid_level == 0
        })
    }

    /// Shared body of passes 2 and 3. The volume gains the overlay as a
    /// consumer; the overlay's member record points at the volume's disks.
    fn reconcile_volumes<F>(&self, inventory: &mut Inventory, controller_id: &str, is_target: F) -> usize
    where
        F: Fn(ControllerKind, u8) -> bool,
    {
        // Software RAID members only ever sit on raw devices.
        let subsystem = match Subsystem::from_controller_id(controller_id) {
            Some(subsystem @ (Subsystem::Zfs | Subsystem::Btrfs | Subsystem::Lvm)) => subsystem,
            _ => {
                debug!(controller = controller_id, "no volume pass for this controller");
                return 0;
            }
        };

        let targets: Vec<usize> = inventory
            .raids
            .iter()
            .enumerate()
            .filter(|(_, raid)| {
                ControllerKind::from_controller_id(&raid.controller_id)
                    .is_some_and(|kind| is_target(kind, raid.raid_level))
                    && is_matchable_device(&raid.os_device)
            })
            .map(|(index, _)| index)
            .collect();
        if targets.is_empty() {
            return 0;
        }

        let mut matches: Vec<(MemberIndex, usize)> = Vec::new();
        for member in overlay_members(inventory, subsystem) {
            let Some(base) = member_base(inventory, member) else {
                continue;
            };
            let found = targets
                .iter()
                .copied()
                .find(|&target| base_device(&inventory.raids[target].os_device) == base);
            if let Some(target) = found {
                matches.push((member, target));
            }
        }

        for &((raid, disk), target) in &matches {
            inventory.raids[target].consumers.insert(subsystem);
            let label = inventory.raids[target].os_device_label();
            let member = &mut inventory.raids[raid].disks[disk];
            member.refer_attributes_to(&label);
            debug!(%subsystem, member = %member.os_device, volume = %label, "overlay member is a volume");
        }
        matches.len()
    }

    /// Pass 4: fill attributes still unknown from another disk with the same
    /// base device. Sources are read before anything is written.
    pub fn backfill_attributes(&self, inventory: &mut Inventory) -> usize {
        let refs = inventory.disk_refs();
        let mut plan: Vec<(DiskRef, PhysicalDisk)> = Vec::new();

        for &target in &refs {
            let Some(disk) = inventory.disk(target) else {
                continue;
            };
            if !disk.has_unknown_attributes() || !is_matchable_device(&disk.os_device) {
                continue;
            }
            let base = base_device(&disk.os_device);
            let source = refs
                .iter()
                .copied()
                .filter(|&candidate| candidate != target)
                .filter_map(|candidate| inventory.disk(candidate))
                .find(|other| {
                    is_matchable_device(&other.os_device)
                        && base_device(&other.os_device) == base
                        && disk.can_backfill_from(other)
                });
            if let Some(source) = source {
                plan.push((target, source.clone()));
            }
        }

        let mut filled = 0;
        for (target, source) in plan {
            if let Some(disk) = inventory.disk_mut(target)
                && disk.backfill_from(&source)
            {
                debug!(disk = %disk.os_device, from = %source.os_device, "attributes backfilled");
                filled += 1;
            }
        }
        info!(filled, "attribute backfill done");
        filled
    }
}

/// Member disks of every volume reported under `subsystem`.
fn overlay_members(inventory: &Inventory, subsystem: Subsystem) -> Vec<MemberIndex> {
    inventory
        .raid_indices(|kind| kind == ControllerKind::Overlay(subsystem))
        .into_iter()
        .flat_map(|raid| (0..inventory.raids[raid].disks.len()).map(move |disk| (raid, disk)))
        .collect()
}

fn member_base(inventory: &Inventory, (raid, disk): MemberIndex) -> Option<&str> {
    let os_device = &inventory.raids[raid].disks[disk].os_device;
    is_matchable_device(os_device).then(|| base_device(os_device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_types::{Controller, RaidVolume, UNKNOWN, UnassignedDisk};

    fn hardware_disk(controller_id: &str, os_device: &str, serial: &str) -> PhysicalDisk {
        PhysicalDisk {
            state: "JBOD".to_string(),
            intf: "SAS".to_string(),
            medium: "HDD".to_string(),
            model: "HUS726T4TAL".to_string(),
            serial_number: serial.to_string(),
            ..PhysicalDisk::new(controller_id, "", os_device)
        }
    }

    fn overlay(subsystem: Subsystem, dg: &str, members: &[&str]) -> RaidVolume {
        let mut raid = RaidVolume::new(subsystem.controller_id(), dg);
        for member in members {
            raid.add_disk(PhysicalDisk::new(subsystem.controller_id(), dg, *member));
        }
        raid
    }

    fn with_jbod(os_device: &str) -> Inventory {
        let mut inventory = Inventory::new();
        inventory.controllers.push(Controller::new("mega-0", "mega", "PERC H730P"));
        inventory
            .unassigned
            .push(UnassignedDisk::new(hardware_disk("mega-0", os_device, "V6G1ABCD")));
        inventory
    }

    #[test]
    fn jbod_pass_annotates_and_enriches() {
        let mut inventory = with_jbod("sdb");
        inventory.raids.push(overlay(Subsystem::Zfs, "tank", &["sdb3", "sdc"]));

        let engine = CorrelationEngine::new();
        assert_eq!(engine.reconcile_jbod_disks(&mut inventory, "zfs-0"), 1);

        assert_eq!(inventory.unassigned[0].os_device_label(), "JBOD-sdb ZFS");
        let member = &inventory.raids[0].disks[0];
        assert_eq!(member.model, "HUS726T4TAL");
        assert_eq!(member.intf, "SAS");
        assert_eq!(member.medium, "HDD");
        assert_eq!(member.serial_number, UNKNOWN);
        assert_eq!(member.os_device, "sdb3");
        assert!(inventory.raids[0].disks[1].has_unknown_attributes());
    }

    #[test]
    fn jbod_pass_is_idempotent() {
        let mut inventory = with_jbod("sdb");
        inventory.raids.push(overlay(Subsystem::Btrfs, "uuid", &["sdb1"]));

        let engine = CorrelationEngine::new();
        engine.reconcile_jbod_disks(&mut inventory, "btrfs-0");
        let once = inventory.clone();
        engine.reconcile_jbod_disks(&mut inventory, "btrfs-0");

        assert_eq!(inventory, once);
        assert_eq!(inventory.unassigned[0].os_device_label(), "JBOD-sdb Btrfs");
    }

    #[test]
    fn one_jbod_can_back_several_overlays() {
        let mut inventory = with_jbod("sdb");
        inventory.raids.push(overlay(Subsystem::SoftRaid, "md0", &["sdb1"]));
        inventory.raids.push(overlay(Subsystem::Lvm, "vg0", &["sdb2"]));

        let engine = CorrelationEngine::new();
        engine.reconcile_jbod_disks(&mut inventory, "lvm-0");
        engine.reconcile_jbod_disks(&mut inventory, "softraid-0");

        assert_eq!(inventory.unassigned[0].os_device_label(), "JBOD-sdb SoftRaid LVM");
    }

    #[test]
    fn unknown_controller_ids_leave_inventory_untouched() {
        let mut inventory = with_jbod("sdb");
        let mut hardware = RaidVolume::new("mega-0", "0");
        hardware.add_disk(PhysicalDisk::new("mega-0", "0", "sdb"));
        inventory.raids.push(hardware);
        let before = inventory.clone();

        let engine = CorrelationEngine::new();
        assert_eq!(engine.reconcile_jbod_disks(&mut inventory, "mega-0"), 0);
        assert_eq!(engine.reconcile_hardware_volumes(&mut inventory, "nfs-0"), 0);
        assert_eq!(inventory, before);
    }

    #[test]
    fn unresolved_devices_never_match() {
        let mut inventory = with_jbod(UNKNOWN);
        inventory
            .unassigned
            .push(UnassignedDisk::new(hardware_disk("mega-0", "BogusDisk-OSUnknown", "X")));
        inventory
            .raids
            .push(overlay(Subsystem::Zfs, "tank", &[UNKNOWN, "", "BogusDisk-OSUnknown"]));

        let engine = CorrelationEngine::new();
        assert_eq!(engine.reconcile_jbod_disks(&mut inventory, "zfs-0"), 0);
        assert!(inventory.unassigned.iter().all(|jbod| jbod.consumers.is_empty()));
    }

    #[test]
    fn softraid_pass_points_members_at_the_array() {
        let mut inventory = Inventory::new();
        let mut array = overlay(Subsystem::SoftRaid, "md127", &["sda1", "sdb1"]);
        array.os_device = "md127".to_string();
        inventory.raids.push(array);
        inventory.raids.push(overlay(Subsystem::Btrfs, "uuid", &["md127"]));

        let engine = CorrelationEngine::new();
        assert_eq!(engine.reconcile_softraid_volumes(&mut inventory, "btrfs-0"), 1);

        assert_eq!(inventory.raids[0].os_device_label(), "md127 Btrfs");
        let member = &inventory.raids[1].disks[0];
        assert_eq!(member.model, "Check MD127 BTRFS disks.");
        assert_eq!(member.intf, "Check MD127 BTRFS disks.");
        assert_eq!(member.serial_number, "Check MD127 BTRFS disks.");
    }

    #[test]
    fn md_names_are_not_digit_stripped() {
        let mut inventory = Inventory::new();
        let mut md3 = overlay(Subsystem::SoftRaid, "md3", &["sdc1"]);
        md3.os_device = "md3".to_string();
        let mut md31 = overlay(Subsystem::SoftRaid, "md31", &["sdd1"]);
        md31.os_device = "md31".to_string();
        inventory.raids.push(md3);
        inventory.raids.push(md31);
        inventory.raids.push(overlay(Subsystem::Zfs, "tank", &["md31"]));

        let engine = CorrelationEngine::new();
        engine.reconcile_softraid_volumes(&mut inventory, "zfs-0");

        assert!(inventory.raids[0].consumers.is_empty());
        assert_eq!(inventory.raids[1].os_device_label(), "md31 ZFS");
    }

    #[test]
    fn softraid_is_never_matched_against_volumes() {
        let mut inventory = Inventory::new();
        let mut volume = RaidVolume::new("perc-0", "0");
        volume.os_device = "sda".to_string();
        inventory.raids.push(volume);
        inventory.raids.push(overlay(Subsystem::SoftRaid, "md0", &["sda1"]));

        let engine = CorrelationEngine::new();
        assert_eq!(engine.reconcile_hardware_volumes(&mut inventory, "softraid-0"), 0);
        assert!(inventory.raids[0].consumers.is_empty());
    }

    #[test]
    fn hardware_pass_skips_nested_legs() {
        let mut inventory = Inventory::new();
        let mut leg = RaidVolume::new("mega-0", "0");
        leg.raid_level = 1;
        leg.os_device = "sdc".to_string();
        inventory.raids.push(leg);
        let mut top = RaidVolume::new("mega-0", "1");
        top.os_device = "sdd".to_string();
        inventory.raids.push(top);
        inventory.raids.push(overlay(Subsystem::Lvm, "vg0", &["sdc", "sdd1"]));

        let engine = CorrelationEngine::new();
        assert_eq!(engine.reconcile_hardware_volumes(&mut inventory, "lvm-0"), 1);
        assert!(inventory.raids[0].consumers.is_empty());
        assert_eq!(inventory.raids[1].os_device_label(), "sdd LVM");
        assert_eq!(inventory.raids[2].disks[1].medium, "Check SDD LVM disks.");
        assert_eq!(inventory.raids[2].disks[0].medium, UNKNOWN);
    }

    #[test]
    fn backfill_copies_only_unknown_fields() {
        let mut inventory = Inventory::new();
        let mut vdev = overlay(Subsystem::Zfs, "tank", &["sdb3"]);
        vdev.disks[0].model = "Check SDB ZFS disks.".to_string();
        inventory.raids.push(vdev);
        let mut board = RaidVolume::new("motherBoard-0", "");
        board.add_disk(hardware_disk("motherBoard-0", "sdb", "ZC11ABCD"));
        inventory.raids.push(board);

        let engine = CorrelationEngine::new();
        assert_eq!(engine.backfill_attributes(&mut inventory), 1);

        let member = &inventory.raids[0].disks[0];
        assert_eq!(member.model, "Check SDB ZFS disks.");
        assert_eq!(member.serial_number, "ZC11ABCD");
        assert_eq!(member.intf, "SAS");
        assert_eq!(engine.backfill_attributes(&mut inventory), 0);
    }

    #[test]
    fn backfill_reads_sources_before_writing() {
        let mut inventory = Inventory::new();
        let mut first = overlay(Subsystem::Zfs, "tank", &["sdb1"]);
        first.disks[0].model = "ST4000NM0035".to_string();
        let mut second = overlay(Subsystem::Btrfs, "uuid", &["sdb2"]);
        second.disks[0].serial_number = "ZC11ABCD".to_string();
        inventory.raids.push(first);
        inventory.raids.push(second);

        let engine = CorrelationEngine::new();
        assert_eq!(engine.backfill_attributes(&mut inventory), 2);
        assert_eq!(inventory.raids[0].disks[0].serial_number, "ZC11ABCD");
        assert_eq!(inventory.raids[1].disks[0].model, "ST4000NM0035");
        assert_eq!(inventory.raids[0].disks[0].intf, UNKNOWN);
    }

    #[test]
    fn backfill_ignores_hidden_members() {
        let mut inventory = Inventory::new();
        let mut volume = RaidVolume::new("mega-0", "0");
        volume.add_disk(hardware_disk("mega-0", "", "W420ABCD"));
        inventory.raids.push(volume);
        inventory.raids.push(overlay(Subsystem::Zfs, "tank", &["sdz"]));

        let engine = CorrelationEngine::new();
        assert_eq!(engine.backfill_attributes(&mut inventory), 0);
    }
}
