// SPDX-License-Identifier: GPL-3.0-only

//! Cross-layer scenarios driven through the public API

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use storage_sys::address::{
    SAS2IRCU_WWN_PREFIX, decrement_hex, increment_hex, reverse_byte_groups,
    sas2ircu_volume_link_name,
};
use storage_sys::{
    CommandOutput, CommandRunner, CorrelationEngine, OsDeviceResolver, SymlinkResolver, SysError,
    ToolFamily,
};
use storage_types::{
    Controller, Inventory, PhysicalDisk, RaidVolume, Subsystem, UNKNOWN, UnassignedDisk,
    strip_trailing_digits,
};

/// Runner that records every call and never succeeds.
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<ToolFamily>>,
}

impl CommandRunner for RecordingRunner {
    fn run(&self, family: ToolFamily, args: &[&str]) -> storage_sys::Result<CommandOutput> {
        self.calls.lock().unwrap().push(family);
        Err(SysError::CommandFailed {
            command: format!("{family} {}", args.join(" ")),
            reason: "not expected".to_string(),
        })
    }

    fn is_available(&self, _family: ToolFamily) -> bool {
        true
    }
}

#[derive(Default)]
struct LinkTable {
    links: HashMap<PathBuf, PathBuf>,
    reads: Mutex<Vec<PathBuf>>,
}

impl SymlinkResolver for LinkTable {
    fn read_link(&self, path: &Path) -> std::io::Result<PathBuf> {
        self.reads.lock().unwrap().push(path.to_path_buf());
        self.links
            .get(path)
            .cloned()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
    }

    fn list_links(&self, _dir: &Path) -> std::io::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

fn member(subsystem: Subsystem, dg: &str, os_device: &str) -> PhysicalDisk {
    PhysicalDisk::new(subsystem.controller_id(), dg, os_device)
}

fn overlay(subsystem: Subsystem, dg: &str, members: &[&str]) -> Inventory {
    let mut inventory = Inventory::new();
    inventory.controllers.push(Controller::for_subsystem(subsystem));
    let mut raid = RaidVolume::new(subsystem.controller_id(), dg);
    for os_device in members {
        raid.add_disk(member(subsystem, dg, os_device));
    }
    inventory.raids.push(raid);
    inventory
}

fn passthrough_controller() -> Inventory {
    let mut inventory = Inventory::new();
    inventory
        .controllers
        .push(Controller::new("mega-0", "mega", "PERC H730P Mini"));
    inventory.unassigned.push(UnassignedDisk::new(PhysicalDisk {
        eid_slot: "32:4".to_string(),
        state: "JBOD".to_string(),
        size: "3.63 TB".to_string(),
        intf: "SAS".to_string(),
        medium: "HDD".to_string(),
        model: "HUS726T4TAL".to_string(),
        serial_number: "V6G1ABCD".to_string(),
        ..PhysicalDisk::new("mega-0", "", "sdb")
    }));
    inventory
}

#[test]
fn jbod_backing_zfs_and_btrfs() {
    let engine = CorrelationEngine::new();
    let mut inventory = passthrough_controller();

    inventory.merge(overlay(Subsystem::Zfs, "tank", &["sdb3"]));
    engine.correlate_overlay(&mut inventory, "zfs-0");
    inventory.merge(overlay(Subsystem::Btrfs, "4e0c6b02-1d2e", &["sdb3"]));
    engine.correlate_overlay(&mut inventory, "btrfs-0");

    // A second round changes nothing.
    let settled = inventory.clone();
    engine.correlate_overlay(&mut inventory, "zfs-0");
    engine.correlate_overlay(&mut inventory, "btrfs-0");
    assert_eq!(inventory, settled);

    assert_eq!(inventory.unassigned[0].os_device_label(), "JBOD-sdb ZFS Btrfs");
    assert_eq!(inventory.unassigned[0].disk.os_device, "sdb");
    for raid in &inventory.raids {
        let disk = &raid.disks[0];
        assert_eq!(disk.model, "HUS726T4TAL");
        assert_eq!(disk.intf, "SAS");
        assert_eq!(disk.medium, "HDD");
    }

    engine.backfill_attributes(&mut inventory);
    assert!(
        inventory
            .raids
            .iter()
            .all(|raid| raid.disks[0].serial_number == "V6G1ABCD")
    );
}

#[test]
fn hardware_volume_backing_lvm() {
    let engine = CorrelationEngine::new();
    let mut inventory = Inventory::new();
    inventory
        .controllers
        .push(Controller::new("perc-0", "perc", "PERC H740P"));
    let mut volume = RaidVolume::new("perc-0", "1");
    volume.raid_type = "RAID0".to_string();
    volume.os_device = "sdc".to_string();
    volume.add_disk(PhysicalDisk {
        eid_slot: "64:2".to_string(),
        model: "MZ7LH960HAJR".to_string(),
        ..PhysicalDisk::new("perc-0", "1", "")
    });
    inventory.raids.push(volume);

    inventory.merge(overlay(Subsystem::Lvm, "vg_data", &["sdc"]));
    engine.correlate_overlay(&mut inventory, "lvm-0");

    assert_eq!(inventory.raids[0].os_device_label(), "sdc LVM");
    assert_eq!(inventory.raids[0].os_device, "sdc");
    let pv = &inventory.raids[1].disks[0];
    for value in [&pv.model, &pv.intf, &pv.medium, &pv.serial_number] {
        assert_eq!(value, "Check SDC LVM disks.");
    }
    assert_eq!(inventory.raids[0].disks[0].model, "MZ7LH960HAJR");
}

#[test]
fn software_raid_names_keep_their_number() {
    assert_eq!(strip_trailing_digits("sda3"), "sda");

    let engine = CorrelationEngine::new();
    let mut inventory = overlay(Subsystem::SoftRaid, "md3", &["sdc1", "sdd1"]);
    inventory.raids[0].os_device = "md3".to_string();
    inventory.merge(overlay(Subsystem::Zfs, "tank", &["md3"]));
    inventory.merge(overlay(Subsystem::Btrfs, "4e0c6b02-1d2e", &["md"]));

    engine.correlate_overlay(&mut inventory, "zfs-0");
    engine.correlate_overlay(&mut inventory, "btrfs-0");

    assert_eq!(inventory.raids[0].os_device_label(), "md3 ZFS");
    assert_eq!(inventory.raids[1].disks[0].model, "Check MD3 ZFS disks.");
    assert_eq!(inventory.raids[2].disks[0].model, UNKNOWN);
}

#[test]
fn adaptec_passthrough_is_never_looked_up() {
    let runner = Arc::new(RecordingRunner::default());
    let links = Arc::new(LinkTable::default());
    let resolver = OsDeviceResolver::new(runner.clone(), links.clone());

    let device = resolver
        .resolve_jbod_disk_device("adaptec", "adaptec-0", "0:5")
        .unwrap();

    assert_eq!(device, UNKNOWN);
    assert!(runner.calls.lock().unwrap().is_empty());
    assert!(links.reads.lock().unwrap().is_empty());
}

#[test]
fn sas2ircu_volume_wwid_builds_kernel_link() {
    let name = sas2ircu_volume_link_name("08e444a2ffdbcba6");
    assert_eq!(name, format!("wwn-0x{SAS2IRCU_WWN_PREFIX}a6cbdbffa244e408"));
    assert_eq!(
        reverse_byte_groups(&reverse_byte_groups("08e444a2ffdbcba6")),
        "08e444a2ffdbcba6"
    );
}

#[test]
fn sas_address_transforms_invert_each_other() {
    for value in ["5000cca23c1237c9", "5000c500a1b2c300", "500605b0000272b1"] {
        let lowered = decrement_hex(value).unwrap();
        assert_eq!(increment_hex(&lowered).unwrap(), value);
    }
    assert_eq!(decrement_hex("5000c500a1b2c300").unwrap(), "5000c500a1b2c2ff");
}
