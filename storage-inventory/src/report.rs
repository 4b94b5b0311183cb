// SPDX-License-Identifier: GPL-3.0-only

//! Plain-text and JSON renderings of an inventory

use std::fmt::Write as _;

use serde::Serialize;
use storage_types::{
    Controller, Inventory, PhysicalDisk, Pool, RaidVolume, UnassignedDisk, VolumeGroup,
};

/// A record with its rendered device name alongside the raw fields
#[derive(Serialize)]
struct Labeled<'a, T> {
    #[serde(flatten)]
    record: &'a T,
    os_device_label: String,
}

#[derive(Serialize)]
struct InventoryReport<'a> {
    controllers: &'a [Controller],
    pools: &'a [Pool],
    volume_groups: &'a [VolumeGroup],
    raids: Vec<Labeled<'a, RaidVolume>>,
    unassigned: Vec<Labeled<'a, UnassignedDisk>>,
}

impl<'a> InventoryReport<'a> {
    fn new(inventory: &'a Inventory) -> Self {
        Self {
            controllers: &inventory.controllers,
            pools: &inventory.pools,
            volume_groups: &inventory.volume_groups,
            raids: inventory
                .raids
                .iter()
                .map(|volume| Labeled {
                    record: volume,
                    os_device_label: volume.os_device_label(),
                })
                .collect(),
            unassigned: inventory
                .unassigned
                .iter()
                .map(|jbod| Labeled {
                    record: jbod,
                    os_device_label: jbod.os_device_label(),
                })
                .collect(),
        }
    }
}

pub fn render_json(inventory: &Inventory) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&InventoryReport::new(inventory))
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn disk_line(out: &mut String, indent: &str, disk: &PhysicalDisk, os_device: &str) {
    let _ = writeln!(
        out,
        "{indent}{:<8} {:<12} {:>10}  {:<6} {:<6} {:<24} {:<20} {}",
        or_dash(&disk.eid_slot),
        disk.state,
        disk.size,
        disk.intf,
        disk.medium,
        disk.model,
        disk.serial_number,
        or_dash(os_device),
    );
}

/// One line per record; volumes are followed by their member disks.
pub fn render_text(inventory: &Inventory) -> String {
    let mut out = String::new();

    if !inventory.controllers.is_empty() {
        let _ = writeln!(out, "CONTROLLERS");
        for controller in &inventory.controllers {
            let _ = writeln!(
                out,
                "  {:<14} {:<10} {:<24} {}",
                controller.id, controller.manufacturer, controller.model, controller.status
            );
        }
    }

    if !inventory.pools.is_empty() {
        let _ = writeln!(out, "POOLS");
        for pool in &inventory.pools {
            let _ = writeln!(
                out,
                "  {:<14} {:<16} {:<10} {:>10}  {}",
                pool.controller_id, pool.name, pool.state, pool.size, pool.os_device
            );
        }
    }

    if !inventory.volume_groups.is_empty() {
        let _ = writeln!(out, "VOLUME GROUPS");
        for vg in &inventory.volume_groups {
            let _ = writeln!(
                out,
                "  {:<14} {:<16} {:<24} {:>10}",
                vg.controller_id, vg.name, vg.state, vg.size
            );
        }
    }

    if !inventory.raids.is_empty() {
        let _ = writeln!(out, "VOLUMES");
        for raid in &inventory.raids {
            let _ = writeln!(
                out,
                "  {:<14} {:<16} {:<10} {:<12} {:>10}  {}",
                raid.controller_id,
                or_dash(&raid.dg),
                raid.raid_type,
                raid.state,
                raid.size,
                or_dash(&raid.os_device_label()),
            );
            for disk in &raid.disks {
                disk_line(&mut out, "    ", disk, &disk.os_device);
            }
        }
    }

    if !inventory.unassigned.is_empty() {
        let _ = writeln!(out, "JBOD DISKS");
        for jbod in &inventory.unassigned {
            let _ = write!(out, "  {:<14} ", jbod.disk.controller_id);
            disk_line(&mut out, "", &jbod.disk, &jbod.os_device_label());
        }
    }

    out
}
