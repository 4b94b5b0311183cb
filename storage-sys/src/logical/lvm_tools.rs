// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{
    Controller, RaidVolume, Subsystem, SubsystemInventory, UNKNOWN, VolumeGroup, bytes_to_pretty,
};
use tracing::debug;

use super::{CollectorContext, parse_byte_count};
use crate::Result;
use crate::exec::ToolFamily;

/// Diagnostics `lvm` prints while still producing usable output.
const BENIGN_DIAGNOSTICS: &[&str] = &[
    "is missing PV",
    "is using an old PV header",
    "devices missing",
];

#[derive(Debug, Clone, PartialEq, Eq)]
struct VgRow {
    name: String,
    size: Option<u64>,
    missing_pv_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LvRow {
    size: Option<u64>,
    segtype: String,
    vg_name: String,
    lv_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PvRow {
    pv_name: String,
    vg_name: String,
    size: Option<u64>,
}

fn pretty(size: Option<u64>) -> String {
    size.map(|bytes| bytes_to_pretty(&bytes, false))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn parse_vgs(output: &str) -> Vec<VgRow> {
    output
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 3 {
                return None;
            }
            Some(VgRow {
                name: cols[0].to_string(),
                size: parse_byte_count(cols[1]),
                missing_pv_count: cols[2].parse().ok()?,
            })
        })
        .collect()
}

fn parse_lvs(output: &str) -> Vec<LvRow> {
    output
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 3 {
                return None;
            }
            Some(LvRow {
                size: parse_byte_count(cols[0]),
                segtype: cols[1].to_string(),
                vg_name: cols[2].to_string(),
                lv_path: cols
                    .get(3)
                    .map(|path| path.trim_start_matches("/dev/").to_string()),
            })
        })
        .collect()
}

fn parse_pvs(output: &str) -> Vec<PvRow> {
    output
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 3 {
                return None;
            }
            Some(PvRow {
                pv_name: cols[0].trim_start_matches("/dev/").to_string(),
                vg_name: cols[1].to_string(),
                size: parse_byte_count(cols[2]),
            })
        })
        .collect()
}

fn run_lvm(ctx: &CollectorContext<'_>, args: &[&str]) -> Result<String> {
    ctx.runner.run(ToolFamily::Lvm, args)?.check(BENIGN_DIAGNOSTICS)
}

/// Discover LVM volume groups and logical volumes. Each LV is reported as a
/// volume whose members are the PVs of its VG.
pub fn discover_lvm(ctx: &CollectorContext<'_>) -> Result<Option<SubsystemInventory>> {
    if !ctx.runner.is_available(ToolFamily::Lvm) {
        return Ok(None);
    }

    let vgs = parse_vgs(&run_lvm(
        ctx,
        &[
            "vgs",
            "--noheadings",
            "--units",
            "b",
            "-o",
            "vg_name,vg_size,vg_missing_pv_count",
        ],
    )?);
    if vgs.is_empty() {
        return Ok(None);
    }

    let lvs = parse_lvs(&run_lvm(
        ctx,
        &[
            "vgs",
            "--noheadings",
            "--units",
            "b",
            "-o",
            "lv_size,segtype,vg_name,lv_path",
        ],
    )?);
    let pvs = parse_pvs(&run_lvm(
        ctx,
        &[
            "pvs",
            "--noheadings",
            "--units",
            "b",
            "-o",
            "pv_name,vg_name,pv_size",
        ],
    )?);

    let subsystem = Subsystem::Lvm;
    let mut controller = Controller::for_subsystem(subsystem);
    let mut inventory = SubsystemInventory::new();

    for vg in &vgs {
        let state = if vg.missing_pv_count == 0 {
            "ONLINE".to_string()
        } else {
            controller.mark_bad();
            format!("Bad: {} missing device.", vg.missing_pv_count)
        };
        inventory.volume_groups.push(VolumeGroup {
            controller_id: subsystem.controller_id().to_string(),
            name: vg.name.clone(),
            state,
            size: pretty(vg.size),
        });
    }

    for lv in lvs {
        let mut raid = RaidVolume::new(subsystem.controller_id(), &lv.vg_name);
        raid.raid_type = lv.segtype;
        raid.size = pretty(lv.size);
        raid.os_device = lv.lv_path.unwrap_or_else(|| "NONE".to_string());
        raid.state = match inventory
            .volume_groups
            .iter()
            .find(|vg| vg.name == lv.vg_name)
        {
            Some(vg) if vg.state == "ONLINE" => vg.state.clone(),
            Some(_) => "Bad".to_string(),
            None => UNKNOWN.to_string(),
        };

        for pv in pvs.iter().filter(|pv| pv.vg_name == lv.vg_name) {
            let mut disk = ctx.probed_disk(subsystem, &pv.vg_name, &pv.pv_name, "ONLINE");
            disk.size = pretty(pv.size);
            raid.add_disk(disk);
        }

        debug!(vg = %raid.dg, lv = %raid.os_device, members = raid.disks.len(), "lvm volume");
        inventory.raids.push(raid);
    }

    inventory.controllers.push(controller);
    Ok(Some(inventory))
}
