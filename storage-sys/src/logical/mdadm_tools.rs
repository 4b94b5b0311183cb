// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{Controller, RaidVolume, Subsystem, SubsystemInventory, UNKNOWN};
use tracing::debug;

use super::CollectorContext;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
struct MdMember {
    device: String,
    failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MdArray {
    name: String,
    state: String,
    raid_type: String,
    members: Vec<MdMember>,
    /// Anything that makes the controller Bad
    unhealthy: bool,
}

fn is_array_line(line: &str) -> bool {
    let mut fields = line.split_whitespace();
    matches!(
        (fields.next(), fields.next()),
        (Some(name), Some(":")) if name.starts_with("md")
            && name[2..].chars().all(|c| c.is_ascii_digit())
    )
}

/// `/proc/mdstat` lists at least one array.
pub fn has_md_arrays(mdstat: &str) -> bool {
    mdstat.lines().any(|line| is_array_line(line.trim()))
}

fn is_personality(token: &str) -> bool {
    token.contains("raid") || token == "linear" || token == "multipath"
}

fn parse_array_line(line: &str) -> Option<MdArray> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let name = fields.first()?.to_string();
    let status = *fields.get(2)?;

    let (state, raid_type, start, unhealthy) = if status == "active" {
        let next = fields.get(3).copied().unwrap_or(UNKNOWN);
        if is_personality(next) {
            ("Okay".to_string(), next.to_string(), 4, false)
        } else {
            let raid_type = fields.get(4).copied().unwrap_or(UNKNOWN);
            (format!("Degraded: {next}"), raid_type.to_string(), 5, true)
        }
    } else {
        (status.to_uppercase(), UNKNOWN.to_string(), 3, true)
    };

    let mut array = MdArray {
        name,
        state,
        raid_type,
        members: Vec::new(),
        unhealthy,
    };

    for token in fields.iter().skip(start) {
        let Some((device, role)) = token.split_once('[') else {
            continue;
        };
        let failed = role.ends_with("(F)");
        if failed {
            array.state = "Degraded".to_string();
            array.unhealthy = true;
        }
        array.members.push(MdMember {
            device: device.trim().to_string(),
            failed,
        });
    }

    Some(array)
}

/// Status line holes such as `[U_]` mean a member is gone.
fn status_line_degraded(line: &str) -> bool {
    line.split_whitespace().last().is_some_and(|last| {
        last.starts_with('[')
            && last.ends_with(']')
            && last.contains('_')
            && last[1..last.len() - 1].chars().all(|c| c == 'U' || c == '_')
    })
}

fn parse_proc_mdstat(output: &str) -> Vec<MdArray> {
    let mut arrays = Vec::new();
    let mut pending: Option<MdArray> = None;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("Personalities") || line.starts_with("unused") {
            continue;
        }

        if is_array_line(line) {
            if let Some(previous) = pending.take() {
                arrays.push(previous);
            }
            pending = parse_array_line(line);
            continue;
        }

        if let Some(mut array) = pending.take() {
            if status_line_degraded(line) {
                array.state = "Degraded".to_string();
                array.unhealthy = true;
            }
            arrays.push(array);
        }
    }

    if let Some(last) = pending {
        arrays.push(last);
    }
    arrays
}

fn inventory_from_arrays(arrays: Vec<MdArray>, ctx: &CollectorContext<'_>) -> SubsystemInventory {
    let subsystem = Subsystem::SoftRaid;
    let mut controller = Controller::for_subsystem(subsystem);
    let mut inventory = SubsystemInventory::new();

    for array in arrays {
        if array.unhealthy {
            controller.mark_bad();
        }
        let mut raid = RaidVolume::new(subsystem.controller_id(), &array.name);
        raid.raid_type = array.raid_type;
        raid.state = array.state;
        raid.size = ctx.probe.size(&array.name);
        raid.os_device = array.name.clone();

        for member in array.members {
            let state = if member.failed { "Failed" } else { "ONLINE" };
            raid.add_disk(ctx.probed_disk(subsystem, &array.name, &member.device, state));
        }
        debug!(array = %raid.dg, members = raid.disks.len(), state = %raid.state, "md array");
        inventory.raids.push(raid);
    }

    inventory.controllers.push(controller);
    inventory
}

/// Discover software RAID arrays from `/proc/mdstat`.
pub fn discover_softraid(ctx: &CollectorContext<'_>) -> Result<Option<SubsystemInventory>> {
    let mdstat = match std::fs::read_to_string(&ctx.mdstat) {
        Ok(contents) => contents,
        Err(err) => {
            debug!(path = %ctx.mdstat.display(), "no software RAID support: {err}");
            return Ok(None);
        }
    };

    if !has_md_arrays(&mdstat) {
        return Ok(None);
    }

    Ok(Some(inventory_from_arrays(parse_proc_mdstat(&mdstat), ctx)))
}
