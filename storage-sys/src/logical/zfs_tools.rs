// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{Controller, Pool, RaidVolume, Subsystem, SubsystemInventory, UNKNOWN, bytes_to_pretty};
use tracing::{debug, warn};

use super::{CollectorContext, parse_byte_count};
use crate::Result;
use crate::exec::ToolFamily;

/// Section headers that group auxiliary vdevs inside a pool's config.
const AUX_SECTIONS: &[&str] = &["logs", "cache", "spares", "special", "dedup"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct ZpoolMember {
    device: String,
    state: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ZpoolVdev {
    pool: String,
    vdev_type: String,
    state: String,
    members: Vec<ZpoolMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ZpoolStatus {
    name: String,
    state: String,
    vdevs: Vec<ZpoolVdev>,
}

fn vdev_type(name: &str) -> Option<String> {
    if name.starts_with("mirror") || name.starts_with("raidz") || name.starts_with("draid") {
        let kind = name.split('-').next().unwrap_or(name);
        return Some(kind.to_string());
    }
    None
}

fn parse_zpool_status(output: &str) -> Vec<ZpoolStatus> {
    let mut pools: Vec<ZpoolStatus> = Vec::new();
    let mut in_config = false;
    let mut in_vdevs = false;
    let mut current: Option<ZpoolVdev> = None;

    let flush = |pools: &mut Vec<ZpoolStatus>, vdev: Option<ZpoolVdev>| {
        if let (Some(vdev), Some(pool)) = (vdev, pools.last_mut())
            && !vdev.members.is_empty()
        {
            pool.vdevs.push(vdev);
        }
    };

    for line in output.lines() {
        let trimmed = line.trim();

        if in_vdevs && trimmed.is_empty() {
            flush(&mut pools, current.take());
            in_vdevs = false;
            in_config = false;
            continue;
        }

        if let Some(name) = trimmed.strip_prefix("pool:") {
            pools.push(ZpoolStatus {
                name: name.trim().to_string(),
                state: UNKNOWN.to_string(),
                vdevs: Vec::new(),
            });
            continue;
        }

        if let Some(state) = trimmed.strip_prefix("state:") {
            if let Some(pool) = pools.last_mut() {
                pool.state = state.trim().to_string();
            }
            continue;
        }

        if trimmed.starts_with("config:") {
            in_config = true;
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let Some(first) = fields.first().copied() else {
            continue;
        };
        let Some(pool_name) = pools.last().map(|pool| pool.name.clone()) else {
            continue;
        };

        if in_config && !in_vdevs && first == pool_name {
            in_vdevs = true;
            current = Some(ZpoolVdev {
                pool: pool_name,
                vdev_type: "STRIPE".to_string(),
                state: fields.get(1).copied().unwrap_or(UNKNOWN).to_string(),
                members: Vec::new(),
            });
            continue;
        }

        if !in_vdevs {
            continue;
        }

        let new_type = vdev_type(first).or_else(|| {
            (fields.len() == 1 && AUX_SECTIONS.contains(&first)).then(|| first.to_string())
        });
        if let Some(vdev_type) = new_type {
            flush(&mut pools, current.take());
            current = Some(ZpoolVdev {
                pool: pool_name,
                vdev_type,
                state: fields.get(1).copied().unwrap_or(UNKNOWN).to_string(),
                members: Vec::new(),
            });
            continue;
        }

        if let Some(vdev) = current.as_mut() {
            vdev.members.push(ZpoolMember {
                device: first.to_string(),
                state: fields.get(1).copied().unwrap_or(UNKNOWN).to_string(),
            });
        }
    }

    flush(&mut pools, current.take());
    pools
}

fn pool_size(ctx: &CollectorContext<'_>, pool: &str) -> String {
    let size = ctx
        .runner
        .run(ToolFamily::Zpool, &["list", "-Hp", "-o", "size", pool])
        .and_then(|output| output.check(&[]));
    match size {
        Ok(stdout) => parse_byte_count(stdout.trim())
            .map(|bytes| bytes_to_pretty(&bytes, false))
            .unwrap_or_else(|| UNKNOWN.to_string()),
        Err(err) => {
            warn!(pool, "could not read pool size: {err}");
            UNKNOWN.to_string()
        }
    }
}

fn inventory_from_status(pools: Vec<ZpoolStatus>, ctx: &CollectorContext<'_>) -> SubsystemInventory {
    let subsystem = Subsystem::Zfs;
    let mut controller = Controller::for_subsystem(subsystem);
    let mut inventory = SubsystemInventory::new();

    for status in pools {
        if status.state != "ONLINE" {
            controller.mark_bad();
        }
        inventory.pools.push(Pool {
            controller_id: subsystem.controller_id().to_string(),
            size: pool_size(ctx, &status.name),
            os_device: format!("/{}", status.name),
            name: status.name,
            state: status.state,
        });

        for vdev in status.vdevs {
            let mut raid = RaidVolume::new(subsystem.controller_id(), &vdev.pool);
            raid.raid_type = vdev.vdev_type;
            raid.state = vdev.state;
            for member in vdev.members {
                if member.state != "ONLINE" {
                    controller.mark_bad();
                }
                raid.add_disk(ctx.probed_disk(subsystem, &vdev.pool, &member.device, &member.state));
            }
            debug!(pool = %raid.dg, vdev = %raid.raid_type, members = raid.disks.len(), "zfs vdev");
            inventory.raids.push(raid);
        }
    }

    inventory.controllers.push(controller);
    inventory
}

/// Discover ZFS pools through `zpool status`.
pub fn discover_zfs(ctx: &CollectorContext<'_>) -> Result<Option<SubsystemInventory>> {
    if !ctx.runner.is_available(ToolFamily::Zpool) {
        return Ok(None);
    }

    let output = ctx.runner.run(ToolFamily::Zpool, &["status"])?.check(&[])?;
    let pools = parse_zpool_status(&output);
    if pools.is_empty() {
        return Ok(None);
    }

    Ok(Some(inventory_from_status(pools, ctx)))
}
