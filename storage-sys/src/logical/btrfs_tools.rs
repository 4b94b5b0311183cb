// SPDX-License-Identifier: GPL-3.0-only

use storage_types::{Controller, RaidVolume, Subsystem, SubsystemInventory, UNKNOWN, bytes_to_pretty};
use tracing::{debug, warn};

use super::CollectorContext;
use crate::Result;
use crate::exec::ToolFamily;

const SOME_DEVICES_MISSING: &str = "Some devices missing";
const MISSING_STATE: &str = "Missing devices";
const UNREADABLE_CHUNK_ROOT: &str = "Cant read chunk root";

#[derive(Debug, Clone)]
struct BtrfsFs {
    label: Option<String>,
    uuid: String,
    devices: Vec<(String, u64)>,
    missing_devices: bool,
}

fn parse_btrfs_show(output: &str) -> Vec<BtrfsFs> {
    let mut filesystems = Vec::new();
    let mut current: Option<BtrfsFs> = None;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("Label:") {
            if let Some(previous) = current.take() {
                filesystems.push(previous);
            }

            let label = line
                .split("Label:")
                .nth(1)
                .and_then(|rest| rest.split("uuid:").next())
                .map(str::trim)
                .map(|value| value.trim_matches('\''))
                .filter(|value| !value.is_empty() && *value != "none")
                .map(ToString::to_string);

            let uuid = line
                .split("uuid:")
                .nth(1)
                .map(str::trim)
                .unwrap_or_default()
                .to_string();

            current = Some(BtrfsFs {
                label,
                uuid,
                devices: Vec::new(),
                missing_devices: false,
            });

            continue;
        }

        let Some(current_fs) = current.as_mut() else {
            continue;
        };

        if line.contains(SOME_DEVICES_MISSING) || line.contains("is missing") {
            current_fs.missing_devices = true;
            continue;
        }

        if line.starts_with("devid") {
            let path = line
                .split(" path ")
                .nth(1)
                .map(str::trim)
                .unwrap_or_default();

            if path.is_empty() || path.starts_with('<') || line.ends_with("MISSING") {
                current_fs.missing_devices = true;
                continue;
            }

            let size = line
                .split("size")
                .nth(1)
                .and_then(parse_first_u64)
                .unwrap_or(0);

            current_fs
                .devices
                .push((path.trim_start_matches("/dev/").to_string(), size));
        }
    }

    if let Some(last) = current {
        filesystems.push(last);
    }

    filesystems
}

fn parse_first_u64(input: &str) -> Option<u64> {
    let digits: String = input
        .chars()
        .skip_while(|character| !character.is_ascii_digit())
        .take_while(|character| character.is_ascii_digit())
        .collect();

    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Data profile from a chunk tree dump. Metadata may use a different
/// profile, only DATA chunks count.
fn parse_data_profile(dump: &str) -> Option<String> {
    let mut plain_data = false;
    for line in dump.lines() {
        let Some((_, kind)) = line.split_once("type ") else {
            continue;
        };
        let kind = kind.trim();
        if let Some(profile) = kind.strip_prefix("DATA|") {
            let profile = profile.split_whitespace().next().unwrap_or_default();
            if !profile.is_empty() {
                return Some(profile.to_string());
            }
        } else if kind == "DATA" {
            plain_data = true;
        }
    }
    plain_data.then(|| "single".to_string())
}

/// Estimated usable bytes for a profile, from the member sizes.
fn estimate_usable_bytes(profile: &str, sizes: &[u64]) -> Option<u64> {
    let total: u64 = sizes.iter().sum();
    let last = sizes.last().copied().unwrap_or(0);
    let usable = match profile.to_ascii_lowercase().as_str() {
        "single" | "mixed" | "raid0" => total,
        "dup" | "raid1" | "raid10" => total / 2,
        "raid1c3" => total / 3,
        "raid1c4" => total / 4,
        "raid5" => total.saturating_sub(last),
        "raid6" => total.saturating_sub(last.saturating_mul(2)),
        _ => return None,
    };
    Some(usable)
}

fn member_profile(ctx: &CollectorContext<'_>, device: &str) -> String {
    let path = format!("/dev/{device}");
    let output = match ctx.runner.run(
        ToolFamily::Btrfs,
        &["inspect-internal", "dump-tree", "-t", "chunk", &path],
    ) {
        Ok(output) => output,
        Err(err) => {
            warn!(device, "could not dump chunk tree: {err}");
            return UNKNOWN.to_string();
        }
    };

    if let Some(profile) = parse_data_profile(&output.stdout) {
        return profile;
    }
    if output.stderr.contains("cannot read chunk root") {
        return UNREADABLE_CHUNK_ROOT.to_string();
    }
    UNKNOWN.to_string()
}

/// Every member has to agree on the data profile.
fn filesystem_profile(ctx: &CollectorContext<'_>, devices: &[(String, u64)]) -> String {
    let mut profile: Option<String> = None;
    for (device, _) in devices {
        let member = member_profile(ctx, device);
        match &profile {
            None => profile = Some(member),
            Some(previous) if *previous != member => {
                warn!(device, previous = %previous, current = %member, "btrfs profile mismatch");
                return UNKNOWN.to_string();
            }
            Some(_) => {}
        }
    }
    profile.unwrap_or_else(|| UNKNOWN.to_string())
}

fn inventory_from_filesystems(filesystems: Vec<BtrfsFs>, ctx: &CollectorContext<'_>) -> SubsystemInventory {
    let subsystem = Subsystem::Btrfs;
    let mut controller = Controller::for_subsystem(subsystem);
    let mut inventory = SubsystemInventory::new();

    for filesystem in filesystems {
        let mut raid = RaidVolume::new(subsystem.controller_id(), &filesystem.uuid);
        raid.state = "ONLINE".to_string();
        raid.raid_type = filesystem_profile(ctx, &filesystem.devices);

        let sizes: Vec<u64> = filesystem.devices.iter().map(|(_, size)| *size).collect();
        raid.size = estimate_usable_bytes(&raid.raid_type, &sizes)
            .map(|bytes| format!("{} Aprox", bytes_to_pretty(&bytes, false)))
            .unwrap_or_else(|| UNKNOWN.to_string());

        if filesystem.missing_devices {
            raid.state = MISSING_STATE.to_string();
            controller.mark_bad();
        }

        for (device, size) in &filesystem.devices {
            let mut disk = ctx.probed_disk(subsystem, &filesystem.uuid, device, "ONLINE");
            disk.size = bytes_to_pretty(size, false);
            raid.add_disk(disk);
        }
        if let Some((first, _)) = filesystem.devices.first() {
            raid.os_device = first.clone();
        }

        debug!(
            uuid = %raid.dg,
            label = filesystem.label.as_deref().unwrap_or("none"),
            profile = %raid.raid_type,
            "btrfs filesystem"
        );
        inventory.raids.push(raid);
    }

    inventory.controllers.push(controller);
    inventory
}

/// Discover Btrfs filesystems through `btrfs filesystem show --raw`,
/// without needing them mounted.
pub fn discover_btrfs(ctx: &CollectorContext<'_>) -> Result<Option<SubsystemInventory>> {
    if !ctx.runner.is_available(ToolFamily::Btrfs) {
        return Ok(None);
    }

    let output = ctx
        .runner
        .run(ToolFamily::Btrfs, &["filesystem", "show", "--raw"])?;
    let stdout = if output.stdout.contains(SOME_DEVICES_MISSING) {
        output.stdout
    } else {
        output.check(&[SOME_DEVICES_MISSING])?
    };

    let filesystems = parse_btrfs_show(&stdout);
    if filesystems.is_empty() {
        return Ok(None);
    }

    Ok(Some(inventory_from_filesystems(filesystems, ctx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::testutil::{FakeProbe, FakeRunner};
    use storage_types::ControllerStatus;

    const SHOW: &str = "\
Label: 'data'  uuid: 5c8d7b1e-3f0a-4a8e-9a55-0a1b2c3d4e5f
\tTotal devices 2 FS bytes used 1048576
\tdevid    1 size 4000787030016 used 2155872256 path /dev/sdb
\tdevid    2 size 4000787030016 used 2155872256 path /dev/sdc

Label: none  uuid: 9e2f0c44-1d3b-4c6a-8f7e-112233445566
\tTotal devices 2 FS bytes used 4096
\tdevid    1 size 1000204886016 used 0 path /dev/sdd
\t*** Some devices missing
";

    const CHUNK_RAID1: &str = "\
chunk tree key (CHUNK_TREE ROOT_ITEM 0)
\titem 1 key (FIRST_CHUNK_TREE CHUNK_ITEM 22020096) itemoff 16025 itemsize 112
\t\tlength 8388608 owner 2 stripe_len 65536 type SYSTEM|RAID1
\titem 2 key (FIRST_CHUNK_TREE CHUNK_ITEM 30408704) itemoff 15913 itemsize 112
\t\tlength 1073741824 owner 2 stripe_len 65536 type DATA|RAID1
";

    fn dump_args(device: &str) -> String {
        format!("inspect-internal dump-tree -t chunk /dev/{device}")
    }

    #[test]
    fn parses_filesystems_and_missing_devices() {
        let parsed = parse_btrfs_show(SHOW);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].label.as_deref(), Some("data"));
        assert_eq!(parsed[0].uuid, "5c8d7b1e-3f0a-4a8e-9a55-0a1b2c3d4e5f");
        assert_eq!(parsed[0].devices[1], ("sdc".to_string(), 4000787030016));
        assert!(!parsed[0].missing_devices);
        assert_eq!(parsed[1].label, None);
        assert!(parsed[1].missing_devices);
    }

    #[test]
    fn newer_progs_mark_missing_members_inline() {
        let parsed = parse_btrfs_show(
            "Label: none  uuid: 1111\n\tdevid    1 size 4096 used 0 path /dev/sda2\n\tdevid    2 size 0 used 0 path <missing disk> MISSING\n",
        );
        assert_eq!(parsed[0].devices.len(), 1);
        assert!(parsed[0].missing_devices);
    }

    #[test]
    fn data_profile_ignores_metadata_chunks() {
        assert_eq!(parse_data_profile(CHUNK_RAID1).as_deref(), Some("RAID1"));
        assert_eq!(
            parse_data_profile("\t\tlength 8388608 owner 2 stripe_len 65536 type DATA\n").as_deref(),
            Some("single")
        );
        assert_eq!(parse_data_profile("type METADATA|DUP\n"), None);
    }

    #[test]
    fn usable_size_follows_profile() {
        let sizes = [1000, 1000, 1000, 1000];
        assert_eq!(estimate_usable_bytes("single", &sizes), Some(4000));
        assert_eq!(estimate_usable_bytes("RAID1", &sizes), Some(2000));
        assert_eq!(estimate_usable_bytes("raid10", &sizes), Some(2000));
        assert_eq!(estimate_usable_bytes("RAID1C3", &sizes[..3]), Some(1000));
        assert_eq!(estimate_usable_bytes("raid1c4", &sizes), Some(1000));
        assert_eq!(estimate_usable_bytes("RAID5", &sizes), Some(3000));
        assert_eq!(estimate_usable_bytes("RAID6", &sizes), Some(2000));
        assert_eq!(estimate_usable_bytes(UNKNOWN, &sizes), None);
    }

    #[test]
    fn builds_inventory_with_profiles() {
        let runner = FakeRunner::new()
            .respond(ToolFamily::Btrfs, "filesystem show --raw", SHOW)
            .respond(ToolFamily::Btrfs, &dump_args("sdb"), CHUNK_RAID1)
            .respond(ToolFamily::Btrfs, &dump_args("sdc"), CHUNK_RAID1)
            .respond_with(
                ToolFamily::Btrfs,
                &dump_args("sdd"),
                CommandOutput {
                    command: "btrfs".to_string(),
                    stdout: String::new(),
                    stderr: "ERROR: cannot read chunk root\n".to_string(),
                    success: false,
                },
            );
        let probe = FakeProbe::new();
        let ctx = CollectorContext::new(&runner, &probe);

        let inventory = discover_btrfs(&ctx).unwrap().unwrap();
        assert_eq!(inventory.controllers[0].id, "btrfs-0");
        assert_eq!(inventory.controllers[0].status, ControllerStatus::Bad);

        let data = &inventory.raids[0];
        assert_eq!(data.raid_type, "RAID1");
        assert_eq!(data.state, "ONLINE");
        assert_eq!(data.os_device, "sdb");
        assert_eq!(data.size, "3.64 TB Aprox");
        assert_eq!(data.disks[0].size, "3.64 TB");
        assert_eq!(data.disks[0].dg, data.dg);

        let degraded = &inventory.raids[1];
        assert_eq!(degraded.state, MISSING_STATE);
        assert_eq!(degraded.raid_type, UNREADABLE_CHUNK_ROOT);
        assert_eq!(degraded.size, UNKNOWN);
    }

    #[test]
    fn mismatched_member_profiles_are_unknown() {
        let runner = FakeRunner::new()
            .respond(ToolFamily::Btrfs, &dump_args("sdb"), CHUNK_RAID1)
            .respond(ToolFamily::Btrfs, &dump_args("sdc"), "type DATA|RAID0\n");
        let probe = FakeProbe::new();
        let ctx = CollectorContext::new(&runner, &probe);
        let devices = vec![("sdb".to_string(), 1), ("sdc".to_string(), 1)];
        assert_eq!(filesystem_profile(&ctx, &devices), UNKNOWN);
    }

    #[test]
    fn real_errors_are_reported() {
        let runner = FakeRunner::new().respond_with(
            ToolFamily::Btrfs,
            "filesystem show --raw",
            CommandOutput {
                command: "btrfs filesystem show --raw".to_string(),
                stdout: String::new(),
                stderr: "ERROR: not a btrfs filesystem\n".to_string(),
                success: false,
            },
        );
        let probe = FakeProbe::new();
        let ctx = CollectorContext::new(&runner, &probe);
        assert!(discover_btrfs(&ctx).is_err());
    }
}
