// SPDX-License-Identifier: GPL-3.0-only

//! Controller identifier to kernel device resolution
//!
//! Each hardware family prints a different identifier for a volume or a
//! passthrough disk. The resolver asks the vendor tool for it, converts it
//! with [`crate::address`] and follows the matching `/dev/disk/by-id` link.

use std::path::PathBuf;
use std::sync::Arc;

use storage_types::{BOGUS_DISK, HardwareVendor, UNKNOWN};
use tracing::{debug, error, warn};

use crate::address::{
    adaptec_link_name, device_from_link_target, jbod_link_name, sas2ircu_volume_link_name,
    split_eid_slot, wwn_link_name,
};
use crate::error::ResolveError;
use crate::exec::{CommandRunner, vendor_tool};
use crate::link::SymlinkResolver;

pub const DEFAULT_BY_ID_DIR: &str = "/dev/disk/by-id";

type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Controller-local number from an inventory id (`mega-1` -> `1`).
pub fn controller_number(controller_id: &str) -> &str {
    controller_id
        .rsplit_once('-')
        .map_or(controller_id, |(_, number)| number)
}

fn parse_vendor(manufacturer: &str) -> ResolveResult<HardwareVendor> {
    manufacturer
        .parse()
        .map_err(ResolveError::UnknownManufacturer)
}

/// Value after the first `separator` with spaces and tabs removed.
fn field_value(line: &str, separator: char) -> Option<String> {
    let (_, value) = line.split_once(separator)?;
    Some(value.chars().filter(|c| *c != ' ' && *c != '\t').collect())
}

/// `SCSI NAA Id` of a mega/perc virtual drive.
pub fn parse_naa_id(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.contains("SCSI NAA Id = "))
        .and_then(|line| field_value(line, '='))
        .filter(|naa| !naa.is_empty())
}

/// SAS address of the active port in a mega/perc drive detail dump.
///
/// Matches port lines such as `0 Active 6.0Gb/s   0x5000cca23c1237c9`.
pub fn parse_active_sas_address(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4
            || !fields[0].chars().all(|c| c.is_ascii_digit())
            || fields[1] != "Active"
            || !fields[2].ends_with("Gb/s")
        {
            return None;
        }
        let hex = fields[3].strip_prefix("0x")?;
        (hex.len() == 16 && hex.chars().all(|c| c.is_ascii_hexdigit())).then(|| hex.to_string())
    })
}

/// Drive serial number (`SN = ...`) from a mega/perc drive detail dump.
pub fn parse_drive_serial(output: &str) -> Option<String> {
    output.lines().map(str::trim).find_map(|line| {
        let (_, serial) = line.split_once("SN = ")?;
        let serial = serial.trim();
        (!serial.is_empty()).then(|| serial.to_string())
    })
}

/// GUID of the disk at `eid:slot` in a sas2ircu `DISPLAY` dump.
pub fn parse_sas2ircu_guid(output: &str, eid: &str, slot: &str) -> Option<String> {
    let mut enclosure = String::new();
    let mut disk_slot = String::new();

    for line in output.lines().map(str::trim) {
        if line.contains("Enclosure #") {
            enclosure = field_value(line, ':').unwrap_or_default();
        }
        if line.contains("Slot #") {
            disk_slot = field_value(line, ':').unwrap_or_default();
        }
        if enclosure == eid && disk_slot == slot && line.contains("GUID") {
            return field_value(line, ':').filter(|guid| !guid.is_empty());
        }
    }
    None
}

/// Volume WWID for volume `dg` in a sas2ircu `DISPLAY` dump.
///
/// A dump with a single volume answers for any `dg`; otherwise only the
/// block whose `Volume ID` is `dg` matches.
pub fn parse_sas2ircu_volume_wwid(output: &str, dg: &str) -> Option<String> {
    let mut current_id = String::new();
    let mut wwids = Vec::new();

    for line in output.lines().map(str::trim) {
        if line.starts_with("Volume ID") {
            current_id = field_value(line, ':').unwrap_or_default();
            continue;
        }
        if line.contains("Volume wwid") {
            let Some(wwid) = field_value(line, ':').filter(|wwid| !wwid.is_empty()) else {
                continue;
            };
            if current_id == dg.trim() {
                return Some(wwid);
            }
            wwids.push(wwid);
        }
    }
    match wwids.as_slice() {
        [only] => Some(only.clone()),
        _ => None,
    }
}

/// Maps controller identifiers to kernel block device names
pub struct OsDeviceResolver {
    runner: Arc<dyn CommandRunner>,
    links: Arc<dyn SymlinkResolver>,
    by_id_dir: PathBuf,
}

impl OsDeviceResolver {
    pub fn new(runner: Arc<dyn CommandRunner>, links: Arc<dyn SymlinkResolver>) -> Self {
        Self {
            runner,
            links,
            by_id_dir: PathBuf::from(DEFAULT_BY_ID_DIR),
        }
    }

    pub fn with_by_id_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.by_id_dir = dir.into();
        self
    }

    /// Kernel device of a RAID volume. `native_id` is the controller-local
    /// volume number, or for adaptec the `<name>_<unique id>` pair.
    pub fn resolve_raid_volume_device(
        &self,
        manufacturer: &str,
        controller_id: &str,
        native_id: &str,
    ) -> ResolveResult<String> {
        let vendor = parse_vendor(manufacturer)?;
        let cid = controller_number(controller_id);
        debug!(%vendor, controller = cid, volume = native_id, "resolving RAID volume device");

        match vendor {
            HardwareVendor::Mega | HardwareVendor::Perc => {
                let (controller, volume) = (format!("/c{cid}"), format!("/v{native_id}"));
                let output = self.query(vendor, &[controller.as_str(), volume.as_str(), "show", "all"])?;
                match parse_naa_id(&output) {
                    Some(naa) => self.lookup(&wwn_link_name(&naa)),
                    None => Ok(UNKNOWN.to_string()),
                }
            }
            HardwareVendor::Sas2ircu => {
                let output = self.query(vendor, &[cid, "DISPLAY"])?;
                match parse_sas2ircu_volume_wwid(&output, native_id) {
                    Some(wwid) => self.lookup(&sas2ircu_volume_link_name(&wwid)),
                    None => Ok(UNKNOWN.to_string()),
                }
            }
            HardwareVendor::Adaptec => self.lookup(&adaptec_link_name(native_id)),
        }
    }

    /// Kernel device of a passthrough disk addressed by `enclosure:slot`.
    ///
    /// A mega/perc disk whose link is missing is hardware the OS never saw:
    /// that yields [`BOGUS_DISK`] rather than an error.
    pub fn resolve_jbod_disk_device(
        &self,
        manufacturer: &str,
        controller_id: &str,
        eid_slot: &str,
    ) -> ResolveResult<String> {
        let vendor = parse_vendor(manufacturer)?;
        let cid = controller_number(controller_id);

        match vendor {
            HardwareVendor::Mega | HardwareVendor::Perc => {
                let (eid, slot) = split_eid_slot(eid_slot)?;
                let output = self.drive_detail(vendor, cid, eid, slot)?;
                let Some(sas_address) = parse_active_sas_address(&output) else {
                    return Ok(UNKNOWN.to_string());
                };
                match self.lookup(&jbod_link_name(&sas_address)?) {
                    Ok(device) => Ok(device),
                    Err(ResolveError::AddressResolution { path, .. }) => {
                        warn!(
                            controller = cid,
                            eid_slot,
                            path = %path.display(),
                            "controller reports a disk the OS does not know"
                        );
                        Ok(BOGUS_DISK.to_string())
                    }
                    Err(err) => Err(err),
                }
            }
            HardwareVendor::Sas2ircu => {
                let (eid, slot) = split_eid_slot(eid_slot)?;
                let output = self.query(vendor, &[cid, "DISPLAY"])?;
                match parse_sas2ircu_guid(&output, eid, slot) {
                    Some(guid) => self.lookup(&wwn_link_name(&guid)),
                    None => Ok(UNKNOWN.to_string()),
                }
            }
            HardwareVendor::Adaptec => Ok(UNKNOWN.to_string()),
        }
    }

    /// Serial number of a mega/perc drive; other families report it in their
    /// own listings.
    pub fn drive_serial_number(
        &self,
        manufacturer: &str,
        controller_id: &str,
        eid_slot: &str,
    ) -> ResolveResult<String> {
        let vendor = parse_vendor(manufacturer)?;
        if !matches!(vendor, HardwareVendor::Mega | HardwareVendor::Perc) {
            return Ok(UNKNOWN.to_string());
        }

        let cid = controller_number(controller_id);
        let (eid, slot) = split_eid_slot(eid_slot)?;
        let output = self.drive_detail(vendor, cid, eid, slot)?;
        Ok(parse_drive_serial(&output).unwrap_or_else(|| UNKNOWN.to_string()))
    }

    fn drive_detail(
        &self,
        vendor: HardwareVendor,
        cid: &str,
        eid: &str,
        slot: &str,
    ) -> ResolveResult<String> {
        let controller = format!("/c{cid}");
        let enclosure = format!("/e{eid}");
        let slot = format!("/s{slot}");
        self.query(
            vendor,
            &[controller.as_str(), enclosure.as_str(), slot.as_str(), "show", "all"],
        )
    }

    fn query(&self, vendor: HardwareVendor, args: &[&str]) -> ResolveResult<String> {
        let family = vendor_tool(vendor);
        let command = format!("{family} {}", args.join(" "));
        self.runner
            .run(family, args)
            .and_then(|output| output.check(&[]))
            .map_err(|err| {
                error!(%command, "Something went wrong executing command: {err}");
                ResolveError::Execution {
                    command,
                    reason: err.to_string(),
                }
            })
    }

    fn lookup(&self, link_name: &str) -> ResolveResult<String> {
        let path = self.by_id_dir.join(link_name);
        match self.links.read_link(&path) {
            Ok(target) => {
                let device = device_from_link_target(&target.to_string_lossy());
                debug!(link = link_name, %device, "resolved by-id link");
                Ok(device)
            }
            Err(source) => Err(ResolveError::AddressResolution { path, source }),
        }
    }
}
