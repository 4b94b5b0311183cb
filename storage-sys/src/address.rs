// SPDX-License-Identifier: GPL-3.0-only

//! Controller address transforms
//!
//! Pure conversions from the identifiers controller tools print (SAS phy
//! addresses, NAA ids, volume WWIDs, GUIDs) to the names udev gives the
//! matching `/dev/disk/by-id` links.

use crate::error::ResolveError;

/// Constant head of every sas2ircu volume WWN as seen by the kernel.
pub const SAS2IRCU_WWN_PREFIX: &str = "600508e000000000";

/// Drop whitespace and a `0x` prefix, lowercase the rest.
pub fn normalize_hex(value: &str) -> String {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact.to_ascii_lowercase();
    compact
        .strip_prefix("0x")
        .map(ToString::to_string)
        .unwrap_or(compact)
}

fn parse_hex(value: &str) -> Result<(u128, usize), ResolveError> {
    let hex = normalize_hex(value);
    if hex.is_empty() || hex.len() > 32 {
        return Err(ResolveError::InvalidAddress(value.to_string()));
    }
    let parsed = u128::from_str_radix(&hex, 16)
        .map_err(|_| ResolveError::InvalidAddress(value.to_string()))?;
    Ok((parsed, hex.len()))
}

/// SAS address minus one, the WWN udev derives for a passthrough disk.
///
/// The result keeps the input width so the transform can be undone with
/// [`increment_hex`].
pub fn decrement_hex(value: &str) -> Result<String, ResolveError> {
    let (parsed, width) = parse_hex(value)?;
    let decremented = parsed
        .checked_sub(1)
        .ok_or_else(|| ResolveError::InvalidAddress(value.to_string()))?;
    Ok(format!("{decremented:0width$x}"))
}

/// Inverse of [`decrement_hex`].
pub fn increment_hex(value: &str) -> Result<String, ResolveError> {
    let (parsed, width) = parse_hex(value)?;
    let incremented = parsed
        .checked_add(1)
        .ok_or_else(|| ResolveError::InvalidAddress(value.to_string()))?;
    Ok(format!("{incremented:0width$x}"))
}

/// Reverse the order of two-character groups (`0392cd` -> `cd9203`).
///
/// sas2ircu prints volume WWIDs byte-swapped. An odd trailing character
/// forms its own group.
pub fn reverse_byte_groups(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    chars
        .chunks(2)
        .rev()
        .flat_map(|group| group.iter())
        .collect()
}

/// `wwn-0x<hex>` link name.
pub fn wwn_link_name(hex: &str) -> String {
    format!("wwn-0x{}", normalize_hex(hex))
}

/// Link name of a sas2ircu RAID volume from the WWID the tool prints.
pub fn sas2ircu_volume_link_name(wwid: &str) -> String {
    let reversed = reverse_byte_groups(&normalize_hex(wwid));
    wwn_link_name(&format!("{SAS2IRCU_WWN_PREFIX}{reversed}"))
}

/// Link name of a mega/perc passthrough disk from its SAS address.
pub fn jbod_link_name(sas_address: &str) -> Result<String, ResolveError> {
    Ok(wwn_link_name(&decrement_hex(sas_address)?))
}

/// Link name of an adaptec logical device (`<name>_<unique id>`).
pub fn adaptec_link_name(dg: &str) -> String {
    format!("scsi-SAdaptec_{}", dg.trim())
}

/// Kernel device name from a by-id symlink target (`../../sda3` -> `sda3`).
pub fn device_from_link_target(target: &str) -> String {
    target.replace("../", "")
}

/// Split an `enclosure:slot` coordinate.
pub fn split_eid_slot(eid_slot: &str) -> Result<(&str, &str), ResolveError> {
    let (eid, slot) = eid_slot
        .split_once(':')
        .ok_or_else(|| ResolveError::InvalidAddress(eid_slot.to_string()))?;
    let (eid, slot) = (eid.trim(), slot.trim());
    if eid.is_empty() || slot.is_empty() {
        return Err(ResolveError::InvalidAddress(eid_slot.to_string()));
    }
    Ok((eid, slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "5000cca23c1237c9",
        "500056b36789abff",
        "0000000000000001",
        "ffffffffffffffff",
        "08e444a2ffdbcba6",
    ];

    #[test]
    fn decrement_matches_udev_naming() {
        assert_eq!(decrement_hex("0x5000cca23c1237c9").unwrap(), "5000cca23c1237c8");
        assert_eq!(decrement_hex("5000CCA23C123800").unwrap(), "5000cca23c1237ff");
        assert_eq!(
            jbod_link_name("5000cca23c1237c9").unwrap(),
            "wwn-0x5000cca23c1237c8"
        );
    }

    #[test]
    fn increment_undoes_decrement() {
        for sample in SAMPLES {
            let decremented = decrement_hex(sample).unwrap();
            assert_eq!(increment_hex(&decremented).unwrap(), *sample);
        }
    }

    #[test]
    fn decrement_rejects_zero_and_garbage() {
        assert!(matches!(
            decrement_hex("0000000000000000"),
            Err(ResolveError::InvalidAddress(_))
        ));
        assert!(decrement_hex("5000cca2zz1237c9").is_err());
        assert!(decrement_hex("").is_err());
    }

    #[test]
    fn byte_group_reversal_is_self_inverse() {
        for sample in SAMPLES {
            assert_eq!(reverse_byte_groups(&reverse_byte_groups(sample)), *sample);
        }
    }

    #[test]
    fn sas2ircu_volume_names() {
        assert_eq!(reverse_byte_groups("0392cdcec8b85290"), "9052b8c8cecd9203");
        assert_eq!(reverse_byte_groups("08e444a2ffdbcba6"), "a6cbdbffa244e408");
        assert_eq!(
            sas2ircu_volume_link_name("08e444a2ffdbcba6"),
            "wwn-0x600508e000000000a6cbdbffa244e408"
        );
    }

    #[test]
    fn link_target_strips_parent_components() {
        assert_eq!(device_from_link_target("../../sda3"), "sda3");
        assert_eq!(device_from_link_target("../../nvme0n1p3"), "nvme0n1p3");
        assert_eq!(device_from_link_target("sdb"), "sdb");
    }

    #[test]
    fn adaptec_names() {
        assert_eq!(adaptec_link_name("DATA_1A2B3C4D"), "scsi-SAdaptec_DATA_1A2B3C4D");
    }

    #[test]
    fn eid_slot_parsing() {
        assert_eq!(split_eid_slot("252:4").unwrap(), ("252", "4"));
        assert_eq!(split_eid_slot(" 1 : 0 ").unwrap(), ("1", "0"));
        assert!(split_eid_slot("252").is_err());
        assert!(split_eid_slot(":4").is_err());
    }
}
