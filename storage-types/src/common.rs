// SPDX-License-Identifier: GPL-3.0-only

//! Sentinels and helpers shared by every inventory layer

use num_format::{Locale, ToFormattedString};

/// Attribute value recorded when a layer cannot see the real value.
pub const UNKNOWN: &str = "Unknown";

/// Device name recorded for a passthrough disk the OS does not know about.
pub const BOGUS_DISK: &str = "BogusDisk-OSUnknown";

/// Prefix that marks a passthrough (JBOD) disk in rendered device names.
pub const JBOD_PREFIX: &str = "JBOD-";

/// Kernel device families whose trailing number is part of the whole-disk name.
const NUMBERED_FAMILIES: &[&str] = &[
    "md", "dm-", "nvme", "mmcblk", "loop", "nbd", "zd", "sr", "ram",
];

/// Remove every trailing ASCII digit (`sda3` -> `sda`).
pub fn strip_trailing_digits(name: &str) -> &str {
    name.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// Whole-disk name of a kernel device, used to correlate layers.
///
/// Partition suffixes are removed (`sdb3` -> `sdb`, `nvme0n1p2` -> `nvme0n1`,
/// `md127p1` -> `md127`) while names whose trailing number identifies the
/// device itself (`md127`, `dm-3`, `nvme0n1`) are kept whole.
pub fn base_device(name: &str) -> &str {
    let name = name.trim();
    let name = name.strip_prefix("/dev/").unwrap_or(name);

    if let Some(pos) = name.rfind('p') {
        let (head, tail) = name.split_at(pos);
        let digits = &tail[1..];
        if !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit())
            && head.ends_with(|c: char| c.is_ascii_digit())
        {
            return head;
        }
    }

    if NUMBERED_FAMILIES
        .iter()
        .any(|family| name.starts_with(family))
    {
        return name;
    }

    strip_trailing_digits(name)
}

/// Device names that can take part in cross-layer matching.
pub fn is_matchable_device(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name != UNKNOWN && name != BOGUS_DISK && name != "NONE"
}

/// Convert bytes to human-readable format (e.g., "1.50 GB")
pub fn bytes_to_pretty(bytes: &u64, add_bytes: bool) -> String {
    let mut steps = 0;
    let mut val: f64 = *bytes as f64;

    while val > 1024. && steps <= 8 {
        val /= 1024.;
        steps += 1;
    }

    let unit = match steps {
        0 => "B",
        1 => "KB",
        2 => "MB",
        3 => "GB",
        4 => "TB",
        5 => "PB",
        6 => "EB",
        7 => "ZB",
        8 => "YB",
        _ => "Not Supported",
    };

    if add_bytes {
        let bytes_str = bytes.to_formatted_string(&Locale::en);
        format!("{:.2} {} ({} bytes)", val, unit, bytes_str)
    } else {
        format!("{:.2} {}", val, unit)
    }
}
