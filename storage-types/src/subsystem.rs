// SPDX-License-Identifier: GPL-3.0-only

//! Overlay subsystems and the set of them consuming a device

use std::fmt;
use std::str::FromStr;

use enumflags2::{BitFlags, bitflags};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A storage layer built on top of block devices exposed by another layer.
///
/// Declaration order is the order collectors run in, and therefore the
/// order labels appear in rendered device names.
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Subsystem {
    SoftRaid = 0b0001,
    Zfs = 0b0010,
    Btrfs = 0b0100,
    Lvm = 0b1000,
}

impl Subsystem {
    pub const ALL: [Subsystem; 4] = [
        Subsystem::SoftRaid,
        Subsystem::Zfs,
        Subsystem::Btrfs,
        Subsystem::Lvm,
    ];

    /// Label appended to a consumed device's rendered name.
    pub fn label(self) -> &'static str {
        match self {
            Subsystem::SoftRaid => "SoftRaid",
            Subsystem::Zfs => "ZFS",
            Subsystem::Btrfs => "Btrfs",
            Subsystem::Lvm => "LVM",
        }
    }

    /// Fixed controller id every collector of this subsystem reports under.
    pub fn controller_id(self) -> &'static str {
        match self {
            Subsystem::SoftRaid => "softraid-0",
            Subsystem::Zfs => "zfs-0",
            Subsystem::Btrfs => "btrfs-0",
            Subsystem::Lvm => "lvm-0",
        }
    }

    pub fn manufacturer(self) -> &'static str {
        match self {
            Subsystem::SoftRaid => "mdadm",
            Subsystem::Zfs => "zfs",
            Subsystem::Btrfs => "btrfs",
            Subsystem::Lvm => "lvm",
        }
    }

    pub fn model(self) -> &'static str {
        match self {
            Subsystem::SoftRaid => "MDADM",
            Subsystem::Zfs => "ZFS",
            Subsystem::Btrfs => "Btrfs",
            Subsystem::Lvm => "LVM",
        }
    }

    /// Subsystem owning a controller id, if any.
    pub fn from_controller_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|subsystem| subsystem.controller_id() == id)
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Subsystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|subsystem| subsystem.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown subsystem: {s}"))
    }
}

/// Subsystems consuming one device. Inserting is idempotent and the set
/// keeps no insertion order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Consumers(BitFlags<Subsystem>);

impl Consumers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a consumer; returns `false` if it was already recorded.
    pub fn insert(&mut self, subsystem: Subsystem) -> bool {
        let added = !self.0.contains(subsystem);
        self.0.insert(subsystem);
        added
    }

    pub fn contains(&self, subsystem: Subsystem) -> bool {
        self.0.contains(subsystem)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Subsystem> + '_ {
        self.0.iter()
    }

    /// Legacy rendering: `base` followed by one space-separated label per consumer.
    ///
    /// Labels always come out in declaration order (SoftRaid, ZFS, Btrfs,
    /// LVM), whatever order the consumers were inserted in.
    pub fn render(&self, base: &str) -> String {
        let mut rendered = base.to_string();
        for subsystem in self.iter() {
            rendered.push(' ');
            rendered.push_str(subsystem.label());
        }
        rendered
    }
}

impl FromIterator<Subsystem> for Consumers {
    fn from_iter<T: IntoIterator<Item = Subsystem>>(iter: T) -> Self {
        let mut consumers = Consumers::new();
        for subsystem in iter {
            consumers.insert(subsystem);
        }
        consumers
    }
}

impl Serialize for Consumers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(Subsystem::label))
    }
}

impl<'de> Deserialize<'de> for Consumers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let labels = Vec::<String>::deserialize(deserializer)?;
        labels
            .iter()
            .map(|label| label.parse::<Subsystem>().map_err(D::Error::custom))
            .collect()
    }
}
