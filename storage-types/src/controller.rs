// SPDX-License-Identifier: GPL-3.0-only

//! Controllers and the families they belong to

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::subsystem::Subsystem;

/// Controller id used for disks with no RAID layer at all.
pub const MOTHERBOARD_CONTROLLER_ID: &str = "motherBoard-0";

/// Hardware RAID tool families that can be resolved to kernel devices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareVendor {
    /// Broadcom/LSI MegaRAID (storcli)
    Mega,
    /// Dell PERC (perccli)
    Perc,
    /// LSI SAS2 HBAs (sas2ircu)
    Sas2ircu,
    /// Adaptec/Microsemi (arcconf)
    Adaptec,
}

impl HardwareVendor {
    pub const ALL: [HardwareVendor; 4] = [
        HardwareVendor::Mega,
        HardwareVendor::Perc,
        HardwareVendor::Sas2ircu,
        HardwareVendor::Adaptec,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HardwareVendor::Mega => "mega",
            HardwareVendor::Perc => "perc",
            HardwareVendor::Sas2ircu => "sas2ircu",
            HardwareVendor::Adaptec => "adaptec",
        }
    }
}

impl fmt::Display for HardwareVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HardwareVendor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|vendor| vendor.as_str() == s.trim())
            .ok_or_else(|| s.to_string())
    }
}

/// Which layer a controller id belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ControllerKind {
    Hardware(HardwareVendor),
    Overlay(Subsystem),
    Motherboard,
}

impl ControllerKind {
    /// Classify a controller id such as `mega-0`, `zfs-0` or `motherBoard-0`.
    pub fn from_controller_id(id: &str) -> Option<Self> {
        if id == MOTHERBOARD_CONTROLLER_ID {
            return Some(ControllerKind::Motherboard);
        }
        if let Some(subsystem) = Subsystem::from_controller_id(id) {
            return Some(ControllerKind::Overlay(subsystem));
        }
        let (family, _) = id.rsplit_once('-')?;
        family.parse().ok().map(ControllerKind::Hardware)
    }
}

/// Controller health as reported.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerStatus {
    #[default]
    Good,
    Bad,
}

impl fmt::Display for ControllerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerStatus::Good => f.write_str("Good"),
            ControllerStatus::Bad => f.write_str("Bad"),
        }
    }
}

/// One physical or logical storage subsystem instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    /// Controller id (e.g., "mega-0", "zfs-0", "motherBoard-0")
    pub id: String,

    pub manufacturer: String,

    pub model: String,

    pub status: ControllerStatus,
}

impl Controller {
    pub fn new(
        id: impl Into<String>,
        manufacturer: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            manufacturer: manufacturer.into(),
            model: model.into(),
            status: ControllerStatus::Good,
        }
    }

    /// Controller record for an overlay subsystem collector.
    pub fn for_subsystem(subsystem: Subsystem) -> Self {
        Self::new(
            subsystem.controller_id(),
            subsystem.manufacturer(),
            subsystem.model(),
        )
    }

    pub fn kind(&self) -> Option<ControllerKind> {
        ControllerKind::from_controller_id(&self.id)
    }

    pub fn mark_bad(&mut self) {
        self.status = ControllerStatus::Bad;
    }
}
