// SPDX-License-Identifier: GPL-3.0-only

//! Inventory models shared by every storage layer
//!
//! Collectors build these records, the correlation engine annotates them in
//! place, and the reporting binary renders them.
//!
//! ## Layers
//!
//! - **Underlying layers** expose raw block devices: hardware RAID
//!   controllers, their passthrough (JBOD) disks and plain motherboard disks.
//! - **Overlay layers** ([`Subsystem`]) consume those devices: software RAID,
//!   ZFS, Btrfs and LVM.
//!
//! A device consumed by an overlay keeps its own record and gains the
//! overlay in its [`Consumers`] set; nothing is duplicated.

pub mod common;
pub mod controller;
pub mod disk;
pub mod inventory;
pub mod raid;
pub mod subsystem;

pub use common::{
    BOGUS_DISK, JBOD_PREFIX, UNKNOWN, base_device, bytes_to_pretty, is_matchable_device,
    strip_trailing_digits,
};
pub use controller::{
    Controller, ControllerKind, ControllerStatus, HardwareVendor, MOTHERBOARD_CONTROLLER_ID,
};
pub use disk::{PhysicalDisk, UnassignedDisk};
pub use inventory::{DiskRef, Inventory, SubsystemInventory};
pub use raid::{Pool, RaidVolume, VolumeGroup};
pub use subsystem::{Consumers, Subsystem};
