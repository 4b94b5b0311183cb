// SPDX-License-Identifier: GPL-3.0-only

//! Host-facing storage inventory operations
//!
//! This crate talks to the host on behalf of the inventory:
//! - Mapping controller-native identifiers to kernel devices
//! - Running controller and volume-manager tools
//! - Collecting software RAID, ZFS, Btrfs and LVM layouts
//! - Correlating disks across those layers
//!
//! Controller tools and the udev database usually need root; without it
//! most attributes come back as `Unknown`.

pub mod address;
pub mod analyzer;
pub mod correlate;
pub mod error;
pub mod exec;
pub mod link;
pub mod logical;
pub mod manifest;
pub mod probe;
pub mod regular;
pub mod resolve;

#[cfg(test)]
mod testutil;

pub use analyzer::{AnalyzerOptions, AnalyzerPaths, InventoryAnalyzer};
pub use correlate::CorrelationEngine;
pub use error::{ResolveError, Result, SysError};
pub use exec::{CommandOutput, CommandRunner, SystemCommandRunner, ToolFamily, vendor_tool};
pub use link::{FsSymlinkResolver, SymlinkResolver};
pub use manifest::HardwareManifest;
pub use probe::{DeviceProperties, DiskIdentity, DiskProbe, SysDiskProbe, UdevProperties};
pub use resolve::OsDeviceResolver;
