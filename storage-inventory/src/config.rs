// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use storage_sys::{AnalyzerOptions, AnalyzerPaths, ToolFamily};
use storage_types::Subsystem;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/storage-inventory/config.toml";

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Explicit binaries per tool family; unset ones are looked up on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub storcli: Option<PathBuf>,
    pub perccli: Option<PathBuf>,
    pub sas2ircu: Option<PathBuf>,
    pub arcconf: Option<PathBuf>,
    pub zpool: Option<PathBuf>,
    pub btrfs: Option<PathBuf>,
    pub lvm: Option<PathBuf>,
}

impl ToolsConfig {
    pub fn overrides(&self) -> HashMap<ToolFamily, PathBuf> {
        [
            (ToolFamily::Storcli, &self.storcli),
            (ToolFamily::Perccli, &self.perccli),
            (ToolFamily::Sas2ircu, &self.sas2ircu),
            (ToolFamily::Arcconf, &self.arcconf),
            (ToolFamily::Zpool, &self.zpool),
            (ToolFamily::Btrfs, &self.btrfs),
            (ToolFamily::Lvm, &self.lvm),
        ]
        .into_iter()
        .filter_map(|(family, path)| path.clone().map(|path| (family, path)))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubsystemsConfig {
    pub softraid: bool,
    pub zfs: bool,
    pub btrfs: bool,
    pub lvm: bool,
    pub regular_disks: bool,
}

impl Default for SubsystemsConfig {
    fn default() -> Self {
        Self {
            softraid: true,
            zfs: true,
            btrfs: true,
            lvm: true,
            regular_disks: true,
        }
    }
}

impl SubsystemsConfig {
    pub fn enabled(&self) -> Vec<Subsystem> {
        [
            (Subsystem::SoftRaid, self.softraid),
            (Subsystem::Zfs, self.zfs),
            (Subsystem::Btrfs, self.btrfs),
            (Subsystem::Lvm, self.lvm),
        ]
        .into_iter()
        .filter_map(|(subsystem, enabled)| enabled.then_some(subsystem))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log_level: LoggingLevel,
    /// Daily rolling log files are written here when set
    pub log_dir: Option<PathBuf>,
    pub by_id_dir: PathBuf,
    pub sys_block_dir: PathBuf,
    pub proc_partitions: PathBuf,
    pub mdstat: PathBuf,
    pub tools: ToolsConfig,
    pub subsystems: SubsystemsConfig,
    pub hardware_manifests: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let paths = AnalyzerPaths::default();
        Self {
            log_level: LoggingLevel::Info,
            log_dir: None,
            by_id_dir: paths.by_id_dir,
            sys_block_dir: paths.sys_block_dir,
            proc_partitions: paths.proc_partitions,
            mdstat: paths.mdstat,
            tools: ToolsConfig::default(),
            subsystems: SubsystemsConfig::default(),
            hardware_manifests: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid configuration")
    }

    /// Read `path`, or the system-wide file when it exists. No file at all
    /// means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn analyzer_paths(&self) -> AnalyzerPaths {
        AnalyzerPaths {
            by_id_dir: self.by_id_dir.clone(),
            sys_block_dir: self.sys_block_dir.clone(),
            proc_partitions: self.proc_partitions.clone(),
            mdstat: self.mdstat.clone(),
        }
    }

    pub fn analyzer_options(&self) -> AnalyzerOptions {
        AnalyzerOptions {
            subsystems: self.subsystems.enabled(),
            regular_disks: self.subsystems.regular_disks,
            manifests: self.hardware_manifests.clone(),
        }
    }
}
