// SPDX-License-Identifier: GPL-3.0-only

//! External command execution
//!
//! Everything that talks to controller or volume-manager tools goes through
//! [`CommandRunner`], so tests can hand in canned output.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Mutex, PoisonError};

use storage_types::HardwareVendor;
use tracing::debug;

use crate::{Result, SysError};

/// Tool families the inventory shells out to
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ToolFamily {
    Storcli,
    Perccli,
    Sas2ircu,
    Arcconf,
    Zpool,
    Btrfs,
    Lvm,
}

impl ToolFamily {
    /// Binary names tried on `PATH`, most specific first.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            ToolFamily::Storcli => &["storcli64", "storcli"],
            ToolFamily::Perccli => &["perccli64", "perccli"],
            ToolFamily::Sas2ircu => &["sas2ircu"],
            ToolFamily::Arcconf => &["arcconf"],
            ToolFamily::Zpool => &["zpool"],
            ToolFamily::Btrfs => &["btrfs"],
            ToolFamily::Lvm => &["lvm"],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolFamily::Storcli => "storcli",
            ToolFamily::Perccli => "perccli",
            ToolFamily::Sas2ircu => "sas2ircu",
            ToolFamily::Arcconf => "arcconf",
            ToolFamily::Zpool => "zpool",
            ToolFamily::Btrfs => "btrfs",
            ToolFamily::Lvm => "lvm",
        }
    }
}

impl fmt::Display for ToolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tool family that manages a hardware controller vendor.
pub fn vendor_tool(vendor: HardwareVendor) -> ToolFamily {
    match vendor {
        HardwareVendor::Mega => ToolFamily::Storcli,
        HardwareVendor::Perc => ToolFamily::Perccli,
        HardwareVendor::Sas2ircu => ToolFamily::Sas2ircu,
        HardwareVendor::Adaptec => ToolFamily::Arcconf,
    }
}

/// Captured result of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Rendered command line, for diagnostics
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(command: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
        }
    }

    pub fn failed(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
        }
    }

    /// Stdout if the command succeeded without diagnostics, or if its
    /// diagnostics contain one of the `benign` patterns.
    pub fn check(self, benign: &[&str]) -> Result<String> {
        let stderr = self.stderr.trim();
        if self.success && stderr.is_empty() {
            return Ok(self.stdout);
        }
        if !stderr.is_empty() && benign.iter().any(|pattern| stderr.contains(pattern)) {
            debug!(command = %self.command, "ignoring benign diagnostics: {stderr}");
            return Ok(self.stdout);
        }

        let reason = if stderr.is_empty() {
            "exited with failure status".to_string()
        } else {
            stderr.to_string()
        };
        Err(SysError::CommandFailed {
            command: self.command,
            reason,
        })
    }
}

/// Runs one external tool invocation to completion.
pub trait CommandRunner: Send + Sync {
    /// A non-zero exit is reported through [`CommandOutput::success`]; only a
    /// missing binary or a spawn failure is an `Err`.
    fn run(&self, family: ToolFamily, args: &[&str]) -> Result<CommandOutput>;

    fn is_available(&self, family: ToolFamily) -> bool;
}

/// Runs system-installed binaries located with `which`
#[derive(Debug, Default)]
pub struct SystemCommandRunner {
    overrides: HashMap<ToolFamily, PathBuf>,
    located: Mutex<HashMap<ToolFamily, PathBuf>>,
}

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit binary for a family instead of searching `PATH`.
    pub fn with_override(mut self, family: ToolFamily, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(family, path.into());
        self
    }

    pub fn locate(&self, family: ToolFamily) -> Result<PathBuf> {
        if let Some(path) = self.overrides.get(&family) {
            return Ok(path.clone());
        }

        let mut located = self.located.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = located.get(&family) {
            return Ok(path.clone());
        }

        let path = family
            .candidates()
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| SysError::ToolNotFound(family.name().to_string()))?;
        debug!(%family, path = %path.display(), "located tool");
        located.insert(family, path.clone());
        Ok(path)
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, family: ToolFamily, args: &[&str]) -> Result<CommandOutput> {
        let binary = self.locate(family)?;
        let command = format!("{} {}", binary.display(), args.join(" "));
        debug!(%command, "running");

        let output = Command::new(&binary).args(args).output()?;
        Ok(CommandOutput {
            command,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }

    fn is_available(&self, family: ToolFamily) -> bool {
        self.locate(family).is_ok()
    }
}
