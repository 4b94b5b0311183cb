// SPDX-License-Identifier: GPL-3.0-only

//! In-test stand-ins for the system collaborators

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::exec::{CommandOutput, CommandRunner, ToolFamily};
use crate::link::SymlinkResolver;
use crate::probe::{DeviceProperties, DiskIdentity, DiskProbe};
use crate::{Result, SysError};

static COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(label: &str) -> Self {
        let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "storage-sys-{label}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("create temp dir");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Canned command output keyed by family and joined arguments.
#[derive(Default)]
pub struct FakeRunner {
    responses: HashMap<(ToolFamily, String), CommandOutput>,
    missing: Vec<ToolFamily>,
    calls: Mutex<Vec<(ToolFamily, String)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, family: ToolFamily, args: &str, stdout: &str) -> Self {
        self.responses
            .insert((family, args.to_string()), CommandOutput::ok(args, stdout));
        self
    }

    pub fn respond_with(mut self, family: ToolFamily, args: &str, output: CommandOutput) -> Self {
        self.responses.insert((family, args.to_string()), output);
        self
    }

    pub fn without(mut self, family: ToolFamily) -> Self {
        self.missing.push(family);
        self
    }

    pub fn calls(&self) -> Vec<(ToolFamily, String)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, family: ToolFamily, args: &[&str]) -> Result<CommandOutput> {
        let joined = args.join(" ");
        self.calls
            .lock()
            .expect("calls lock")
            .push((family, joined.clone()));
        if self.missing.contains(&family) {
            return Err(SysError::ToolNotFound(family.name().to_string()));
        }
        self.responses
            .get(&(family, joined.clone()))
            .cloned()
            .ok_or_else(|| SysError::CommandFailed {
                command: joined,
                reason: "no canned response".to_string(),
            })
    }

    fn is_available(&self, family: ToolFamily) -> bool {
        !self.missing.contains(&family)
    }
}

/// In-memory symlink table.
#[derive(Default)]
pub struct FakeLinks {
    links: HashMap<PathBuf, PathBuf>,
}

impl FakeLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(mut self, path: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        self.links.insert(path.into(), target.into());
        self
    }
}

impl SymlinkResolver for FakeLinks {
    fn read_link(&self, path: &Path) -> std::io::Result<PathBuf> {
        self.links.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, path.display().to_string())
        })
    }

    fn list_links(&self, dir: &Path) -> std::io::Result<Vec<String>> {
        let mut names: Vec<String> = self
            .links
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Probe answering from a fixed table; unknown devices get unknown attributes.
#[derive(Default)]
pub struct FakeProbe {
    identities: HashMap<String, DiskIdentity>,
    sizes: HashMap<String, String>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disk(mut self, device: &str, size: &str, identity: DiskIdentity) -> Self {
        self.sizes.insert(device.to_string(), size.to_string());
        self.identities.insert(device.to_string(), identity);
        self
    }
}

impl DiskProbe for FakeProbe {
    fn size(&self, device: &str) -> String {
        self.sizes
            .get(device)
            .cloned()
            .unwrap_or_else(|| storage_types::UNKNOWN.to_string())
    }

    fn identity(&self, device: &str) -> DiskIdentity {
        self.identities.get(device).cloned().unwrap_or_default()
    }
}

/// udev properties keyed by device name.
#[derive(Default)]
pub struct FakeProperties {
    values: HashMap<(String, String), String>,
}

impl FakeProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, device: &str, key: &str, value: &str) -> Self {
        self.values
            .insert((device.to_string(), key.to_string()), value.to_string());
        self
    }
}

impl DeviceProperties for FakeProperties {
    fn property(&self, device: &str, key: &str) -> Option<String> {
        self.values
            .get(&(device.to_string(), key.to_string()))
            .cloned()
    }
}
