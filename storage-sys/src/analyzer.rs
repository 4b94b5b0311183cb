// SPDX-License-Identifier: GPL-3.0-only

//! One full inventory run
//!
//! Hardware manifests are resolved first, then the overlay collectors run in
//! [`Subsystem::ALL`] order, then correlation passes 1 to 3 per overlay, then
//! plain disks, then the attribute backfill.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use storage_types::{Inventory, Subsystem};
use tracing::{error, info, warn};

use crate::correlate::CorrelationEngine;
use crate::exec::{CommandRunner, SystemCommandRunner, ToolFamily};
use crate::link::{FsSymlinkResolver, SymlinkResolver};
use crate::logical::{CollectorContext, discover_overlay_subsystems};
use crate::manifest::HardwareManifest;
use crate::probe::{DiskProbe, SysDiskProbe, UdevProperties};
use crate::regular::{DEFAULT_SYS_BLOCK_DIR, discover_regular_disks};
use crate::resolve::{DEFAULT_BY_ID_DIR, OsDeviceResolver};

/// Where the host exposes its block device metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerPaths {
    pub by_id_dir: PathBuf,
    pub sys_block_dir: PathBuf,
    pub proc_partitions: PathBuf,
    pub mdstat: PathBuf,
}

impl Default for AnalyzerPaths {
    fn default() -> Self {
        Self {
            by_id_dir: PathBuf::from(DEFAULT_BY_ID_DIR),
            sys_block_dir: PathBuf::from(DEFAULT_SYS_BLOCK_DIR),
            proc_partitions: PathBuf::from("/proc/partitions"),
            mdstat: PathBuf::from("/proc/mdstat"),
        }
    }
}

/// Which sources take part in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerOptions {
    pub subsystems: Vec<Subsystem>,
    pub regular_disks: bool,
    pub manifests: Vec<PathBuf>,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            subsystems: Subsystem::ALL.to_vec(),
            regular_disks: true,
            manifests: Vec::new(),
        }
    }
}

/// Builds one [`Inventory`] from every enabled source
pub struct InventoryAnalyzer {
    runner: Arc<dyn CommandRunner>,
    links: Arc<dyn SymlinkResolver>,
    probe: Arc<dyn DiskProbe>,
    options: AnalyzerOptions,
    paths: AnalyzerPaths,
    engine: CorrelationEngine,
}

impl InventoryAnalyzer {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        links: Arc<dyn SymlinkResolver>,
        probe: Arc<dyn DiskProbe>,
        options: AnalyzerOptions,
        paths: AnalyzerPaths,
    ) -> Self {
        Self {
            runner,
            links,
            probe,
            options,
            paths,
            engine: CorrelationEngine::new(),
        }
    }

    /// Analyzer wired to the real host: system binaries (with explicit
    /// overrides), the real filesystem and udev.
    pub fn for_host(
        tools: &HashMap<ToolFamily, PathBuf>,
        options: AnalyzerOptions,
        paths: AnalyzerPaths,
    ) -> Self {
        let runner = tools
            .iter()
            .fold(SystemCommandRunner::new(), |runner, (family, path)| {
                runner.with_override(*family, path.clone())
            });
        let links: Arc<dyn SymlinkResolver> = Arc::new(FsSymlinkResolver);
        let properties = Arc::new(UdevProperties::new(&paths.sys_block_dir));
        let probe = SysDiskProbe::new(links.clone(), properties)
            .with_proc_partitions(&paths.proc_partitions)
            .with_by_id_dir(&paths.by_id_dir);

        Self::new(Arc::new(runner), links, Arc::new(probe), options, paths)
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Run every enabled source and correlate the result.
    pub fn run(&self) -> Inventory {
        let mut inventory = Inventory::new();

        self.load_manifests(&mut inventory);

        let mut ctx = CollectorContext::new(self.runner.as_ref(), self.probe.as_ref());
        ctx.mdstat = self.paths.mdstat.clone();
        let overlays = discover_overlay_subsystems(&self.options.subsystems, &ctx);
        let found: Vec<Subsystem> = overlays.iter().map(|(subsystem, _)| *subsystem).collect();
        for (_, overlay) in overlays {
            inventory.merge(overlay);
        }
        for subsystem in found {
            self.engine
                .correlate_overlay(&mut inventory, subsystem.controller_id());
        }

        if self.options.regular_disks {
            match discover_regular_disks(
                self.links.as_ref(),
                self.probe.as_ref(),
                &self.paths.sys_block_dir,
                &inventory,
            ) {
                Ok(Some(disks)) => inventory.merge(disks),
                Ok(None) => info!("no plain disks left to report"),
                Err(err) => error!(
                    path = %self.paths.sys_block_dir.display(),
                    "plain disk discovery failed: {err}"
                ),
            }
        }

        self.engine.backfill_attributes(&mut inventory);

        info!(
            controllers = inventory.controllers.len(),
            volumes = inventory.raids.len(),
            disks = inventory.disk_count(),
            "inventory complete"
        );
        inventory
    }

    fn load_manifests(&self, inventory: &mut Inventory) {
        if self.options.manifests.is_empty() {
            return;
        }

        let resolver = OsDeviceResolver::new(self.runner.clone(), self.links.clone())
            .with_by_id_dir(&self.paths.by_id_dir);
        for path in &self.options.manifests {
            match HardwareManifest::load(path) {
                Ok(manifest) => {
                    let resolved = manifest.resolve(&resolver);
                    info!(
                        path = %path.display(),
                        controllers = resolved.controllers.len(),
                        "hardware manifest loaded"
                    );
                    inventory.merge(resolved);
                }
                Err(err) => warn!("skipping hardware manifest: {err}"),
            }
        }
    }
}
