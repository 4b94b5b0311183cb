// SPDX-License-Identifier: GPL-3.0-only

//! Storage inventory
//!
//! Lists every disk on the host once, together with the RAID controllers,
//! arrays, pools, filesystems and volume groups built on top of it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use storage_sys::InventoryAnalyzer;

mod config;
mod logging;
mod report;

use config::{Config, LoggingLevel};

#[derive(Debug, Parser)]
#[command(name = "storage-inventory", version)]
#[command(about = "Inventory disks across hardware RAID, software RAID, ZFS, Btrfs and LVM")]
struct Args {
    /// Configuration file (default: /etc/storage-inventory/config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the inventory as JSON
    #[arg(long)]
    json: bool,

    /// Hardware RAID manifest produced by the vendor parsers (repeatable)
    #[arg(long = "manifest", value_name = "PATH")]
    manifests: Vec<PathBuf>,

    #[arg(long, value_enum)]
    log_level: Option<LoggingLevel>,

    #[arg(long)]
    no_softraid: bool,

    #[arg(long)]
    no_zfs: bool,

    #[arg(long)]
    no_btrfs: bool,

    #[arg(long)]
    no_lvm: bool,

    #[arg(long)]
    no_regular_disks: bool,
}

impl Args {
    /// Flags win over the configuration file.
    fn apply(&self, config: &mut Config) {
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        config.hardware_manifests.extend(self.manifests.iter().cloned());

        let subsystems = &mut config.subsystems;
        subsystems.softraid &= !self.no_softraid;
        subsystems.zfs &= !self.no_zfs;
        subsystems.btrfs &= !self.no_btrfs;
        subsystems.lvm &= !self.no_lvm;
        subsystems.regular_disks &= !self.no_regular_disks;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    args.apply(&mut config);

    logging::init(&config);
    tracing::debug!(?config, "configuration loaded");

    if unsafe { libc::geteuid() } != 0 {
        tracing::warn!("not running as root: controller tools and udev data may be unreadable");
    }

    let analyzer = InventoryAnalyzer::for_host(
        &config.tools.overrides(),
        config.analyzer_options(),
        config.analyzer_paths(),
    );
    let inventory = analyzer.run();

    if args.json {
        println!(
            "{}",
            report::render_json(&inventory).context("failed to serialize inventory")?
        );
    } else {
        print!("{}", report::render_text(&inventory));
    }

    Ok(())
}
