// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Config, LoggingLevel};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_PREFIX: &str = "storage-inventory.log";
const KEEP_DAYS: u64 = 7;

/// Default filter: the configured level for our crates, warnings elsewhere.
fn default_filter(level: LoggingLevel) -> EnvFilter {
    let level = level.as_directive();
    EnvFilter::new(format!(
        "warn,storage_inventory={level},storage_sys={level},storage_types={level}"
    ))
}

pub(crate) fn init(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config.log_level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let Some(dir) = config.log_dir.as_deref() else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        return;
    };

    match file_writer(dir) {
        Ok((writer, guard)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();

            // Keep the background logging worker alive for the duration of the process.
            let _ = LOG_GUARD.set(guard);
        }
        Err(e) => {
            eprintln!("storage-inventory: failed to initialize file logging: {e:#}");
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
        }
    }
}

fn file_writer(
    dir: &Path,
) -> anyhow::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    if let Err(e) = fs::create_dir_all(dir) {
        return Err(anyhow::anyhow!(
            "create log directory failed: {} ({})",
            dir.display(),
            e
        ));
    }

    cleanup_old_logs(dir, LOG_PREFIX, KEEP_DAYS);

    let appender = tracing_appender::rolling::daily(dir, LOG_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

fn cleanup_old_logs(dir: &Path, prefix: &str, keep_days: u64) {
    let cutoff = SystemTime::now().checked_sub(Duration::from_secs(keep_days * 24 * 60 * 60));
    let Some(cutoff) = cutoff else { return };

    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        // Only touch files created by our rolling appender.
        if !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }

        let Ok(modified) = entry.metadata().and_then(|metadata| metadata.modified()) else {
            continue;
        };
        if modified >= cutoff {
            continue;
        }

        let _ = fs::remove_file(entry.path());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "storage-inventory-{label}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn age(path: &Path, days: u64) {
        let when = SystemTime::now() - Duration::from_secs(days * 24 * 60 * 60);
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    #[test]
    fn cleanup_removes_only_old_rolled_logs() {
        let dir = scratch_dir("cleanup");
        for name in [
            "storage-inventory.log.2026-01-01",
            "storage-inventory.log.2026-10-16",
            "other.log",
        ] {
            fs::write(dir.join(name), "").unwrap();
        }
        age(&dir.join("storage-inventory.log.2026-01-01"), 30);
        age(&dir.join("other.log"), 30);

        cleanup_old_logs(&dir, LOG_PREFIX, KEEP_DAYS);

        assert!(!dir.join("storage-inventory.log.2026-01-01").exists());
        assert!(dir.join("storage-inventory.log.2026-10-16").exists());
        assert!(dir.join("other.log").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn default_filter_follows_configured_level() {
        let filter = default_filter(LoggingLevel::Debug).to_string();
        assert!(filter.contains("storage_sys=debug"));
        assert!(filter.contains("storage_inventory=debug"));
    }
}
