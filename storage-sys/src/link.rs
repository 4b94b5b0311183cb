// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

/// Reads symlink targets; swapped for an in-memory table in tests.
pub trait SymlinkResolver: Send + Sync {
    fn read_link(&self, path: &Path) -> std::io::Result<PathBuf>;

    /// Names of the links in a directory such as `/dev/disk/by-id` or `/sys/block`.
    fn list_links(&self, dir: &Path) -> std::io::Result<Vec<String>>;
}

/// Resolves links on the real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSymlinkResolver;

impl SymlinkResolver for FsSymlinkResolver {
    fn read_link(&self, path: &Path) -> std::io::Result<PathBuf> {
        std::fs::read_link(path)
    }

    fn list_links(&self, dir: &Path) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            names.push(entry?.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }
}
