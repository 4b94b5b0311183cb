// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use thiserror::Error;

use storage_types::UNKNOWN;

/// Why a controller-native identifier could not be mapped to a kernel device
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Unknown manufacturer: {0}")]
    UnknownManufacturer(String),

    #[error("Something went wrong executing command {command}: {reason}")]
    Execution { command: String, reason: String },

    #[error("Could not resolve {}: {source}", path.display())]
    AddressResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid controller address: {0}")]
    InvalidAddress(String),
}

impl ResolveError {
    /// Device name recorded when resolution fails.
    pub const FALLBACK: &'static str = UNKNOWN;

    pub fn fallback_device() -> String {
        Self::FALLBACK.to_string()
    }
}

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Command {command} failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Invalid hardware manifest {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
