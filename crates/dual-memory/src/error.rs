// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for dual memory management.
//!
//! [`DualMemError`] is the taxonomy of misuse and allocation failures. Every
//! variant is fatal under the abort policy in [`crate::abort`]; the `try_*`
//! manager methods surface them as values so callers can inspect the kind
//! before deciding to terminate.

use std::fmt;
use std::path::PathBuf;

/// Which half of a dual object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum MemorySide {
    Host,
    Device,
}

impl fmt::Display for MemorySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemorySide::Host => f.write_str("host"),
            MemorySide::Device => f.write_str("device"),
        }
    }
}

/// Errors raised by [`DualMemoryManager`](crate::DualMemoryManager) operations.
///
/// The `Display` output is the message written on the abort line, after the
/// `"<component> error: "` prefix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DualMemError {
    /// Device memory was requested but no accelerator is attached.
    #[error("{label} was requested to be allocated on device as well, but accelerator support is not enabled.")]
    Configuration { label: String },

    /// The host or device allocator could not satisfy the request.
    #[error("Failed to allocate {side} memory.")]
    AllocationFailure { label: String, side: MemorySide },

    /// The label is already tracked by this manager.
    #[error("{label} already exists. Please choose another label.")]
    DuplicateLabel { label: String },

    /// A release was requested for a label this manager does not track.
    #[error("{label} was not found by memory manager.")]
    UntrackedRelease { label: String },

    /// The operation needs a buffer the dual object does not hold.
    #[error("{label}'s {side} pointer is a null pointer.")]
    DanglingPointer { label: String, side: MemorySide },

    /// A transfer window reaches past the end of the array.
    #[error("{label}: transfer of {count} elements at offset {offset} exceeds array length {len}.")]
    OutOfBounds {
        label: String,
        offset: usize,
        count: usize,
        len: usize,
    },
}

impl DualMemError {
    /// Returns the label of the dual object involved.
    pub fn label(&self) -> &str {
        match self {
            DualMemError::Configuration { label }
            | DualMemError::AllocationFailure { label, .. }
            | DualMemError::DuplicateLabel { label }
            | DualMemError::UntrackedRelease { label }
            | DualMemError::DanglingPointer { label, .. }
            | DualMemError::OutOfBounds { label, .. } => label,
        }
    }

    /// Returns a stable name for the error kind, used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DualMemError::Configuration { .. } => "ConfigurationError",
            DualMemError::AllocationFailure { .. } => "AllocationFailure",
            DualMemError::DuplicateLabel { .. } => "DuplicateLabel",
            DualMemError::UntrackedRelease { .. } => "UntrackedRelease",
            DualMemError::DanglingPointer { .. } => "DanglingPointer",
            DualMemError::OutOfBounds { .. } => "OutOfBounds",
        }
    }
}

/// Errors that can occur while loading a [`ManagerConfig`](crate::ManagerConfig).
///
/// Unlike [`DualMemError`] these are ordinary recoverable errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML document is malformed or has unexpected fields.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be written as TOML.
    #[error("TOML serialise error: {0}")]
    Serialise(#[from] toml::ser::Error),

    /// A device capacity string could not be parsed.
    #[error("invalid device capacity '{input}': {reason}")]
    InvalidCapacity { input: String, reason: String },
}
