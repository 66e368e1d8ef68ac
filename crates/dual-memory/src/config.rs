// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Manager configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! accelerator = "simulated"
//! device_capacity = "256M"
//! component_name = "DualMemoryManager"
//! ```

use crate::abort::DEFAULT_COMPONENT;
use crate::{ConfigError, DeviceCapacity};
use std::path::Path;

/// Whether a manager drives an accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceleratorMode {
    /// Host only: device requests are configuration errors and transfers
    /// are no-ops.
    #[default]
    #[serde(rename = "none")]
    Disabled,
    /// Device buffers backed by host RAM.
    Simulated,
}

/// Configuration for a [`DualMemoryManager`](crate::DualMemoryManager).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    #[serde(default)]
    pub accelerator: AcceleratorMode,
    /// Device memory ceiling (human-readable, e.g. `"512M"`). Unlimited if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_capacity: Option<String>,
    /// Prefix of abort lines and title of usage reports.
    #[serde(default = "default_component_name")]
    pub component_name: String,
}

fn default_component_name() -> String {
    DEFAULT_COMPONENT.to_string()
}

impl ManagerConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parses the device capacity string, if one is set.
    pub fn parse_capacity(&self) -> Result<Option<DeviceCapacity>, ConfigError> {
        self.device_capacity
            .as_deref()
            .map(DeviceCapacity::parse)
            .transpose()
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            accelerator: AcceleratorMode::Disabled,
            device_capacity: None,
            component_name: default_component_name(),
        }
    }
}
