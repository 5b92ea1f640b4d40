// TTD - Time-Travel Debugging identity core
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Configuration of a runtime thread's TTD state
//!
//! Values are read from `~/.ttd/config.toml` (or an explicit path). A missing
//! file yields the defaults; a present but malformed file is an error.

use std::{
    fs,
    path::{Path, PathBuf},
};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{TtdError, TtdResult, SENTINEL_ID_TAG};

/// Default bound on simultaneously tracked contexts
pub const DEFAULT_MAX_CONTEXTS: usize = 32;

/// Default capacity hint for core object paths
pub const DEFAULT_CORE_OBJECT_CAPACITY: usize = 1028;

/// Default capacity hint for core function body paths
pub const DEFAULT_CORE_BODY_CAPACITY: usize = 512;

/// Per runtime-thread TTD configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtdConfig {
    /// Location of the log, passed through to the host stream functions
    pub uri: String,
    /// Interval between snapshots in milliseconds
    pub snap_interval: u32,
    /// Number of snapshots kept in history
    pub snap_history_length: u32,
    /// Hard bound on simultaneously tracked contexts
    pub max_contexts: usize,
    /// First ordinary log pointer id handed out while recording
    pub first_log_pointer_id: u64,
    /// Capacity hint for the core object path map
    pub core_object_capacity: usize,
    /// Capacity hint for the core function body path map
    pub core_body_capacity: usize,
}

impl Default for TtdConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            snap_interval: 2000,
            snap_history_length: 2,
            max_contexts: DEFAULT_MAX_CONTEXTS,
            first_log_pointer_id: 1,
            core_object_capacity: DEFAULT_CORE_OBJECT_CAPACITY,
            core_body_capacity: DEFAULT_CORE_BODY_CAPACITY,
        }
    }
}

impl TtdConfig {
    /// Get the default config file path (`~/.ttd/config.toml`)
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir()
            .ok_or_else(|| eyre::eyre!("Unable to determine home directory"))?;
        Ok(home.join(".ttd").join("config.toml"))
    }

    /// Load the configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load the configuration from `path`, falling back to defaults if the file is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;

        let config: Self =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;
        config.validate()?;

        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save the configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {parent:?}"))?;
        }

        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {path:?}"))?;

        debug!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")
    }

    /// Reject values the registry cannot operate with
    pub fn validate(&self) -> TtdResult<()> {
        if self.max_contexts == 0 {
            return Err(TtdError::Config("max_contexts must be at least 1".to_string()));
        }

        if self.first_log_pointer_id == 0 || self.first_log_pointer_id & SENTINEL_ID_TAG != 0 {
            return Err(TtdError::Config(format!(
                "first_log_pointer_id {} is outside the ordinary id range",
                self.first_log_pointer_id
            )));
        }

        Ok(())
    }
}
