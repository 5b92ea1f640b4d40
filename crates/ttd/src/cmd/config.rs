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

//! `ttd config`

use std::path::Path;

use eyre::Result;
use ttd_common::TtdConfig;

/// Load the configuration from `path`, or from the default location
pub fn load_config(path: Option<&Path>) -> Result<TtdConfig> {
    match path {
        Some(path) => TtdConfig::load_from(path),
        None => TtdConfig::load(),
    }
}

/// Print the effective configuration
pub fn show_config(config: &TtdConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
