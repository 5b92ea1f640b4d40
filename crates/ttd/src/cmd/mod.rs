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

//! Command modules for the TTD CLI

pub mod config;
pub mod paths;
pub mod verify;

pub use config::{load_config, show_config};
pub use paths::print_paths;
pub use verify::verify_image;

use std::{fs, path::Path};

use eyre::{Context, Result};
use ttd_engine::ObjectArena;

/// Read and validate a JSON image description
pub fn load_image(path: &Path) -> Result<ObjectArena> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read image file: {path:?}"))?;
    ObjectArena::from_json(&json).with_context(|| format!("Invalid image description: {path:?}"))
}
