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

//! `ttd verify`

use std::{collections::BTreeSet, path::Path};

use eyre::{bail, Result};
use ttd_common::TtdConfig;
use ttd_engine::PathResolver;

/// Load the image twice and compare two independent path computations
pub fn verify_image(image: &Path, config: TtdConfig) -> Result<()> {
    let first = compute(image, &config)?;
    let second = compute(image, &config)?;

    let first_set: BTreeSet<&String> = first.traversal_order().iter().collect();
    let second_set: BTreeSet<&String> = second.traversal_order().iter().collect();
    if first_set != second_set {
        let diff: Vec<_> = first_set.symmetric_difference(&second_set).collect();
        bail!("Path sets differ between runs: {diff:?}");
    }

    if first.traversal_order() != second.traversal_order() {
        bail!("Traversal order differs between runs");
    }

    println!(
        "ok: {} objects, {} bodies, {} scopes",
        first.object_count(),
        first.body_count(),
        first.scope_count()
    );
    Ok(())
}

fn compute(image: &Path, config: &TtdConfig) -> Result<PathResolver> {
    let arena = super::load_image(image)?;
    Ok(PathResolver::build_with_capacity(
        &arena,
        arena.roots(),
        config.core_object_capacity,
        config.core_body_capacity,
    )?)
}
