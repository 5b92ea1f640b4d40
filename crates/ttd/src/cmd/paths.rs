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

//! `ttd paths`

use std::path::Path;

use eyre::{bail, Result};
use ttd_common::TtdConfig;
use ttd_engine::{CorePathEntry, CoreTarget, IdentityRegistry, NamedRoot, PathResolver};

/// Compute and print every core path of the image, one `kind<TAB>path` line each
pub fn print_paths(image: &Path, root_names: &[String], config: TtdConfig) -> Result<()> {
    let arena = super::load_image(image)?;
    let roots = select_roots(arena.roots(), root_names)?;

    let registry = IdentityRegistry::new(config)?;
    let paths = registry.ensure_core_paths(&arena, &roots)?;

    for line in render_paths(paths) {
        println!("{line}");
    }

    tracing::info!(
        objects = paths.object_count(),
        bodies = paths.body_count(),
        scopes = paths.scope_count(),
        "Printed core paths"
    );
    Ok(())
}

/// The image's roots, restricted to `names` when any are given
pub fn select_roots(available: &[NamedRoot], names: &[String]) -> Result<Vec<NamedRoot>> {
    if names.is_empty() {
        return Ok(available.to_vec());
    }

    names
        .iter()
        .map(|name| match available.iter().find(|r| &r.name == name) {
            Some(root) => Ok(root.clone()),
            None => bail!("Image has no root named `{name}`"),
        })
        .collect()
}

/// Lines for every path, objects first, then bodies, then scopes, each name-sorted
pub fn render_paths(paths: &PathResolver) -> Vec<String> {
    paths
        .sorted_objects()
        .iter()
        .chain(paths.sorted_bodies())
        .chain(paths.sorted_scopes())
        .map(render_entry)
        .collect()
}

fn render_entry(entry: &CorePathEntry) -> String {
    let kind = match entry.target {
        CoreTarget::Object(_) => "object",
        CoreTarget::Body(_) => "body",
        CoreTarget::Scope(_) => "scope",
    };
    format!("{kind}\t{}", entry.path)
}
