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

//! Path assignment must not depend on allocation history or slot order

use ttd_common::{TtdConfig, TtdError};
use ttd_engine::{CoreTarget, IdentityRegistry, MarkList, PathResolver};
use ttd_integration_tests::test_utils::{images, init};

fn sorted_paths(paths: &PathResolver) -> Vec<String> {
    paths
        .sorted_objects()
        .iter()
        .chain(paths.sorted_bodies())
        .chain(paths.sorted_scopes())
        .map(|e| e.path.clone())
        .collect()
}

#[test]
fn test_independent_builds_agree() {
    init::init_test_environment();

    let (first_image, first_roots) = images::builtin_image(false);
    let (second_image, second_roots) = images::builtin_image(false);

    let first = PathResolver::build(&first_image, &first_roots).unwrap();
    let second = PathResolver::build(&second_image, &second_roots).unwrap();

    assert_eq!(first.traversal_order(), second.traversal_order());
    assert_eq!(sorted_paths(&first), sorted_paths(&second));
}

#[test]
fn test_scrambled_image_yields_same_paths() {
    init::init_test_environment();

    let (plain, plain_roots) = images::builtin_image(false);
    let (scrambled, scrambled_roots) = images::builtin_image(true);

    let expected = PathResolver::build(&plain, &plain_roots).unwrap();
    let actual = PathResolver::build(&scrambled, &scrambled_roots).unwrap();

    assert_eq!(expected.traversal_order(), actual.traversal_order());
    assert_eq!(sorted_paths(&expected), sorted_paths(&actual));

    // Same path, same position, even though the handles differ
    for entry in expected.sorted_objects() {
        let CoreTarget::Object(obj) = entry.target else { unreachable!() };
        let other = actual.lookup_object(&entry.path).unwrap();
        assert_eq!(expected.object_position(obj).unwrap(), actual.object_position(other).unwrap());
    }
}

#[test]
fn test_fixture_paths() {
    init::init_test_environment();

    let (image, roots) = images::builtin_image(true);
    let paths = PathResolver::build(&image, &roots).unwrap();

    assert_eq!(paths.object_count(), images::OBJECT_COUNT);
    assert_eq!(paths.body_count(), images::BODY_COUNT);
    assert_eq!(paths.scope_count(), images::SCOPE_COUNT);

    for path in [
        "global.Array.prototype.map",
        "global.Object.prototype.__proto__!get",
        "global.Object.prototype.__proto__!set",
        "global.Symbol.iterator",
    ] {
        assert!(paths.lookup_object(path).is_ok(), "missing {path}");
    }
    assert!(paths.lookup_body("global.JSON.parse!body").is_ok());
    assert!(paths.lookup_scope("global.Array.prototype.map!body!scope[1]").is_ok());

    // Cycles back to already named objects add nothing
    assert!(matches!(paths.lookup_object("global.globalThis"), Err(TtdError::NotFound { .. })));
    assert!(paths.lookup_object("global.Array.prototype.constructor").is_err());
}

#[test]
fn test_registry_marks_every_core_path() {
    init::init_test_environment();

    let (image, roots) = images::builtin_image(false);
    let registry = IdentityRegistry::new(TtdConfig::default()).unwrap();
    registry.ensure_core_paths(&image, &roots).unwrap();

    let mut marks = MarkList::default();
    registry.mark_roots(&mut marks);
    assert_eq!(marks.objects.len(), images::OBJECT_COUNT);
    assert_eq!(marks.bodies.len(), images::BODY_COUNT);
    assert_eq!(marks.scopes.len(), images::SCOPE_COUNT);
}
