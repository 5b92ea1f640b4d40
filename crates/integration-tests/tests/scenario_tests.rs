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

//! End-to-end scenarios across the registry, the journals and the path resolver

use ttd_common::{ExecutionMode, LogPointerId, ObjectHandle, SentinelIds, TtdConfig};
use ttd_engine::{IdentityRegistry, NamedRoot, ObjectArena, PathResolver, Property};
use ttd_integration_tests::test_utils::{
    contexts::{sentinels, RecordingFactory},
    init,
};
use tracing::info;

/// Register, expose a root, retire the context, then tear everything down for a restore
#[test]
fn test_record_lifecycle_to_snapshot_restore() -> eyre::Result<()> {
    init::init_test_environment();

    let config = TtdConfig { first_log_pointer_id: 42, ..Default::default() };
    let mut registry = IdentityRegistry::new(config)?;
    let mut factory = RecordingFactory::default();

    let c1 = registry.register_context(ExecutionMode::Record, sentinels(100), &mut factory)?;
    registry.set_active_context(Some(c1))?;

    let r1 = ObjectHandle(7);
    let id = registry.add_root(r1)?;
    assert_eq!(id, LogPointerId(42));
    assert_eq!(registry.lookup_object(id)?, r1);
    assert_eq!(registry.extract_snapshot_roots(), vec![r1]);

    let record = registry.destroy_context_in_record(c1)?;
    info!(?record, "Context retired in record mode");
    assert!(registry.contexts().is_empty());
    assert_eq!(registry.active_context(), None);
    assert_eq!(registry.dead_context_record(c1)?.ids, SentinelIds::for_context(c1));

    let finalize = registry.clear_contexts_for_snapshot_restore();
    assert_eq!(finalize, vec![factory.wrapped[0].2]);
    assert!(registry.contexts().is_empty());
    assert!(registry.runtime_context_for(c1).is_err());

    // The general root outlives the context teardown until roots are cleared
    assert_eq!(registry.lookup_object(id)?, r1);
    registry.clear_roots_for_snapshot_restore();
    assert!(registry.lookup_object(id).is_err());
    Ok(())
}

/// Raw property order "b" then "a" still assigns "a" first
#[test]
fn test_path_order_ignores_raw_property_order() -> eyre::Result<()> {
    init::init_test_environment();

    let mut arena = ObjectArena::new();
    let root = arena.alloc_object();
    let b = arena.alloc_object();
    let a = arena.alloc_object();
    let b_child = arena.alloc_object();
    let a_child = arena.alloc_object();
    arena.define_property(root, Property::object("b", b));
    arena.define_property(root, Property::object("a", a));
    arena.define_property(b, Property::object("x", b_child));
    arena.define_property(a, Property::object("x", a_child));

    let paths = PathResolver::build(&arena, &[NamedRoot::new("root", root)])?;
    let order = paths.traversal_order();
    info!(?order, "Traversal order");

    assert_eq!(order, ["root", "root.a", "root.b", "root.a.x", "root.b.x"]);
    assert_eq!(paths.lookup_object("root.a")?, a);
    assert_eq!(paths.lookup_object("root.b.x")?, b_child);
    Ok(())
}

/// Replay reconstructs the same ids the record run handed out
#[test]
fn test_replay_reuses_recorded_ids() -> eyre::Result<()> {
    init::init_test_environment();

    let mut recorder = IdentityRegistry::new(TtdConfig::default())?;
    let mut factory = RecordingFactory::default();
    let ctx = recorder.register_context(ExecutionMode::Record, sentinels(0), &mut factory)?;
    let recorded: Vec<_> = [ObjectHandle(10), ObjectHandle(11), ObjectHandle(12)]
        .into_iter()
        .map(|obj| recorder.add_root(obj).map(|id| (obj, id)))
        .collect::<Result<_, _>>()?;
    let global_id = recorder.id_of(ObjectHandle(0))?;

    // Replay runs in a fresh address space with different handles
    let mut replayer = IdentityRegistry::new(TtdConfig::default())?;
    let replayed_ctx = replayer.register_context_in_replay(ctx, sentinels(500), &mut factory)?;
    assert!(replayer.context_created_or_destroyed_in_replay());
    assert_eq!(replayed_ctx, ctx);

    for (obj, id) in &recorded {
        replayer.add_root_with_id(ObjectHandle(obj.0 + 1000), *id)?;
    }
    for (obj, id) in &recorded {
        assert_eq!(replayer.lookup_object(*id)?, ObjectHandle(obj.0 + 1000));
    }
    assert_eq!(replayer.lookup_context(global_id)?, replayed_ctx);
    assert_eq!(replayer.lookup_object(global_id)?, ObjectHandle(500));

    replayer.destroy_context_in_replay(SentinelIds::for_context(replayed_ctx))?;
    assert!(replayer.contexts().is_empty());
    Ok(())
}
