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

//! Registry and journal properties exercised through the public API

use ttd_common::{
    ContextId, ExecutionMode, LogPointerId, NameIndex, ObjectHandle, SentinelIds, SentinelSlot,
    TtdConfig, TtdError,
};
use ttd_engine::{IdentityRegistry, ObjectArena};
use ttd_integration_tests::test_utils::{
    contexts::{sentinels, RecordingFactory},
    init,
};

fn registry() -> IdentityRegistry {
    IdentityRegistry::new(TtdConfig::default()).unwrap()
}

#[test]
fn test_ids_round_trip_until_context_is_gone() {
    init::init_test_environment();

    let mut registry = registry();
    let mut factory = RecordingFactory::default();
    let ctx = registry.register_context(ExecutionMode::Record, sentinels(0), &mut factory).unwrap();

    let objects: Vec<_> = (100..164).map(ObjectHandle).collect();
    for obj in &objects {
        registry.add_root(*obj).unwrap();
    }
    for obj in &objects {
        let id = registry.id_of(*obj).unwrap();
        assert_eq!(registry.lookup_object(id).unwrap(), *obj);
    }
    assert_eq!(registry.inverted_root_map().len(), objects.len());

    let global = registry.add_special_root(ctx, SentinelSlot::Global).unwrap();
    assert_eq!(registry.lookup_object(global).unwrap(), ObjectHandle(0));

    registry.destroy_context_in_record(ctx).unwrap();
    assert!(matches!(registry.lookup_object(global), Err(TtdError::NotFound { .. })));
    // Ordinary roots do not belong to a context
    assert_eq!(registry.lookup_object(LogPointerId(1)).unwrap(), ObjectHandle(100));
}

#[test]
fn test_local_roots_are_rebuilt_per_step() {
    init::init_test_environment();

    let mut registry = registry();
    registry.add_root(ObjectHandle(1)).unwrap();
    registry.add_root(ObjectHandle(2)).unwrap();
    let before = registry.inverted_root_map();

    for step in 0..3u32 {
        for obj in 10..15 {
            registry.add_local_root(ObjectHandle(obj + step * 10)).unwrap();
        }
        registry.add_local_root(ObjectHandle(1)).unwrap();
        assert_eq!(registry.extract_snapshot_roots().len(), 7);

        registry.clear_local_roots_and_refresh_map();
        assert_eq!(registry.inverted_root_map(), before);
        assert_eq!(registry.root_set().collect::<Vec<_>>(), vec![ObjectHandle(1), ObjectHandle(2)]);
    }
}

#[test]
fn test_dead_contexts_survive_their_context() {
    init::init_test_environment();

    let mut registry = registry();
    let mut factory = RecordingFactory::default();
    let c0 = registry.register_context(ExecutionMode::Record, sentinels(0), &mut factory).unwrap();
    let c1 = registry.register_context(ExecutionMode::Record, sentinels(5), &mut factory).unwrap();
    let c2 = registry.register_context(ExecutionMode::Record, sentinels(10), &mut factory).unwrap();

    registry.destroy_context_in_record(c1).unwrap();
    registry.destroy_context_in_record(c0).unwrap();

    let ids: Vec<ContextId> = registry.contexts().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![c2]);

    let dead: Vec<ContextId> = registry.dead_contexts_for_record().iter().map(|r| r.context).collect();
    assert_eq!(dead, vec![c1, c0]);
    assert_eq!(registry.dead_context_record(c1).unwrap().ids, SentinelIds::for_context(c1));

    // Context ids are never reused
    let c3 = registry.register_context(ExecutionMode::Record, sentinels(20), &mut factory).unwrap();
    assert_eq!(c3, ContextId(3));
}

#[test]
fn test_collector_retirement_is_deferred() {
    init::init_test_environment();

    let mut registry = registry();
    let mut factory = RecordingFactory::default();
    let ctx = registry.register_context(ExecutionMode::Record, sentinels(0), &mut factory).unwrap();

    registry.collector_notifier().context_retired(ctx);
    assert!(registry.is_tracked(ctx));

    let records = registry.process_retired_contexts().unwrap();
    assert_eq!(records[0].ids, SentinelIds::for_context(ctx));
    assert_eq!(registry.clear_contexts_for_snapshot_restore().len(), 1);
}

#[test]
fn test_loaded_code_is_registered_once() {
    init::init_test_environment();

    let mut arena = ObjectArena::new();
    let script = arena.alloc_body(Some("main.js"), true);
    let inner = arena.alloc_body(Some("main.js"), false);
    arena.add_nested_body(script, inner);

    let mut registry = registry();
    let mut factory = RecordingFactory::default();
    let ctx = registry.register_context(ExecutionMode::Record, sentinels(0), &mut factory).unwrap();
    let journal = registry.journal_mut(ctx).unwrap();

    assert!(journal.register_script_load(script, 1, &mut arena).unwrap());
    assert!(!journal.register_script_load(script, 1, &mut arena).unwrap());
    assert!(!journal.register_new_function(script, 2, &mut arena).unwrap());

    assert_eq!(journal.script_loads().len(), 1);
    assert!(journal.new_functions().is_empty());
    assert_eq!(journal.resolve_parent(inner).unwrap(), Some(script));
    assert_eq!(journal.find_body_by_source_name("main.js"), Some(script));
    assert_eq!(arena.parse_count(), 1);
}

/// Deterministic permutation of `0..n`
fn scrambled(n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    for i in (1..n).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        order.swap(i, (state % (i as u64 + 1)) as usize);
    }
    order
}

#[test]
fn test_sort_and_search_over_many_sizes() {
    init::init_test_environment();

    for n in [0, 1, 2, 9, 57, 300, 1500] {
        let names: Vec<String> = scrambled(n).into_iter().map(|i| format!("name{i:05}")).collect();
        let index = NameIndex::build(names, |s: &String| s.as_str());

        for (pos, name) in index.items().iter().enumerate() {
            assert_eq!(index.lookup_required(name, |s: &String| s.as_str()).unwrap(), pos);
        }
        for absent in ["", "name", "name99999", "zzz"] {
            assert_eq!(index.lookup_optional(absent, |s: &String| s.as_str()), None);
        }
        if n == 0 {
            assert!(matches!(
                index.lookup_required("name00000", |s: &String| s.as_str()),
                Err(TtdError::InvariantViolation(_))
            ));
        }
    }
}
