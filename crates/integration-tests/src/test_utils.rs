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

//! Test utilities for integration tests

/// Initialization utilities for tests
pub mod init {
    /// Initialize logging for a test; safe to call from every test
    pub fn init_test_environment() {
        ttd_common::logging::ensure_test_logging(None);
    }
}

/// Built-in image fixtures
pub mod images {
    use std::collections::HashMap;

    use ttd_common::ObjectHandle;
    use ttd_engine::{NamedRoot, ObjectArena, Property};

    /// Objects of the fixture image; `true` marks callables
    const NODES: &[(&str, bool)] = &[
        ("global", false),
        ("Object", true),
        ("Object.prototype", false),
        ("Object.prototype.toString", true),
        ("Object.prototype.hasOwnProperty", true),
        ("Object.prototype.__proto__.get", true),
        ("Object.prototype.__proto__.set", true),
        ("Array", true),
        ("Array.prototype", false),
        ("Array.prototype.push", true),
        ("Array.prototype.map", true),
        ("Array.isArray", true),
        ("Math", false),
        ("Math.max", true),
        ("Math.min", true),
        ("JSON", false),
        ("JSON.parse", true),
        ("JSON.stringify", true),
        ("Symbol", true),
        ("Symbol.iterator", false),
    ];

    /// Data properties as (owner, property name, value)
    const DATA: &[(&str, &str, &str)] = &[
        ("global", "Object", "Object"),
        ("global", "Array", "Array"),
        ("global", "Math", "Math"),
        ("global", "JSON", "JSON"),
        ("global", "Symbol", "Symbol"),
        ("global", "globalThis", "global"),
        ("Object", "prototype", "Object.prototype"),
        ("Object.prototype", "constructor", "Object"),
        ("Object.prototype", "toString", "Object.prototype.toString"),
        ("Object.prototype", "hasOwnProperty", "Object.prototype.hasOwnProperty"),
        ("Array", "prototype", "Array.prototype"),
        ("Array", "isArray", "Array.isArray"),
        ("Array.prototype", "constructor", "Array"),
        ("Array.prototype", "push", "Array.prototype.push"),
        ("Array.prototype", "map", "Array.prototype.map"),
        ("Math", "max", "Math.max"),
        ("Math", "min", "Math.min"),
        ("JSON", "parse", "JSON.parse"),
        ("JSON", "stringify", "JSON.stringify"),
        ("Symbol", "iterator", "Symbol.iterator"),
    ];

    /// Number of objects reachable from `global`
    pub const OBJECT_COUNT: usize = 20;

    /// Number of callables, each with one body
    pub const BODY_COUNT: usize = 14;

    /// Number of debugger scopes
    pub const SCOPE_COUNT: usize = 3;

    /// Build the fixture image.
    ///
    /// With `scrambled` set, objects are allocated and properties defined in
    /// reverse order, so handles and raw enumeration order both differ while
    /// the graph stays the same.
    pub fn builtin_image(scrambled: bool) -> (ObjectArena, Vec<NamedRoot>) {
        let mut arena = ObjectArena::new();
        let mut handles: HashMap<&str, ObjectHandle> = HashMap::new();

        let nodes: Vec<_> =
            if scrambled { NODES.iter().rev().collect() } else { NODES.iter().collect() };
        for (name, callable) in nodes {
            let handle = if *callable {
                let (obj, body) = arena.alloc_function();
                match *name {
                    "Array.prototype.map" => {
                        arena.add_scope(body);
                        arena.add_scope(body);
                    }
                    "JSON.parse" => {
                        arena.add_scope(body);
                    }
                    _ => {}
                }
                obj
            } else {
                arena.alloc_object()
            };
            handles.insert(*name, handle);
        }

        let mut properties: Vec<(ObjectHandle, Property)> = DATA
            .iter()
            .map(|(owner, prop, value)| (handles[owner], Property::object(*prop, handles[value])))
            .collect();
        properties.push((handles["Math"], Property::primitive("PI")));
        properties.push((
            handles["Object.prototype"],
            Property::accessor(
                "__proto__",
                Some(handles["Object.prototype.__proto__.get"]),
                Some(handles["Object.prototype.__proto__.set"]),
            ),
        ));
        if scrambled {
            properties.reverse();
        }
        for (owner, property) in properties {
            arena.define_property(owner, property);
        }

        arena.add_root("global", handles["global"]);
        let roots = arena.roots().to_vec();
        (arena, roots)
    }
}

/// Context fixtures
pub mod contexts {
    use ttd_common::{ContextId, ContextSentinels, ExecutionMode, ObjectHandle};
    use ttd_engine::{ExternalContextRef, HostContextFactory};

    /// Five consecutive sentinel handles starting at `base`
    pub fn sentinels(base: u32) -> ContextSentinels {
        ContextSentinels {
            global: ObjectHandle(base),
            undefined: ObjectHandle(base + 1),
            null: ObjectHandle(base + 2),
            true_value: ObjectHandle(base + 3),
            false_value: ObjectHandle(base + 4),
        }
    }

    /// Host factory that hands out sequential wrappers and remembers each call
    #[derive(Debug, Default)]
    pub struct RecordingFactory {
        /// Contexts wrapped so far, with their mode and wrapper
        pub wrapped: Vec<(ContextId, ExecutionMode, ExternalContextRef)>,
    }

    impl HostContextFactory for RecordingFactory {
        fn wrap_context(&mut self, ctx: ContextId, mode: ExecutionMode) -> ExternalContextRef {
            let external = ExternalContextRef(1000 + self.wrapped.len() as u64);
            self.wrapped.push((ctx, mode, external));
            external
        }
    }
}
