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

//! Deterministic path names for the built-in (core) image.
//!
//! Every object reachable from the named roots before user code runs gets a
//! path such as `global.Array.prototype.push`. Paths are assigned by a
//! breadth-first walk that re-sorts each object's own properties by name, so
//! the result depends only on the shape of the graph and never on slot order
//! or allocation history.
//!
//! Path grammar:
//!
//! | target | path |
//! |---|---|
//! | root | `<root name>` |
//! | data property | `<parent>.<name>` |
//! | getter / setter | `<parent>.<name>!get` / `<parent>.<name>!set` |
//! | function body | `<owner>!body` |
//! | debugger scope | `<body>!scope[<slot>]` |

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;
use ttd_common::{
    shell_sort_by, DebuggerScopeHandle, FunctionBodyHandle, LookupKind, NameIndex, ObjectHandle,
    TtdError, TtdResult, DEFAULT_CORE_BODY_CAPACITY, DEFAULT_CORE_OBJECT_CAPACITY,
};

use crate::{CoreImage, MarkVisitor, PropertyValue};

/// Separator between a parent path and a property name
pub const PATH_SEPARATOR: &str = ".";

/// Suffix of a getter reached through an accessor property
pub const GETTER_TAG: &str = "!get";

/// Suffix of a setter reached through an accessor property
pub const SETTER_TAG: &str = "!set";

/// Suffix naming the function body of a callable
pub const BODY_TAG: &str = "!body";

/// A named entry point of the path walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRoot {
    /// Root name, the first path component
    pub name: String,
    /// Root object
    pub object: ObjectHandle,
}

impl NamedRoot {
    /// Create a named root
    pub fn new(name: impl Into<String>, object: ObjectHandle) -> Self {
        Self { name: name.into(), object }
    }
}

/// Anything a core path can name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoreTarget {
    /// A built-in object
    Object(ObjectHandle),
    /// A function body of a built-in callable
    Body(FunctionBodyHandle),
    /// A debugger scope of such a body
    Scope(DebuggerScopeHandle),
}

/// A path and its target, as stored in the name-sorted indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorePathEntry {
    /// Canonical path
    pub path: String,
    /// What the path names
    pub target: CoreTarget,
}

fn entry_path(entry: &CorePathEntry) -> &str {
    &entry.path
}

/// Build `parent.name` with an optional accessor tag
pub fn build_path(parent: &str, name: &str, accessor_tag: Option<&str>) -> String {
    let mut path = String::with_capacity(parent.len() + name.len() + 5);
    path.push_str(parent);
    path.push_str(PATH_SEPARATOR);
    path.push_str(name);
    if let Some(tag) = accessor_tag {
        path.push_str(tag);
    }
    path
}

/// Path token for an array element
pub fn array_index_token(index: u32) -> String {
    format!("[{index}]")
}

/// Path token for a closure environment
pub fn environment_token(env_index: u32) -> String {
    format!("!env[{env_index}]")
}

/// Path token for a slot in a closure environment
pub fn environment_slot_token(env_index: u32, slot_index: u32) -> String {
    format!("!env[{env_index}].slot[{slot_index}]")
}

/// Worklist state of a single breadth-first walk
struct PathWalk<'a, I: ?Sized> {
    image: &'a I,
    worklist: VecDeque<ObjectHandle>,
    resolver: PathResolver,
}

impl<I: CoreImage + ?Sized> PathWalk<'_, I> {
    fn claim_path(&mut self, path: &str, target: CoreTarget) -> TtdResult<()> {
        if let Some(existing) = self.resolver.path_targets.get(path) {
            return Err(TtdError::invariant(format!(
                "core path `{path}` assigned to both {existing:?} and {target:?}"
            )));
        }
        self.resolver.path_targets.insert(path.to_string(), target);
        self.resolver.traversal_order.push(path.to_string());
        Ok(())
    }

    fn enqueue_root(&mut self, root: &NamedRoot) -> TtdResult<()> {
        self.enqueue_object(root.name.clone(), root.object)
    }

    fn enqueue_object(&mut self, path: String, obj: ObjectHandle) -> TtdResult<()> {
        if self.resolver.object_paths.contains_key(&obj) {
            return Ok(());
        }
        self.claim_path(&path, CoreTarget::Object(obj))?;
        self.resolver.object_paths.insert(obj, path);
        self.worklist.push_back(obj);
        Ok(())
    }

    fn enqueue_child(
        &mut self,
        parent: &str,
        name: &str,
        accessor_tag: Option<&str>,
        value: Option<ObjectHandle>,
    ) -> TtdResult<()> {
        match value {
            Some(obj) if !self.resolver.object_paths.contains_key(&obj) => {
                self.enqueue_object(build_path(parent, name, accessor_tag), obj)
            }
            _ => Ok(()),
        }
    }

    fn add_function_body(&mut self, owner_path: &str, body: FunctionBodyHandle) -> TtdResult<()> {
        if self.resolver.body_paths.contains_key(&body) {
            return Ok(());
        }

        let body_path = format!("{owner_path}{BODY_TAG}");
        self.claim_path(&body_path, CoreTarget::Body(body))?;

        for (slot, scope) in self.image.debugger_scopes(body).into_iter().enumerate() {
            if self.resolver.scope_paths.contains_key(&scope) {
                continue;
            }
            let scope_path = format!("{body_path}!scope[{slot}]");
            self.claim_path(&scope_path, CoreTarget::Scope(scope))?;
            self.resolver.scope_paths.insert(scope, scope_path);
        }

        self.resolver.body_paths.insert(body, body_path);
        Ok(())
    }

    fn run(&mut self) -> TtdResult<()> {
        while let Some(obj) = self.worklist.pop_front() {
            let path = self.resolver.object_paths[&obj].clone();

            let mut properties = self.image.own_properties(obj);
            shell_sort_by(&mut properties, |a, b| a.name.cmp(&b.name));

            for prop in &properties {
                match prop.value {
                    PropertyValue::Data(value) => self.enqueue_child(&path, &prop.name, None, value)?,
                    PropertyValue::Accessor { getter, setter } => {
                        self.enqueue_child(&path, &prop.name, Some(GETTER_TAG), getter)?;
                        self.enqueue_child(&path, &prop.name, Some(SETTER_TAG), setter)?;
                    }
                }
            }

            if let Some(body) = self.image.function_body(obj) {
                self.add_function_body(&path, body)?;
            }
        }
        Ok(())
    }
}

/// Path names of the built-in image of one runtime thread.
///
/// Built once, then read-only and shared by every context on the thread.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    object_paths: HashMap<ObjectHandle, String>,
    body_paths: HashMap<FunctionBodyHandle, String>,
    scope_paths: HashMap<DebuggerScopeHandle, String>,
    path_targets: HashMap<String, CoreTarget>,
    traversal_order: Vec<String>,

    sorted_objects: NameIndex<CorePathEntry>,
    sorted_bodies: NameIndex<CorePathEntry>,
    sorted_scopes: NameIndex<CorePathEntry>,
}

impl PathResolver {
    /// Walk the image from `roots` and assign a path to everything reachable
    pub fn build<I>(image: &I, roots: &[NamedRoot]) -> TtdResult<Self>
    where
        I: CoreImage + ?Sized,
    {
        Self::build_with_capacity(image, roots, DEFAULT_CORE_OBJECT_CAPACITY, DEFAULT_CORE_BODY_CAPACITY)
    }

    /// Like [`PathResolver::build`], pre-sizing the maps
    pub fn build_with_capacity<I>(
        image: &I,
        roots: &[NamedRoot],
        object_capacity: usize,
        body_capacity: usize,
    ) -> TtdResult<Self>
    where
        I: CoreImage + ?Sized,
    {
        let resolver = Self {
            object_paths: HashMap::with_capacity(object_capacity),
            body_paths: HashMap::with_capacity(body_capacity),
            path_targets: HashMap::with_capacity(object_capacity + body_capacity),
            traversal_order: Vec::with_capacity(object_capacity + body_capacity),
            ..Default::default()
        };

        let mut walk = PathWalk { image, worklist: VecDeque::new(), resolver };
        for root in roots {
            walk.enqueue_root(root)?;
        }
        walk.run()?;

        let mut resolver = walk.resolver;
        resolver.build_sorted_indices();

        debug!(
            objects = resolver.object_paths.len(),
            bodies = resolver.body_paths.len(),
            scopes = resolver.scope_paths.len(),
            "Computed core image paths"
        );
        Ok(resolver)
    }

    fn build_sorted_indices(&mut self) {
        let entries = |paths: Vec<(String, CoreTarget)>| {
            let items = paths.into_iter().map(|(path, target)| CorePathEntry { path, target }).collect();
            NameIndex::build(items, entry_path)
        };

        self.sorted_objects = entries(
            self.object_paths.iter().map(|(h, p)| (p.clone(), CoreTarget::Object(*h))).collect(),
        );
        self.sorted_bodies =
            entries(self.body_paths.iter().map(|(h, p)| (p.clone(), CoreTarget::Body(*h))).collect());
        self.sorted_scopes = entries(
            self.scope_paths.iter().map(|(h, p)| (p.clone(), CoreTarget::Scope(*h))).collect(),
        );
    }

    /// Number of named objects
    pub fn object_count(&self) -> usize {
        self.object_paths.len()
    }

    /// Number of named function bodies
    pub fn body_count(&self) -> usize {
        self.body_paths.len()
    }

    /// Number of named debugger scopes
    pub fn scope_count(&self) -> usize {
        self.scope_paths.len()
    }

    /// Paths in the order the walk assigned them
    pub fn traversal_order(&self) -> &[String] {
        &self.traversal_order
    }

    /// Whether `obj` belongs to the core image
    pub fn is_core_object(&self, obj: ObjectHandle) -> bool {
        self.object_paths.contains_key(&obj)
    }

    /// Path of a core object
    pub fn resolve_object_path(&self, obj: ObjectHandle) -> TtdResult<&str> {
        self.object_paths
            .get(&obj)
            .map(String::as_str)
            .ok_or_else(|| TtdError::not_found(LookupKind::CorePath, obj))
    }

    /// Path of a core function body
    pub fn resolve_body_path(&self, body: FunctionBodyHandle) -> TtdResult<&str> {
        self.body_paths
            .get(&body)
            .map(String::as_str)
            .ok_or_else(|| TtdError::not_found(LookupKind::CorePath, body))
    }

    /// Path of a debugger scope, if it belongs to the core image
    ///
    /// Scopes of user code are common, so absence is not an error here.
    pub fn resolve_scope_path_if_exists(&self, scope: DebuggerScopeHandle) -> Option<&str> {
        self.scope_paths.get(&scope).map(String::as_str)
    }

    /// Target named by `path`
    pub fn lookup_target(&self, path: &str) -> TtdResult<CoreTarget> {
        self.path_targets
            .get(path)
            .copied()
            .ok_or_else(|| TtdError::not_found(LookupKind::CorePath, path))
    }

    /// Object named by `path`
    pub fn lookup_object(&self, path: &str) -> TtdResult<ObjectHandle> {
        match self.lookup_target(path)? {
            CoreTarget::Object(obj) => Ok(obj),
            _ => Err(TtdError::not_found(LookupKind::CorePath, path)),
        }
    }

    /// Function body named by `path`
    pub fn lookup_body(&self, path: &str) -> TtdResult<FunctionBodyHandle> {
        match self.lookup_target(path)? {
            CoreTarget::Body(body) => Ok(body),
            _ => Err(TtdError::not_found(LookupKind::CorePath, path)),
        }
    }

    /// Debugger scope named by `path`
    pub fn lookup_scope(&self, path: &str) -> TtdResult<DebuggerScopeHandle> {
        match self.lookup_target(path)? {
            CoreTarget::Scope(scope) => Ok(scope),
            _ => Err(TtdError::not_found(LookupKind::CorePath, path)),
        }
    }

    /// Core objects in path-name order
    pub fn sorted_objects(&self) -> &[CorePathEntry] {
        self.sorted_objects.items()
    }

    /// Core function bodies in path-name order
    pub fn sorted_bodies(&self) -> &[CorePathEntry] {
        self.sorted_bodies.items()
    }

    /// Core debugger scopes in path-name order
    pub fn sorted_scopes(&self) -> &[CorePathEntry] {
        self.sorted_scopes.items()
    }

    /// Position of a core object in the name-sorted object index
    ///
    /// Every core object is in the index, so a miss is an invariant violation.
    pub fn object_position(&self, obj: ObjectHandle) -> TtdResult<usize> {
        let path = self.resolve_object_path(obj)?;
        self.sorted_objects.lookup_required(path, entry_path)
    }

    /// Position of an object path coming from outside, e.g. read from a log
    pub fn object_position_for_path(&self, path: &str) -> Option<usize> {
        self.sorted_objects.lookup_optional(path, entry_path)
    }

    /// Position of a core function body in the name-sorted body index
    pub fn body_position(&self, body: FunctionBodyHandle) -> TtdResult<usize> {
        let path = self.resolve_body_path(body)?;
        self.sorted_bodies.lookup_required(path, entry_path)
    }

    /// Object at `position` of the name-sorted object index
    pub fn object_at_position(&self, position: usize) -> TtdResult<ObjectHandle> {
        match self.sorted_objects.get(position).map(|e| e.target) {
            Some(CoreTarget::Object(obj)) => Ok(obj),
            _ => Err(TtdError::not_found(LookupKind::CorePath, format!("position {position}"))),
        }
    }

    /// Report every path target to the collector
    pub fn mark_well_known(&self, visitor: &mut dyn MarkVisitor) {
        let entries = self.sorted_objects.items().iter().chain(self.sorted_bodies.items()).chain(self.sorted_scopes.items());
        for entry in entries {
            match entry.target {
                CoreTarget::Object(obj) => visitor.mark_object(obj),
                CoreTarget::Body(body) => visitor.mark_body(body),
                CoreTarget::Scope(scope) => visitor.mark_scope(scope),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MarkList, ObjectArena, Property};

    /// global { Object: fn { prototype: { toString: fn } }, Math: { PI, max: fn }, size: get/set }
    fn small_image() -> (ObjectArena, Vec<NamedRoot>) {
        let mut arena = ObjectArena::new();
        let global = arena.alloc_object();
        let (object_ctor, ctor_body) = arena.alloc_function();
        let proto = arena.alloc_object();
        let (to_string, _) = arena.alloc_function();
        let math = arena.alloc_object();
        let (max, _) = arena.alloc_function();
        let (getter, _) = arena.alloc_function();
        let (setter, _) = arena.alloc_function();
        arena.add_scope(ctor_body);
        arena.add_scope(ctor_body);

        arena.define_property(global, Property::object("Math", math));
        arena.define_property(global, Property::object("Object", object_ctor));
        arena.define_property(global, Property::accessor("size", Some(getter), Some(setter)));
        arena.define_property(object_ctor, Property::object("prototype", proto));
        arena.define_property(proto, Property::object("toString", to_string));
        arena.define_property(proto, Property::object("constructor", object_ctor));
        arena.define_property(math, Property::primitive("PI"));
        arena.define_property(math, Property::object("max", max));

        (arena, vec![NamedRoot::new("global", global)])
    }

    #[test]
    fn test_paths_follow_property_names() {
        let (arena, roots) = small_image();
        let resolver = PathResolver::build(&arena, &roots).unwrap();

        let obj = resolver.lookup_object("global.Object.prototype.toString").unwrap();
        assert_eq!(resolver.resolve_object_path(obj).unwrap(), "global.Object.prototype.toString");
        assert!(resolver.lookup_object("global.size!get").is_ok());
        assert!(resolver.lookup_object("global.size!set").is_ok());
        assert!(resolver.lookup_body("global.Math.max!body").is_ok());

        // The cycle through `constructor` does not produce a second path
        assert!(resolver.lookup_object("global.Object.prototype.constructor").is_err());
        assert_eq!(resolver.object_count(), 8);
    }

    #[test]
    fn test_scopes_are_keyed_by_slot() {
        let (arena, roots) = small_image();
        let resolver = PathResolver::build(&arena, &roots).unwrap();

        let first = resolver.lookup_scope("global.Object!body!scope[0]").unwrap();
        let second = resolver.lookup_scope("global.Object!body!scope[1]").unwrap();
        assert_ne!(first, second);
        assert_eq!(resolver.resolve_scope_path_if_exists(second), Some("global.Object!body!scope[1]"));
        assert_eq!(resolver.resolve_scope_path_if_exists(DebuggerScopeHandle(77)), None);
    }

    #[test]
    fn test_traversal_is_breadth_first_and_name_sorted() {
        let (arena, roots) = small_image();
        let resolver = PathResolver::build(&arena, &roots).unwrap();

        let order: Vec<&str> = resolver.traversal_order().iter().map(String::as_str).collect();
        assert_eq!(
            &order[..5],
            &["global", "global.Math", "global.Object", "global.size!get", "global.size!set"]
        );
    }

    #[test]
    fn test_kind_mismatch_and_unknown_paths() {
        let (arena, roots) = small_image();
        let resolver = PathResolver::build(&arena, &roots).unwrap();

        assert!(matches!(resolver.lookup_object("global.Math.max!body"), Err(TtdError::NotFound { .. })));
        assert!(resolver.lookup_target("global.Nope").is_err());
        assert!(resolver.resolve_object_path(ObjectHandle(999)).is_err());
    }

    #[test]
    fn test_positions_match_sorted_index() {
        let (arena, roots) = small_image();
        let resolver = PathResolver::build(&arena, &roots).unwrap();

        let names: Vec<&str> = resolver.sorted_objects().iter().map(|e| e.path.as_str()).collect();
        let mut expected = names.clone();
        expected.sort();
        assert_eq!(names, expected);

        for entry in resolver.sorted_objects() {
            let CoreTarget::Object(obj) = entry.target else { panic!("object index holds {entry:?}") };
            let pos = resolver.object_position(obj).unwrap();
            assert_eq!(resolver.object_at_position(pos).unwrap(), obj);
            assert_eq!(resolver.object_position_for_path(&entry.path), Some(pos));
        }
        assert_eq!(resolver.object_position_for_path("global.stale"), None);
    }

    #[test]
    fn test_mark_visits_every_target() {
        let (arena, roots) = small_image();
        let resolver = PathResolver::build(&arena, &roots).unwrap();

        let mut marks = MarkList::default();
        resolver.mark_well_known(&mut marks);
        assert_eq!(marks.objects.len(), resolver.object_count());
        assert_eq!(marks.bodies.len(), resolver.body_count());
        assert_eq!(marks.scopes.len(), resolver.scope_count());
    }

    #[test]
    fn test_colliding_paths_are_rejected() {
        let mut arena = ObjectArena::new();
        let global = arena.alloc_object();
        let a = arena.alloc_object();
        let b = arena.alloc_object();
        arena.define_property(global, Property::accessor("x", Some(a), None));
        arena.define_property(global, Property::object("x!get", b));

        let err = PathResolver::build(&arena, &[NamedRoot::new("global", global)]).unwrap_err();
        assert!(matches!(err, TtdError::InvariantViolation(_)));
    }

    #[test]
    fn test_token_builders() {
        assert_eq!(build_path("global", "Array", None), "global.Array");
        assert_eq!(build_path("global", "size", Some(GETTER_TAG)), "global.size!get");
        assert_eq!(array_index_token(3), "[3]");
        assert_eq!(environment_token(1), "!env[1]");
        assert_eq!(environment_slot_token(1, 4), "!env[1].slot[4]");
    }
}
