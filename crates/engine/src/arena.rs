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

//! In-memory object arena.
//!
//! Objects, function bodies and debugger scopes live in vectors and are named
//! by their index. The arena implements [`CoreImage`] and [`CodeLoader`], and
//! it can be loaded from a JSON image description, which is how the command
//! line tool and the tests build built-in graphs.
//!
//! ```json
//! {
//!   "objects": [
//!     { "properties": [ { "name": "Array", "value": { "data": 1 } } ] },
//!     { "properties": [], "body": 0 }
//!   ],
//!   "bodies": [ { "source_name": null, "deferred": false, "nested": [], "scopes": [] } ],
//!   "scope_count": 0,
//!   "roots": [ { "name": "global", "object": 0 } ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use ttd_common::{
    DebuggerScopeHandle, FunctionBodyHandle, LookupKind, ObjectHandle, TtdError, TtdResult,
};

use crate::{CodeLoader, CoreImage, NamedRoot, Property, PropertyValue};

/// An object in the arena
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaObject {
    /// Own properties in natural (insertion) order
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Function body, for callables
    #[serde(default)]
    pub body: Option<FunctionBodyHandle>,
}

/// A function body in the arena
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaBody {
    /// Source (file) name
    #[serde(default)]
    pub source_name: Option<String>,
    /// Whether parsing was deferred; nested bodies stay hidden until parsed
    #[serde(default)]
    pub deferred: bool,
    /// Directly nested bodies
    #[serde(default)]
    pub nested: Vec<FunctionBodyHandle>,
    /// Debugger scopes by slot
    #[serde(default)]
    pub scopes: Vec<DebuggerScopeHandle>,
}

/// Arena of objects, bodies and scopes addressed by integer handles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectArena {
    #[serde(default)]
    objects: Vec<ArenaObject>,
    #[serde(default)]
    bodies: Vec<ArenaBody>,
    #[serde(default)]
    scope_count: u32,
    #[serde(default)]
    roots: Vec<NamedRoot>,
    #[serde(skip)]
    parse_count: usize,
}

impl ObjectArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate an arena from its JSON description
    pub fn from_json(json: &str) -> eyre::Result<Self> {
        let arena: Self = serde_json::from_str(json)?;
        arena.validate()?;
        Ok(arena)
    }

    /// Serialize the arena to pretty JSON
    pub fn to_json(&self) -> eyre::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Allocate an object without properties
    pub fn alloc_object(&mut self) -> ObjectHandle {
        self.objects.push(ArenaObject::default());
        ObjectHandle(self.objects.len() as u32 - 1)
    }

    /// Allocate a function body
    pub fn alloc_body(&mut self, source_name: Option<&str>, deferred: bool) -> FunctionBodyHandle {
        self.bodies.push(ArenaBody {
            source_name: source_name.map(str::to_string),
            deferred,
            ..Default::default()
        });
        FunctionBodyHandle(self.bodies.len() as u32 - 1)
    }

    /// Allocate a callable object with a fresh body
    pub fn alloc_function(&mut self) -> (ObjectHandle, FunctionBodyHandle) {
        let body = self.alloc_body(None, false);
        let obj = self.alloc_object();
        self.objects[obj.0 as usize].body = Some(body);
        (obj, body)
    }

    /// Define (or redefine in place) an own property of `obj`
    pub fn define_property(&mut self, obj: ObjectHandle, property: Property) {
        let props = &mut self.objects[obj.0 as usize].properties;
        match props.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => props.push(property),
        }
    }

    /// Declare `child` as nested directly inside `parent`
    pub fn add_nested_body(&mut self, parent: FunctionBodyHandle, child: FunctionBodyHandle) {
        self.bodies[parent.0 as usize].nested.push(child);
    }

    /// Append a debugger scope to `body`
    pub fn add_scope(&mut self, body: FunctionBodyHandle) -> DebuggerScopeHandle {
        let scope = DebuggerScopeHandle(self.scope_count);
        self.scope_count += 1;
        self.bodies[body.0 as usize].scopes.push(scope);
        scope
    }

    /// Register a named root
    pub fn add_root(&mut self, name: impl Into<String>, object: ObjectHandle) {
        self.roots.push(NamedRoot::new(name, object));
    }

    /// Named roots in registration order
    pub fn roots(&self) -> &[NamedRoot] {
        &self.roots
    }

    /// Number of objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Whether `body` has been fully parsed
    pub fn is_parsed(&self, body: FunctionBodyHandle) -> bool {
        self.bodies.get(body.0 as usize).is_some_and(|b| !b.deferred)
    }

    /// Number of forced parses performed so far
    pub fn parse_count(&self) -> usize {
        self.parse_count
    }

    /// Check that every handle in the arena points inside it
    pub fn validate(&self) -> TtdResult<()> {
        let obj_ok = |h: &ObjectHandle| (h.0 as usize) < self.objects.len();
        let body_ok = |h: &FunctionBodyHandle| (h.0 as usize) < self.bodies.len();
        let scope_ok = |h: &DebuggerScopeHandle| h.0 < self.scope_count;

        for (i, obj) in self.objects.iter().enumerate() {
            for prop in &obj.properties {
                let targets = match prop.value {
                    PropertyValue::Data(v) => [v, None],
                    PropertyValue::Accessor { getter, setter } => [getter, setter],
                };
                if let Some(bad) = targets.iter().flatten().find(|h| !obj_ok(*h)) {
                    return Err(TtdError::invariant(format!(
                        "property `{}` of obj{i} refers to missing {bad}",
                        prop.name
                    )));
                }
            }
            if let Some(body) = obj.body.filter(|b| !body_ok(b)) {
                return Err(TtdError::invariant(format!("obj{i} refers to missing {body}")));
            }
        }

        for (i, body) in self.bodies.iter().enumerate() {
            if let Some(bad) = body.nested.iter().find(|b| !body_ok(*b)) {
                return Err(TtdError::invariant(format!("body{i} nests missing {bad}")));
            }
            if let Some(bad) = body.scopes.iter().find(|s| !scope_ok(*s)) {
                return Err(TtdError::invariant(format!("body{i} refers to missing {bad}")));
            }
        }

        if let Some(root) = self.roots.iter().find(|r| !obj_ok(&r.object)) {
            return Err(TtdError::invariant(format!("root `{}` refers to missing {}", root.name, root.object)));
        }

        Ok(())
    }

    fn body(&self, body: FunctionBodyHandle) -> Option<&ArenaBody> {
        self.bodies.get(body.0 as usize)
    }
}

impl CoreImage for ObjectArena {
    fn own_properties(&self, obj: ObjectHandle) -> Vec<Property> {
        self.objects.get(obj.0 as usize).map(|o| o.properties.clone()).unwrap_or_default()
    }

    fn function_body(&self, obj: ObjectHandle) -> Option<FunctionBodyHandle> {
        self.objects.get(obj.0 as usize)?.body
    }

    fn debugger_scopes(&self, body: FunctionBodyHandle) -> Vec<DebuggerScopeHandle> {
        self.body(body).map(|b| b.scopes.clone()).unwrap_or_default()
    }
}

impl CodeLoader for ObjectArena {
    fn force_parse(&mut self, body: FunctionBodyHandle) -> TtdResult<()> {
        let entry = self
            .bodies
            .get_mut(body.0 as usize)
            .ok_or_else(|| TtdError::not_found(LookupKind::FunctionBody, body))?;
        if entry.deferred {
            entry.deferred = false;
            self.parse_count += 1;
        }
        Ok(())
    }

    fn nested_bodies(&self, body: FunctionBodyHandle) -> Vec<FunctionBodyHandle> {
        match self.body(body) {
            Some(b) if !b.deferred => b.nested.clone(),
            _ => Vec::new(),
        }
    }

    fn source_name(&self, body: FunctionBodyHandle) -> Option<String> {
        self.body(body)?.source_name.clone()
    }
}
