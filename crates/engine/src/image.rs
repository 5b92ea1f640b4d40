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

//! Interfaces consumed from the parsing/execution engine and the collector.
//!
//! The identity core never owns runtime objects. It sees them through these
//! narrow traits:
//!
//! - [`CoreImage`]: property enumeration of built-in objects, the function
//!   body of callables and the debugger scopes of a body
//! - [`CodeLoader`]: forced parsing of lazily parsed bodies and their nesting
//! - [`MarkVisitor`]: the collector's mark phase hook

use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};
use ttd_common::{DebuggerScopeHandle, FunctionBodyHandle, ObjectHandle, TtdResult};

/// Value stored in an own property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    /// A plain data property; `None` for primitive values
    Data(Option<ObjectHandle>),
    /// An accessor pair; either half may be absent
    Accessor {
        /// Getter function
        getter: Option<ObjectHandle>,
        /// Setter function
        setter: Option<ObjectHandle>,
    },
}

/// One own property of an object, as enumerated by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Property name
    pub name: String,
    /// Property value
    pub value: PropertyValue,
}

impl Property {
    /// A data property holding an object
    pub fn object(name: impl Into<String>, value: ObjectHandle) -> Self {
        Self { name: name.into(), value: PropertyValue::Data(Some(value)) }
    }

    /// A data property holding a primitive
    pub fn primitive(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: PropertyValue::Data(None) }
    }

    /// An accessor property
    pub fn accessor(
        name: impl Into<String>,
        getter: Option<ObjectHandle>,
        setter: Option<ObjectHandle>,
    ) -> Self {
        Self { name: name.into(), value: PropertyValue::Accessor { getter, setter } }
    }
}

/// Read access to the built-in object graph.
///
/// Enumeration order is whatever the engine's slot layout produces; callers
/// that need a stable order must sort.
#[auto_impl(&, &mut, Box)]
pub trait CoreImage {
    /// Own properties of `obj` in the engine's natural order
    fn own_properties(&self, obj: ObjectHandle) -> Vec<Property>;

    /// Function body of `obj` if it is callable and has one
    fn function_body(&self, obj: ObjectHandle) -> Option<FunctionBodyHandle>;

    /// Debugger scopes nested in `body`, indexed by slot
    fn debugger_scopes(&self, body: FunctionBodyHandle) -> Vec<DebuggerScopeHandle>;
}

/// Access to the parser for code that is registered in a context journal
#[auto_impl(&mut, Box)]
pub trait CodeLoader {
    /// Force full parsing of `body` if it was deferred
    fn force_parse(&mut self, body: FunctionBodyHandle) -> TtdResult<()>;

    /// Function bodies declared directly inside `body`
    ///
    /// Only complete after [`CodeLoader::force_parse`] ran on `body`.
    fn nested_bodies(&self, body: FunctionBodyHandle) -> Vec<FunctionBodyHandle>;

    /// Source (file) name of `body`, if it has one
    fn source_name(&self, body: FunctionBodyHandle) -> Option<String>;
}

/// Receiver of the collector's mark phase
///
/// Everything reported here is treated as permanently reachable for the
/// current collection.
pub trait MarkVisitor {
    /// Mark an object
    fn mark_object(&mut self, obj: ObjectHandle);

    /// Mark a function body
    fn mark_body(&mut self, body: FunctionBodyHandle);

    /// Mark a debugger scope
    fn mark_scope(&mut self, scope: DebuggerScopeHandle);
}

/// A [`MarkVisitor`] that collects everything it is shown, in visit order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MarkList {
    /// Marked objects
    pub objects: Vec<ObjectHandle>,
    /// Marked function bodies
    pub bodies: Vec<FunctionBodyHandle>,
    /// Marked debugger scopes
    pub scopes: Vec<DebuggerScopeHandle>,
}

impl MarkVisitor for MarkList {
    fn mark_object(&mut self, obj: ObjectHandle) {
        self.objects.push(obj);
    }

    fn mark_body(&mut self, body: FunctionBodyHandle) {
        self.bodies.push(body);
    }

    fn mark_scope(&mut self, scope: DebuggerScopeHandle) {
        self.scopes.push(scope);
    }
}
