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

//! Stable identifiers and arena handles shared by every TTD component

use std::fmt;

use serde::{Deserialize, Serialize};

use super::SentinelSlot;

/// Bit marking a [`LogPointerId`] as a per-context sentinel identity.
pub const SENTINEL_ID_TAG: u64 = 1 << 63;

/// Number of low bits reserved for the sentinel slot inside a sentinel id.
const SENTINEL_SLOT_BITS: u32 = 3;

/// Stable logical identity of a log-observable object.
///
/// Ordinary ids are handed out by the identity registry from a monotone
/// counter. Ids with [`SENTINEL_ID_TAG`] set name one of the five sentinel
/// singletons of a context and are derived from the context and slot, never
/// allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogPointerId(pub u64);

impl fmt::Display for LogPointerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_sentinel() {
            Some((ctx, slot)) => write!(f, "{ctx}/{slot}"),
            None => write!(f, "#{}", self.0),
        }
    }
}

impl LogPointerId {
    /// Wrap a raw id value
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The sentinel id of `slot` in context `ctx`
    pub fn sentinel(ctx: ContextId, slot: SentinelSlot) -> Self {
        Self(SENTINEL_ID_TAG | (u64::from(ctx.0) << SENTINEL_SLOT_BITS) | slot.index() as u64)
    }

    /// Get the raw id value
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Check whether this id lies in the reserved sentinel range
    pub fn is_sentinel(&self) -> bool {
        self.0 & SENTINEL_ID_TAG != 0
    }

    /// Decode a sentinel id into its context and slot
    pub fn as_sentinel(&self) -> Option<(ContextId, SentinelSlot)> {
        if !self.is_sentinel() {
            return None;
        }

        let payload = self.0 & !SENTINEL_ID_TAG;
        let slot = SentinelSlot::from_index((payload & ((1 << SENTINEL_SLOT_BITS) - 1)) as usize)?;
        let ctx = u32::try_from(payload >> SENTINEL_SLOT_BITS).ok()?;
        Some((ContextId(ctx), slot))
    }
}

/// Registry-assigned index of an execution context.
///
/// Indices are never reused within one registry, so a retired context can
/// still be named by log events that refer to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(pub u32);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

/// Handle of an object in the runtime's object arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle(pub u32);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj{}", self.0)
    }
}

/// Handle of a function body in the runtime's object arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionBodyHandle(pub u32);

impl fmt::Display for FunctionBodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body{}", self.0)
    }
}

/// Handle of a debugger (lexical) scope in the runtime's object arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DebuggerScopeHandle(pub u32);

impl fmt::Display for DebuggerScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope{}", self.0)
    }
}
