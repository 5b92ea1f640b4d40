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

//! Execution context descriptors: modes, sentinels and dead-context records

use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::{ContextId, LogPointerId, ObjectHandle};

/// Whether a context was created while recording or while replaying a log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ExecutionMode {
    /// Context observed during recording
    #[display("record")]
    Record,
    /// Context reconstructed during replay
    #[display("replay")]
    Replay,
}

/// Fixed slot of one of the five universal singletons every context owns
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
pub enum SentinelSlot {
    /// The global object
    #[display("global")]
    Global,
    /// The `undefined` value
    #[display("undefined")]
    Undefined,
    /// The `null` value
    #[display("null")]
    Null,
    /// The `true` value
    #[display("true")]
    True,
    /// The `false` value
    #[display("false")]
    False,
}

impl SentinelSlot {
    /// All slots in their canonical order
    pub const ALL: [Self; 5] = [Self::Global, Self::Undefined, Self::Null, Self::True, Self::False];

    /// Position of the slot in [`SentinelSlot::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`SentinelSlot::index`]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// The live sentinel objects of one context, supplied when it is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSentinels {
    /// The global object
    pub global: ObjectHandle,
    /// The `undefined` value
    pub undefined: ObjectHandle,
    /// The `null` value
    pub null: ObjectHandle,
    /// The `true` value
    pub true_value: ObjectHandle,
    /// The `false` value
    pub false_value: ObjectHandle,
}

impl ContextSentinels {
    /// Object stored in `slot`
    pub fn get(&self, slot: SentinelSlot) -> ObjectHandle {
        match slot {
            SentinelSlot::Global => self.global,
            SentinelSlot::Undefined => self.undefined,
            SentinelSlot::Null => self.null,
            SentinelSlot::True => self.true_value,
            SentinelSlot::False => self.false_value,
        }
    }

    /// Slot holding `obj`, if it is one of the sentinels
    pub fn slot_of(&self, obj: ObjectHandle) -> Option<SentinelSlot> {
        SentinelSlot::ALL.into_iter().find(|slot| self.get(*slot) == obj)
    }
}

/// Log ids of the five sentinels of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SentinelIds {
    /// Id of the global object
    pub global: LogPointerId,
    /// Id of `undefined`
    pub undefined: LogPointerId,
    /// Id of `null`
    pub null: LogPointerId,
    /// Id of `true`
    pub true_value: LogPointerId,
    /// Id of `false`
    pub false_value: LogPointerId,
}

impl SentinelIds {
    /// Derive the sentinel ids of context `ctx`
    pub fn for_context(ctx: ContextId) -> Self {
        Self {
            global: LogPointerId::sentinel(ctx, SentinelSlot::Global),
            undefined: LogPointerId::sentinel(ctx, SentinelSlot::Undefined),
            null: LogPointerId::sentinel(ctx, SentinelSlot::Null),
            true_value: LogPointerId::sentinel(ctx, SentinelSlot::True),
            false_value: LogPointerId::sentinel(ctx, SentinelSlot::False),
        }
    }

    /// The ids in [`SentinelSlot::ALL`] order
    pub fn to_array(&self) -> [LogPointerId; 5] {
        [self.global, self.undefined, self.null, self.true_value, self.false_value]
    }
}

/// Sentinel ids captured when a context was retired during recording.
///
/// Later log events may still reference these sentinels after the owning
/// context is gone, so the record outlives the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeadContextRecord {
    /// The retired context
    pub context: ContextId,
    /// Its sentinel ids at the moment of retirement
    pub ids: SentinelIds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_index_round_trip() {
        for (i, slot) in SentinelSlot::ALL.into_iter().enumerate() {
            assert_eq!(slot.index(), i);
            assert_eq!(SentinelSlot::from_index(i), Some(slot));
        }
        assert_eq!(SentinelSlot::from_index(5), None);
    }

    #[test]
    fn test_sentinels_slot_of() {
        let sentinels = ContextSentinels {
            global: ObjectHandle(1),
            undefined: ObjectHandle(2),
            null: ObjectHandle(3),
            true_value: ObjectHandle(4),
            false_value: ObjectHandle(5),
        };
        assert_eq!(sentinels.slot_of(ObjectHandle(3)), Some(SentinelSlot::Null));
        assert_eq!(sentinels.slot_of(ObjectHandle(9)), None);
    }

    #[test]
    fn test_sentinel_ids_follow_slot_order() {
        let ids = SentinelIds::for_context(ContextId(2));
        for (slot, id) in SentinelSlot::ALL.into_iter().zip(ids.to_array()) {
            assert_eq!(id.as_sentinel(), Some((ContextId(2), slot)));
        }
    }
}
