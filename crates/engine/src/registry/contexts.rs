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

//! Context lifecycle: registration, activation, retirement and teardown.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use ttd_common::{
    ContextId, ContextSentinels, DeadContextRecord, ExecutionMode, LookupKind, SentinelIds,
    SentinelSlot, TtdError, TtdResult,
};

use super::IdentityRegistry;
use crate::{ContextJournal, ExternalContextRef, HostContextFactory};

/// An execution context the registry currently tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedContext {
    /// Registry-assigned id
    pub id: ContextId,
    /// Whether the context was created while recording or replaying
    pub mode: ExecutionMode,
    /// Live sentinel objects
    pub sentinels: ContextSentinels,
    /// Log ids of the sentinels
    pub sentinel_ids: SentinelIds,
}

impl IdentityRegistry {
    /// Start tracking a newly observed context
    ///
    /// The host factory wraps the context into an external reference that
    /// stays registered until [`IdentityRegistry::clear_contexts_for_snapshot_restore`].
    pub fn register_context(
        &mut self,
        mode: ExecutionMode,
        sentinels: ContextSentinels,
        factory: &mut dyn HostContextFactory,
    ) -> TtdResult<ContextId> {
        let id = ContextId(self.next_context);
        self.track_context(id, mode, sentinels, factory)
    }

    /// Re-create, during replay, the context the log recorded as `recorded`
    ///
    /// The context keeps its recorded id, so the sentinel ids written to the
    /// log resolve again no matter how many contexts this registry has seen.
    pub fn register_context_in_replay(
        &mut self,
        recorded: ContextId,
        sentinels: ContextSentinels,
        factory: &mut dyn HostContextFactory,
    ) -> TtdResult<ContextId> {
        if self.is_tracked(recorded) || self.external_refs.contains_key(&recorded) {
            error!(context = %recorded, "Recorded context id is already in use");
            return Err(TtdError::invariant(format!("context {recorded} is already registered")));
        }
        self.track_context(recorded, ExecutionMode::Replay, sentinels, factory)
    }

    fn track_context(
        &mut self,
        id: ContextId,
        mode: ExecutionMode,
        sentinels: ContextSentinels,
        factory: &mut dyn HostContextFactory,
    ) -> TtdResult<ContextId> {
        if self.contexts.len() >= self.config.max_contexts {
            error!(limit = self.config.max_contexts, "Context list is full");
            return Err(TtdError::CapacityExceeded { limit: self.config.max_contexts });
        }
        for slot in SentinelSlot::ALL {
            let obj = sentinels.get(slot);
            if let Some(existing) = self.object_to_id.get(&obj) {
                error!(context = %id, %obj, %existing, "Sentinel already carries an ordinary id");
                return Err(TtdError::invariant(format!("sentinel {obj} already has {existing}")));
            }
            if self.is_special_root(obj) {
                error!(context = %id, %obj, "Sentinel shared with another context");
                return Err(TtdError::invariant(format!("{obj} is a sentinel of another context")));
            }
        }

        self.next_context = self.next_context.max(id.0.saturating_add(1));

        let external = factory.wrap_context(id, mode);
        self.contexts.push(TrackedContext {
            id,
            mode,
            sentinels,
            sentinel_ids: SentinelIds::for_context(id),
        });
        self.journals.insert(id, ContextJournal::new(id));
        self.external_refs.insert(id, external);

        if mode == ExecutionMode::Replay {
            self.created_or_destroyed_in_replay = true;
        }

        debug!(context = %id, %mode, %external, "Registered context");
        Ok(id)
    }

    /// Tracked contexts in registration order
    pub fn contexts(&self) -> &[TrackedContext] {
        &self.contexts
    }

    /// A tracked context by id
    pub fn context(&self, ctx: ContextId) -> TtdResult<&TrackedContext> {
        self.contexts
            .iter()
            .find(|c| c.id == ctx)
            .ok_or_else(|| TtdError::not_found(LookupKind::Context, ctx))
    }

    /// Whether `ctx` is tracked
    pub fn is_tracked(&self, ctx: ContextId) -> bool {
        self.contexts.iter().any(|c| c.id == ctx)
    }

    /// Make `ctx` the active context, or clear it with `None`
    pub fn set_active_context(&mut self, ctx: Option<ContextId>) -> TtdResult<()> {
        if let Some(ctx) = ctx {
            if !self.is_tracked(ctx) {
                return Err(TtdError::not_found(LookupKind::Context, ctx));
            }
        }
        self.active_context = ctx;
        Ok(())
    }

    /// The active context, if any
    pub fn active_context(&self) -> Option<ContextId> {
        self.active_context
    }

    /// External wrapper the host created for `ctx`
    ///
    /// Still available after the context was retired in record mode.
    pub fn runtime_context_for(&self, ctx: ContextId) -> TtdResult<ExternalContextRef> {
        self.external_refs
            .get(&ctx)
            .copied()
            .ok_or_else(|| TtdError::not_found(LookupKind::Context, ctx))
    }

    /// Retire `ctx` while recording and remember its sentinel ids
    pub fn destroy_context_in_record(&mut self, ctx: ContextId) -> TtdResult<DeadContextRecord> {
        let retired = self.retire_context(ctx)?;
        let record = DeadContextRecord { context: ctx, ids: retired.sentinel_ids };
        self.dead_contexts.push(record);

        debug!(context = %ctx, "Destroyed context in record");
        Ok(record)
    }

    /// Retire the context whose sentinel ids a replayed log reports
    pub fn destroy_context_in_replay(&mut self, ids: SentinelIds) -> TtdResult<ContextId> {
        let ctx = self
            .contexts
            .iter()
            .find(|c| c.sentinel_ids.global == ids.global)
            .map(|c| c.id)
            .ok_or_else(|| TtdError::not_found(LookupKind::Context, ids.global))?;

        self.retire_context(ctx)?;
        self.created_or_destroyed_in_replay = true;

        debug!(context = %ctx, "Destroyed context in replay");
        Ok(ctx)
    }

    fn retire_context(&mut self, ctx: ContextId) -> TtdResult<TrackedContext> {
        let index = self
            .contexts
            .iter()
            .position(|c| c.id == ctx)
            .ok_or_else(|| TtdError::not_found(LookupKind::Context, ctx))?;
        let retired = self.contexts.remove(index);

        if self.active_context == Some(ctx) {
            self.active_context = None;
        }
        for slot in SentinelSlot::ALL {
            self.special_roots.release(retired.sentinels.get(slot));
        }
        self.journals.remove(&ctx);

        Ok(retired)
    }

    /// Sentinel ids of every context retired while recording, oldest first
    pub fn dead_contexts_for_record(&self) -> &[DeadContextRecord] {
        &self.dead_contexts
    }

    /// Sentinel ids captured when `ctx` was retired
    pub fn dead_context_record(&self, ctx: ContextId) -> TtdResult<&DeadContextRecord> {
        self.dead_contexts
            .iter()
            .find(|r| r.context == ctx)
            .ok_or_else(|| TtdError::not_found(LookupKind::Context, ctx))
    }

    /// Forget dead context records once the log writer has consumed them
    pub fn clear_dead_contexts(&mut self) {
        self.dead_contexts.clear();
    }

    /// Whether a context was created or destroyed during replay since the last reset
    pub fn context_created_or_destroyed_in_replay(&self) -> bool {
        self.created_or_destroyed_in_replay
    }

    /// Reset the replay context-change flag
    pub fn reset_context_created_or_destroyed_in_replay(&mut self) {
        self.created_or_destroyed_in_replay = false;
    }

    /// Tear down every context before a snapshot is restored
    ///
    /// Returns the external wrappers of all contexts, including those already
    /// retired in record mode, in context order. The caller finalizes them.
    pub fn clear_contexts_for_snapshot_restore(&mut self) -> Vec<ExternalContextRef> {
        let wrappers: Vec<_> = std::mem::take(&mut self.external_refs).into_values().collect();

        self.contexts.clear();
        self.journals.clear();
        self.active_context = None;
        self.special_roots.clear();
        self.retired_contexts.clear();

        debug!(count = wrappers.len(), "Cleared contexts for snapshot restore");
        wrappers
    }
}
