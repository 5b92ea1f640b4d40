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

//! Root pinning and the log pointer id mapping.
//!
//! Ordinary ids are handed out from a monotone counter while recording and
//! taken from the log while replaying. Sentinel ids are never stored in the
//! map: they encode (context, slot) and resolve through the tracked contexts.
//! A sentinel pinned through any root set keeps its sentinel id, so every
//! live object has exactly one id.

use std::collections::BTreeMap;

use itertools::Itertools;
use tracing::{debug, error};
use ttd_common::{
    ContextId, LogPointerId, LookupKind, ObjectHandle, SentinelSlot, TtdError, TtdResult,
    SENTINEL_ID_TAG,
};

use super::IdentityRegistry;

impl IdentityRegistry {
    // ========== General roots ==========

    /// Pin `obj` as a general root, assigning it a fresh id if it has none
    pub fn add_root(&mut self, obj: ObjectHandle) -> TtdResult<LogPointerId> {
        let id = self.id_or_allocate(obj)?;
        self.roots.pin(obj);
        Ok(id)
    }

    /// Pin `obj` as a general root under the id recorded in the log
    pub fn add_root_with_id(&mut self, obj: ObjectHandle, id: LogPointerId) -> TtdResult<()> {
        if id.is_sentinel() {
            let bound = self.lookup_sentinel(id)?;
            if bound != obj {
                error!(%id, %obj, %bound, "Sentinel id names a different object");
                return Err(TtdError::invariant(format!("{id} maps to {bound}, not {obj}")));
            }
            self.roots.pin(obj);
            return Ok(());
        }
        if let Some(sentinel) = self.sentinel_id_of(obj) {
            error!(%id, %obj, %sentinel, "Ordinary id supplied for a sentinel");
            return Err(TtdError::invariant(format!("{obj} is sentinel {sentinel}, not {id}")));
        }

        if let Some(&bound) = self.id_to_object.get(&id) {
            if bound != obj {
                error!(%id, %obj, %bound, "Log pointer id already bound");
                return Err(TtdError::invariant(format!("{id} already maps to {bound}, not {obj}")));
            }
        }
        if let Some(&existing) = self.object_to_id.get(&obj) {
            if existing != id {
                error!(%id, %obj, %existing, "Object already carries a different id");
                return Err(TtdError::invariant(format!("{obj} already has {existing}, not {id}")));
            }
        }

        self.bind(obj, id);
        self.next_log_pointer_id = self.next_log_pointer_id.max(id.raw() + 1);
        self.roots.pin(obj);
        Ok(())
    }

    /// Release one general-root pin on `obj`
    ///
    /// The id stays resolvable until the next local-root refresh.
    pub fn remove_root(&mut self, obj: ObjectHandle) -> TtdResult<()> {
        self.roots
            .unpin(obj)
            .map(|_| ())
            .ok_or_else(|| TtdError::not_found(LookupKind::LogPointerId, obj))
    }

    /// Objects pinned as general roots, in handle order
    pub fn root_set(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.roots.iter()
    }

    // ========== Special roots ==========

    /// Pin the sentinel in `slot` of `ctx` and return its sentinel id
    pub fn add_special_root(&mut self, ctx: ContextId, slot: SentinelSlot) -> TtdResult<LogPointerId> {
        let obj = self.context(ctx)?.sentinels.get(slot);
        self.special_roots.pin(obj);
        Ok(LogPointerId::sentinel(ctx, slot))
    }

    /// Release one pin on the sentinel named by `id`
    pub fn remove_special_root(&mut self, id: LogPointerId) -> TtdResult<()> {
        let obj = self.lookup_sentinel(id)?;
        self.special_roots
            .unpin(obj)
            .map(|_| ())
            .ok_or_else(|| TtdError::not_found(LookupKind::LogPointerId, id))
    }

    /// Whether `obj` is a sentinel of any tracked context
    pub fn is_special_root(&self, obj: ObjectHandle) -> bool {
        self.contexts.iter().any(|c| c.sentinels.slot_of(obj).is_some())
    }

    // ========== Local roots ==========

    /// Pin `obj` for the current debug step
    pub fn add_local_root(&mut self, obj: ObjectHandle) -> TtdResult<LogPointerId> {
        let id = self.id_or_allocate(obj)?;
        self.local_roots.pin(obj);
        Ok(id)
    }

    /// Drop every local root and every id whose object is no longer a general root
    ///
    /// Returns the number of id mappings dropped.
    pub fn clear_local_roots_and_refresh_map(&mut self) -> usize {
        self.local_roots.clear();

        let before = self.id_to_object.len();
        let roots = &self.roots;
        self.id_to_object.retain(|_, obj| roots.contains(*obj));
        self.object_to_id.retain(|obj, _| roots.contains(*obj));
        let dropped = before - self.id_to_object.len();

        debug!(dropped, remaining = self.id_to_object.len(), "Refreshed log pointer id map");
        dropped
    }

    /// Objects pinned as local roots, in handle order
    pub fn local_root_set(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.local_roots.iter()
    }

    // ========== Views for the snapshot writer ==========

    /// Object to id view of the mapping, including every pinned sentinel
    pub fn inverted_root_map(&self) -> BTreeMap<ObjectHandle, LogPointerId> {
        let sentinels = self
            .extract_snapshot_roots()
            .into_iter()
            .filter_map(|obj| self.sentinel_id_of(obj).map(|id| (obj, id)));
        self.id_to_object.iter().map(|(id, obj)| (*obj, *id)).chain(sentinels).collect()
    }

    /// Distinct objects pinned as general, local or special roots, in handle order
    pub fn extract_snapshot_roots(&self) -> Vec<ObjectHandle> {
        self.roots
            .iter()
            .merge(self.local_roots.iter())
            .merge(self.special_roots.iter())
            .dedup()
            .collect()
    }

    /// Empty the root sets and the id mapping before a snapshot restore
    pub fn clear_roots_for_snapshot_restore(&mut self) {
        self.roots.clear();
        self.local_roots.clear();
        self.special_roots.clear();
        self.id_to_object.clear();
        self.object_to_id.clear();
    }

    // ========== Resolution ==========

    /// Id of `obj`
    ///
    /// Sentinels of tracked contexts answer with their sentinel id.
    pub fn id_of(&self, obj: ObjectHandle) -> TtdResult<LogPointerId> {
        if let Some(id) = self.object_to_id.get(&obj) {
            return Ok(*id);
        }
        self.sentinel_id_of(obj).ok_or_else(|| TtdError::not_found(LookupKind::LogPointerId, obj))
    }

    /// Object currently bound to `id`
    pub fn lookup_object(&self, id: LogPointerId) -> TtdResult<ObjectHandle> {
        if id.is_sentinel() {
            return self.lookup_sentinel(id);
        }
        self.id_to_object
            .get(&id)
            .copied()
            .ok_or_else(|| TtdError::not_found(LookupKind::LogPointerId, id))
    }

    /// Tracked context whose global object carries `id`
    pub fn lookup_context(&self, id: LogPointerId) -> TtdResult<ContextId> {
        self.contexts
            .iter()
            .find(|c| c.sentinel_ids.global == id)
            .map(|c| c.id)
            .ok_or_else(|| TtdError::not_found(LookupKind::Context, id))
    }

    fn lookup_sentinel(&self, id: LogPointerId) -> TtdResult<ObjectHandle> {
        let (ctx, slot) =
            id.as_sentinel().ok_or_else(|| TtdError::not_found(LookupKind::LogPointerId, id))?;
        let context = self.context(ctx).map_err(|_| TtdError::not_found(LookupKind::LogPointerId, id))?;
        Ok(context.sentinels.get(slot))
    }

    fn sentinel_id_of(&self, obj: ObjectHandle) -> Option<LogPointerId> {
        self.contexts
            .iter()
            .find_map(|c| c.sentinels.slot_of(obj).map(|slot| LogPointerId::sentinel(c.id, slot)))
    }

    fn id_or_allocate(&mut self, obj: ObjectHandle) -> TtdResult<LogPointerId> {
        if let Some(id) = self.object_to_id.get(&obj) {
            return Ok(*id);
        }
        if let Some(id) = self.sentinel_id_of(obj) {
            return Ok(id);
        }

        let raw = self.next_log_pointer_id;
        if raw & SENTINEL_ID_TAG != 0 {
            error!(raw, "Ordinary log pointer ids exhausted");
            return Err(TtdError::invariant("ordinary log pointer id range exhausted"));
        }
        self.next_log_pointer_id += 1;

        let id = LogPointerId::new(raw);
        self.bind(obj, id);
        debug!(%id, %obj, "Assigned log pointer id");
        Ok(id)
    }

    fn bind(&mut self, obj: ObjectHandle, id: LogPointerId) {
        self.id_to_object.insert(id, obj);
        self.object_to_id.insert(obj, id);
    }
}
