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

//! Per runtime-thread identity registry.
//!
//! One [`IdentityRegistry`] exists per runtime thread. It is created when the
//! thread starts recording or replaying, passed explicitly into every
//! operation, and dropped with the thread. It owns:
//!
//! - the bounded, insertion-ordered list of tracked execution contexts with
//!   one [`ContextJournal`] each
//! - the general, local and special root pin sets
//! - the bidirectional [`LogPointerId`] to object mapping
//! - the thread's [`PathResolver`], computed at most once
//! - the host callback table
//!
//! Nothing here is synchronized. The collector only ever sees a
//! [`CollectorNotifier`], which cannot touch any of the maps.

mod collector;
mod contexts;
mod roots;

pub use collector::CollectorNotifier;
pub use contexts::TrackedContext;

use std::collections::{BTreeMap, HashMap};

use once_cell::unsync::OnceCell;
use tracing::debug;
use ttd_common::{
    ContextId, DeadContextRecord, LogPointerId, LookupKind, ObjectHandle, SentinelSlot, TtdConfig,
    TtdError, TtdResult,
};

use crate::{
    ContextJournal, CoreImage, ExternalContextRef, HostFunctions, MarkVisitor, NamedRoot,
    PathResolver, PinSet,
};

/// Identity bookkeeping of one runtime thread
#[derive(Debug)]
pub struct IdentityRegistry {
    config: TtdConfig,

    // Contexts
    contexts: Vec<TrackedContext>,
    next_context: u32,
    active_context: Option<ContextId>,
    journals: BTreeMap<ContextId, ContextJournal>,
    external_refs: BTreeMap<ContextId, ExternalContextRef>,
    dead_contexts: Vec<DeadContextRecord>,
    created_or_destroyed_in_replay: bool,

    // Roots and ids
    next_log_pointer_id: u64,
    id_to_object: BTreeMap<LogPointerId, ObjectHandle>,
    object_to_id: HashMap<ObjectHandle, LogPointerId>,
    roots: PinSet<ObjectHandle>,
    local_roots: PinSet<ObjectHandle>,
    special_roots: PinSet<ObjectHandle>,

    /// Contexts the collector reported as retired, sized once at construction
    retired_contexts: Vec<ContextId>,

    core_paths: OnceCell<PathResolver>,
    host: HostFunctions,
}

impl IdentityRegistry {
    /// Create a registry from a validated configuration
    pub fn new(config: TtdConfig) -> TtdResult<Self> {
        config.validate()?;

        debug!(
            max_contexts = config.max_contexts,
            first_id = config.first_log_pointer_id,
            "Creating identity registry"
        );

        Ok(Self {
            contexts: Vec::with_capacity(config.max_contexts),
            next_context: 0,
            active_context: None,
            journals: BTreeMap::new(),
            external_refs: BTreeMap::new(),
            dead_contexts: Vec::new(),
            created_or_destroyed_in_replay: false,
            next_log_pointer_id: config.first_log_pointer_id,
            id_to_object: BTreeMap::new(),
            object_to_id: HashMap::new(),
            roots: PinSet::new(),
            local_roots: PinSet::new(),
            special_roots: PinSet::new(),
            retired_contexts: Vec::with_capacity(config.max_contexts),
            core_paths: OnceCell::new(),
            host: HostFunctions::default(),
            config,
        })
    }

    /// Install the host callback table
    pub fn with_host_functions(mut self, host: HostFunctions) -> Self {
        self.host = host;
        self
    }

    /// Configuration the registry was created with
    pub fn config(&self) -> &TtdConfig {
        &self.config
    }

    /// Host callback table
    pub fn host_functions_mut(&mut self) -> &mut HostFunctions {
        &mut self.host
    }

    /// Prepare the configured log location for writing
    pub fn initialize_log_for_write(&mut self) -> TtdResult<()> {
        let uri = self.config.uri.clone();
        self.host.initialize_for_write(&uri)
    }

    /// Journal of a tracked context
    pub fn journal(&self, ctx: ContextId) -> TtdResult<&ContextJournal> {
        self.journals.get(&ctx).ok_or_else(|| TtdError::not_found(LookupKind::Context, ctx))
    }

    /// Mutable journal of a tracked context
    pub fn journal_mut(&mut self, ctx: ContextId) -> TtdResult<&mut ContextJournal> {
        self.journals.get_mut(&ctx).ok_or_else(|| TtdError::not_found(LookupKind::Context, ctx))
    }

    /// Compute the core image paths on first use and return them
    ///
    /// Later calls return the first result and ignore their arguments; the
    /// built-in image does not change within a thread.
    pub fn ensure_core_paths<I>(&self, image: &I, roots: &[NamedRoot]) -> TtdResult<&PathResolver>
    where
        I: CoreImage + ?Sized,
    {
        self.core_paths.get_or_try_init(|| {
            PathResolver::build_with_capacity(
                image,
                roots,
                self.config.core_object_capacity,
                self.config.core_body_capacity,
            )
        })
    }

    /// Core image paths, if they were computed
    pub fn core_paths(&self) -> Option<&PathResolver> {
        self.core_paths.get()
    }

    /// Report everything the registry keeps alive to the collector
    ///
    /// Covers the three pin sets, the sentinels of every tracked context, the
    /// journals' pins and every core path target.
    pub fn mark_roots(&self, visitor: &mut dyn MarkVisitor) {
        for obj in self.roots.iter().chain(self.local_roots.iter()).chain(self.special_roots.iter()) {
            visitor.mark_object(obj);
        }

        for ctx in &self.contexts {
            for slot in SentinelSlot::ALL {
                visitor.mark_object(ctx.sentinels.get(slot));
            }
        }

        for journal in self.journals.values() {
            journal.mark(visitor);
        }

        if let Some(paths) = self.core_paths.get() {
            paths.mark_well_known(visitor);
        }
    }
}
