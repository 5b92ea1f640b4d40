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

//! Per-context journal of facts replay needs but cannot observe directly.
//!
//! A journal remembers three things for its context:
//!
//! - asynchronous buffer writes that were scheduled but have not landed yet
//! - every top-level code unit that was loaded, split by how it was created
//! - the lexical parent of every function body reachable from that code
//!
//! It also pins what it references (loaded bodies and weakly held objects)
//! and reports those pins through [`ContextJournal::mark`].

use std::collections::{BTreeMap, BTreeSet};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ttd_common::{ContextId, FunctionBodyHandle, LookupKind, ObjectHandle, TtdError, TtdResult};

use crate::{CodeLoader, MarkVisitor, PinSet};

/// A scheduled asynchronous buffer mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingAsyncWrite {
    /// Buffer the write targets
    pub buffer: ObjectHandle,
    /// Offset the write starts at
    pub start: u64,
}

/// A pending write matched against its completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletedAsyncWrite {
    /// Buffer the write targeted
    pub buffer: ObjectHandle,
    /// Offset the write started at
    pub start: u64,
    /// Position reached when the write completed
    pub final_position: u64,
}

/// How a top-level code unit came into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
pub enum CodeOrigin {
    /// Loaded as a script by the host
    #[display("script")]
    ScriptLoad,
    /// Built by the dynamic function constructor
    #[display("new-function")]
    NewFunction,
    /// Compiled by `eval`
    #[display("eval")]
    Eval,
}

/// A loaded top-level code unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopLevelCodeRecord {
    /// Top-level function body
    pub body: FunctionBodyHandle,
    /// Creation mechanism
    pub origin: CodeOrigin,
    /// Host body counter at load time
    pub body_counter: u64,
    /// Source (file) name, when the engine knows one
    pub source_name: Option<String>,
}

/// Journal of one execution context
#[derive(Debug, Clone)]
pub struct ContextJournal {
    context: ContextId,

    pending_writes: Vec<PendingAsyncWrite>,

    script_loads: Vec<TopLevelCodeRecord>,
    new_functions: Vec<TopLevelCodeRecord>,
    evals: Vec<TopLevelCodeRecord>,
    top_level_bodies: BTreeSet<FunctionBodyHandle>,

    /// Lexical parent of every tracked body; `None` for top-level code
    parents: BTreeMap<FunctionBodyHandle, Option<FunctionBodyHandle>>,

    pinned_bodies: PinSet<FunctionBodyHandle>,
    weak_pins: PinSet<ObjectHandle>,
}

impl ContextJournal {
    /// Create an empty journal for `context`
    pub fn new(context: ContextId) -> Self {
        Self {
            context,
            pending_writes: Vec::new(),
            script_loads: Vec::new(),
            new_functions: Vec::new(),
            evals: Vec::new(),
            top_level_bodies: BTreeSet::new(),
            parents: BTreeMap::new(),
            pinned_bodies: PinSet::new(),
            weak_pins: PinSet::new(),
        }
    }

    /// Context this journal belongs to
    pub fn context(&self) -> ContextId {
        self.context
    }

    // ========== Asynchronous buffer writes ==========

    /// Remember that a write into `buffer` starting at `start` is in flight
    pub fn schedule_async_write(&mut self, buffer: ObjectHandle, start: u64) {
        debug!(context = %self.context, %buffer, start, "Scheduled async write");
        self.pending_writes.push(PendingAsyncWrite { buffer, start });
    }

    /// Match and remove the pending write into `buffer` that ended at `final_position`
    ///
    /// Among the pending writes into `buffer` that start at or before
    /// `final_position`, the one starting closest to it wins. Ties go to the
    /// write scheduled first.
    pub fn complete_async_write(
        &mut self,
        buffer: ObjectHandle,
        final_position: u64,
    ) -> TtdResult<CompletedAsyncWrite> {
        let mut best: Option<usize> = None;
        for (i, pending) in self.pending_writes.iter().enumerate() {
            if pending.buffer != buffer || pending.start > final_position {
                continue;
            }
            if best.is_none_or(|b| pending.start > self.pending_writes[b].start) {
                best = Some(i);
            }
        }

        let index = best.ok_or_else(|| {
            TtdError::not_found(LookupKind::AsyncWrite, format!("{buffer}@{final_position}"))
        })?;
        let pending = self.pending_writes.remove(index);

        Ok(CompletedAsyncWrite { buffer, start: pending.start, final_position })
    }

    /// Writes still in flight, in scheduling order
    pub fn pending_async_writes(&self) -> &[PendingAsyncWrite] {
        &self.pending_writes
    }

    /// Forget every in-flight write
    pub fn clear_pending_async_writes_for_restore(&mut self) {
        self.pending_writes.clear();
    }

    // ========== Loaded code ==========

    /// Register a script loaded by the host
    ///
    /// Returns `false` if `body` is already registered as top-level code.
    pub fn register_script_load(
        &mut self,
        body: FunctionBodyHandle,
        body_counter: u64,
        loader: &mut dyn CodeLoader,
    ) -> TtdResult<bool> {
        self.register_code(CodeOrigin::ScriptLoad, body, body_counter, loader)
    }

    /// Register code built by the dynamic function constructor
    pub fn register_new_function(
        &mut self,
        body: FunctionBodyHandle,
        body_counter: u64,
        loader: &mut dyn CodeLoader,
    ) -> TtdResult<bool> {
        self.register_code(CodeOrigin::NewFunction, body, body_counter, loader)
    }

    /// Register code compiled by `eval`
    pub fn register_eval(
        &mut self,
        body: FunctionBodyHandle,
        body_counter: u64,
        loader: &mut dyn CodeLoader,
    ) -> TtdResult<bool> {
        self.register_code(CodeOrigin::Eval, body, body_counter, loader)
    }

    /// Register a top-level code unit of the given origin
    pub fn register_code(
        &mut self,
        origin: CodeOrigin,
        body: FunctionBodyHandle,
        body_counter: u64,
        loader: &mut dyn CodeLoader,
    ) -> TtdResult<bool> {
        if self.top_level_bodies.contains(&body) {
            debug!(context = %self.context, %body, %origin, "Top-level code already registered");
            return Ok(false);
        }

        let record =
            TopLevelCodeRecord { body, origin, body_counter, source_name: loader.source_name(body) };

        let nested = self.collect_nested_parents(body, loader)?;
        self.parents.extend(nested);

        match origin {
            CodeOrigin::ScriptLoad => self.script_loads.push(record),
            CodeOrigin::NewFunction => self.new_functions.push(record),
            CodeOrigin::Eval => self.evals.push(record),
        }
        self.top_level_bodies.insert(body);
        self.parents.insert(body, None);
        self.pinned_bodies.pin(body);

        debug!(context = %self.context, %body, %origin, body_counter, "Registered top-level code");
        Ok(true)
    }

    /// Parse `body` fully and record the parent of every nested body, transitively
    pub fn force_load_for_tracking(
        &mut self,
        body: FunctionBodyHandle,
        loader: &mut dyn CodeLoader,
    ) -> TtdResult<()> {
        let nested = self.collect_nested_parents(body, loader)?;
        self.parents.extend(nested);
        Ok(())
    }

    /// Walk the bodies nested in `body` without touching the parent map
    ///
    /// Nothing is recorded if any parse fails.
    fn collect_nested_parents(
        &self,
        body: FunctionBodyHandle,
        loader: &mut dyn CodeLoader,
    ) -> TtdResult<BTreeMap<FunctionBodyHandle, Option<FunctionBodyHandle>>> {
        let mut found = BTreeMap::new();
        let mut worklist = vec![body];
        while let Some(current) = worklist.pop() {
            loader.force_parse(current)?;
            for child in loader.nested_bodies(current) {
                if self.parents.contains_key(&child) || found.contains_key(&child) {
                    continue;
                }
                found.insert(child, Some(current));
                worklist.push(child);
            }
        }
        Ok(found)
    }

    /// Whether `body` was registered as top-level code of any origin
    pub fn is_body_loaded_at_top_level(&self, body: FunctionBodyHandle) -> bool {
        self.top_level_bodies.contains(&body)
    }

    /// Lexical parent of `body`; `None` for top-level code
    pub fn resolve_parent(&self, body: FunctionBodyHandle) -> TtdResult<Option<FunctionBodyHandle>> {
        self.parents
            .get(&body)
            .copied()
            .ok_or_else(|| TtdError::not_found(LookupKind::FunctionBody, body))
    }

    /// First top-level body loaded from `source_name`
    ///
    /// Script loads are searched first, then dynamic functions, then evals.
    /// Two units with the same name cannot be told apart here, the first one
    /// wins.
    pub fn find_body_by_source_name(&self, source_name: &str) -> Option<FunctionBodyHandle> {
        let mut matches = self.loaded_code().filter(|r| r.source_name.as_deref() == Some(source_name));
        let first = matches.next()?;
        if matches.next().is_some() {
            warn!(context = %self.context, source_name, body = %first.body, "Ambiguous source name, using the first match");
        }
        Some(first.body)
    }

    /// Scripts loaded by the host, in load order
    pub fn script_loads(&self) -> &[TopLevelCodeRecord] {
        &self.script_loads
    }

    /// Dynamic function constructor results, in load order
    pub fn new_functions(&self) -> &[TopLevelCodeRecord] {
        &self.new_functions
    }

    /// Eval results, in load order
    pub fn evals(&self) -> &[TopLevelCodeRecord] {
        &self.evals
    }

    /// All loaded code: script loads, then dynamic functions, then evals
    pub fn loaded_code(&self) -> impl Iterator<Item = &TopLevelCodeRecord> + '_ {
        self.script_loads.iter().chain(&self.new_functions).chain(&self.evals)
    }

    /// Drop the loaded-code lists, the parent map and the body pins at once
    pub fn clear_loaded_sources_for_restore(&mut self) {
        self.script_loads.clear();
        self.new_functions.clear();
        self.evals.clear();
        self.top_level_bodies.clear();
        self.parents.clear();
        self.pinned_bodies.clear();
    }

    // ========== Weak references ==========

    /// Keep an object held by a weak collection alive for this context
    pub fn add_weak_reference_pin(&mut self, obj: ObjectHandle) {
        self.weak_pins.pin(obj);
    }

    /// Release one weak-collection pin on `obj`
    pub fn remove_weak_reference_pin(&mut self, obj: ObjectHandle) -> bool {
        self.weak_pins.unpin(obj).is_some()
    }

    /// Objects pinned on behalf of weak collections
    pub fn weak_reference_pins(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.weak_pins.iter()
    }

    /// Report pinned bodies and weakly held objects to the collector
    pub fn mark(&self, visitor: &mut dyn MarkVisitor) {
        for body in self.pinned_bodies.iter() {
            visitor.mark_body(body);
        }
        for obj in self.weak_pins.iter() {
            visitor.mark_object(obj);
        }
    }
}
