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

//! The collector's view of the registry.
//!
//! A sweep or finalizer must not grow any registry map, so it gets a
//! [`CollectorNotifier`] that can only append to storage reserved when the
//! registry was created. The signals are applied by the next ordinary
//! registry call.

use tracing::{debug, warn};
use ttd_common::{ContextId, DeadContextRecord, TtdResult};

use super::IdentityRegistry;

/// Restricted handle given to the collector's sweep/finalize path
#[derive(Debug)]
pub struct CollectorNotifier<'a> {
    retired: &'a mut Vec<ContextId>,
    limit: usize,
}

impl CollectorNotifier<'_> {
    /// Record that the collector finalized `ctx`
    ///
    /// Never allocates. Returns `false` if the reserved storage is full and the
    /// signal was dropped.
    pub fn context_retired(&mut self, ctx: ContextId) -> bool {
        if self.retired.len() >= self.limit {
            return false;
        }
        self.retired.push(ctx);
        true
    }
}

impl IdentityRegistry {
    /// Hand out the collector's restricted view
    pub fn collector_notifier(&mut self) -> CollectorNotifier<'_> {
        CollectorNotifier { retired: &mut self.retired_contexts, limit: self.config.max_contexts }
    }

    /// Apply the retirements the collector reported since the last call
    ///
    /// Each still-tracked context is destroyed as in record mode. Contexts that
    /// are already gone are skipped.
    pub fn process_retired_contexts(&mut self) -> TtdResult<Vec<DeadContextRecord>> {
        let signals: Vec<ContextId> = self.retired_contexts.drain(..).collect();
        let mut records = Vec::with_capacity(signals.len());

        for ctx in signals {
            if !self.is_tracked(ctx) {
                warn!(context = %ctx, "Collector retired an untracked context");
                continue;
            }
            records.push(self.destroy_context_in_record(ctx)?);
        }

        if !records.is_empty() {
            debug!(count = records.len(), "Processed retired contexts");
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::{sentinels, wrap};
    use ttd_common::{ExecutionMode, TtdConfig};

    #[test]
    fn test_notifier_signals_become_record_destroys() {
        let mut registry = IdentityRegistry::new(TtdConfig { max_contexts: 2, ..Default::default() }).unwrap();
        let mut factory = wrap;
        let c0 = registry.register_context(ExecutionMode::Record, sentinels(0), &mut factory).unwrap();
        let c1 = registry.register_context(ExecutionMode::Record, sentinels(5), &mut factory).unwrap();

        {
            let mut notifier = registry.collector_notifier();
            assert!(notifier.context_retired(c1));
            assert!(notifier.context_retired(ContextId(42)));
            assert!(!notifier.context_retired(c0));
        }
        // Nothing happens until the registry processes the signals
        assert!(registry.is_tracked(c1));

        let records = registry.process_retired_contexts().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].context, c1);
        assert!(!registry.is_tracked(c1));
        assert!(registry.is_tracked(c0));
        assert!(registry.process_retired_contexts().unwrap().is_empty());
    }
}
