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

//! Error taxonomy of the identity and naming core
//!
//! Only [`TtdError::NotFound`] may be legitimate for a caller (a root that is
//! not registered yet). Every other variant aborts recording or replay: a
//! skipped or guessed answer would make the replay diverge silently.

use std::io;

use derive_more::Display;
use thiserror::Error;

/// Result alias used throughout the TTD crates
pub type TtdResult<T> = Result<T, TtdError>;

/// What kind of key a failed lookup was performed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LookupKind {
    /// A log pointer id
    #[display("log pointer id")]
    LogPointerId,
    /// An execution context
    #[display("context")]
    Context,
    /// A core image path
    #[display("core path")]
    CorePath,
    /// A function body
    #[display("function body")]
    FunctionBody,
    /// A pending asynchronous buffer write
    #[display("pending async write")]
    AsyncWrite,
    /// A name in a sorted name index
    #[display("name")]
    Name,
}

/// Errors raised by the registry, the journals and the path resolver
#[derive(Debug, Error)]
pub enum TtdError {
    /// The key has no current mapping
    #[error("no {kind} mapping for `{key}`")]
    NotFound {
        /// Kind of key that was looked up
        kind: LookupKind,
        /// Rendered key
        key: String,
    },

    /// An internal invariant does not hold; recording or replay must stop
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The bounded context list is full
    #[error("context capacity exceeded (limit {limit})")]
    CapacityExceeded {
        /// Configured maximum number of tracked contexts
        limit: usize,
    },

    /// A host-supplied callback failed
    #[error("host callback `{operation}` failed: {source}")]
    Host {
        /// Name of the failing host operation
        operation: &'static str,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration values are unusable
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TtdError {
    /// Build a [`TtdError::NotFound`] for `key`
    pub fn not_found(kind: LookupKind, key: impl ToString) -> Self {
        Self::NotFound { kind, key: key.to_string() }
    }

    /// Build a [`TtdError::InvariantViolation`]
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Build a [`TtdError::Host`] from a failed host operation
    pub fn host(operation: &'static str, source: io::Error) -> Self {
        Self::Host { operation, source }
    }

    /// Whether the error must abort recording or replay
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }
}
