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


//! TTD Common - Shared functionality for the TTD identity core
//!
//! This crate provides the identifier types, the error taxonomy, the
//! configuration and logging setup, and the name-sorted index used by the
//! engine crate and the command-line tool.

/// Identifier, handle and context record types
pub mod types;

/// Configuration of a runtime thread's TTD state
pub mod config;
/// Error taxonomy and result alias
pub mod error;
/// Logging setup and utilities for consistent logging across TTD components
pub mod logging;
/// Name-sorted index with required and optional lookups
pub mod naming;

pub use config::*;
pub use error::*;
pub use naming::*;
pub use types::*;
