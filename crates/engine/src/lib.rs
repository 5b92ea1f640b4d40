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

//! TTD Engine - identity registry, context journals and core image paths
//!
//! [`IdentityRegistry`] is the per runtime-thread entry point. It owns one
//! [`ContextJournal`] per tracked context and the thread's [`PathResolver`].
//! The runtime itself is reached only through the traits in [`image`] and
//! [`host`]; [`ObjectArena`] implements them in memory.

pub mod arena;
pub use arena::*;

pub mod host;
pub use host::*;

pub mod image;
pub use image::*;

pub mod journal;
pub use journal::*;

pub mod paths;
pub use paths::*;

pub mod pins;
pub use pins::*;

pub mod registry;
pub use registry::*;
