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

//! Host-supplied callbacks.
//!
//! The host wraps contexts into its own finalizable objects, owns the log
//! storage and creates external objects referenced from the log. The identity
//! core stores these callbacks and routes failures into [`TtdError::Host`];
//! there is no retry, a lost log write cannot be recovered.

use std::{fmt, io};

use serde::{Deserialize, Serialize};
use ttd_common::{ContextId, ExecutionMode, ObjectHandle, TtdError, TtdResult};

/// Opaque reference to a host-side wrapper object.
///
/// The registry hands these back from a snapshot-restore teardown so the host
/// can finalize them; it never dereferences them itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalContextRef(pub u64);

impl fmt::Display for ExternalContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ext{}", self.0)
    }
}

/// Factory the host supplies when a context is registered
pub trait HostContextFactory {
    /// Wrap the newly observed context `ctx`
    fn wrap_context(&mut self, ctx: ContextId, mode: ExecutionMode) -> ExternalContextRef;
}

impl<F> HostContextFactory for F
where
    F: FnMut(ContextId, ExecutionMode) -> ExternalContextRef,
{
    fn wrap_context(&mut self, ctx: ContextId, mode: ExecutionMode) -> ExternalContextRef {
        self(ctx, mode)
    }
}

/// Handle of a host log stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u64);

/// Log stream table supplied by the host
pub trait LogStreamFunctions {
    /// Prepare the log location `uri` for writing
    fn initialize_for_write(&mut self, uri: &str) -> io::Result<()>;

    /// Open the stream `name` under `uri` for reading or writing
    fn open(&mut self, uri: &str, name: &str, write: bool) -> io::Result<StreamHandle>;

    /// Read into `buf`, returning the number of bytes read
    fn read(&mut self, stream: StreamHandle, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `data`
    fn write(&mut self, stream: StreamHandle, data: &[u8]) -> io::Result<()>;

    /// Flush and close `stream`
    fn close(&mut self, stream: StreamHandle) -> io::Result<()>;
}

/// Factory for host external objects referenced from the log
pub trait ExternalObjectFactory {
    /// Create an external object in `ctx` during replay
    fn create_external_object(&mut self, ctx: ContextId) -> io::Result<ObjectHandle>;
}

/// Host callback table held by the identity registry
#[derive(Default)]
pub struct HostFunctions {
    streams: Option<Box<dyn LogStreamFunctions>>,
    external_objects: Option<Box<dyn ExternalObjectFactory>>,
}

impl fmt::Debug for HostFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunctions")
            .field("streams", &self.streams.is_some())
            .field("external_objects", &self.external_objects.is_some())
            .finish()
    }
}

impl HostFunctions {
    /// Build a table from the host's stream functions and external object factory
    pub fn new(
        streams: Box<dyn LogStreamFunctions>,
        external_objects: Box<dyn ExternalObjectFactory>,
    ) -> Self {
        Self { streams: Some(streams), external_objects: Some(external_objects) }
    }

    fn streams(&mut self) -> TtdResult<&mut (dyn LogStreamFunctions + 'static)> {
        match self.streams.as_deref_mut() {
            Some(streams) => Ok(streams),
            None => Err(TtdError::host(
                "streams",
                io::Error::new(io::ErrorKind::NotConnected, "no log stream functions installed"),
            )),
        }
    }

    /// Initialize `uri` for writing
    pub fn initialize_for_write(&mut self, uri: &str) -> TtdResult<()> {
        self.streams()?.initialize_for_write(uri).map_err(|e| TtdError::host("initialize_for_write", e))
    }

    /// Open a log stream
    pub fn open_stream(&mut self, uri: &str, name: &str, write: bool) -> TtdResult<StreamHandle> {
        self.streams()?.open(uri, name, write).map_err(|e| TtdError::host("open", e))
    }

    /// Write a whole buffer to a log stream
    pub fn write_stream(&mut self, stream: StreamHandle, data: &[u8]) -> TtdResult<()> {
        self.streams()?.write(stream, data).map_err(|e| TtdError::host("write", e))
    }

    /// Read from a log stream
    pub fn read_stream(&mut self, stream: StreamHandle, buf: &mut [u8]) -> TtdResult<usize> {
        self.streams()?.read(stream, buf).map_err(|e| TtdError::host("read", e))
    }

    /// Close a log stream
    pub fn close_stream(&mut self, stream: StreamHandle) -> TtdResult<()> {
        self.streams()?.close(stream).map_err(|e| TtdError::host("close", e))
    }

    /// Create an external object referenced from the log
    pub fn create_external_object(&mut self, ctx: ContextId) -> TtdResult<ObjectHandle> {
        let factory = self.external_objects.as_deref_mut().ok_or_else(|| {
            TtdError::host(
                "create_external_object",
                io::Error::new(io::ErrorKind::NotConnected, "no external object factory installed"),
            )
        })?;
        factory.create_external_object(ctx).map_err(|e| TtdError::host("create_external_object", e))
    }
}
