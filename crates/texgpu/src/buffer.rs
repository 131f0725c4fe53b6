//! Linear storage buffers for compute shaders.

use std::fmt;

use texgpu_core::RawHandle;

use crate::device::{live, BufferKey, ContextKey, Device, BufferState};
use crate::error::Result;

/// A storage buffer owned by a [`Context`](crate::Context).
///
/// Only buffers created with `downloadable = true` can be read back, and a
/// [`Context::download_buffer`](crate::Context::download_buffer) call that
/// passes its checks consumes it.
pub struct StorageBuffer<'d> {
    device: &'d Device,
    context: ContextKey,
    key: BufferKey,
}

impl<'d> StorageBuffer<'d> {
    pub(crate) fn new(device: &'d Device, context: ContextKey, key: BufferKey) -> Self {
        Self { device, context, key }
    }

    pub(crate) fn device(&self) -> &'d Device {
        self.device
    }

    pub(crate) fn context_key(&self) -> ContextKey {
        self.context
    }

    pub(crate) fn key(&self) -> BufferKey {
        self.key
    }

    fn read<R>(&self, f: impl FnOnce(&BufferState) -> R) -> Result<R> {
        self.device
            .with_context(self.context, |ctx| ctx.buffer(self.key).map(f))
    }

    /// Length in bytes as requested at creation.
    pub fn len(&self) -> Result<usize> {
        self.read(|b| b.len)
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.read(|b| b.len == 0)
    }

    pub fn is_downloadable(&self) -> Result<bool> {
        self.read(|b| b.downloadable)
    }

    /// The underlying native buffer handle.
    pub fn raw_handle(&self) -> Result<RawHandle> {
        self.device
            .with_context(self.context, |ctx| live(&ctx.buffer(self.key)?.handle))
    }

    /// Release the buffer. Idempotent.
    pub fn dispose(&self) {
        self.device.release_resource(self.context, |ctx| {
            ctx.buffers.remove(self.key);
        });
    }

    pub fn is_disposed(&self) -> bool {
        self.read(|_| ()).is_err()
    }
}

impl Drop for StorageBuffer<'_> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for StorageBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.read(|b| (b.len, b.downloadable)) {
            Ok((len, downloadable)) => f
                .debug_struct("StorageBuffer")
                .field("len", &len)
                .field("downloadable", &downloadable)
                .finish(),
            Err(_) => f.write_str("StorageBuffer(disposed)"),
        }
    }
}
