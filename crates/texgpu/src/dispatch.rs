//! Compute handlers: binding resources and issuing dispatches.

use std::fmt;

use bytemuck::Pod;
use tracing::trace;

use texgpu_core::{RawHandle, WorkGroupSize};

use crate::buffer::StorageBuffer;
use crate::device::{live, ContextKey, Device, HandlerKey};
use crate::error::{Error, Result};
use crate::keys::ComputeShaderKey;
use crate::texture::RenderTexture;

/// Number of work groups needed to cover `extent` invocations.
///
/// Rounds up and never returns less than one group, so a partially covered
/// tail still gets an invocation and an empty extent still dispatches.
pub fn group_count(extent: u32, work_group: u32) -> u32 {
    num::integer::div_ceil(extent, work_group.max(1)).max(1)
}

/// An instance of a registered compute shader inside one context.
///
/// Bindings are addressed by slot; use [`name_to_slot`](Self::name_to_slot)
/// to resolve a slot from the binding's name in the shader source.
pub struct ComputeHandler<'d> {
    device: &'d Device,
    context: ContextKey,
    key: HandlerKey,
}

impl<'d> ComputeHandler<'d> {
    pub(crate) fn new(device: &'d Device, context: ContextKey, key: HandlerKey) -> Self {
        Self { device, context, key }
    }

    /// Run `f` with the live context and handler raw handles.
    fn with_raw<R>(&self, f: impl FnOnce(&crate::device::ContextState, RawHandle) -> Result<R>) -> Result<R> {
        self.device.with_context(self.context, |ctx| {
            let handler = live(&ctx.handler(self.key)?.handle)?;
            f(ctx, handler)
        })
    }

    fn check_owner(&self, device: &Device, context: ContextKey, what: &str) -> Result<()> {
        if !std::ptr::eq(self.device, device) || self.context != context {
            return Err(Error::InvalidArgument(format!(
                "{what} belongs to a different context than the compute handler"
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Bindings
    // -----------------------------------------------------------------------

    /// Slot of the binding called `name`.
    pub fn name_to_slot(&self, name: &str) -> Result<u32> {
        let backend = self.device.backend();
        self.with_raw(|_, handler| {
            backend
                .get_bind_slot(handler, name)
                .map_err(Error::native("get_bind_slot"))?
                .ok_or_else(|| Error::lookup("binding", name))
        })
    }

    pub fn set_render_texture(&self, slot: u32, texture: &RenderTexture<'d>) -> Result<()> {
        self.check_owner(texture.device(), texture.context_key(), "texture")?;
        let backend = self.device.backend();
        self.with_raw(|ctx, handler| {
            let texture = live(&ctx.texture(texture.key())?.handle)?;
            backend
                .set_render_texture(handler, slot, texture)
                .map_err(Error::native("set_render_texture"))
        })
    }

    pub fn set_storage_buffer(&self, slot: u32, buffer: &StorageBuffer<'d>) -> Result<()> {
        self.check_owner(buffer.device(), buffer.context_key(), "storage buffer")?;
        let backend = self.device.backend();
        self.with_raw(|ctx, handler| {
            let buffer = live(&ctx.buffer(buffer.key())?.handle)?;
            backend
                .set_storage_buffer(handler, slot, buffer)
                .map_err(Error::native("set_storage_buffer"))
        })
    }

    /// Upload `data` as the uniform block bound at `slot`.
    pub fn upload_constants_buffer<T: Pod>(&self, slot: u32, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let backend = self.device.backend();
        self.with_raw(|_, handler| {
            backend
                .upload_constants_buffer(handler, slot, bytes)
                .map_err(Error::native("upload_constants_buffer"))
        })
    }

    /// Upload `data` into a handler-owned storage buffer bound at `slot`.
    pub fn upload_storage_buffer<T: Pod>(&self, slot: u32, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let backend = self.device.backend();
        self.with_raw(|_, handler| {
            backend
                .upload_storage_buffer_binding(handler, slot, bytes)
                .map_err(Error::native("upload_storage_buffer"))
        })
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Work-group size reported by the backend when the handler was created.
    pub fn work_group_size(&self) -> Result<WorkGroupSize> {
        self.device
            .with_context(self.context, |ctx| Ok(ctx.handler(self.key)?.work_group))
    }

    /// The shader this handler runs.
    pub fn shader_key(&self) -> Result<ComputeShaderKey> {
        self.device
            .with_context(self.context, |ctx| Ok(ctx.handler(self.key)?.shader))
    }

    /// Issue `x * y * z` work groups. Does not wait for completion.
    pub fn dispatch(&self, x: u32, y: u32, z: u32) -> Result<()> {
        if x == 0 || y == 0 || z == 0 {
            return Err(Error::InvalidArgument(format!(
                "work group counts must be non-zero, got ({x}, {y}, {z})"
            )));
        }
        let backend = self.device.backend();
        self.with_raw(|_, handler| {
            trace!(%handler, x, y, z, "dispatch");
            backend
                .dispatch(handler, x, y, z)
                .map_err(Error::native("dispatch"))
        })
    }

    /// Dispatch enough work groups to cover `width x height x depth`
    /// invocations.
    pub fn dispatch_extent(&self, width: u32, height: u32, depth: u32) -> Result<()> {
        let wg = self.work_group_size()?;
        self.dispatch(
            group_count(width, wg.x),
            group_count(height, wg.y),
            group_count(depth, wg.z),
        )
    }

    /// Dispatch one invocation per texel of `texture`.
    pub fn dispatch_for_texture(&self, texture: &RenderTexture<'_>) -> Result<()> {
        let (width, height) = texture.size()?;
        self.dispatch_extent(width, height, 1)
    }

    // -----------------------------------------------------------------------
    // Lifetime
    // -----------------------------------------------------------------------

    /// The underlying native handler handle.
    pub fn raw_handle(&self) -> Result<RawHandle> {
        self.with_raw(|_, handler| Ok(handler))
    }

    /// Release the handler. Idempotent.
    pub fn dispose(&self) {
        self.device.release_resource(self.context, |ctx| {
            ctx.handlers.remove(self.key);
        });
    }

    pub fn is_disposed(&self) -> bool {
        self.raw_handle().is_err()
    }
}

impl Drop for ComputeHandler<'_> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ComputeHandler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeHandler")
            .field("shader", &self.shader_key().ok())
            .field("work_group", &self.work_group_size().ok())
            .finish()
    }
}
