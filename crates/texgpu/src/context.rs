//! [`Context`]: a session that creates and owns GPU resources.

use std::fmt;
use std::sync::Arc;

use bytemuck::Pod;
use tracing::trace;

use texgpu_core::{image_byte_len, HandleKind, OwnedHandle, TextureChannel, TextureFormat};

use crate::buffer::StorageBuffer;
use crate::device::{live, BufferState, ContextKey, Device, HandlerState, TextureState};
use crate::dispatch::ComputeHandler;
use crate::error::{Error, Result};
use crate::keys::ComputeShaderKey;
use crate::texture::RenderTexture;

/// Smallest width and height [`Context::download_texture`] accepts.
pub const MIN_DOWNLOAD_EXTENT: u32 = 64;

/// Largest storage buffer, in bytes, [`Context::allocate_storage_buffer`] accepts.
pub const MAX_STORAGE_BUFFER_LEN: usize = isize::MAX as usize - 4;

/// A session on a [`Device`].
///
/// Every resource created through a context is owned by it and is released
/// when the context is disposed, whether or not the resource's own value is
/// still around. Dropping the context disposes it.
pub struct Context<'d> {
    device: &'d Device,
    key: ContextKey,
}

impl<'d> Context<'d> {
    pub(crate) fn new(device: &'d Device, key: ContextKey) -> Self {
        Self { device, key }
    }

    pub fn device(&self) -> &'d Device {
        self.device
    }

    /// Fail unless `device`/`context` identify this context.
    fn check_owner(&self, device: &Device, context: ContextKey, what: &str) -> Result<()> {
        if !std::ptr::eq(self.device, device) || self.key != context {
            return Err(Error::InvalidArgument(format!("{what} belongs to a different context")));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Render textures
    // -----------------------------------------------------------------------

    pub fn create_render_texture(
        &self,
        width: u32,
        height: u32,
        channel: TextureChannel,
    ) -> Result<RenderTexture<'d>> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidArgument(format!(
                "render texture size must be non-zero, got {width}x{height}"
            )));
        }
        let backend = Arc::clone(self.device.backend());
        let key = self.device.with_context(self.key, |ctx| {
            let raw = backend
                .create_render_texture(ctx.raw()?, width, height, channel)
                .map_err(Error::native("create_render_texture"))?;
            let handle = OwnedHandle::new(Arc::clone(&backend), HandleKind::RenderTexture, raw);
            let width = backend.texture_width(raw).map_err(Error::native("get_width"))?;
            let height = backend.texture_height(raw).map_err(Error::native("get_height"))?;
            trace!(handle = %raw, width, height, ?channel, "render texture created");
            Ok(ctx.textures.insert(TextureState {
                handle,
                width,
                height,
                channel,
            }))
        })?;
        Ok(RenderTexture::new(self.device, self.key, key))
    }

    /// Copy `src` into `dst`. Both must have the same width, height and
    /// channel layout.
    pub fn copy_texture(&self, dst: &RenderTexture<'d>, src: &RenderTexture<'d>) -> Result<()> {
        self.check_owner(dst.device(), dst.context_key(), "destination texture")?;
        self.check_owner(src.device(), src.context_key(), "source texture")?;
        let backend = self.device.backend();
        self.device.with_context(self.key, |ctx| {
            let d = ctx.texture(dst.key())?;
            let s = ctx.texture(src.key())?;
            if (d.width, d.height) != (s.width, s.height) {
                return Err(Error::InvalidArgument(format!(
                    "cannot copy a {}x{} texture into a {}x{} texture",
                    s.width, s.height, d.width, d.height
                )));
            }
            if d.channel != s.channel {
                return Err(Error::InvalidArgument(format!(
                    "cannot copy a {:?} texture into a {:?} texture",
                    s.channel, d.channel
                )));
            }
            backend
                .copy_texture(ctx.raw()?, live(&d.handle)?, live(&s.handle)?)
                .map_err(Error::native("copy_texture"))
        })
    }

    /// Write host pixels into `dst`.
    ///
    /// `data` must hold exactly `width * height` pixels of `dst`'s channel
    /// layout in `format`.
    pub fn upload_texture<T: Pod>(&self, dst: &RenderTexture<'d>, data: &[T], format: TextureFormat) -> Result<()> {
        self.check_owner(dst.device(), dst.context_key(), "texture")?;
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let backend = self.device.backend();
        self.device.with_context(self.key, |ctx| {
            let tex = ctx.texture(dst.key())?;
            let expected = image_byte_len(tex.width, tex.height, format, tex.channel);
            if bytes.len() != expected {
                return Err(Error::InvalidArgument(format!(
                    "{}x{} {:?} texture as {format} needs {expected} bytes, got {}",
                    tex.width,
                    tex.height,
                    tex.channel,
                    bytes.len()
                )));
            }
            backend
                .upload_texture(ctx.raw()?, live(&tex.handle)?, bytes, format)
                .map_err(Error::native("upload_texture"))
        })
    }

    /// Read `src` back into host memory. Blocks until the data is available.
    ///
    /// `src` must be at least [`MIN_DOWNLOAD_EXTENT`] pixels in each
    /// direction and `data` must have exactly the image's byte length.
    pub fn download_texture<T: Pod>(
        &self,
        data: &mut [T],
        format: TextureFormat,
        src: &RenderTexture<'d>,
    ) -> Result<()> {
        self.check_owner(src.device(), src.context_key(), "texture")?;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(data);
        let backend = self.device.backend();
        self.device.with_context(self.key, |ctx| {
            let tex = ctx.texture(src.key())?;
            if tex.width < MIN_DOWNLOAD_EXTENT || tex.height < MIN_DOWNLOAD_EXTENT {
                return Err(Error::InvalidArgument(format!(
                    "only textures of at least {MIN_DOWNLOAD_EXTENT}x{MIN_DOWNLOAD_EXTENT} can be downloaded, got {}x{}",
                    tex.width, tex.height
                )));
            }
            let expected = image_byte_len(tex.width, tex.height, format, tex.channel);
            if bytes.len() != expected {
                return Err(Error::InvalidArgument(format!(
                    "download of a {}x{} {:?} texture as {format} needs {expected} bytes, got {}",
                    tex.width,
                    tex.height,
                    tex.channel,
                    bytes.len()
                )));
            }
            backend
                .download_texture(ctx.raw()?, bytes, format, live(&tex.handle)?)
                .map_err(Error::native("download_texture"))
        })
    }

    // -----------------------------------------------------------------------
    // Storage buffers
    // -----------------------------------------------------------------------

    /// Allocate a zeroed storage buffer of `len` bytes.
    pub fn allocate_storage_buffer(&self, len: usize, downloadable: bool) -> Result<StorageBuffer<'d>> {
        if len > MAX_STORAGE_BUFFER_LEN {
            return Err(Error::InvalidArgument(format!(
                "storage buffer of {len} bytes exceeds the {MAX_STORAGE_BUFFER_LEN} byte limit"
            )));
        }
        let backend = Arc::clone(self.device.backend());
        let key = self.device.with_context(self.key, |ctx| {
            let raw = backend
                .allocate_storage_buffer(ctx.raw()?, len, downloadable)
                .map_err(Error::native("allocate_storage_buffer"))?;
            Ok(ctx.buffers.insert(BufferState {
                handle: OwnedHandle::new(Arc::clone(&backend), HandleKind::StorageBuffer, raw),
                len,
                downloadable,
            }))
        })?;
        Ok(StorageBuffer::new(self.device, self.key, key))
    }

    /// Create a storage buffer initialised with `data`.
    pub fn upload_storage_buffer<T: Pod>(&self, data: &[T], downloadable: bool) -> Result<StorageBuffer<'d>> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let backend = Arc::clone(self.device.backend());
        let key = self.device.with_context(self.key, |ctx| {
            let raw = backend
                .upload_storage_buffer(ctx.raw()?, bytes, downloadable)
                .map_err(Error::native("upload_storage_buffer"))?;
            Ok(ctx.buffers.insert(BufferState {
                handle: OwnedHandle::new(Arc::clone(&backend), HandleKind::StorageBuffer, raw),
                len: bytes.len(),
                downloadable,
            }))
        })?;
        Ok(StorageBuffer::new(self.device, self.key, key))
    }

    /// Read the first `size_of_val(data)` bytes of `buffer` back into `data`.
    ///
    /// The buffer must belong to this context, be downloadable and hold at
    /// least `data`'s length; a buffer that fails these checks is left alive.
    /// Once they pass the buffer is consumed: it is disposed when the call
    /// returns, whether the transfer itself succeeded or not.
    pub fn download_buffer<T: Pod>(&self, data: &mut [T], buffer: &StorageBuffer<'d>) -> Result<()> {
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(data);
        self.check_owner(buffer.device(), buffer.context_key(), "storage buffer")?;
        self.device.with_context(self.key, |ctx| {
            let state = ctx.buffer(buffer.key())?;
            if !state.downloadable {
                return Err(Error::InvalidState(
                    "storage buffer was not allocated as downloadable".into(),
                ));
            }
            if bytes.len() > state.len {
                return Err(Error::InvalidArgument(format!(
                    "cannot read {} bytes from a {} byte storage buffer",
                    bytes.len(),
                    state.len
                )));
            }
            Ok(())
        })?;

        let backend = self.device.backend();
        let result = self.device.with_context(self.key, |ctx| {
            let state = ctx.buffer(buffer.key())?;
            backend
                .download_storage_buffer(ctx.raw()?, bytes, live(&state.handle)?)
                .map_err(Error::native("download_storage_buffer"))
        });
        buffer.dispose();
        result
    }

    // -----------------------------------------------------------------------
    // Compute handlers
    // -----------------------------------------------------------------------

    /// Instantiate the compute shader registered as `key`.
    pub fn get_compute_handler(&self, key: ComputeShaderKey) -> Result<ComputeHandler<'d>> {
        if key.device_serial() != self.device.serial() {
            return Err(Error::InvalidArgument(format!("{key} was registered on a different device")));
        }
        let backend = Arc::clone(self.device.backend());
        let handler = self.device.with_context(self.key, |ctx| {
            let raw = backend
                .get_compute_handler(ctx.raw()?, key.id())
                .map_err(Error::native("get_compute_handler"))?;
            let handle = OwnedHandle::new(Arc::clone(&backend), HandleKind::ComputeHandler, raw);
            let work_group = backend
                .get_work_group_size(raw)
                .map_err(Error::native("get_work_group_size"))?;
            trace!(handle = %raw, %key, %work_group, "compute handler created");
            Ok(ctx.handlers.insert(HandlerState {
                handle,
                shader: key,
                work_group,
            }))
        })?;
        Ok(ComputeHandler::new(self.device, self.key, handler))
    }

    // -----------------------------------------------------------------------
    // Lifetime
    // -----------------------------------------------------------------------

    /// Dispose every owned resource, then release the context. Idempotent.
    pub fn dispose(&self) {
        self.device.dispose_context(self.key);
    }

    pub fn is_disposed(&self) -> bool {
        !self.device.context_alive(self.key)
    }

    pub fn texture_count(&self) -> Result<usize> {
        self.device.with_context(self.key, |ctx| Ok(ctx.textures.len()))
    }

    pub fn buffer_count(&self) -> Result<usize> {
        self.device.with_context(self.key, |ctx| Ok(ctx.buffers.len()))
    }

    pub fn handler_count(&self) -> Result<usize> {
        self.device.with_context(self.key, |ctx| Ok(ctx.handlers.len()))
    }

    /// The underlying native context handle.
    pub fn raw_handle(&self) -> Result<texgpu_core::RawHandle> {
        self.device.with_context(self.key, |ctx| ctx.raw())
    }
}

impl Drop for Context<'_> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("device", &self.device.serial())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
