//! GPU-resident 2D render textures.

use std::fmt;

use texgpu_core::{RawHandle, TextureChannel};

use crate::device::{live, ContextKey, Device, TextureKey, TextureState};
use crate::error::Result;

/// A render texture owned by a [`Context`](crate::Context).
///
/// Width, height and channel layout are fixed at creation. Dropping the value
/// disposes the texture; disposing its context does too, after which every
/// accessor returns [`Error::Disposed`](crate::Error::Disposed).
pub struct RenderTexture<'d> {
    device: &'d Device,
    context: ContextKey,
    key: TextureKey,
}

impl<'d> RenderTexture<'d> {
    pub(crate) fn new(device: &'d Device, context: ContextKey, key: TextureKey) -> Self {
        Self { device, context, key }
    }

    pub(crate) fn device(&self) -> &'d Device {
        self.device
    }

    pub(crate) fn context_key(&self) -> ContextKey {
        self.context
    }

    pub(crate) fn key(&self) -> TextureKey {
        self.key
    }

    fn read<R>(&self, f: impl FnOnce(&TextureState) -> R) -> Result<R> {
        self.device
            .with_context(self.context, |ctx| ctx.texture(self.key).map(f))
    }

    pub fn width(&self) -> Result<u32> {
        self.read(|t| t.width)
    }

    pub fn height(&self) -> Result<u32> {
        self.read(|t| t.height)
    }

    /// `(width, height)`
    pub fn size(&self) -> Result<(u32, u32)> {
        self.read(|t| (t.width, t.height))
    }

    pub fn channel(&self) -> Result<TextureChannel> {
        self.read(|t| t.channel)
    }

    /// Whether `other` has the same width and height.
    pub fn equal_size(&self, other: &RenderTexture<'_>) -> Result<bool> {
        Ok(self.size()? == other.size()?)
    }

    /// The underlying native texture handle.
    pub fn raw_handle(&self) -> Result<RawHandle> {
        self.device
            .with_context(self.context, |ctx| live(&ctx.texture(self.key)?.handle))
    }

    /// Release the texture. Idempotent.
    pub fn dispose(&self) {
        self.device.release_resource(self.context, |ctx| {
            ctx.textures.remove(self.key);
        });
    }

    pub fn is_disposed(&self) -> bool {
        self.read(|_| ()).is_err()
    }
}

impl Drop for RenderTexture<'_> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for RenderTexture<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.read(|t| (t.width, t.height, t.channel)) {
            Ok((width, height, channel)) => f
                .debug_struct("RenderTexture")
                .field("width", &width)
                .field("height", &height)
                .field("channel", &channel)
                .finish(),
            Err(_) => f.write_str("RenderTexture(disposed)"),
        }
    }
}
