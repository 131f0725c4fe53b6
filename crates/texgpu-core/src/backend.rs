//! The call boundary into a compute backend.
//!
//! A [`Backend`] owns the real GPU objects. Everything above it only ever sees
//! [`RawHandle`]s, and every handle it hands out must eventually come back
//! through the matching `drop_*` call exactly once. [`OwnedHandle`] is the
//! wrapper that guarantees the second half of that contract.
//!
//! [`OwnedHandle`]: crate::handle::OwnedHandle

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::formats::{TextureChannel, TextureFormat, UnknownVariant};
use crate::handle::RawHandle;
use crate::log::DebugLog;

/// Adapter selection hint passed to [`Backend::create_device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DevicePreference {
    #[default]
    Auto,
    DiscreteGpu,
    IntegratedGpuOrCpu,
}

impl FromStr for DevicePreference {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "auto" => Ok(DevicePreference::Auto),
            "discrete" | "discretegpu" => Ok(DevicePreference::DiscreteGpu),
            "integrated" | "integratedgpuorcpu" | "cpu" => Ok(DevicePreference::IntegratedGpuOrCpu),
            _ => Err(UnknownVariant::new("device preference", s)),
        }
    }
}

/// Threads per work group of a compute shader, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkGroupSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl WorkGroupSize {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for WorkGroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Failure reported by a backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The handle is unknown to the backend, or of the wrong kind.
    #[error("invalid {kind} handle {handle}")]
    InvalidHandle { kind: &'static str, handle: RawHandle },
    /// Shader source was rejected. Carries the compiler diagnostic.
    #[error("shader compilation failed: {0}")]
    Compile(String),
    /// A well-formed request the backend refused (size or slot mismatch, ...).
    #[error("{0}")]
    Rejected(String),
    /// The backend does not implement the requested feature.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Native compute backend.
///
/// Methods take `&self`; implementations are expected to serialise access
/// internally so one backend can be shared by several devices. Handles
/// returned from `create_*`/`allocate_*`/`get_*` calls are owned by the
/// caller until passed to the matching `drop_*` call.
pub trait Backend: Send + Sync {
    // -----------------------------------------------------------------------
    // Device
    // -----------------------------------------------------------------------

    /// Open a device session. `log` receives backend diagnostics for the
    /// lifetime of the session.
    fn create_device(
        &self,
        preference: DevicePreference,
        log: Arc<dyn DebugLog>,
    ) -> Result<RawHandle, BackendError>;

    fn drop_device(&self, device: RawHandle) -> Result<(), BackendError>;

    /// Texture storage format used for textures created after this call.
    fn set_default_texture_format(
        &self,
        device: RawHandle,
        format: TextureFormat,
    ) -> Result<(), BackendError>;

    /// Install the routines used to convert between the texture storage
    /// format and the format of uploaded or downloaded host data.
    fn register_format_convertor(&self, device: RawHandle) -> Result<(), BackendError>;

    /// Compile `source` and return the shader id. `path` is used for
    /// diagnostics only.
    fn register_compute_shader(
        &self,
        device: RawHandle,
        path: &str,
        source: &str,
    ) -> Result<u32, BackendError>;

    // -----------------------------------------------------------------------
    // Context
    // -----------------------------------------------------------------------

    fn create_context(&self, device: RawHandle) -> Result<RawHandle, BackendError>;

    fn drop_context(&self, context: RawHandle) -> Result<(), BackendError>;

    // -----------------------------------------------------------------------
    // Render textures
    // -----------------------------------------------------------------------

    fn create_render_texture(
        &self,
        context: RawHandle,
        width: u32,
        height: u32,
        channel: TextureChannel,
    ) -> Result<RawHandle, BackendError>;

    fn drop_render_texture(&self, texture: RawHandle) -> Result<(), BackendError>;

    fn texture_width(&self, texture: RawHandle) -> Result<u32, BackendError>;

    fn texture_height(&self, texture: RawHandle) -> Result<u32, BackendError>;

    fn copy_texture(
        &self,
        context: RawHandle,
        dst: RawHandle,
        src: RawHandle,
    ) -> Result<(), BackendError>;

    fn upload_texture(
        &self,
        context: RawHandle,
        dst: RawHandle,
        data: &[u8],
        format: TextureFormat,
    ) -> Result<(), BackendError>;

    /// Blocks until `src` holds the result of all previously issued work.
    fn download_texture(
        &self,
        context: RawHandle,
        data: &mut [u8],
        format: TextureFormat,
        src: RawHandle,
    ) -> Result<(), BackendError>;

    // -----------------------------------------------------------------------
    // Storage buffers
    // -----------------------------------------------------------------------

    fn allocate_storage_buffer(
        &self,
        context: RawHandle,
        len: usize,
        downloadable: bool,
    ) -> Result<RawHandle, BackendError>;

    fn upload_storage_buffer(
        &self,
        context: RawHandle,
        data: &[u8],
        downloadable: bool,
    ) -> Result<RawHandle, BackendError>;

    /// Blocks until `buffer` holds the result of all previously issued work.
    fn download_storage_buffer(
        &self,
        context: RawHandle,
        data: &mut [u8],
        buffer: RawHandle,
    ) -> Result<(), BackendError>;

    fn drop_storage_buffer(&self, buffer: RawHandle) -> Result<(), BackendError>;

    // -----------------------------------------------------------------------
    // Compute handlers
    // -----------------------------------------------------------------------

    fn get_compute_handler(&self, context: RawHandle, shader: u32) -> Result<RawHandle, BackendError>;

    fn drop_compute_handler(&self, handler: RawHandle) -> Result<(), BackendError>;

    /// Binding slot of the resource called `name`, if the shader has one.
    fn get_bind_slot(&self, handler: RawHandle, name: &str) -> Result<Option<u32>, BackendError>;

    fn set_render_texture(
        &self,
        handler: RawHandle,
        slot: u32,
        texture: RawHandle,
    ) -> Result<(), BackendError>;

    fn set_storage_buffer(
        &self,
        handler: RawHandle,
        slot: u32,
        buffer: RawHandle,
    ) -> Result<(), BackendError>;

    fn upload_constants_buffer(
        &self,
        handler: RawHandle,
        slot: u32,
        data: &[u8],
    ) -> Result<(), BackendError>;

    /// Upload `data` into a storage buffer owned by the handler and bind it.
    fn upload_storage_buffer_binding(
        &self,
        handler: RawHandle,
        slot: u32,
        data: &[u8],
    ) -> Result<(), BackendError>;

    fn get_work_group_size(&self, handler: RawHandle) -> Result<WorkGroupSize, BackendError>;

    /// Issue the compute invocation. Does not wait for completion.
    fn dispatch(&self, handler: RawHandle, x: u32, y: u32, z: u32) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_parsing_is_lenient() {
        assert_eq!("Discrete-GPU".parse::<DevicePreference>(), Ok(DevicePreference::DiscreteGpu));
        assert_eq!("integrated_gpu_or_cpu".parse::<DevicePreference>(), Ok(DevicePreference::IntegratedGpuOrCpu));
        assert_eq!("AUTO".parse::<DevicePreference>(), Ok(DevicePreference::Auto));
        assert!("fastest".parse::<DevicePreference>().is_err());
    }
}
