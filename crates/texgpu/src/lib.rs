//! GPU compute resource management over an opaque backend.
//!
//! Ownership is a tree rooted at a [`Device`]:
//!
//! ```text
//! Device
//! └── Context
//!     ├── RenderTexture
//!     ├── StorageBuffer
//!     └── ComputeHandler
//! ```
//!
//! Every node holds exactly one native handle and releases it exactly once,
//! either when it is disposed explicitly or when its owner is. Shaders are
//! registered on the device before its first context is created; the
//! [`shader`] module turns a directory of assets into a validated
//! [`ShaderDictionary`] of capability keys.
//!
//! ```no_run
//! use texgpu::{Device, DevicePreference, DirectoryTemplates, ShaderDevice, TextureChannel};
//!
//! # fn main() -> texgpu::Result<()> {
//! let device = Device::host(DevicePreference::Auto)?;
//! let shaders = ShaderDevice::new(device, "shaders", &DirectoryTemplates::new("shaders"))?;
//! let ctx = shaders.create_context()?;
//! let target = ctx.create_render_texture(256, 256, TextureChannel::RGBA)?;
//! let fill = ctx.handler("ColorFill")?;
//! fill.set_render_texture(fill.name_to_slot("tex")?, &target)?;
//! fill.dispatch_for_texture(&target)?;
//! # Ok(())
//! # }
//! ```

mod buffer;
mod context;
mod device;
mod dispatch;
mod error;
mod keys;
pub mod shader;
mod shader_device;
mod texture;

pub use buffer::StorageBuffer;
pub use context::{Context, MAX_STORAGE_BUFFER_LEN, MIN_DOWNLOAD_EXTENT};
pub use device::{Device, DeviceDescriptor};
pub use dispatch::{group_count, ComputeHandler};
pub use error::{Error, RegistryError, RegistryIssue, Result};
pub use keys::{BlendKey, ComputeKeyDictionary, ComputeShaderKey, SamplerKey, SamplerVariant};
pub use shader::{
    register_shaders, register_shaders_with, DirectoryTemplates, RegistryOptions, ShaderDictionary,
    ShaderRegistry, TemplateSource,
};
pub use shader_device::{ShaderContext, ShaderDevice};
pub use texture::RenderTexture;

pub use texgpu_core::{
    Backend, BackendError, DebugLog, DevicePreference, RawHandle, TextureChannel, TextureFormat,
    WorkGroupSize,
};
#[cfg(feature = "host")]
pub use texgpu_host::{HostBackend, HostStats};
