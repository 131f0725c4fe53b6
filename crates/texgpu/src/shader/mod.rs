//! Shader library registration.
//!
//! Assets are discovered below a root directory ([`finder`]), classified by
//! their embedded header ([`header`]), compiled according to their category
//! ([`registry`], with [`templates`] for the generated variants) and finally
//! validated into a [`ShaderDictionary`] ([`dictionary`]).

pub mod dictionary;
pub mod finder;
pub mod header;
pub mod registry;
pub mod templates;

use std::path::Path;

use crate::device::Device;
use crate::error::{Error, Result};

pub use dictionary::{
    AtlasKeys, CoreKeys, NearTransKeys, ShaderDictionary, StandardKeys, TransTextureKeys,
    DEFAULT_SAMPLER,
};
pub use finder::{discover_shaders, RegistryOptions};
pub use header::{parse_description, ComputeType, ShaderDescription};
pub use registry::ShaderRegistry;
pub use templates::{DirectoryTemplates, TemplateSource};

/// Register every shader asset below `root` on `device` with default options.
pub fn register_shaders(
    device: &Device,
    root: impl AsRef<Path>,
    templates: &dyn TemplateSource,
) -> Result<ShaderDictionary> {
    register_shaders_with(device, root, templates, &RegistryOptions::default())
}

/// Discover, register and validate in one go.
///
/// Fails with [`Error::Registry`] listing every per-file and validation
/// issue, or with the first error that stops registration altogether.
pub fn register_shaders_with(
    device: &Device,
    root: impl AsRef<Path>,
    templates: &dyn TemplateSource,
    options: &RegistryOptions,
) -> Result<ShaderDictionary> {
    let paths = discover_shaders(root, options)?;
    let registry = ShaderRegistry::register(device, &paths, templates, options)?;
    ShaderDictionary::assemble(registry).map_err(Error::from)
}
