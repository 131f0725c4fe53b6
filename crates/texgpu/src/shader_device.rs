//! A [`Device`] bundled with the shader library registered on it.

use std::fmt;
use std::ops::Deref;
use std::path::Path;

use crate::context::Context;
use crate::device::Device;
use crate::dispatch::ComputeHandler;
use crate::error::{Error, Result};
use crate::keys::{ComputeKeyDictionary, SamplerVariant};
use crate::shader::{register_shaders, ShaderDictionary, TemplateSource};

/// A device whose registration window was used to load a shader library.
pub struct ShaderDevice {
    device: Device,
    dictionary: ShaderDictionary,
}

impl ShaderDevice {
    /// Register every shader below `root` on `device`.
    pub fn new(device: Device, root: impl AsRef<Path>, templates: &dyn TemplateSource) -> Result<Self> {
        let dictionary = register_shaders(&device, root, templates)?;
        Ok(Self { device, dictionary })
    }

    /// Pair a device with a dictionary registered on it elsewhere.
    pub fn from_parts(device: Device, dictionary: ShaderDictionary) -> Result<Self> {
        if dictionary.device_serial() != device.serial() {
            return Err(Error::InvalidArgument(
                "shader dictionary was registered on a different device".into(),
            ));
        }
        Ok(Self { device, dictionary })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn dictionary(&self) -> &ShaderDictionary {
        &self.dictionary
    }

    pub fn create_context(&self) -> Result<ShaderContext<'_>> {
        let context: Context<'_> = self.device.create_context()?;
        Ok(ShaderContext {
            context,
            dictionary: &self.dictionary,
        })
    }
}

impl fmt::Debug for ShaderDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderDevice")
            .field("device", &self.device)
            .field("general", &self.dictionary.general_names().count())
            .field("blending", &self.dictionary.blend_names().count())
            .field("samplers", &self.dictionary.sampler_names().count())
            .finish()
    }
}

/// A [`Context`] that resolves compute handlers by shader name.
#[derive(Debug)]
pub struct ShaderContext<'d> {
    context: Context<'d>,
    dictionary: &'d ShaderDictionary,
}

impl<'d> ShaderContext<'d> {
    pub fn dictionary(&self) -> &'d ShaderDictionary {
        self.dictionary
    }

    /// Handler for any key the dictionary can resolve: a General shader name
    /// or a [`BlendKey`](crate::BlendKey).
    pub fn handler<K: ?Sized>(&self, key: &K) -> Result<ComputeHandler<'d>>
    where
        ShaderDictionary: ComputeKeyDictionary<K>,
    {
        let key = self.dictionary.compute_key(key)?;
        self.context.get_compute_handler(key)
    }

    pub fn grab_blend_handler(&self, name: &str) -> Result<ComputeHandler<'d>> {
        self.context.get_compute_handler(self.dictionary.grab_blend(name)?)
    }

    /// Handler for the blend operation registered under `name`.
    pub fn blend_handler(&self, name: &str) -> Result<ComputeHandler<'d>> {
        self.handler(&self.dictionary.query_blend_key(name)?)
    }

    pub fn sampler_handler(&self, name: &str, variant: SamplerVariant) -> Result<ComputeHandler<'d>> {
        let key = self.dictionary.sampler_key(name)?;
        self.context.get_compute_handler(key.get(variant))
    }

    pub fn into_inner(self) -> Context<'d> {
        self.context
    }
}

impl<'d> Deref for ShaderContext<'d> {
    type Target = Context<'d>;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}
