//! Capability keys handed out by shader registration.
//!
//! A [`ComputeShaderKey`] names one registered program on one device.
//! [`BlendKey`] and [`SamplerKey`] wrap compute keys so that call sites which
//! expect a blend operation or a sampler cannot be given an arbitrary
//! program.

use std::fmt;

use crate::error::Result;

/// Opaque identifier of a registered compute shader.
///
/// Keys compare by identity: the registering device and the backend's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputeShaderKey {
    device: u64,
    id: u32,
}

impl ComputeShaderKey {
    pub(crate) fn new(device: u64, id: u32) -> Self {
        Self { device, id }
    }

    /// Backend-assigned shader id.
    pub fn id(self) -> u32 {
        self.id
    }

    pub(crate) fn device_serial(self) -> u64 {
        self.device
    }
}

impl fmt::Display for ComputeShaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComputeShaderKey:{}", self.id)
    }
}

/// Selects a registered pixel-blending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendKey(ComputeShaderKey);

impl BlendKey {
    pub(crate) fn new(key: ComputeShaderKey) -> Self {
        Self(key)
    }

    pub fn compute_key(self) -> ComputeShaderKey {
        self.0
    }
}

/// Which of the three programs generated from one sampler source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerVariant {
    Resizing,
    Trans,
    Atlas,
}

impl SamplerVariant {
    pub const ALL: [SamplerVariant; 3] = [
        SamplerVariant::Resizing,
        SamplerVariant::Trans,
        SamplerVariant::Atlas,
    ];
}

/// The resize, directional-transform and atlas programs built from one
/// sampler source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerKey {
    resizing: ComputeShaderKey,
    trans: ComputeShaderKey,
    atlas: ComputeShaderKey,
}

impl SamplerKey {
    pub(crate) fn new(resizing: ComputeShaderKey, trans: ComputeShaderKey, atlas: ComputeShaderKey) -> Self {
        Self {
            resizing,
            trans,
            atlas,
        }
    }

    pub fn resizing(self) -> ComputeShaderKey {
        self.resizing
    }

    pub fn trans(self) -> ComputeShaderKey {
        self.trans
    }

    pub fn atlas(self) -> ComputeShaderKey {
        self.atlas
    }

    pub fn get(self, variant: SamplerVariant) -> ComputeShaderKey {
        match variant {
            SamplerVariant::Resizing => self.resizing,
            SamplerVariant::Trans => self.trans,
            SamplerVariant::Atlas => self.atlas,
        }
    }

    pub fn keys(self) -> [ComputeShaderKey; 3] {
        [self.resizing, self.trans, self.atlas]
    }
}

/// Resolves some key type to the compute shader that implements it.
pub trait ComputeKeyDictionary<K: ?Sized> {
    fn compute_key(&self, key: &K) -> Result<ComputeShaderKey>;
}
