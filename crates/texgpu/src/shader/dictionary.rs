//! Second registration phase: the validated, closed [`ShaderDictionary`].

use std::collections::BTreeMap;

use crate::error::{Error, RegistryError, RegistryIssue, Result};
use crate::keys::{BlendKey, ComputeKeyDictionary, ComputeShaderKey, SamplerKey};

use super::header::ComputeType;
use super::registry::ShaderRegistry;

/// Sampler every dictionary must provide.
pub const DEFAULT_SAMPLER: &str = "AverageSampling";

/// A named set of General shaders that is present entirely or not at all.
macro_rules! key_group {
    ($(#[$meta:meta])* $group:ident { $($field:ident => $name:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $group {
            $(pub $field: ComputeShaderKey,)+
        }

        impl $group {
            pub const NAMES: &'static [&'static str] = &[$($name),+];

            /// `Ok(None)` when no member is registered, the missing names when
            /// only some are.
            fn resolve(
                general: &BTreeMap<String, ComputeShaderKey>,
            ) -> std::result::Result<Option<Self>, Vec<&'static str>> {
                let missing: Vec<&'static str> = Self::NAMES
                    .iter()
                    .copied()
                    .filter(|name| !general.contains_key(*name))
                    .collect();
                if missing.len() == Self::NAMES.len() {
                    return Ok(None);
                }
                if !missing.is_empty() {
                    return Err(missing);
                }
                Ok(Some(Self {
                    $($field: general[$name],)+
                }))
            }
        }
    };
}

key_group!(
    /// Fill and swizzle programs every dictionary provides.
    CoreKeys {
        alpha_fill => "AlphaFill",
        color_fill => "ColorFill",
        swizzling => "Swizzling",
    }
);

key_group!(
    /// Per-pixel channel and colour-space programs.
    StandardKeys {
        alpha_copy => "AlphaCopy",
        alpha_multiply => "AlphaMultiply",
        alpha_multiply_with_texture => "AlphaMultiplyWithTexture",
        color_multiply => "ColorMultiply",
        gamma_to_linear => "GammaToLinear",
        linear_to_gamma => "LinearToGamma",
        fill_r => "FillR",
        fill_rg => "FillRG",
        fill_r_only => "FillROnly",
        fill_g_only => "FillGOnly",
    }
);

key_group!(
    /// Texture transfer by mapping and warping.
    TransTextureKeys {
        trans_mapping => "TransMapping",
        trans_mapping_with_depth => "TransMappingWithDepth",
        trans_warp_none => "TransWarpNone",
        trans_warp_stretch => "TransWarpStretch",
        depth_renderer => "DepthRenderer",
        culling_depth => "CullingDepth",
    }
);

key_group!(
    NearTransKeys {
        near_trans_texture => "NearTransTexture",
        position_mapper => "PositionMapper",
        fill_float4_storage_buffer => "FilleFloat4StorageBuffer",
        near_distance_fade_write => "NearDistanceFadeWrite",
    }
);

key_group!(
    AtlasKeys {
        rectangle_trans_mapping => "RectangleTransMapping",
        merge_atlased_textures => "MergeAtlasedTextures",
    }
);

/// Every shader registered on one device, checked for the names the
/// toolkit depends on.
#[derive(Debug, Clone)]
pub struct ShaderDictionary {
    general: BTreeMap<String, ComputeShaderKey>,
    grab_blend: BTreeMap<String, ComputeShaderKey>,
    blending: BTreeMap<String, BlendKey>,
    samplers: BTreeMap<String, SamplerKey>,
    core: CoreKeys,
    default_sampler: SamplerKey,
    standard: Option<StandardKeys>,
    trans_texture: Option<TransTextureKeys>,
    near_trans: Option<NearTransKeys>,
    atlas: Option<AtlasKeys>,
}

impl ShaderDictionary {
    /// Validate `registry`. Fails with every registration issue plus every
    /// missing required name.
    pub fn assemble(registry: ShaderRegistry) -> Result<Self, RegistryError> {
        let parts = registry.into_parts();
        let mut issues = parts.issues;
        let mut missing = |names: Vec<&'static str>, category: ComputeType| {
            issues.extend(
                names
                    .into_iter()
                    .map(|name| RegistryIssue::MissingRequired { category, name }),
            );
        };

        let core = match CoreKeys::resolve(&parts.general) {
            Ok(Some(core)) => Some(core),
            Ok(None) => {
                missing(CoreKeys::NAMES.to_vec(), ComputeType::General);
                None
            }
            Err(names) => {
                missing(names, ComputeType::General);
                None
            }
        };
        let mut optional = |names: Vec<&'static str>| missing(names, ComputeType::General);
        let standard = StandardKeys::resolve(&parts.general).unwrap_or_else(|names| {
            optional(names);
            None
        });
        let trans_texture = TransTextureKeys::resolve(&parts.general).unwrap_or_else(|names| {
            optional(names);
            None
        });
        let near_trans = NearTransKeys::resolve(&parts.general).unwrap_or_else(|names| {
            optional(names);
            None
        });
        let atlas = AtlasKeys::resolve(&parts.general).unwrap_or_else(|names| {
            optional(names);
            None
        });

        let default_sampler = parts.samplers.get(DEFAULT_SAMPLER).copied();
        if default_sampler.is_none() {
            issues.push(RegistryIssue::MissingRequired {
                category: ComputeType::Sampler,
                name: DEFAULT_SAMPLER,
            });
        }

        match (core, default_sampler) {
            (Some(core), Some(default_sampler)) if issues.is_empty() => Ok(Self {
                general: parts.general,
                grab_blend: parts.grab_blend,
                blending: parts.blending,
                samplers: parts.samplers,
                core,
                default_sampler,
                standard,
                trans_texture,
                near_trans,
                atlas,
            }),
            _ => Err(RegistryError { issues }),
        }
    }

    // -----------------------------------------------------------------------
    // Required programs
    // -----------------------------------------------------------------------

    pub fn alpha_fill(&self) -> ComputeShaderKey {
        self.core.alpha_fill
    }

    pub fn color_fill(&self) -> ComputeShaderKey {
        self.core.color_fill
    }

    pub fn swizzling(&self) -> ComputeShaderKey {
        self.core.swizzling
    }

    pub fn core(&self) -> &CoreKeys {
        &self.core
    }

    /// The `AverageSampling` sampler.
    pub fn default_sampler(&self) -> SamplerKey {
        self.default_sampler
    }

    // -----------------------------------------------------------------------
    // Optional groups
    // -----------------------------------------------------------------------

    pub fn standard(&self) -> Result<&StandardKeys> {
        self.standard.as_ref().ok_or_else(|| Error::lookup("shader group", "standard"))
    }

    pub fn trans_texture(&self) -> Result<&TransTextureKeys> {
        self.trans_texture
            .as_ref()
            .ok_or_else(|| Error::lookup("shader group", "trans texture"))
    }

    pub fn near_trans(&self) -> Result<&NearTransKeys> {
        self.near_trans
            .as_ref()
            .ok_or_else(|| Error::lookup("shader group", "near trans"))
    }

    pub fn atlas(&self) -> Result<&AtlasKeys> {
        self.atlas.as_ref().ok_or_else(|| Error::lookup("shader group", "atlas"))
    }

    // -----------------------------------------------------------------------
    // Lookup by name
    // -----------------------------------------------------------------------

    pub fn general(&self, name: &str) -> Result<ComputeShaderKey> {
        self.general
            .get(name)
            .copied()
            .ok_or_else(|| Error::lookup("general shader", name))
    }

    pub fn grab_blend(&self, name: &str) -> Result<ComputeShaderKey> {
        self.grab_blend
            .get(name)
            .copied()
            .ok_or_else(|| Error::lookup("grab blend shader", name))
    }

    /// Blend key registered under the header `Key` value `name`.
    pub fn query_blend_key(&self, name: &str) -> Result<BlendKey> {
        self.blending
            .get(name)
            .copied()
            .ok_or_else(|| Error::lookup("blend key", name))
    }

    pub fn sampler_key(&self, name: &str) -> Result<SamplerKey> {
        self.samplers
            .get(name)
            .copied()
            .ok_or_else(|| Error::lookup("sampler", name))
    }

    /// Program implementing `key`, if it was registered in this dictionary.
    pub fn blend_compute_key(&self, key: BlendKey) -> Result<ComputeShaderKey> {
        if self.blending.values().any(|k| *k == key) {
            Ok(key.compute_key())
        } else {
            Err(Error::lookup("blend key", key.compute_key().to_string()))
        }
    }

    pub fn general_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.general.keys().map(String::as_str)
    }

    pub fn grab_blend_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.grab_blend.keys().map(String::as_str)
    }

    pub fn blend_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.blending.keys().map(String::as_str)
    }

    pub fn sampler_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.samplers.keys().map(String::as_str)
    }

    /// Device serial every key in this dictionary was registered on.
    pub(crate) fn device_serial(&self) -> u64 {
        self.core.alpha_fill.device_serial()
    }
}

impl ComputeKeyDictionary<str> for ShaderDictionary {
    fn compute_key(&self, key: &str) -> Result<ComputeShaderKey> {
        self.general(key)
    }
}

impl ComputeKeyDictionary<BlendKey> for ShaderDictionary {
    fn compute_key(&self, key: &BlendKey) -> Result<ComputeShaderKey> {
        self.blend_compute_key(*key)
    }
}
