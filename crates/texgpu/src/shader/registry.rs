//! First registration phase: compile every asset and collect open name maps.
//!
//! Per-file problems never stop the run. They are collected as
//! [`RegistryIssue`]s so that one pass over a library reports everything
//! that is wrong with it. Only errors that make every later file fail too
//! (a disposed device, a closed registration window) abort early.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;

use tracing::{debug, warn};

use crate::device::Device;
use crate::error::{Error, RegistryIssue, Result};
use crate::keys::{BlendKey, ComputeShaderKey, SamplerKey};

use super::finder::RegistryOptions;
use super::header::{parse_description, ComputeType, BLEND_KEY_FIELD};
use super::templates::{
    expand_sampler_template, TemplateSource, ATLAS_TEMPLATE, BLENDING_SHADER_TEMPLATE,
    RESIZING_TEMPLATE, TRANS_TEMPLATE,
};

/// Name maps produced by registration, plus every issue met on the way.
#[derive(Debug, Default)]
pub struct ShaderRegistry {
    general: BTreeMap<String, ComputeShaderKey>,
    grab_blend: BTreeMap<String, ComputeShaderKey>,
    blending: BTreeMap<String, BlendKey>,
    samplers: BTreeMap<String, SamplerKey>,
    issues: Vec<RegistryIssue>,
}

impl ShaderRegistry {
    /// Register every file in `paths` on `device`.
    pub fn register<P: AsRef<Path>>(
        device: &Device,
        paths: impl IntoIterator<Item = P>,
        templates: &dyn TemplateSource,
        options: &RegistryOptions,
    ) -> Result<Self> {
        let mut registry = Self::default();
        let mut cache = TemplateCache::new(templates);
        for path in paths {
            let path = path.as_ref();
            match std::fs::read_to_string(path) {
                Ok(source) => registry.register_one(device, path, &source, &mut cache, options)?,
                Err(source) => registry.issues.push(RegistryIssue::Io {
                    path: path.to_path_buf(),
                    source,
                }),
            }
        }
        debug!(
            general = registry.general.len(),
            grab_blend = registry.grab_blend.len(),
            blending = registry.blending.len(),
            samplers = registry.samplers.len(),
            issues = registry.issues.len(),
            "shader registration finished"
        );
        Ok(registry)
    }

    /// Register one in-memory asset. `path` names it in keys and diagnostics.
    pub fn register_source(
        &mut self,
        device: &Device,
        path: impl AsRef<Path>,
        source: &str,
        templates: &dyn TemplateSource,
        options: &RegistryOptions,
    ) -> Result<()> {
        let mut cache = TemplateCache::new(templates);
        self.register_one(device, path.as_ref(), source, &mut cache, options)
    }

    fn register_one(
        &mut self,
        device: &Device,
        path: &Path,
        source: &str,
        templates: &mut TemplateCache<'_>,
        options: &RegistryOptions,
    ) -> Result<()> {
        if let Some(marker) = options.legacy_marker(source) {
            self.issues.push(RegistryIssue::LegacyInclude {
                path: path.to_path_buf(),
                marker: marker.to_owned(),
            });
            return Ok(());
        }

        let description = match parse_description(source) {
            Ok(Some(description)) => description,
            Ok(None) => {
                debug!(path = %path.display(), "no shader header, skipped");
                return Ok(());
            }
            Err(e) => {
                self.issues.push(RegistryIssue::InvalidHeader {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };
        let name = shader_name(path);

        match description.compute_type() {
            ComputeType::General => {
                if let Some(key) = self.compile(device, path, source)? {
                    insert_named(&mut self.general, ComputeType::General, name, key, path);
                }
            }
            ComputeType::GrabBlend => {
                if let Some(key) = self.compile(device, path, source)? {
                    insert_named(&mut self.grab_blend, ComputeType::GrabBlend, name, key, path);
                }
            }
            ComputeType::Blending => {
                let Some(blend_name) = description.get(BLEND_KEY_FIELD).filter(|k| !k.is_empty()) else {
                    self.issues.push(RegistryIssue::MissingBlendKey {
                        path: path.to_path_buf(),
                    });
                    return Ok(());
                };
                let full = format!("{source}\n{BLENDING_SHADER_TEMPLATE}");
                if let Some(key) = self.compile(device, path, &full)? {
                    insert_named(
                        &mut self.blending,
                        ComputeType::Blending,
                        blend_name.to_owned(),
                        BlendKey::new(key),
                        path,
                    );
                }
            }
            ComputeType::Sampler => {
                if let Some(key) = self.register_sampler(device, path, source, templates)? {
                    insert_named(&mut self.samplers, ComputeType::Sampler, name, key, path);
                }
            }
        }
        Ok(())
    }

    fn register_sampler(
        &mut self,
        device: &Device,
        path: &Path,
        source: &str,
        templates: &mut TemplateCache<'_>,
    ) -> Result<Option<SamplerKey>> {
        let mut keys = Vec::with_capacity(3);
        for template_name in [RESIZING_TEMPLATE, TRANS_TEMPLATE, ATLAS_TEMPLATE] {
            let Some(template) = templates.get(template_name) else {
                self.issues.push(RegistryIssue::MissingTemplate {
                    path: path.to_path_buf(),
                    template: template_name,
                });
                return Ok(None);
            };
            let Some(expanded) = expand_sampler_template(template, source) else {
                self.issues.push(RegistryIssue::TemplateWithoutMarker {
                    path: path.to_path_buf(),
                    template: template_name,
                });
                return Ok(None);
            };
            match self.compile(device, path, &expanded)? {
                Some(key) => keys.push(key),
                None => return Ok(None),
            }
        }
        Ok(Some(SamplerKey::new(keys[0], keys[1], keys[2])))
    }

    /// Compile `source`; per-file failures become issues and yield `None`.
    fn compile(&mut self, device: &Device, path: &Path, source: &str) -> Result<Option<ComputeShaderKey>> {
        match device.register_compute_shader(path, Some(source)) {
            Ok(key) => Ok(Some(key)),
            Err(Error::ShaderCompile {
                path,
                source_text,
                reason,
            }) => {
                self.issues.push(RegistryIssue::Compile {
                    path,
                    source_text,
                    reason,
                });
                Ok(None)
            }
            Err(Error::NativeOperation { source, .. }) => {
                self.issues.push(RegistryIssue::Native {
                    path: path.to_path_buf(),
                    source,
                });
                Ok(None)
            }
            Err(Error::Io { path, source }) => {
                self.issues.push(RegistryIssue::Io { path, source });
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn general(&self) -> &BTreeMap<String, ComputeShaderKey> {
        &self.general
    }

    pub fn grab_blend(&self) -> &BTreeMap<String, ComputeShaderKey> {
        &self.grab_blend
    }

    pub fn blending(&self) -> &BTreeMap<String, BlendKey> {
        &self.blending
    }

    pub fn samplers(&self) -> &BTreeMap<String, SamplerKey> {
        &self.samplers
    }

    pub fn issues(&self) -> &[RegistryIssue] {
        &self.issues
    }

    pub(crate) fn into_parts(self) -> RegistryParts {
        RegistryParts {
            general: self.general,
            grab_blend: self.grab_blend,
            blending: self.blending,
            samplers: self.samplers,
            issues: self.issues,
        }
    }
}

pub(crate) struct RegistryParts {
    pub(crate) general: BTreeMap<String, ComputeShaderKey>,
    pub(crate) grab_blend: BTreeMap<String, ComputeShaderKey>,
    pub(crate) blending: BTreeMap<String, BlendKey>,
    pub(crate) samplers: BTreeMap<String, SamplerKey>,
    pub(crate) issues: Vec<RegistryIssue>,
}

/// Registered name of an asset: its file stem.
fn shader_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn insert_named<K>(map: &mut BTreeMap<String, K>, category: ComputeType, name: String, key: K, path: &Path) {
    match map.entry(name) {
        Entry::Vacant(slot) => {
            slot.insert(key);
        }
        Entry::Occupied(mut slot) => {
            warn!(%category, name = %slot.key(), path = %path.display(), "duplicate shader name, later file wins");
            slot.insert(key);
        }
    }
}

/// Templates fetched at most once per registration run.
struct TemplateCache<'a> {
    source: &'a dyn TemplateSource,
    loaded: BTreeMap<&'static str, Option<String>>,
}

impl<'a> TemplateCache<'a> {
    fn new(source: &'a dyn TemplateSource) -> Self {
        Self {
            source,
            loaded: BTreeMap::new(),
        }
    }

    fn get(&mut self, name: &'static str) -> Option<&str> {
        let source = self.source;
        self.loaded
            .entry(name)
            .or_insert_with(|| source.find_template(name))
            .as_deref()
    }
}
