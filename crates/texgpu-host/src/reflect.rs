//! WGSL reflection via naga: work-group size and named bindings.

use texgpu_core::{BackendError, DebugLog, WorkGroupSize};
use tracing::warn;

/// What a binding slot expects to be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// `texture_storage_2d<..>`
    StorageTexture,
    /// `texture_2d<..>` and the other sampled image classes.
    SampledTexture,
    /// Samplers are supplied by the backend and never bound by callers.
    Sampler,
    /// `var<uniform>`; `size` is the byte size of the bound type.
    Uniform { size: u32 },
    /// `var<storage, ..>`
    StorageBuffer { writable: bool },
}

impl BindingKind {
    pub fn is_texture(self) -> bool {
        matches!(self, BindingKind::StorageTexture | BindingKind::SampledTexture)
    }
}

/// One named resource in bind group 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
    pub name: String,
    pub slot: u32,
    pub kind: BindingKind,
}

/// Everything the host backend needs to know about a compiled shader.
#[derive(Debug, Clone)]
pub struct ShaderReflection {
    pub path: String,
    pub entry_point: String,
    pub work_group: WorkGroupSize,
    pub bindings: Vec<BindingInfo>,
}

impl ShaderReflection {
    pub fn binding(&self, slot: u32) -> Option<&BindingInfo> {
        self.bindings.iter().find(|b| b.slot == slot)
    }

    pub fn slot_of(&self, name: &str) -> Option<u32> {
        self.bindings.iter().find(|b| b.name == name).map(|b| b.slot)
    }
}

/// Parse and validate `source`, then extract the first compute entry point's
/// work-group size and the named bindings of group 0.
///
/// Bindings in other groups are reported to `log` and ignored.
pub fn reflect_wgsl(path: &str, source: &str, log: &dyn DebugLog) -> Result<ShaderReflection, BackendError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| BackendError::Compile(e.emit_to_string(source)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| BackendError::Compile(e.emit_to_string(source)))?;

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Compute)
        .ok_or_else(|| BackendError::Compile(format!("{path}: no compute entry point")))?;
    let [x, y, z] = entry.workgroup_size;

    let mut bindings = Vec::new();
    for (_, gv) in module.global_variables.iter() {
        let (Some(name), Some(binding)) = (gv.name.as_ref(), gv.binding.as_ref()) else {
            continue;
        };
        if binding.group != 0 {
            let message = format!(
                "{path}: binding `{name}` is in group {}; only group 0 is supported",
                binding.group
            );
            warn!("{message}");
            log.log(&message);
            continue;
        }

        let kind = match gv.space {
            naga::AddressSpace::Uniform => BindingKind::Uniform {
                size: module.types[gv.ty].inner.size(module.to_ctx()),
            },
            naga::AddressSpace::Storage { access } => BindingKind::StorageBuffer {
                writable: access.contains(naga::StorageAccess::STORE),
            },
            naga::AddressSpace::Handle => match module.types[gv.ty].inner {
                naga::TypeInner::Image {
                    class: naga::ImageClass::Storage { .. },
                    ..
                } => BindingKind::StorageTexture,
                naga::TypeInner::Image { .. } => BindingKind::SampledTexture,
                naga::TypeInner::Sampler { .. } => BindingKind::Sampler,
                _ => continue,
            },
            _ => continue,
        };

        bindings.push(BindingInfo {
            name: name.clone(),
            slot: binding.binding,
            kind,
        });
    }
    bindings.sort_by_key(|b| b.slot);

    Ok(ShaderReflection {
        path: path.to_owned(),
        entry_point: entry.name.clone(),
        work_group: WorkGroupSize::new(x, y, z),
        bindings,
    })
}
