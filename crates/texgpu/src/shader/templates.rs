//! Source templates that category strategies splice shader bodies into.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

/// Line in a sampler template that is replaced by the sampler source.
pub const SAMPLER_TEMPLATE_MARKER: &str = "#include \"SamplerTemplate.wgsl\"";

pub const RESIZING_TEMPLATE: &str = "TextureResizingTemplate.wgsl";
pub const TRANS_TEMPLATE: &str = "TransSamplingTemplate.wgsl";
pub const ATLAS_TEMPLATE: &str = "AtlasSamplingTemplate.wgsl";

/// Appended to every Blending source. The source provides `blend_color`.
pub const BLENDING_SHADER_TEMPLATE: &str = r#"
@group(0) @binding(0) var dist_tex: texture_storage_2d<rgba32float, write>;
@group(0) @binding(1) var base_tex: texture_2d<f32>;
@group(0) @binding(2) var add_tex: texture_2d<f32>;

@compute @workgroup_size(16, 16, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = textureDimensions(base_tex);
    if (id.x >= size.x || id.y >= size.y) {
        return;
    }
    let base_color = textureLoad(base_tex, vec2<i32>(id.xy), 0);
    let add_color = textureLoad(add_tex, vec2<i32>(id.xy), 0);
    textureStore(dist_tex, vec2<i32>(id.xy), blend_color(base_color, add_color));
}
"#;

/// Looks up template sources by file name.
pub trait TemplateSource {
    fn find_template(&self, name: &str) -> Option<String>;
}

impl TemplateSource for HashMap<String, String> {
    fn find_template(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<F> TemplateSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn find_template(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Templates stored anywhere below a directory.
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    root: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateSource for DirectoryTemplates {
    fn find_template(&self, name: &str) -> Option<String> {
        let path = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .find(|entry| entry.file_type().is_file() && entry.file_name() == name)?
            .into_path();
        match std::fs::read_to_string(&path) {
            Ok(source) => Some(source),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable template");
                None
            }
        }
    }
}

/// Replace the marker line in `template` with `body`.
///
/// Returns `None` when the template has no marker.
pub fn expand_sampler_template(template: &str, body: &str) -> Option<String> {
    template
        .contains(SAMPLER_TEMPLATE_MARKER)
        .then(|| template.replacen(SAMPLER_TEMPLATE_MARKER, body, 1))
}
