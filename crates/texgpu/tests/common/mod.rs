#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use texgpu::shader::header::{HEADER_BEGIN, HEADER_END};
use texgpu::shader::templates::{
    ATLAS_TEMPLATE, RESIZING_TEMPLATE, SAMPLER_TEMPLATE_MARKER, TRANS_TEMPLATE,
};
use texgpu::{Device, DeviceDescriptor, DevicePreference, HostBackend, TextureFormat};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn host_device() -> (Arc<HostBackend>, Device) {
    init_tracing();
    let backend = Arc::new(HostBackend::new());
    let device = Device::create(backend.clone(), DevicePreference::Auto).unwrap();
    (backend, device)
}

pub fn host_device_with_format(format: TextureFormat) -> (Arc<HostBackend>, Device) {
    init_tracing();
    let backend = Arc::new(HostBackend::new());
    let descriptor = DeviceDescriptor::new(DevicePreference::Auto).with_default_format(format);
    let device = Device::new(backend.clone(), descriptor).unwrap();
    (backend, device)
}

// ---------------------------------------------------------------------------
// Shader sources
// ---------------------------------------------------------------------------

pub fn header(lines: &str) -> String {
    format!("/*\n{HEADER_BEGIN}\nLanguage WGSL\n{lines}\n{HEADER_END}\n*/\n")
}

/// Fills `tex` with the uniform colour.
pub fn general_source() -> String {
    header("TTComputeType General")
        + r#"
struct Params {
    color: vec4<f32>,
}

@group(0) @binding(0) var<uniform> gv: Params;
@group(0) @binding(1) var tex: texture_storage_2d<rgba32float, write>;

@compute @workgroup_size(16, 16, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = textureDimensions(tex);
    if (id.x >= size.x || id.y >= size.y) {
        return;
    }
    textureStore(tex, vec2<i32>(id.xy), gv.color);
}
"#
}

/// Reads a texture and a storage buffer, writes a texture.
pub fn grab_blend_source() -> String {
    header("TTComputeType GrabBlend")
        + r#"
@group(0) @binding(0) var rw_tex: texture_storage_2d<rgba32float, write>;
@group(0) @binding(1) var src_tex: texture_2d<f32>;
@group(0) @binding(2) var<storage, read_write> weights: array<f32>;

@compute @workgroup_size(32, 32, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    let color = textureLoad(src_tex, vec2<i32>(id.xy), 0);
    weights[0] = color.a;
    textureStore(rw_tex, vec2<i32>(id.xy), color);
}
"#
}

pub fn blend_source(key: &str) -> String {
    header(&format!("TTComputeType Blending\nKey {key}"))
        + r#"
fn blend_color(base: vec4<f32>, add: vec4<f32>) -> vec4<f32> {
    return vec4<f32>(mix(base.rgb, add.rgb, vec3<f32>(add.a)), base.a + add.a * (1.0 - base.a));
}
"#
}

pub fn sampler_source() -> String {
    header("TTComputeType Sampler")
        + r#"
fn sample_source(uv: vec2<f32>) -> vec4<f32> {
    return textureSampleLevel(source_tex, source_sampler, uv, 0.0);
}
"#
}

fn sampler_template(extra: &str) -> String {
    format!(
        r#"
@group(0) @binding(0) var source_tex: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;
@group(0) @binding(2) var target_tex: texture_storage_2d<rgba32float, write>;
{extra}

{SAMPLER_TEMPLATE_MARKER}

@compute @workgroup_size(8, 8, 1)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {{
    let size = textureDimensions(target_tex);
    if (id.x >= size.x || id.y >= size.y) {{
        return;
    }}
    let uv = (vec2<f32>(id.xy) + vec2<f32>(0.5)) / vec2<f32>(size);
    textureStore(target_tex, vec2<i32>(id.xy), sample_source(uv));
}}
"#
    )
}

/// The three sampler templates, keyed by file name.
pub fn templates() -> HashMap<String, String> {
    [
        (RESIZING_TEMPLATE, sampler_template("")),
        (
            TRANS_TEMPLATE,
            sampler_template(
                "struct TransParams {\n    offset: vec2<f32>,\n    scale: vec2<f32>,\n}\n\
                 @group(0) @binding(3) var<uniform> trans: TransParams;",
            ),
        ),
        (
            ATLAS_TEMPLATE,
            sampler_template("@group(0) @binding(3) var<storage, read> rects: array<vec4<f32>>;"),
        ),
    ]
    .into_iter()
    .map(|(name, source)| (name.to_owned(), source))
    .collect()
}

// ---------------------------------------------------------------------------
// Shader library on disk
// ---------------------------------------------------------------------------

/// A scratch shader directory, removed on drop.
pub struct ShaderLibrary {
    root: PathBuf,
}

impl ShaderLibrary {
    pub fn new(name: &str) -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let root = std::env::temp_dir().join(format!(
            "texgpu-{name}-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Required shaders, one GrabBlend, the `Normal` blend and the default
    /// sampler.
    pub fn write_required(&self) {
        for name in ["AlphaFill", "ColorFill", "Swizzling"] {
            self.write(&format!("general/{name}.ttcomp"), &general_source());
        }
        self.write("grab/Grab.ttcomp", &grab_blend_source());
        self.write("blend/Normal.ttblend", &blend_source("Normal"));
        self.write("sampler/AverageSampling.ttcomp", &sampler_source());
    }

    pub fn write_templates(&self) {
        for (name, source) in templates() {
            self.write(&format!("templates/{name}"), &source);
        }
    }

    pub fn write_group(&self, names: &[&str]) {
        for name in names {
            self.write(&format!("general/{name}.ttcomp"), &general_source());
        }
    }
}

impl Drop for ShaderLibrary {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// A library with the required set and every optional group.
pub fn standard_library(name: &str) -> ShaderLibrary {
    use texgpu::shader::{AtlasKeys, NearTransKeys, StandardKeys, TransTextureKeys};

    let library = ShaderLibrary::new(name);
    library.write_required();
    library.write_templates();
    library.write_group(StandardKeys::NAMES);
    library.write_group(TransTextureKeys::NAMES);
    library.write_group(NearTransKeys::NAMES);
    library.write_group(AtlasKeys::NAMES);
    library
}
