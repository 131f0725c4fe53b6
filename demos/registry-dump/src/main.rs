//! Registers a shader directory on a host device and prints the dictionary.
//!
//! ```text
//! registry-dump <shader-root> [auto|discrete|integrated] [template-root]
//! ```
//!
//! Templates are looked up below `template-root`, or below the shader root
//! when it is omitted. Set `RUST_LOG=debug` for the registration trace.

use std::path::PathBuf;

use anyhow::{bail, Context as _};
use texgpu::{
    Device, DevicePreference, DirectoryTemplates, SamplerVariant, ShaderDevice, ShaderDictionary,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args_os().skip(1);
    let Some(root) = args.next().map(PathBuf::from) else {
        bail!("usage: registry-dump <shader-root> [auto|discrete|integrated] [template-root]");
    };
    let preference = match args.next() {
        Some(arg) => arg
            .to_string_lossy()
            .parse::<DevicePreference>()
            .with_context(|| format!("invalid device preference {arg:?}"))?,
        None => DevicePreference::Auto,
    };
    let template_root = args.next().map(PathBuf::from).unwrap_or_else(|| root.clone());

    let device = Device::host(preference).context("failed to open host device")?;
    let shaders = ShaderDevice::new(device, &root, &DirectoryTemplates::new(&template_root))
        .with_context(|| format!("failed to register shaders from {}", root.display()))?;
    info!(root = %root.display(), ?preference, "shader library registered");

    print_dictionary(shaders.dictionary());
    Ok(())
}

fn print_dictionary(dictionary: &ShaderDictionary) {
    println!("required:");
    println!("  AlphaFill        {}", dictionary.alpha_fill());
    println!("  ColorFill        {}", dictionary.color_fill());
    println!("  Swizzling        {}", dictionary.swizzling());

    let groups = [
        ("standard", dictionary.standard().is_ok()),
        ("trans texture", dictionary.trans_texture().is_ok()),
        ("near trans", dictionary.near_trans().is_ok()),
        ("atlas", dictionary.atlas().is_ok()),
    ];
    println!("groups:");
    for (name, present) in groups {
        println!("  {name:<16} {}", if present { "present" } else { "absent" });
    }

    println!("general:");
    for name in dictionary.general_names() {
        if let Ok(key) = dictionary.general(name) {
            println!("  {name:<32} {key}");
        }
    }
    println!("grab blend:");
    for name in dictionary.grab_blend_names() {
        if let Ok(key) = dictionary.grab_blend(name) {
            println!("  {name:<32} {key}");
        }
    }
    println!("blending:");
    for name in dictionary.blend_names() {
        if let Ok(key) = dictionary.query_blend_key(name) {
            println!("  {name:<32} {}", key.compute_key());
        }
    }
    println!("samplers:");
    for name in dictionary.sampler_names() {
        if let Ok(key) = dictionary.sampler_key(name) {
            let variants: Vec<String> = SamplerVariant::ALL
                .iter()
                .map(|v| format!("{v:?}={}", key.get(*v).id()))
                .collect();
            println!("  {name:<32} {}", variants.join(" "));
        }
    }
}
