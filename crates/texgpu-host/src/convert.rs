//! Texel format conversion used once a device has a format convertor.
//!
//! Values travel through normalized `f32`: integer formats map to `[0, 1]`,
//! `Half` and `Float` pass through unchanged.

use half::f16;
use texgpu_core::TextureFormat;

/// Convert tightly packed channel values from `from` to `to`.
///
/// `bytes.len()` must be a multiple of `from.bytes_per_channel()`.
pub fn convert(bytes: &[u8], from: TextureFormat, to: TextureFormat) -> Vec<u8> {
    if from == to {
        return bytes.to_vec();
    }
    encode(to, &decode(from, bytes))
}

fn decode(format: TextureFormat, bytes: &[u8]) -> Vec<f32> {
    match format {
        TextureFormat::Byte => bytes.iter().map(|&v| v as f32 / u8::MAX as f32).collect(),
        TextureFormat::UShort => bytemuck::pod_collect_to_vec::<u8, u16>(bytes)
            .into_iter()
            .map(|v| v as f32 / u16::MAX as f32)
            .collect(),
        TextureFormat::Half => bytemuck::pod_collect_to_vec::<u8, f16>(bytes)
            .into_iter()
            .map(f16::to_f32)
            .collect(),
        TextureFormat::Float => bytemuck::pod_collect_to_vec::<u8, f32>(bytes),
    }
}

fn encode(format: TextureFormat, values: &[f32]) -> Vec<u8> {
    match format {
        TextureFormat::Byte => values
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * u8::MAX as f32).round() as u8)
            .collect(),
        TextureFormat::UShort => {
            let packed: Vec<u16> = values
                .iter()
                .map(|&v| (v.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16)
                .collect();
            bytemuck::cast_slice(&packed).to_vec()
        }
        TextureFormat::Half => {
            let packed: Vec<f16> = values.iter().copied().map(f16::from_f32).collect();
            bytemuck::cast_slice(&packed).to_vec()
        }
        TextureFormat::Float => bytemuck::cast_slice(values).to_vec(),
    }
}
