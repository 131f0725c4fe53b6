//! Pixel formats and channel layouts shared by the device layer and backends.

use std::fmt;
use std::str::FromStr;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Per-channel storage format of texel data crossing the backend boundary.
///
/// The discriminants are the values used on the native call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u32)]
pub enum TextureFormat {
    Byte = 0,
    UShort = 1,
    Half = 2,
    Float = 3,
}

impl TextureFormat {
    /// All formats, in boundary order.
    pub const ALL: [TextureFormat; 4] = [
        TextureFormat::Byte,
        TextureFormat::UShort,
        TextureFormat::Half,
        TextureFormat::Float,
    ];

    /// Width of one channel in bytes.
    pub const fn bytes_per_channel(self) -> usize {
        match self {
            TextureFormat::Byte => 1,
            TextureFormat::UShort | TextureFormat::Half => 2,
            TextureFormat::Float => 4,
        }
    }

    /// Decode a raw boundary value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::from_u32(raw)
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextureFormat::Byte => "byte",
            TextureFormat::UShort => "ushort",
            TextureFormat::Half => "half",
            TextureFormat::Float => "float",
        };
        f.write_str(name)
    }
}

impl FromStr for TextureFormat {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "byte" | "u8" => Ok(TextureFormat::Byte),
            "ushort" | "u16" => Ok(TextureFormat::UShort),
            "half" | "f16" => Ok(TextureFormat::Half),
            "float" | "f32" => Ok(TextureFormat::Float),
            _ => Err(UnknownVariant::new("texture format", s)),
        }
    }
}

/// Channel layout of a render texture. The discriminant is the channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u32)]
pub enum TextureChannel {
    R = 1,
    RG = 2,
    RGBA = 4,
}

impl TextureChannel {
    pub const fn count(self) -> usize {
        self as usize
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::from_u32(raw)
    }
}

impl Default for TextureChannel {
    fn default() -> Self {
        TextureChannel::RGBA
    }
}

impl FromStr for TextureChannel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "R" => Ok(TextureChannel::R),
            "RG" => Ok(TextureChannel::RG),
            "RGBA" => Ok(TextureChannel::RGBA),
            _ => Err(UnknownVariant::new("texture channel", s)),
        }
    }
}

/// Size in bytes of one pixel of `channel` stored as `format`.
pub const fn bytes_per_pixel(format: TextureFormat, channel: TextureChannel) -> usize {
    channel.count() * format.bytes_per_channel()
}

/// Byte length of a `width` x `height` image of `channel` stored as `format`.
pub fn image_byte_len(width: u32, height: u32, format: TextureFormat, channel: TextureChannel) -> usize {
    width as usize * height as usize * bytes_per_pixel(format, channel)
}

/// Returned by the `FromStr` impls in this crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what}: `{value}`")]
pub struct UnknownVariant {
    pub what: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_owned(),
        }
    }
}
