//! Descriptive headers embedded in shader sources.
//!
//! A shader asset carries its metadata in a block between two marker lines,
//! usually inside a block comment so the source still compiles:
//!
//! ```text
//! /*
//! BEGIN__TT_COMPUTE_SHADER_HEADER
//!
//! Language WGSL
//! TTComputeType Blending
//! Key Normal
//!
//! END__TT_COMPUTE_SHADER_HEADER
//! */
//! ```
//!
//! Every non-empty line is a `Key Value` pair split at the first run of
//! whitespace. `TTComputeType` is mandatory and selects the category.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const HEADER_BEGIN: &str = "BEGIN__TT_COMPUTE_SHADER_HEADER";
pub const HEADER_END: &str = "END__TT_COMPUTE_SHADER_HEADER";
pub const COMPUTE_TYPE_FIELD: &str = "TTComputeType";
/// Header field naming a blending operation.
pub const BLEND_KEY_FIELD: &str = "Key";

/// Registration strategy of a shader asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComputeType {
    General,
    GrabBlend,
    Blending,
    Sampler,
}

impl fmt::Display for ComputeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComputeType::General => "General",
            ComputeType::GrabBlend => "GrabBlend",
            ComputeType::Blending => "Blending",
            ComputeType::Sampler => "Sampler",
        };
        f.write_str(name)
    }
}

impl FromStr for ComputeType {
    type Err = HeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "General" => Ok(ComputeType::General),
            "GrabBlend" => Ok(ComputeType::GrabBlend),
            "Blending" => Ok(ComputeType::Blending),
            "Sampler" => Ok(ComputeType::Sampler),
            other => Err(HeaderError::UnknownComputeType(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("`BEGIN__TT_COMPUTE_SHADER_HEADER` without a matching `END__TT_COMPUTE_SHADER_HEADER`")]
    Unterminated,
    #[error("header has no `TTComputeType` field")]
    MissingComputeType,
    #[error("unknown compute type `{0}`")]
    UnknownComputeType(String),
}

/// Parsed header of one shader asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDescription {
    compute_type: ComputeType,
    fields: BTreeMap<String, String>,
}

impl ShaderDescription {
    pub fn compute_type(&self) -> ComputeType {
        self.compute_type
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}

/// Parse the header of `source`.
///
/// Returns `Ok(None)` when the source has no header at all, which marks it
/// as something other than a shader asset.
pub fn parse_description(source: &str) -> Result<Option<ShaderDescription>, HeaderError> {
    let Some(begin) = source.find(HEADER_BEGIN) else {
        return Ok(None);
    };
    let body = &source[begin + HEADER_BEGIN.len()..];
    let end = body.find(HEADER_END).ok_or(HeaderError::Unterminated)?;

    let mut fields = BTreeMap::new();
    for line in body[..end].lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (key, value) = line
            .split_once(char::is_whitespace)
            .map(|(k, v)| (k, v.trim()))
            .unwrap_or((line, ""));
        fields.insert(key.to_owned(), value.to_owned());
    }

    let compute_type = fields
        .get(COMPUTE_TYPE_FIELD)
        .ok_or(HeaderError::MissingComputeType)?
        .parse::<ComputeType>()?;
    Ok(Some(ShaderDescription { compute_type, fields }))
}
