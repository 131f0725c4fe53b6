//! Error taxonomy of the device layer and the shader registry.

use std::fmt;
use std::path::PathBuf;

use texgpu_core::BackendError;

use crate::shader::header::ComputeType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The object, or one of its owners, has already been released.
    #[error("{0} has been disposed")]
    Disposed(&'static str),

    /// The call is not allowed in the object's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown {kind} `{name}`")]
    Lookup { kind: &'static str, name: String },

    /// The backend rejected a shader. `source_text` is the exact source that
    /// was submitted, after any template expansion.
    #[error("failed to compile {}: {reason}", .path.display())]
    ShaderCompile {
        path: PathBuf,
        source_text: String,
        reason: String,
    },

    #[error("native operation `{operation}` failed: {source}")]
    NativeOperation {
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn lookup(kind: &'static str, name: impl Into<String>) -> Self {
        Error::Lookup {
            kind,
            name: name.into(),
        }
    }

    /// Adapter for `map_err` on backend calls.
    pub(crate) fn native(operation: &'static str) -> impl FnOnce(BackendError) -> Error {
        move |source| Error::NativeOperation { operation, source }
    }
}

// ---------------------------------------------------------------------------
// Registry issues
// ---------------------------------------------------------------------------

/// One problem found while registering a shader library.
#[derive(Debug, thiserror::Error)]
pub enum RegistryIssue {
    #[error("{}: contains `{marker}`, which is not allowed", .path.display())]
    LegacyInclude { path: PathBuf, marker: String },

    #[error("{}: invalid shader header: {reason}", .path.display())]
    InvalidHeader { path: PathBuf, reason: String },

    #[error("{}: blending shader header has no `Key` field", .path.display())]
    MissingBlendKey { path: PathBuf },

    #[error("{}: sampler template `{template}` was not found", .path.display())]
    MissingTemplate { path: PathBuf, template: &'static str },

    #[error("{}: sampler template `{template}` has no include marker", .path.display())]
    TemplateWithoutMarker { path: PathBuf, template: &'static str },

    #[error("{}: {reason}", .path.display())]
    Compile {
        path: PathBuf,
        source_text: String,
        reason: String,
    },

    #[error("{}: {source}", .path.display())]
    Native {
        path: PathBuf,
        #[source]
        source: BackendError,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("required {category} shader `{name}` is missing")]
    MissingRequired { category: ComputeType, name: &'static str },
}

/// Every issue collected while building a shader dictionary.
#[derive(Debug)]
pub struct RegistryError {
    pub issues: Vec<RegistryIssue>,
}

impl RegistryError {
    /// Names of required shaders that were not found.
    pub fn missing_required(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.issues.iter().filter_map(|issue| match issue {
            RegistryIssue::MissingRequired { name, .. } => Some(*name),
            _ => None,
        })
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shader registry has {} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RegistryError {}
