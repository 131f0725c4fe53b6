//! Discovery of shader assets below a root directory.

use std::path::{Path, PathBuf};

use tracing::trace;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// What the registry treats as a shader asset and what it refuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOptions {
    /// File extensions, without the dot.
    pub extensions: Vec<String>,
    /// Substrings that mark a source written for the legacy pipeline.
    pub legacy_markers: Vec<String>,
    pub follow_links: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["ttcomp".into(), "ttblend".into()],
            legacy_markers: vec!["UnityCG.cginc".into()],
            follow_links: false,
        }
    }
}

impl RegistryOptions {
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    /// First legacy marker found in `source`.
    pub fn legacy_marker(&self, source: &str) -> Option<&str> {
        self.legacy_markers
            .iter()
            .map(String::as_str)
            .find(|marker| source.contains(marker))
    }
}

/// Every shader asset below `root`, in file-name order per directory.
pub fn discover_shaders(root: impl AsRef<Path>, options: &RegistryOptions) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let mut found = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(options.follow_links)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::Io {
                path,
                source: e.into(),
            }
        })?;
        if entry.file_type().is_file() && options.matches(entry.path()) {
            found.push(entry.into_path());
        }
    }
    trace!(root = %root.display(), count = found.len(), "shader assets discovered");
    Ok(found)
}
