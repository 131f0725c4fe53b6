//! Opaque backend handles and their single-release owner.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::backend::Backend;

/// Opaque pointer-sized value identifying one backend object.
///
/// Zero is the released sentinel and is not representable, so a live
/// `RawHandle` is never null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(NonZeroU64);

impl RawHandle {
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl From<NonZeroU64> for RawHandle {
    fn from(raw: NonZeroU64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

/// Which `drop_*` call releases a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Device,
    Context,
    RenderTexture,
    StorageBuffer,
    ComputeHandler,
}

impl HandleKind {
    pub const fn name(self) -> &'static str {
        match self {
            HandleKind::Device => "device",
            HandleKind::Context => "context",
            HandleKind::RenderTexture => "render texture",
            HandleKind::StorageBuffer => "storage buffer",
            HandleKind::ComputeHandler => "compute handler",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exclusive owner of one backend object.
///
/// The handle is released through the backend exactly once: either by an
/// explicit [`release`](Self::release) or when the owner is dropped. Not
/// `Clone`; move it to transfer ownership.
pub struct OwnedHandle {
    raw: Option<RawHandle>,
    kind: HandleKind,
    backend: Arc<dyn Backend>,
}

impl OwnedHandle {
    pub fn new(backend: Arc<dyn Backend>, kind: HandleKind, raw: RawHandle) -> Self {
        Self {
            raw: Some(raw),
            kind,
            backend,
        }
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// The raw handle, or `None` once released.
    pub fn get(&self) -> Option<RawHandle> {
        self.raw
    }

    pub fn is_released(&self) -> bool {
        self.raw.is_none()
    }

    /// Release the backend object. Later calls do nothing.
    ///
    /// A backend failure is logged and otherwise ignored: the handle is
    /// invalid either way and there is nothing the owner could retry.
    pub fn release(&mut self) {
        let Some(raw) = self.raw.take() else {
            return;
        };
        trace!(kind = %self.kind, handle = %raw, "releasing native handle");
        let result = match self.kind {
            HandleKind::Device => self.backend.drop_device(raw),
            HandleKind::Context => self.backend.drop_context(raw),
            HandleKind::RenderTexture => self.backend.drop_render_texture(raw),
            HandleKind::StorageBuffer => self.backend.drop_storage_buffer(raw),
            HandleKind::ComputeHandler => self.backend.drop_compute_handler(raw),
        };
        if let Err(e) = result {
            warn!(kind = %self.kind, handle = %raw, "backend failed to release handle: {e}");
        }
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for OwnedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedHandle")
            .field("kind", &self.kind)
            .field("raw", &self.raw)
            .finish()
    }
}
