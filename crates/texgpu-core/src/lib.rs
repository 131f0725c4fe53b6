//! Shared vocabulary between the texgpu device layer and compute backends.
//!
//! - [`formats`]: pixel formats, channel layouts and byte sizes.
//! - [`handle`]: [`RawHandle`] and the release-once [`OwnedHandle`].
//! - [`backend`]: the [`Backend`] call boundary.
//! - [`log`]: the per-device [`DebugLog`] sink.

pub mod backend;
pub mod formats;
pub mod handle;
pub mod log;

pub use backend::{Backend, BackendError, DevicePreference, WorkGroupSize};
pub use formats::{bytes_per_pixel, image_byte_len, TextureChannel, TextureFormat, UnknownVariant};
pub use handle::{HandleKind, OwnedHandle, RawHandle};
pub use log::{default_log, DebugLog, TracingLog};
