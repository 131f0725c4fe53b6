//! In-process reference implementation of the texgpu backend boundary.
//!
//! [`HostBackend`] keeps every object in host memory behind a single
//! `parking_lot` mutex. It compiles nothing to machine code: WGSL sources are
//! parsed and validated with naga, their bind group 0 is reflected, and
//! dispatches are checked against the bindings that were set. Textures and
//! buffers hold real bytes, so uploads, copies and downloads round-trip.
//!
//! The backend records [`HostStats`] so callers can observe how many native
//! objects are alive and whether any handle was released twice.

pub mod backend;
pub mod convert;
pub mod reflect;

pub use backend::{aligned_buffer_len, HostBackend, HostStats};
pub use reflect::{reflect_wgsl, BindingInfo, BindingKind, ShaderReflection};
