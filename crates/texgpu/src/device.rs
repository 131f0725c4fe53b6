//! The top-level [`Device`]: backend session, shader registration window and
//! the authoritative table of live contexts and their resources.
//!
//! Ownership is a strict tree. The device owns one [`ContextState`] per live
//! context and each of those owns the native handles of its textures,
//! buffers and compute handlers. The user-facing [`Context`],
//! [`RenderTexture`](crate::RenderTexture), [`StorageBuffer`](crate::StorageBuffer)
//! and [`ComputeHandler`](crate::ComputeHandler) values only carry slot keys
//! into this table, so a child never holds its parent alive and a disposed
//! parent leaves its children's keys dangling harmlessly: every later call
//! through them fails with [`Error::Disposed`].

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use slotmap::{new_key_type, SlotMap};
use tracing::{debug, error, trace};

use texgpu_core::{
    default_log, Backend, BackendError, DebugLog, DevicePreference, HandleKind, OwnedHandle,
    RawHandle, TextureChannel, TextureFormat, WorkGroupSize,
};
#[cfg(feature = "host")]
use texgpu_host::HostBackend;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::keys::ComputeShaderKey;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

new_key_type! {
    pub(crate) struct ContextKey;
    pub(crate) struct TextureKey;
    pub(crate) struct BufferKey;
    pub(crate) struct HandlerKey;
}

/// Raw handle of `handle`, or [`Error::Disposed`] once it has been released.
pub(crate) fn live(handle: &OwnedHandle) -> Result<RawHandle> {
    handle.get().ok_or(Error::Disposed(handle.kind().name()))
}

// ---------------------------------------------------------------------------
// Resource table
// ---------------------------------------------------------------------------

pub(crate) struct TextureState {
    pub(crate) handle: OwnedHandle,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) channel: TextureChannel,
}

pub(crate) struct BufferState {
    pub(crate) handle: OwnedHandle,
    pub(crate) len: usize,
    pub(crate) downloadable: bool,
}

pub(crate) struct HandlerState {
    pub(crate) handle: OwnedHandle,
    pub(crate) shader: ComputeShaderKey,
    pub(crate) work_group: WorkGroupSize,
}

pub(crate) struct ContextState {
    pub(crate) textures: SlotMap<TextureKey, TextureState>,
    pub(crate) buffers: SlotMap<BufferKey, BufferState>,
    pub(crate) handlers: SlotMap<HandlerKey, HandlerState>,
    // Declared last so that plain drops also release children first.
    pub(crate) handle: OwnedHandle,
}

impl ContextState {
    pub(crate) fn raw(&self) -> Result<RawHandle> {
        live(&self.handle)
    }

    pub(crate) fn texture(&self, key: TextureKey) -> Result<&TextureState> {
        self.textures.get(key).ok_or(Error::Disposed("render texture"))
    }

    pub(crate) fn buffer(&self, key: BufferKey) -> Result<&BufferState> {
        self.buffers.get(key).ok_or(Error::Disposed("storage buffer"))
    }

    pub(crate) fn handler(&self, key: HandlerKey) -> Result<&HandlerState> {
        self.handlers.get(key).ok_or(Error::Disposed("compute handler"))
    }

    /// Release every owned resource, then the context's own handle.
    fn teardown(mut self) {
        let (textures, buffers, handlers) = (self.textures.len(), self.buffers.len(), self.handlers.len());
        self.handlers.clear();
        self.buffers.clear();
        self.textures.clear();
        self.handle.release();
        trace!(textures, buffers, handlers, "context torn down");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Registration {
    Open,
    Closed,
}

struct DeviceState {
    registration: Registration,
    default_format: Option<TextureFormat>,
    contexts: SlotMap<ContextKey, ContextState>,
    handle: OwnedHandle,
}

// ---------------------------------------------------------------------------
// DeviceDescriptor
// ---------------------------------------------------------------------------

/// Options for [`Device::new`].
#[derive(Clone, Default)]
pub struct DeviceDescriptor {
    pub preference: DevicePreference,
    /// Texture storage format. `None` keeps the backend's default.
    pub default_format: Option<TextureFormat>,
    /// Sink for backend diagnostics. `None` forwards them to `tracing`.
    pub log: Option<Arc<dyn DebugLog>>,
}

impl DeviceDescriptor {
    pub fn new(preference: DevicePreference) -> Self {
        Self {
            preference,
            ..Self::default()
        }
    }

    pub fn with_default_format(mut self, format: TextureFormat) -> Self {
        self.default_format = Some(format);
        self
    }

    pub fn with_log(mut self, log: Arc<dyn DebugLog>) -> Self {
        self.log = Some(log);
        self
    }
}

impl fmt::Debug for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceDescriptor")
            .field("preference", &self.preference)
            .field("default_format", &self.default_format)
            .field("log", &self.log.as_ref().map(|_| "custom"))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// A backend device session.
///
/// Shader registration is only allowed until the first context is created;
/// after that the registration window is closed for the rest of the device's
/// life. Dropping the device disposes every context it still owns.
///
/// `Device` is `Send` but not `Sync`: callers serialise access to one device
/// and everything created from it.
pub struct Device {
    serial: u64,
    preference: DevicePreference,
    backend: Arc<dyn Backend>,
    state: RefCell<DeviceState>,
}

impl Device {
    /// Open a device on `backend`.
    ///
    /// Sets the default texture format if one is given, then registers the
    /// backend's format convertor. Both happen before any shader can be
    /// registered.
    pub fn new(backend: Arc<dyn Backend>, descriptor: DeviceDescriptor) -> Result<Self> {
        let DeviceDescriptor {
            preference,
            default_format,
            log,
        } = descriptor;
        let log = log.unwrap_or_else(default_log);

        let raw = backend
            .create_device(preference, log)
            .map_err(Error::native("create_device"))?;
        let handle = OwnedHandle::new(Arc::clone(&backend), HandleKind::Device, raw);

        if let Some(format) = default_format {
            backend
                .set_default_texture_format(raw, format)
                .map_err(Error::native("set_default_texture_format"))?;
        }
        backend
            .register_format_convertor(raw)
            .map_err(Error::native("register_format_convertor"))?;

        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        debug!(serial, handle = %raw, ?preference, ?default_format, "device created");

        Ok(Self {
            serial,
            preference,
            backend,
            state: RefCell::new(DeviceState {
                registration: Registration::Open,
                default_format,
                contexts: SlotMap::with_key(),
                handle,
            }),
        })
    }

    /// Open a device on `backend` with default options.
    pub fn create(backend: Arc<dyn Backend>, preference: DevicePreference) -> Result<Self> {
        Self::new(backend, DeviceDescriptor::new(preference))
    }

    /// Open a device on a fresh in-process [`HostBackend`].
    #[cfg(feature = "host")]
    pub fn host(preference: DevicePreference) -> Result<Self> {
        Self::create(Arc::new(HostBackend::new()), preference)
    }

    // -----------------------------------------------------------------------
    // Shader registration
    // -----------------------------------------------------------------------

    /// Compile a compute shader.
    ///
    /// `source` overrides the file contents; when `None` the file at `path`
    /// is read. The path is always passed to the backend for diagnostics.
    pub fn register_compute_shader(
        &self,
        path: impl AsRef<Path>,
        source: Option<&str>,
    ) -> Result<ComputeShaderKey> {
        let path = path.as_ref();
        let state = self.state.borrow();
        let raw = live(&state.handle)?;
        if state.registration == Registration::Closed {
            return Err(Error::InvalidState(format!(
                "cannot register {} after a context has been created",
                path.display()
            )));
        }

        let loaded: String;
        let source = match source {
            Some(source) => source,
            None => {
                loaded = std::fs::read_to_string(path).map_err(|source| Error::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                loaded.as_str()
            }
        };

        match self
            .backend
            .register_compute_shader(raw, &path.to_string_lossy(), source)
        {
            Ok(id) => {
                trace!(serial = self.serial, id, path = %path.display(), "compute shader registered");
                Ok(ComputeShaderKey::new(self.serial, id))
            }
            Err(BackendError::Compile(reason)) => Err(Error::ShaderCompile {
                path: path.to_path_buf(),
                source_text: source.to_owned(),
                reason,
            }),
            Err(e) => Err(Error::native("register_compute_shader")(e)),
        }
    }

    /// Change the texture storage format. Only allowed while the registration
    /// window is open.
    pub fn set_default_format(&self, format: TextureFormat) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let raw = live(&state.handle)?;
        if state.registration == Registration::Closed {
            return Err(Error::InvalidState(
                "the default texture format is fixed once a context exists".into(),
            ));
        }
        self.backend
            .set_default_texture_format(raw, format)
            .map_err(Error::native("set_default_texture_format"))?;
        state.default_format = Some(format);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Contexts
    // -----------------------------------------------------------------------

    /// Create a context and wrap it in any type built from a [`Context`].
    ///
    /// Closes the shader registration window.
    pub fn create_context<'d, T>(&'d self) -> Result<T>
    where
        T: From<Context<'d>>,
    {
        let key = {
            let mut state = self.state.borrow_mut();
            let device = live(&state.handle)?;
            let raw = self
                .backend
                .create_context(device)
                .map_err(Error::native("create_context"))?;
            let handle = OwnedHandle::new(Arc::clone(&self.backend), HandleKind::Context, raw);

            if state.registration == Registration::Open {
                debug!(serial = self.serial, "shader registration closed");
            }
            state.registration = Registration::Closed;
            let key = state.contexts.insert(ContextState {
                textures: SlotMap::with_key(),
                buffers: SlotMap::with_key(),
                handlers: SlotMap::with_key(),
                handle,
            });
            debug!(serial = self.serial, handle = %raw, live = state.contexts.len(), "context created");
            key
        };
        Ok(T::from(Context::new(self, key)))
    }

    /// Dispose every live context, then release the device. Idempotent.
    pub fn dispose(&self) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            error!(serial = self.serial, "device state is borrowed; dispose skipped");
            return;
        };
        if state.handle.is_released() {
            return;
        }
        let contexts = state.contexts.len();
        for (_, context) in state.contexts.drain() {
            context.teardown();
        }
        state.handle.release();
        debug!(serial = self.serial, contexts, "device disposed");
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn is_disposed(&self) -> bool {
        self.state.borrow().handle.is_released()
    }

    /// Whether [`register_compute_shader`](Self::register_compute_shader) is
    /// still allowed.
    pub fn registration_open(&self) -> bool {
        let state = self.state.borrow();
        !state.handle.is_released() && state.registration == Registration::Open
    }

    pub fn live_contexts(&self) -> usize {
        self.state.borrow().contexts.len()
    }

    pub fn preference(&self) -> DevicePreference {
        self.preference
    }

    /// Texture storage format set on this device, if any.
    pub fn default_format(&self) -> Option<TextureFormat> {
        self.state.borrow().default_format
    }

    /// Borrow the backend this device talks to.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// The underlying native device handle.
    pub fn raw_handle(&self) -> Result<RawHandle> {
        live(&self.state.borrow().handle)
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    // -----------------------------------------------------------------------
    // Table access for contexts and resources
    // -----------------------------------------------------------------------

    /// Run `f` against a live context's state.
    pub(crate) fn with_context<R>(
        &self,
        key: ContextKey,
        f: impl FnOnce(&mut ContextState) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state.borrow_mut();
        if state.handle.is_released() {
            return Err(Error::Disposed("device"));
        }
        let context = state.contexts.get_mut(key).ok_or(Error::Disposed("context"))?;
        f(context)
    }

    pub(crate) fn context_alive(&self, key: ContextKey) -> bool {
        self.state.borrow().contexts.contains_key(key)
    }

    pub(crate) fn dispose_context(&self, key: ContextKey) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            error!(serial = self.serial, "device state is borrowed; context dispose skipped");
            return;
        };
        if let Some(context) = state.contexts.remove(key) {
            context.teardown();
            debug!(serial = self.serial, live = state.contexts.len(), "context disposed");
        }
    }

    /// Remove a resource from a context, if both still exist. Used by drop
    /// paths, so it never fails.
    pub(crate) fn release_resource(&self, key: ContextKey, f: impl FnOnce(&mut ContextState)) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            error!(serial = self.serial, "device state is borrowed; resource release skipped");
            return;
        };
        if let Some(context) = state.contexts.get_mut(key) {
            f(context);
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Device")
            .field("serial", &self.serial)
            .field("preference", &self.preference)
            .field("handle", &state.handle.get())
            .field("registration", &state.registration)
            .field("contexts", &state.contexts.len())
            .finish()
    }
}
