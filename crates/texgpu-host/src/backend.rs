//! [`HostBackend`]: the [`Backend`] boundary implemented in host memory.
//!
//! Texel and buffer contents live in `Vec<u8>`s, shaders are validated and
//! reflected with naga, and dispatch checks that every binding the shader
//! declares is satisfied. No shader code is executed; dispatches are counted.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU64;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use texgpu_core::{
    bytes_per_pixel, image_byte_len, Backend, BackendError, DebugLog, DevicePreference,
    RawHandle, TextureChannel, TextureFormat, WorkGroupSize,
};

use crate::convert::convert;
use crate::reflect::{reflect_wgsl, BindingKind, ShaderReflection};

/// Storage buffers are allocated in whole 4-byte words, never empty.
///
/// `None` when the padded length does not fit in `usize`.
pub fn aligned_buffer_len(len: usize) -> Option<usize> {
    Some((len.checked_add(4)? & !3).max(4))
}

fn zeroed_buffer(len: usize) -> Result<Vec<u8>, BackendError> {
    aligned_buffer_len(len)
        .filter(|&aligned| aligned <= isize::MAX as usize)
        .map(|aligned| vec![0; aligned])
        .ok_or_else(|| BackendError::Rejected(format!("storage buffer of {len} bytes is too large")))
}

/// Snapshot of the objects a [`HostBackend`] is tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub devices: usize,
    pub contexts: usize,
    pub textures: usize,
    pub buffers: usize,
    pub handlers: usize,
    /// Successful `drop_*` calls.
    pub released: u64,
    /// `drop_*` calls for handles that were unknown (already released).
    pub invalid_releases: u64,
    /// Parents dropped while the backend still tracked one of their children.
    pub out_of_order_releases: u64,
    pub dispatches: u64,
}

impl HostStats {
    pub fn live_objects(&self) -> usize {
        self.devices + self.contexts + self.textures + self.buffers + self.handlers
    }
}

// ---------------------------------------------------------------------------
// Tracked objects
// ---------------------------------------------------------------------------

struct DeviceEntry {
    preference: DevicePreference,
    log: Arc<dyn DebugLog>,
    default_format: TextureFormat,
    convertor_registered: bool,
    shaders: Vec<Arc<ShaderReflection>>,
}

struct ContextEntry {
    device: RawHandle,
}

struct TextureEntry {
    context: RawHandle,
    width: u32,
    height: u32,
    channel: TextureChannel,
    /// Storage format, fixed from the device default at creation.
    format: TextureFormat,
    texels: Vec<u8>,
}

struct BufferEntry {
    context: RawHandle,
    data: Vec<u8>,
    downloadable: bool,
}

enum Bound {
    Texture(RawHandle),
    Buffer(RawHandle),
    Constants(Vec<u8>),
    InlineStorage(Vec<u8>),
}

struct HandlerEntry {
    context: RawHandle,
    shader: Arc<ShaderReflection>,
    bound: BTreeMap<u32, Bound>,
    dispatches: u64,
}

struct HostState {
    next_handle: NonZeroU64,
    devices: HashMap<RawHandle, DeviceEntry>,
    contexts: HashMap<RawHandle, ContextEntry>,
    textures: HashMap<RawHandle, TextureEntry>,
    buffers: HashMap<RawHandle, BufferEntry>,
    handlers: HashMap<RawHandle, HandlerEntry>,
    released: u64,
    invalid_releases: u64,
    out_of_order_releases: u64,
    dispatches: u64,
}

fn invalid(kind: &'static str, handle: RawHandle) -> BackendError {
    BackendError::InvalidHandle { kind, handle }
}

impl HostState {
    fn allocate(&mut self) -> RawHandle {
        let raw = RawHandle::from(self.next_handle);
        self.next_handle = self.next_handle.saturating_add(1);
        raw
    }

    fn device(&self, handle: RawHandle) -> Result<&DeviceEntry, BackendError> {
        self.devices.get(&handle).ok_or_else(|| invalid("device", handle))
    }

    fn device_mut(&mut self, handle: RawHandle) -> Result<&mut DeviceEntry, BackendError> {
        self.devices.get_mut(&handle).ok_or_else(|| invalid("device", handle))
    }

    fn context(&self, handle: RawHandle) -> Result<&ContextEntry, BackendError> {
        self.contexts.get(&handle).ok_or_else(|| invalid("context", handle))
    }

    fn device_of_context(&self, context: RawHandle) -> Result<&DeviceEntry, BackendError> {
        let device = self.context(context)?.device;
        self.device(device)
    }

    /// Texture `texture`, which must belong to `context`.
    fn owned_texture(&self, context: RawHandle, texture: RawHandle) -> Result<&TextureEntry, BackendError> {
        let entry = self.textures.get(&texture).ok_or_else(|| invalid("render texture", texture))?;
        if entry.context != context {
            return Err(BackendError::Rejected(format!(
                "render texture {texture} belongs to context {}, not {context}",
                entry.context
            )));
        }
        Ok(entry)
    }

    fn handler(&self, handle: RawHandle) -> Result<&HandlerEntry, BackendError> {
        self.handlers.get(&handle).ok_or_else(|| invalid("compute handler", handle))
    }

    fn handler_mut(&mut self, handle: RawHandle) -> Result<&mut HandlerEntry, BackendError> {
        self.handlers.get_mut(&handle).ok_or_else(|| invalid("compute handler", handle))
    }

    /// Check that `slot` of `handler` exists and accepts `accept`.
    fn binding_kind(
        &self,
        handler: RawHandle,
        slot: u32,
        accept: impl Fn(BindingKind) -> bool,
    ) -> Result<BindingKind, BackendError> {
        let entry = self.handler(handler)?;
        let binding = entry.shader.binding(slot).ok_or_else(|| {
            BackendError::Rejected(format!("{}: no binding at slot {slot}", entry.shader.path))
        })?;
        if !accept(binding.kind) {
            return Err(BackendError::Rejected(format!(
                "{}: slot {slot} (`{}`) is a {:?} binding",
                entry.shader.path, binding.name, binding.kind
            )));
        }
        Ok(binding.kind)
    }

    fn log(&self, context: RawHandle, message: &str) {
        if let Ok(device) = self.device_of_context(context) {
            device.log.log(message);
        }
    }

    fn record_release(&mut self, found: bool) -> Result<(), BackendError> {
        if found {
            self.released += 1;
            Ok(())
        } else {
            self.invalid_releases += 1;
            Err(BackendError::Rejected("handle was already released".into()))
        }
    }
}

// ---------------------------------------------------------------------------
// HostBackend
// ---------------------------------------------------------------------------

/// In-process reference backend.
///
/// Thread-safe; one instance can back any number of devices.
pub struct HostBackend {
    state: Mutex<HostState>,
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HostState {
                next_handle: NonZeroU64::MIN,
                devices: HashMap::new(),
                contexts: HashMap::new(),
                textures: HashMap::new(),
                buffers: HashMap::new(),
                handlers: HashMap::new(),
                released: 0,
                invalid_releases: 0,
                out_of_order_releases: 0,
                dispatches: 0,
            }),
        }
    }

    pub fn stats(&self) -> HostStats {
        let state = self.state.lock();
        HostStats {
            devices: state.devices.len(),
            contexts: state.contexts.len(),
            textures: state.textures.len(),
            buffers: state.buffers.len(),
            handlers: state.handlers.len(),
            released: state.released,
            invalid_releases: state.invalid_releases,
            out_of_order_releases: state.out_of_order_releases,
            dispatches: state.dispatches,
        }
    }

    /// Number of dispatches issued through `handler`.
    pub fn handler_dispatches(&self, handler: RawHandle) -> Option<u64> {
        self.state.lock().handlers.get(&handler).map(|h| h.dispatches)
    }

    /// Bytes most recently uploaded to `slot` of `handler` through
    /// `upload_constants_buffer` or `upload_storage_buffer_binding`.
    pub fn uploaded_binding(&self, handler: RawHandle, slot: u32) -> Option<Vec<u8>> {
        let state = self.state.lock();
        match state.handlers.get(&handler)?.bound.get(&slot)? {
            Bound::Constants(data) | Bound::InlineStorage(data) => Some(data.clone()),
            Bound::Texture(_) | Bound::Buffer(_) => None,
        }
    }

    /// Device preference recorded at creation.
    pub fn device_preference(&self, device: RawHandle) -> Option<DevicePreference> {
        self.state.lock().devices.get(&device).map(|d| d.preference)
    }

    /// Number of shaders compiled on `device`.
    pub fn shader_count(&self, device: RawHandle) -> Option<usize> {
        self.state.lock().devices.get(&device).map(|d| d.shaders.len())
    }
}

impl Backend for HostBackend {
    fn create_device(
        &self,
        preference: DevicePreference,
        log: Arc<dyn DebugLog>,
    ) -> Result<RawHandle, BackendError> {
        let mut state = self.state.lock();
        let handle = state.allocate();
        state.devices.insert(
            handle,
            DeviceEntry {
                preference,
                log,
                default_format: TextureFormat::Byte,
                convertor_registered: false,
                shaders: Vec::new(),
            },
        );
        debug!(%handle, ?preference, "host device created");
        Ok(handle)
    }

    fn drop_device(&self, device: RawHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let found = state.devices.remove(&device).is_some();
        if found && state.contexts.values().any(|c| c.device == device) {
            warn!(%device, "device dropped while it still owns contexts");
            state.out_of_order_releases += 1;
        }
        state.record_release(found)
    }

    fn set_default_texture_format(
        &self,
        device: RawHandle,
        format: TextureFormat,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.device_mut(device)?.default_format = format;
        Ok(())
    }

    fn register_format_convertor(&self, device: RawHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let entry = state.device_mut(device)?;
        if entry.convertor_registered {
            return Err(BackendError::Rejected("format convertor is already registered".into()));
        }
        entry.convertor_registered = true;
        Ok(())
    }

    fn register_compute_shader(
        &self,
        device: RawHandle,
        path: &str,
        source: &str,
    ) -> Result<u32, BackendError> {
        let log = Arc::clone(&self.state.lock().device(device)?.log);
        // Compile outside the lock; naga validation is the slow part.
        let reflection = reflect_wgsl(path, source, log.as_ref())?;

        let mut state = self.state.lock();
        let entry = state.device_mut(device)?;
        let id = u32::try_from(entry.shaders.len())
            .map_err(|_| BackendError::Rejected("too many shaders on one device".into()))?;
        trace!(%device, id, path, work_group = %reflection.work_group, "compute shader registered");
        entry.shaders.push(Arc::new(reflection));
        Ok(id)
    }

    fn create_context(&self, device: RawHandle) -> Result<RawHandle, BackendError> {
        let mut state = self.state.lock();
        state.device(device)?;
        let handle = state.allocate();
        state.contexts.insert(handle, ContextEntry { device });
        Ok(handle)
    }

    fn drop_context(&self, context: RawHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let found = state.contexts.remove(&context).is_some();
        if found {
            let orphans = state.textures.values().filter(|t| t.context == context).count()
                + state.buffers.values().filter(|b| b.context == context).count()
                + state.handlers.values().filter(|h| h.context == context).count();
            if orphans > 0 {
                warn!(%context, orphans, "context dropped while it still owns resources");
                state.out_of_order_releases += 1;
            }
        }
        state.record_release(found)
    }

    fn create_render_texture(
        &self,
        context: RawHandle,
        width: u32,
        height: u32,
        channel: TextureChannel,
    ) -> Result<RawHandle, BackendError> {
        let mut state = self.state.lock();
        if width == 0 || height == 0 {
            return Err(BackendError::Rejected(format!("texture size {width}x{height} is empty")));
        }
        let format = state.device_of_context(context)?.default_format;
        let handle = state.allocate();
        state.textures.insert(
            handle,
            TextureEntry {
                context,
                width,
                height,
                channel,
                format,
                texels: vec![0; image_byte_len(width, height, format, channel)],
            },
        );
        Ok(handle)
    }

    fn drop_render_texture(&self, texture: RawHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let found = state.textures.remove(&texture).is_some();
        state.record_release(found)
    }

    fn texture_width(&self, texture: RawHandle) -> Result<u32, BackendError> {
        let state = self.state.lock();
        let entry = state.textures.get(&texture).ok_or_else(|| invalid("render texture", texture))?;
        Ok(entry.width)
    }

    fn texture_height(&self, texture: RawHandle) -> Result<u32, BackendError> {
        let state = self.state.lock();
        let entry = state.textures.get(&texture).ok_or_else(|| invalid("render texture", texture))?;
        Ok(entry.height)
    }

    fn copy_texture(
        &self,
        context: RawHandle,
        dst: RawHandle,
        src: RawHandle,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let src_entry = state.owned_texture(context, src)?;
        let dst_entry = state.owned_texture(context, dst)?;
        if (src_entry.width, src_entry.height, src_entry.channel, src_entry.format)
            != (dst_entry.width, dst_entry.height, dst_entry.channel, dst_entry.format)
        {
            return Err(BackendError::Rejected(format!(
                "cannot copy {}x{} {:?} into {}x{} {:?}",
                src_entry.width,
                src_entry.height,
                src_entry.channel,
                dst_entry.width,
                dst_entry.height,
                dst_entry.channel
            )));
        }
        if src == dst {
            return Ok(());
        }
        let texels = src_entry.texels.clone();
        if let Some(dst_entry) = state.textures.get_mut(&dst) {
            dst_entry.texels = texels;
        }
        Ok(())
    }

    fn upload_texture(
        &self,
        context: RawHandle,
        dst: RawHandle,
        data: &[u8],
        format: TextureFormat,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let convertor = state.device_of_context(context)?.convertor_registered;
        let entry = state.owned_texture(context, dst)?;
        let expected = image_byte_len(entry.width, entry.height, format, entry.channel);
        if data.len() != expected {
            return Err(BackendError::Rejected(format!(
                "upload of {} bytes into a texture expecting {expected}",
                data.len()
            )));
        }
        if format != entry.format && !convertor {
            return Err(BackendError::Unsupported(format!(
                "uploading {format} data into {} storage without a format convertor",
                entry.format
            )));
        }
        let texels = convert(data, format, entry.format);
        if let Some(entry) = state.textures.get_mut(&dst) {
            entry.texels = texels;
        }
        Ok(())
    }

    fn download_texture(
        &self,
        context: RawHandle,
        data: &mut [u8],
        format: TextureFormat,
        src: RawHandle,
    ) -> Result<(), BackendError> {
        let state = self.state.lock();
        let convertor = state.device_of_context(context)?.convertor_registered;
        let entry = state.owned_texture(context, src)?;
        let expected = image_byte_len(entry.width, entry.height, format, entry.channel);
        if data.len() != expected {
            return Err(BackendError::Rejected(format!(
                "download into {} bytes from a texture holding {expected}",
                data.len()
            )));
        }
        if format != entry.format && !convertor {
            return Err(BackendError::Unsupported(format!(
                "downloading {} storage as {format} without a format convertor",
                entry.format
            )));
        }
        data.copy_from_slice(&convert(&entry.texels, entry.format, format));
        trace!(
            %src,
            bytes = data.len(),
            pixel = bytes_per_pixel(format, entry.channel),
            "texture downloaded"
        );
        Ok(())
    }

    fn allocate_storage_buffer(
        &self,
        context: RawHandle,
        len: usize,
        downloadable: bool,
    ) -> Result<RawHandle, BackendError> {
        let mut state = self.state.lock();
        state.context(context)?;
        let handle = state.allocate();
        state.buffers.insert(
            handle,
            BufferEntry {
                context,
                data: zeroed_buffer(len)?,
                downloadable,
            },
        );
        Ok(handle)
    }

    fn upload_storage_buffer(
        &self,
        context: RawHandle,
        data: &[u8],
        downloadable: bool,
    ) -> Result<RawHandle, BackendError> {
        let mut state = self.state.lock();
        state.context(context)?;
        let mut contents = zeroed_buffer(data.len())?;
        contents[..data.len()].copy_from_slice(data);
        let handle = state.allocate();
        state.buffers.insert(
            handle,
            BufferEntry {
                context,
                data: contents,
                downloadable,
            },
        );
        Ok(handle)
    }

    fn download_storage_buffer(
        &self,
        context: RawHandle,
        data: &mut [u8],
        buffer: RawHandle,
    ) -> Result<(), BackendError> {
        let state = self.state.lock();
        let entry = state.buffers.get(&buffer).ok_or_else(|| invalid("storage buffer", buffer))?;
        if entry.context != context {
            return Err(BackendError::Rejected(format!(
                "storage buffer {buffer} belongs to another context"
            )));
        }
        if !entry.downloadable {
            return Err(BackendError::Rejected(format!(
                "storage buffer {buffer} was not allocated downloadable"
            )));
        }
        let Some(source) = entry.data.get(..data.len()) else {
            return Err(BackendError::Rejected(format!(
                "download of {} bytes from a {} byte buffer",
                data.len(),
                entry.data.len()
            )));
        };
        data.copy_from_slice(source);
        Ok(())
    }

    fn drop_storage_buffer(&self, buffer: RawHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let found = state.buffers.remove(&buffer).is_some();
        state.record_release(found)
    }

    fn get_compute_handler(&self, context: RawHandle, shader: u32) -> Result<RawHandle, BackendError> {
        let mut state = self.state.lock();
        let device = state.device_of_context(context)?;
        let reflection = device
            .shaders
            .get(shader as usize)
            .cloned()
            .ok_or_else(|| BackendError::Rejected(format!("unknown compute shader id {shader}")))?;
        let handle = state.allocate();
        state.handlers.insert(
            handle,
            HandlerEntry {
                context,
                shader: reflection,
                bound: BTreeMap::new(),
                dispatches: 0,
            },
        );
        Ok(handle)
    }

    fn drop_compute_handler(&self, handler: RawHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let found = state.handlers.remove(&handler).is_some();
        state.record_release(found)
    }

    fn get_bind_slot(&self, handler: RawHandle, name: &str) -> Result<Option<u32>, BackendError> {
        let state = self.state.lock();
        Ok(state.handler(handler)?.shader.slot_of(name))
    }

    fn set_render_texture(
        &self,
        handler: RawHandle,
        slot: u32,
        texture: RawHandle,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.binding_kind(handler, slot, BindingKind::is_texture)?;
        let context = state.handler(handler)?.context;
        state.owned_texture(context, texture)?;
        state.handler_mut(handler)?.bound.insert(slot, Bound::Texture(texture));
        Ok(())
    }

    fn set_storage_buffer(
        &self,
        handler: RawHandle,
        slot: u32,
        buffer: RawHandle,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.binding_kind(handler, slot, |k| matches!(k, BindingKind::StorageBuffer { .. }))?;
        let context = state.handler(handler)?.context;
        let entry = state.buffers.get(&buffer).ok_or_else(|| invalid("storage buffer", buffer))?;
        if entry.context != context {
            return Err(BackendError::Rejected(format!(
                "storage buffer {buffer} belongs to another context"
            )));
        }
        state.handler_mut(handler)?.bound.insert(slot, Bound::Buffer(buffer));
        Ok(())
    }

    fn upload_constants_buffer(
        &self,
        handler: RawHandle,
        slot: u32,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let kind = state.binding_kind(handler, slot, |k| matches!(k, BindingKind::Uniform { .. }))?;
        if let BindingKind::Uniform { size } = kind {
            if data.len() != size as usize {
                return Err(BackendError::Rejected(format!(
                    "constants buffer at slot {slot} is {size} bytes, got {}",
                    data.len()
                )));
            }
        }
        state.handler_mut(handler)?.bound.insert(slot, Bound::Constants(data.to_vec()));
        Ok(())
    }

    fn upload_storage_buffer_binding(
        &self,
        handler: RawHandle,
        slot: u32,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.binding_kind(handler, slot, |k| matches!(k, BindingKind::StorageBuffer { .. }))?;
        let mut contents = zeroed_buffer(data.len())?;
        contents[..data.len()].copy_from_slice(data);
        state.handler_mut(handler)?.bound.insert(slot, Bound::InlineStorage(contents));
        Ok(())
    }

    fn get_work_group_size(&self, handler: RawHandle) -> Result<WorkGroupSize, BackendError> {
        let state = self.state.lock();
        Ok(state.handler(handler)?.shader.work_group)
    }

    fn dispatch(&self, handler: RawHandle, x: u32, y: u32, z: u32) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        let entry = state.handler(handler)?;
        if x == 0 || y == 0 || z == 0 {
            return Err(BackendError::Rejected(format!("empty dispatch ({x}, {y}, {z})")));
        }

        let mut problems = Vec::new();
        for binding in &entry.shader.bindings {
            match (binding.kind, entry.bound.get(&binding.slot)) {
                (BindingKind::Sampler, _) => {}
                (_, None) => problems.push(format!("`{}` is not bound", binding.name)),
                (_, Some(Bound::Texture(t))) if !state.textures.contains_key(t) => {
                    problems.push(format!("texture bound to `{}` was released", binding.name))
                }
                (_, Some(Bound::Buffer(b))) if !state.buffers.contains_key(b) => {
                    problems.push(format!("buffer bound to `{}` was released", binding.name))
                }
                (_, Some(_)) => {}
            }
        }
        if !problems.is_empty() {
            let message = format!("{}: cannot dispatch: {}", entry.shader.path, problems.join(", "));
            state.log(entry.context, &message);
            return Err(BackendError::Rejected(message));
        }

        trace!(%handler, x, y, z, shader = %entry.shader.path, "dispatch");
        state.dispatches += 1;
        if let Some(entry) = state.handlers.get_mut(&handler) {
            entry.dispatches += 1;
        }
        Ok(())
    }
}
