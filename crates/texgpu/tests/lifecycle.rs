mod common;

use texgpu::{Context, DevicePreference, Error, TextureChannel};

use common::{general_source, host_device, ShaderLibrary};

#[test]
fn dispose_is_idempotent() {
    let (backend, device) = host_device();
    let ctx: Context<'_> = device.create_context().unwrap();
    let tex = ctx.create_render_texture(8, 8, TextureChannel::RGBA).unwrap();
    let buf = ctx.allocate_storage_buffer(16, false).unwrap();

    tex.dispose();
    tex.dispose();
    buf.dispose();
    buf.dispose();
    ctx.dispose();
    ctx.dispose();
    device.dispose();
    device.dispose();

    let stats = backend.stats();
    assert_eq!(stats.live_objects(), 0);
    assert_eq!(stats.released, 4);
    assert_eq!(stats.invalid_releases, 0);
}

#[test]
fn use_after_dispose_reports_disposed() {
    let (_backend, device) = host_device();
    let shader = device
        .register_compute_shader("Fill.ttcomp", Some(&general_source()))
        .unwrap();
    let ctx: Context<'_> = device.create_context().unwrap();
    let tex = ctx.create_render_texture(8, 8, TextureChannel::R).unwrap();
    let buf = ctx.allocate_storage_buffer(4, true).unwrap();
    let handler = ctx.get_compute_handler(shader).unwrap();

    tex.dispose();
    assert!(tex.is_disposed());
    assert!(matches!(tex.width(), Err(Error::Disposed(_))));
    assert!(matches!(tex.raw_handle(), Err(Error::Disposed(_))));

    buf.dispose();
    assert!(matches!(buf.len(), Err(Error::Disposed(_))));

    handler.dispose();
    assert!(matches!(handler.dispatch(1, 1, 1), Err(Error::Disposed(_))));
    assert!(matches!(handler.name_to_slot("tex"), Err(Error::Disposed(_))));

    ctx.dispose();
    assert!(ctx.is_disposed());
    assert!(matches!(
        ctx.create_render_texture(8, 8, TextureChannel::R),
        Err(Error::Disposed(_))
    ));
    assert!(matches!(ctx.allocate_storage_buffer(4, false), Err(Error::Disposed(_))));

    device.dispose();
    assert!(device.is_disposed());
    assert!(matches!(device.create_context::<Context<'_>>(), Err(Error::Disposed(_))));
    assert!(matches!(
        device.register_compute_shader("Late.ttcomp", Some(&general_source())),
        Err(Error::Disposed(_))
    ));
}

#[test]
fn context_disposal_cascades_to_children() {
    let (backend, device) = host_device();
    let shader = device
        .register_compute_shader("Fill.ttcomp", Some(&general_source()))
        .unwrap();
    let ctx: Context<'_> = device.create_context().unwrap();
    let textures: Vec<_> = (0..3)
        .map(|_| ctx.create_render_texture(16, 16, TextureChannel::RGBA).unwrap())
        .collect();
    let buffer = ctx.upload_storage_buffer(&[1.0f32, 2.0, 3.0], true).unwrap();
    let handler = ctx.get_compute_handler(shader).unwrap();
    assert_eq!(ctx.texture_count().unwrap(), 3);
    assert_eq!(backend.stats().textures, 3);

    ctx.dispose();

    assert!(textures.iter().all(|t| t.is_disposed()));
    assert!(buffer.is_disposed());
    assert!(handler.is_disposed());
    let stats = backend.stats();
    assert_eq!(stats.contexts, 0);
    assert_eq!(stats.textures, 0);
    assert_eq!(stats.buffers, 0);
    assert_eq!(stats.handlers, 0);
    assert_eq!(stats.out_of_order_releases, 0);

    // Dropping the stale values afterwards must not release anything twice.
    drop(textures);
    drop(buffer);
    drop(handler);
    assert_eq!(backend.stats().invalid_releases, 0);
}

#[test]
fn device_disposal_cascades_through_every_context() {
    let (backend, device) = host_device();
    let a: Context<'_> = device.create_context().unwrap();
    let b: Context<'_> = device.create_context().unwrap();
    let ta = a.create_render_texture(4, 4, TextureChannel::RG).unwrap();
    let tb = b.create_render_texture(4, 4, TextureChannel::RG).unwrap();
    assert_eq!(device.live_contexts(), 2);

    device.dispose();

    assert!(a.is_disposed() && b.is_disposed());
    assert!(ta.is_disposed() && tb.is_disposed());
    let stats = backend.stats();
    assert_eq!(stats.live_objects(), 0);
    assert_eq!(stats.out_of_order_releases, 0);
    assert_eq!(stats.invalid_releases, 0);
}

#[test]
fn contexts_partition_their_resources() {
    let (_backend, device) = host_device();
    let a: Context<'_> = device.create_context().unwrap();
    let b: Context<'_> = device.create_context().unwrap();
    let ta = a.create_render_texture(8, 8, TextureChannel::RGBA).unwrap();
    let tb = b.create_render_texture(8, 8, TextureChannel::RGBA).unwrap();

    a.dispose();

    assert!(ta.is_disposed());
    assert!(!tb.is_disposed());
    assert_eq!(b.texture_count().unwrap(), 1);
    assert!(matches!(b.copy_texture(&tb, &ta), Err(Error::InvalidArgument(_))));
}

#[test]
fn dropping_everything_releases_everything_once() {
    let (backend, device) = host_device();
    {
        let shader = device
            .register_compute_shader("Fill.ttcomp", Some(&general_source()))
            .unwrap();
        let ctx: Context<'_> = device.create_context().unwrap();
        let _tex = ctx.create_render_texture(8, 8, TextureChannel::RGBA).unwrap();
        let _buf = ctx.allocate_storage_buffer(64, false).unwrap();
        let _handler = ctx.get_compute_handler(shader).unwrap();
        // Locals drop in reverse order, so `ctx` goes after its resources.
    }
    drop(device);

    let stats = backend.stats();
    assert_eq!(stats.live_objects(), 0);
    assert_eq!(stats.released, 5);
    assert_eq!(stats.invalid_releases, 0);
    assert_eq!(stats.out_of_order_releases, 0);
}

#[test]
fn first_context_closes_registration() {
    let (_backend, device) = host_device();
    assert!(device.registration_open());
    device
        .register_compute_shader("Early.ttcomp", Some(&general_source()))
        .unwrap();

    let ctx: Context<'_> = device.create_context().unwrap();
    assert!(!device.registration_open());
    let err = device
        .register_compute_shader("Late.ttcomp", Some(&general_source()))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)), "{err}");
    assert!(matches!(
        device.set_default_format(texgpu::TextureFormat::Float),
        Err(Error::InvalidState(_))
    ));

    // Closing is permanent, even with no live context left.
    ctx.dispose();
    assert_eq!(device.live_contexts(), 0);
    assert!(!device.registration_open());
    assert!(matches!(
        device.register_compute_shader("Later.ttcomp", Some(&general_source())),
        Err(Error::InvalidState(_))
    ));
}

struct Session<'d> {
    context: Context<'d>,
}

impl<'d> From<Context<'d>> for Session<'d> {
    fn from(context: Context<'d>) -> Self {
        Self { context }
    }
}

#[test]
fn create_context_builds_wrapper_types() {
    let (_backend, device) = host_device();
    let session: Session<'_> = device.create_context().unwrap();
    assert!(!session.context.is_disposed());
    assert_eq!(device.live_contexts(), 1);
    drop(session);
    assert_eq!(device.live_contexts(), 0);
}

#[test]
fn keys_do_not_cross_devices() {
    let (_backend, first) = host_device();
    let second = texgpu::Device::host(DevicePreference::IntegratedGpuOrCpu).unwrap();
    let key = first
        .register_compute_shader("Fill.ttcomp", Some(&general_source()))
        .unwrap();

    let ctx: Context<'_> = second.create_context().unwrap();
    assert!(matches!(ctx.get_compute_handler(key), Err(Error::InvalidArgument(_))));
}

#[test]
fn resources_do_not_cross_contexts() {
    let (_backend, device) = host_device();
    let shader = device
        .register_compute_shader("Fill.ttcomp", Some(&general_source()))
        .unwrap();
    let a: Context<'_> = device.create_context().unwrap();
    let b: Context<'_> = device.create_context().unwrap();
    let handler = a.get_compute_handler(shader).unwrap();
    let foreign = b.create_render_texture(8, 8, TextureChannel::RGBA).unwrap();
    let slot = handler.name_to_slot("tex").unwrap();

    assert!(matches!(
        handler.set_render_texture(slot, &foreign),
        Err(Error::InvalidArgument(_))
    ));
    let buffer = b.upload_storage_buffer(&[7u8; 8], true).unwrap();
    let mut out = [0u8; 8];
    assert!(matches!(a.download_buffer(&mut out, &buffer), Err(Error::InvalidArgument(_))));
    assert!(!buffer.is_disposed());
    assert_eq!(b.buffer_count().unwrap(), 1);

    b.download_buffer(&mut out, &buffer).unwrap();
    assert_eq!(out, [7; 8]);
    assert!(buffer.is_disposed());
}

#[test]
fn shader_source_is_read_from_the_path() {
    let library = ShaderLibrary::new("from-path");
    let path = library.write("general/ColorFill.ttcomp", &general_source());
    let (_backend, device) = host_device();
    let key = device.register_compute_shader(&path, None).unwrap();

    let ctx: Context<'_> = device.create_context().unwrap();
    let handler = ctx.get_compute_handler(key).unwrap();
    assert_eq!(handler.name_to_slot("tex").unwrap(), 1);
}

#[test]
fn missing_shader_file_is_an_io_error() {
    let library = ShaderLibrary::new("missing-file");
    let path = library.root().join("general/Nowhere.ttcomp");
    let (_backend, device) = host_device();
    let err = device.register_compute_shader(&path, None).unwrap_err();
    assert!(matches!(&err, Error::Io { path: p, .. } if *p == path), "{err}");
}

#[test]
fn compile_failure_carries_the_submitted_source() {
    let (_backend, device) = host_device();
    let broken = "@compute @workgroup_size(8, 8, 1)\nfn cs_main( {\n";
    let err = device
        .register_compute_shader("Broken.ttcomp", Some(broken))
        .unwrap_err();
    match err {
        Error::ShaderCompile { path, source_text, .. } => {
            assert_eq!(path, std::path::Path::new("Broken.ttcomp"));
            assert_eq!(source_text, broken);
        }
        other => panic!("expected a compile error, got {other}"),
    }
    // a failed compile leaves the window open
    device
        .register_compute_shader("Fill.ttcomp", Some(&general_source()))
        .unwrap();
}
