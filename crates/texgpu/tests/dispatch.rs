mod common;

use texgpu::{Context, Error, TextureChannel, WorkGroupSize};

use common::{general_source, grab_blend_source, host_device};

#[test]
fn bindings_resolve_by_name() {
    let (_backend, device) = host_device();
    let fill = device
        .register_compute_shader("ColorFill.ttcomp", Some(&general_source()))
        .unwrap();
    let ctx: Context<'_> = device.create_context().unwrap();
    let handler = ctx.get_compute_handler(fill).unwrap();

    assert_eq!(handler.name_to_slot("gv").unwrap(), 0);
    assert_eq!(handler.name_to_slot("tex").unwrap(), 1);
    let err = handler.name_to_slot("nope").unwrap_err();
    assert!(matches!(err, Error::Lookup { kind: "binding", .. }), "{err}");
    assert_eq!(handler.shader_key().unwrap(), fill);
}

#[test]
fn work_group_size_is_reflected() {
    let (_backend, device) = host_device();
    let fill = device
        .register_compute_shader("ColorFill.ttcomp", Some(&general_source()))
        .unwrap();
    let grab = device
        .register_compute_shader("Grab.ttcomp", Some(&grab_blend_source()))
        .unwrap();
    assert_ne!(fill, grab);
    let ctx: Context<'_> = device.create_context().unwrap();

    let fill = ctx.get_compute_handler(fill).unwrap();
    let grab = ctx.get_compute_handler(grab).unwrap();
    assert_eq!(fill.work_group_size().unwrap(), WorkGroupSize::new(16, 16, 1));
    assert_eq!(grab.work_group_size().unwrap(), WorkGroupSize::new(32, 32, 1));
}

#[test]
fn dispatch_requires_every_binding() {
    let (backend, device) = host_device();
    let fill = device
        .register_compute_shader("ColorFill.ttcomp", Some(&general_source()))
        .unwrap();
    let ctx: Context<'_> = device.create_context().unwrap();
    let handler = ctx.get_compute_handler(fill).unwrap();
    let target = ctx.create_render_texture(100, 40, TextureChannel::RGBA).unwrap();

    let err = handler.dispatch(1, 1, 1).unwrap_err();
    assert!(matches!(err, Error::NativeOperation { operation: "dispatch", .. }), "{err}");

    handler
        .set_render_texture(handler.name_to_slot("tex").unwrap(), &target)
        .unwrap();
    handler
        .upload_constants_buffer(handler.name_to_slot("gv").unwrap(), &[1.0f32, 0.5, 0.25, 1.0])
        .unwrap();
    handler.dispatch_for_texture(&target).unwrap();

    let raw = handler.raw_handle().unwrap();
    assert_eq!(backend.handler_dispatches(raw), Some(1));
    assert_eq!(backend.stats().dispatches, 1);
    let constants = backend.uploaded_binding(raw, 0).unwrap();
    assert_eq!(constants.len(), 16);
}

#[test]
fn constants_must_match_the_uniform_size() {
    let (_backend, device) = host_device();
    let fill = device
        .register_compute_shader("ColorFill.ttcomp", Some(&general_source()))
        .unwrap();
    let ctx: Context<'_> = device.create_context().unwrap();
    let handler = ctx.get_compute_handler(fill).unwrap();

    let err = handler.upload_constants_buffer(0, &[1.0f32; 3]).unwrap_err();
    assert!(matches!(err, Error::NativeOperation { .. }), "{err}");
    let err = handler.upload_constants_buffer(7, &[1.0f32; 4]).unwrap_err();
    assert!(matches!(err, Error::NativeOperation { .. }), "{err}");
}

#[test]
fn zero_group_count_is_rejected() {
    let (_backend, device) = host_device();
    let fill = device
        .register_compute_shader("ColorFill.ttcomp", Some(&general_source()))
        .unwrap();
    let ctx: Context<'_> = device.create_context().unwrap();
    let handler = ctx.get_compute_handler(fill).unwrap();
    assert!(matches!(handler.dispatch(0, 1, 1), Err(Error::InvalidArgument(_))));
}

#[test]
fn disposed_binding_blocks_dispatch() {
    let (_backend, device) = host_device();
    let grab = device
        .register_compute_shader("Grab.ttcomp", Some(&grab_blend_source()))
        .unwrap();
    let ctx: Context<'_> = device.create_context().unwrap();
    let handler = ctx.get_compute_handler(grab).unwrap();
    let src = ctx.create_render_texture(64, 64, TextureChannel::RGBA).unwrap();
    let dst = ctx.create_render_texture(64, 64, TextureChannel::RGBA).unwrap();
    let weights = ctx.allocate_storage_buffer(64 * 64 * 4, false).unwrap();

    handler.set_render_texture(handler.name_to_slot("src_tex").unwrap(), &src).unwrap();
    handler.set_render_texture(handler.name_to_slot("rw_tex").unwrap(), &dst).unwrap();
    handler
        .set_storage_buffer(handler.name_to_slot("weights").unwrap(), &weights)
        .unwrap();
    handler.dispatch_extent(64, 64, 1).unwrap();

    src.dispose();
    let err = handler.dispatch_extent(64, 64, 1).unwrap_err();
    assert!(matches!(err, Error::NativeOperation { .. }), "{err}");
    assert!(matches!(
        handler.set_render_texture(0, &src),
        Err(Error::Disposed("render texture"))
    ));
}

#[test]
fn inline_storage_binding_satisfies_dispatch() {
    let (backend, device) = host_device();
    let grab = device
        .register_compute_shader("Grab.ttcomp", Some(&grab_blend_source()))
        .unwrap();
    let ctx: Context<'_> = device.create_context().unwrap();
    let handler = ctx.get_compute_handler(grab).unwrap();
    let src = ctx.create_render_texture(64, 64, TextureChannel::RGBA).unwrap();
    let dst = ctx.create_render_texture(64, 64, TextureChannel::RGBA).unwrap();

    handler.set_render_texture(1, &src).unwrap();
    handler.set_render_texture(0, &dst).unwrap();
    handler.upload_storage_buffer(2, &[0.25f32, 0.5, 0.75]).unwrap();
    handler.dispatch(2, 2, 1).unwrap();

    let stored = backend.uploaded_binding(handler.raw_handle().unwrap(), 2).unwrap();
    assert_eq!(stored.len(), 16);
    assert_eq!(&stored[..12], ne_bytes(&[0.25f32, 0.5, 0.75]).as_slice());
}

fn ne_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

#[test]
fn handler_count_tracks_creation_and_disposal() {
    let (_backend, device) = host_device();
    let fill = device
        .register_compute_shader("ColorFill.ttcomp", Some(&general_source()))
        .unwrap();
    let ctx: Context<'_> = device.create_context().unwrap();
    let a = ctx.get_compute_handler(fill).unwrap();
    let b = ctx.get_compute_handler(fill).unwrap();
    assert_ne!(a.raw_handle().unwrap(), b.raw_handle().unwrap());
    assert_eq!(ctx.handler_count().unwrap(), 2);
    drop(a);
    assert_eq!(ctx.handler_count().unwrap(), 1);
    b.dispose();
    assert_eq!(ctx.handler_count().unwrap(), 0);
}
