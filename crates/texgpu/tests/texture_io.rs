mod common;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use texgpu::{
    Context, Error, TextureChannel, TextureFormat, MAX_STORAGE_BUFFER_LEN, MIN_DOWNLOAD_EXTENT,
};

use common::{grab_blend_source, host_device, host_device_with_format};

#[test]
fn copy_requires_equal_sizes() {
    let (_backend, device) = host_device();
    let ctx: Context<'_> = device.create_context().unwrap();
    let big = ctx.create_render_texture(128, 64, TextureChannel::RGBA).unwrap();
    let small = ctx.create_render_texture(64, 64, TextureChannel::RGBA).unwrap();
    let other = ctx.create_render_texture(64, 64, TextureChannel::RGBA).unwrap();

    assert!(!big.equal_size(&small).unwrap());
    assert!(matches!(ctx.copy_texture(&small, &big), Err(Error::InvalidArgument(_))));
    ctx.copy_texture(&other, &small).unwrap();
}

#[test]
fn copy_requires_equal_channels() {
    let (_backend, device) = host_device();
    let ctx: Context<'_> = device.create_context().unwrap();
    let rgba = ctx.create_render_texture(64, 64, TextureChannel::RGBA).unwrap();
    let red = ctx.create_render_texture(64, 64, TextureChannel::R).unwrap();

    let err = ctx.copy_texture(&red, &rgba).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
}

#[test]
fn copy_moves_pixels() {
    let (_backend, device) = host_device();
    let ctx: Context<'_> = device.create_context().unwrap();
    let src = ctx.create_render_texture(64, 64, TextureChannel::R).unwrap();
    let dst = ctx.create_render_texture(64, 64, TextureChannel::R).unwrap();

    let pixels: Vec<u8> = (0..64 * 64).map(|i| (i % 251) as u8).collect();
    ctx.upload_texture(&src, &pixels, TextureFormat::Byte).unwrap();
    ctx.copy_texture(&dst, &src).unwrap();

    let mut out = vec![0u8; pixels.len()];
    ctx.download_texture(&mut out, TextureFormat::Byte, &dst).unwrap();
    assert_eq!(out, pixels);
}

#[test]
fn random_pixels_round_trip_under_every_default_format() {
    let mut rng = StdRng::seed_from_u64(0x7e57);
    for storage in TextureFormat::ALL {
        let (backend, device) = host_device_with_format(storage);
        assert_eq!(device.default_format(), Some(storage));
        {
            let ctx: Context<'_> = device.create_context().unwrap();
            let tex = ctx.create_render_texture(64, 64, TextureChannel::RGBA).unwrap();

            let mut pixels = vec![0u8; 64 * 64 * 4];
            rng.fill(pixels.as_mut_slice());
            ctx.upload_texture(&tex, &pixels, TextureFormat::Byte).unwrap();

            let mut out = vec![0u8; pixels.len()];
            ctx.download_texture(&mut out, TextureFormat::Byte, &tex).unwrap();
            assert_eq!(out, pixels, "default format {storage}");
        }
        drop(device);
        assert_eq!(backend.stats().live_objects(), 0);
    }
}

#[test]
fn float_download_of_byte_storage_is_normalised() {
    let (_backend, device) = host_device();
    let ctx: Context<'_> = device.create_context().unwrap();
    let tex = ctx.create_render_texture(64, 64, TextureChannel::R).unwrap();
    ctx.upload_texture(&tex, &vec![255u8; 64 * 64], TextureFormat::Byte).unwrap();

    let mut out = vec![0f32; 64 * 64];
    ctx.download_texture(&mut out, TextureFormat::Float, &tex).unwrap();
    assert!(out.iter().all(|&v| v == 1.0));
}

#[test]
fn download_requires_minimum_extent() {
    let (_backend, device) = host_device();
    let ctx: Context<'_> = device.create_context().unwrap();
    let narrow = ctx
        .create_render_texture(MIN_DOWNLOAD_EXTENT - 1, 128, TextureChannel::R)
        .unwrap();
    let mut out = vec![0u8; (MIN_DOWNLOAD_EXTENT as usize - 1) * 128];
    assert!(matches!(
        ctx.download_texture(&mut out, TextureFormat::Byte, &narrow),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn transfers_require_exact_lengths() {
    let (_backend, device) = host_device();
    let ctx: Context<'_> = device.create_context().unwrap();
    let tex = ctx.create_render_texture(64, 64, TextureChannel::RG).unwrap();

    assert!(matches!(
        ctx.upload_texture(&tex, &[0u8; 16], TextureFormat::Byte),
        Err(Error::InvalidArgument(_))
    ));
    let mut short = vec![0u16; 64 * 64];
    assert!(matches!(
        ctx.download_texture(&mut short, TextureFormat::UShort, &tex),
        Err(Error::InvalidArgument(_))
    ));
    let mut exact = vec![0u16; 64 * 64 * 2];
    ctx.download_texture(&mut exact, TextureFormat::UShort, &tex).unwrap();
    assert!(matches!(
        ctx.create_render_texture(0, 8, TextureChannel::R),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn buffer_download_consumes_the_buffer() {
    let (backend, device) = host_device();
    let ctx: Context<'_> = device.create_context().unwrap();
    let values = [1u32, 2, 3, 5, 8, 13];
    let buffer = ctx.upload_storage_buffer(&values, true).unwrap();
    assert_eq!(buffer.len().unwrap(), 24);
    assert_eq!(ctx.buffer_count().unwrap(), 1);

    let mut out = [0u32; 6];
    ctx.download_buffer(&mut out, &buffer).unwrap();
    assert_eq!(out, values);
    assert_eq!(ctx.buffer_count().unwrap(), 0);
    assert_eq!(backend.stats().buffers, 0);
}

#[test]
fn buffer_download_reads_a_prefix() {
    let (_backend, device) = host_device();
    let ctx: Context<'_> = device.create_context().unwrap();
    let buffer = ctx.upload_storage_buffer(&[10u8, 20, 30, 40, 50], true).unwrap();
    let mut out = [0u8; 3];
    ctx.download_buffer(&mut out, &buffer).unwrap();
    assert_eq!(out, [10, 20, 30]);

    let buffer = ctx.allocate_storage_buffer(4, true).unwrap();
    let mut too_long = [0u8; 5];
    assert!(matches!(
        ctx.download_buffer(&mut too_long, &buffer),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(ctx.buffer_count().unwrap(), 1);
    let mut exact = [1u8; 4];
    ctx.download_buffer(&mut exact, &buffer).unwrap();
    assert_eq!(exact, [0; 4]);
    assert_eq!(ctx.buffer_count().unwrap(), 0);
}

#[test]
fn non_downloadable_buffer_survives_a_rejected_download() {
    let (backend, device) = host_device();
    let grab = device
        .register_compute_shader("Grab.ttcomp", Some(&grab_blend_source()))
        .unwrap();
    let ctx: Context<'_> = device.create_context().unwrap();
    let handler = ctx.get_compute_handler(grab).unwrap();
    let src = ctx.create_render_texture(64, 64, TextureChannel::RGBA).unwrap();
    let dst = ctx.create_render_texture(64, 64, TextureChannel::RGBA).unwrap();
    let buffer = ctx.allocate_storage_buffer(32, false).unwrap();
    assert!(!buffer.is_downloadable().unwrap());
    handler.set_render_texture(handler.name_to_slot("rw_tex").unwrap(), &dst).unwrap();
    handler.set_render_texture(handler.name_to_slot("src_tex").unwrap(), &src).unwrap();
    handler
        .set_storage_buffer(handler.name_to_slot("weights").unwrap(), &buffer)
        .unwrap();

    let mut out = [0u8; 32];
    let err = ctx.download_buffer(&mut out, &buffer).unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)), "{err}");
    assert!(!buffer.is_disposed());
    assert_eq!(backend.stats().buffers, 1);
    handler.dispatch(1, 1, 1).unwrap();
}

#[test]
fn oversized_buffer_is_an_argument_error() {
    let (backend, device) = host_device();
    let ctx: Context<'_> = device.create_context().unwrap();
    for len in [usize::MAX - 1, MAX_STORAGE_BUFFER_LEN + 1] {
        assert!(matches!(
            ctx.allocate_storage_buffer(len, false),
            Err(Error::InvalidArgument(_))
        ));
    }
    assert_eq!(ctx.buffer_count().unwrap(), 0);
    assert_eq!(backend.stats().buffers, 0);
}
