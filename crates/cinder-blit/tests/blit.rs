//! End-to-end tests for the native backend, decoding the packet streams it
//! records against the software device.

use std::sync::Arc;

use cinder_blit::NativeContext;
use cinder_cmd::packet::{pkt3, Pkt3Op, IB_ALIGN_WORDS};
use cinder_core::{
    BlitOp, Box2, Color, ImageFlags, Source, FOURCC_ARGB8888, FOURCC_XRGB8888,
};
use cinder_test_framework::{SoftDevice, SubmissionRecord};

// =============================================================================
// STREAM DECODING
// =============================================================================

/// A decoded draw packet: (stream index, vertex count)
fn draw_packets(words: &[u32]) -> Vec<(usize, u32)> {
    let header = pkt3(Pkt3Op::DrawIndexAuto, 1);
    words
        .iter()
        .enumerate()
        .filter(|(_, w)| **w == header)
        .map(|(i, _)| (i, words[i + 1]))
        .collect()
}

/// Payload runs of SET_SH_REG packets starting at the given packed register
/// index: (stream index, payload words)
fn sh_reg_writes(words: &[u32], packed_index: u32) -> Vec<(usize, Vec<u32>)> {
    let mut out = Vec::new();
    for (i, w) in words.iter().enumerate() {
        if w >> 30 == 3 && (w >> 8) & 0xff == Pkt3Op::SetShReg as u32 {
            let count = ((w >> 16) & 0x3fff) as usize;
            if words.get(i + 1) == Some(&packed_index) {
                out.push((i, words[i + 2..i + 2 + count].to_vec()));
            }
        }
    }
    out
}

/// Packed register index of SPI_SHADER_PGM_LO_PS
const PGM_LO_PS: u32 = (0xb020 - 0xb000) >> 2;
/// Packed register index of SPI_SHADER_USER_DATA_VS_3
const USER_DATA_VS_3: u32 = (0xb13c - 0xb000) >> 2;

fn stream(dev: &SoftDevice, sub: &SubmissionRecord) -> Vec<u32> {
    dev.read_words(sub.ib_addr, sub.ib_len_words as usize)
}

fn backend() -> (Arc<SoftDevice>, NativeContext<SoftDevice>) {
    let dev = Arc::new(SoftDevice::new());
    let ctx = NativeContext::new(Arc::clone(&dev)).unwrap();
    (dev, ctx)
}

fn solid(red: u16, green: u16, blue: u16, alpha: u16) -> Source {
    Source::Solid(cinder_core::SolidOperand {
        color: Color::new(red, green, blue, alpha),
    })
}

// =============================================================================
// BATCHING PROPERTIES
// =============================================================================

#[test]
fn batched_rects_accumulate_into_one_draw() {
    let (dev, mut ctx) = backend();
    let a = ctx
        .create_image(256, 256, FOURCC_XRGB8888, ImageFlags::DST)
        .unwrap();
    ctx.setup(BlitOp::Src, Some(a), Some(solid(0, 0, 0xffff, 0xffff)), None)
        .unwrap();
    for i in 0..4 {
        ctx.append_rects(&[Box2::from_extent(i * 8, 0, 8, 8)]).unwrap();
    }
    ctx.submit().unwrap();

    let subs = dev.submissions();
    assert_eq!(subs.len(), 1);
    let words = stream(&dev, &subs[0]);
    let draws = draw_packets(&words);
    assert_eq!(draws.len(), 1, "one draw per flush boundary");
    assert_eq!(draws[0].1, 4 * 3, "three vertices per rectangle");
    assert_eq!(subs[0].ib_len_words % IB_ALIGN_WORDS, 0);
}

#[test]
fn empty_batch_still_emits_one_zero_length_draw() {
    let (dev, mut ctx) = backend();
    let a = ctx
        .create_image(64, 64, FOURCC_XRGB8888, ImageFlags::DST)
        .unwrap();
    ctx.setup(BlitOp::Src, Some(a), Some(solid(0, 0, 0, 0)), None)
        .unwrap();
    ctx.submit().unwrap();

    let subs = dev.submissions();
    assert_eq!(subs.len(), 1);
    let draws = draw_packets(&stream(&dev, &subs[0]));
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].1, 0);
}

#[test]
fn stream_opens_with_init_block_replay() {
    let (dev, mut ctx) = backend();
    let a = ctx
        .create_image(64, 64, FOURCC_XRGB8888, ImageFlags::DST)
        .unwrap();
    ctx.setup(BlitOp::Src, Some(a), None, None).unwrap();
    ctx.submit().unwrap();

    let words = stream(&dev, &dev.submissions()[0]);
    // The first packet jumps into the shared init block by reference.
    assert_eq!(words[0], pkt3(Pkt3Op::IndirectBuffer, 2));
    let init_addr = words[1] as u64 | (words[2] as u64) << 32;
    let init_len = words[3];
    assert_eq!(init_len % IB_ALIGN_WORDS, 0);
    // The init block itself starts with CLEAR_STATE.
    let init = dev.read_words(cinder_core::GpuAddr::new(init_addr), 2);
    assert_eq!(init[0], pkt3(Pkt3Op::ClearState, 0));
}

// =============================================================================
// DESTINATION / SOURCE TRANSITIONS
// =============================================================================

#[test]
fn destination_change_submits_previous_batch_once() {
    let (dev, mut ctx) = backend();
    let a = ctx
        .create_image(256, 256, FOURCC_XRGB8888, ImageFlags::DST)
        .unwrap();
    let b = ctx
        .create_image(128, 128, FOURCC_XRGB8888, ImageFlags::DST)
        .unwrap();
    let src = solid(0xffff, 0xffff, 0, 0xffff);
    ctx.setup(BlitOp::Src, Some(a), Some(src), None).unwrap();
    ctx.append_rects(&[Box2::new(0, 0, 32, 32)]).unwrap();

    ctx.setup(BlitOp::Src, Some(b), Some(src), None).unwrap();
    let subs = dev.submissions();
    assert_eq!(subs.len(), 1, "exactly one submit for the old destination");
    let draws = draw_packets(&stream(&dev, &subs[0]));
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].1, 3);

    // The new destination records from position zero.
    ctx.append_rects(&[Box2::new(0, 0, 8, 8)]).unwrap();
    ctx.submit().unwrap();
    let subs = dev.submissions();
    assert_eq!(subs.len(), 2);
    let words = stream(&dev, &subs[1]);
    let vs3 = sh_reg_writes(&words, USER_DATA_VS_3);
    assert_eq!(vs3.len(), 1);
    assert_eq!(vs3[0].1[0], 0, "start vertex resets with the destination");
}

#[test]
fn source_change_mid_batch_flushes_under_old_shader() {
    let (dev, mut ctx) = backend();
    let a = ctx
        .create_image(256, 256, FOURCC_XRGB8888, ImageFlags::DST)
        .unwrap();
    let b = ctx
        .create_image(128, 128, FOURCC_ARGB8888, ImageFlags::SRC)
        .unwrap();

    ctx.setup(BlitOp::Src, Some(a), Some(solid(0xffff, 0, 0, 0xffff)), None)
        .unwrap();
    ctx.append_rects(&[Box2::new(0, 0, 128, 128)]).unwrap();
    // Source change mid-destination: the solid batch must be drawn with the
    // fill shader before the copy shader is bound.
    ctx.setup(BlitOp::Src, Some(a), Some(Source::Image(b)), None)
        .unwrap();
    ctx.submit().unwrap();

    let subs = dev.submissions();
    assert_eq!(subs.len(), 1);
    let words = stream(&dev, &subs[0]);

    let ps_binds = sh_reg_writes(&words, PGM_LO_PS);
    assert_eq!(ps_binds.len(), 2, "fill bind, then copy bind");
    assert_ne!(ps_binds[0].1[0], ps_binds[1].1[0], "different programs");

    let draws = draw_packets(&words);
    assert_eq!(draws.len(), 2, "solid flush plus the final submit flush");
    assert_eq!(draws[0].1, 3, "the solid rectangle");
    assert!(
        ps_binds[0].0 < draws[0].0 && draws[0].0 < ps_binds[1].0,
        "solid draw sits between the two shader binds"
    );
    assert_eq!(draws[1].1, 0, "nothing was appended under the copy shader");
}

// =============================================================================
// DEPENDENCY LISTS
// =============================================================================

#[test]
fn submission_lists_every_referenced_buffer() {
    let (dev, mut ctx) = backend();
    let a = ctx
        .create_image(256, 256, FOURCC_XRGB8888, ImageFlags::DST)
        .unwrap();
    ctx.setup(BlitOp::Src, Some(a), Some(solid(0xffff, 0, 0, 0xffff)), None)
        .unwrap();
    ctx.append_rects(&[Box2::new(0, 0, 128, 128)]).unwrap();
    // A source-only image created after everything else: the one live
    // allocation the stream does not touch.
    let b = ctx
        .create_image(128, 128, FOURCC_XRGB8888, ImageFlags::SRC)
        .unwrap();
    ctx.setup(BlitOp::Src, Some(a), Some(Source::Image(b)), None)
        .unwrap();
    ctx.submit().unwrap();

    let subs = dev.submissions();
    assert_eq!(subs.len(), 1);
    let resources = &subs[0].resources;
    // Command, vertex, the three shaders, the init block, and image A.
    assert_eq!(resources.len(), 7);
    let mut unique = resources.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 7, "no duplicate handles");

    let live = dev.live_allocation_handles();
    assert_eq!(live.len(), 8);
    let absent: Vec<_> = live
        .iter()
        .copied()
        .filter(|h| !resources.contains(h))
        .collect();
    assert_eq!(absent.len(), 1, "only the untouched source surface is absent");
    let max_handle = live.iter().map(|h| h.id()).max().unwrap();
    assert_eq!(
        absent[0].id(),
        max_handle,
        "the absent allocation is the last-created surface (image B)"
    );
    assert_eq!(dev.live_resource_lists(), 0, "temporary list released");
}

// =============================================================================
// REUSE BETWEEN SUBMISSIONS
// =============================================================================

#[test]
fn submission_reuse_produces_independent_streams() {
    let (dev, mut ctx) = backend();
    let a = ctx
        .create_image(256, 256, FOURCC_XRGB8888, ImageFlags::DST)
        .unwrap();
    let src = solid(0, 0xffff, 0, 0xffff);

    for round in 0..2 {
        ctx.setup(BlitOp::Src, Some(a), Some(src), None).unwrap();
        ctx.append_rects(&[Box2::new(round, round, round + 16, round + 16)])
            .unwrap();
        ctx.submit().unwrap();
    }

    let subs = dev.submissions();
    assert_eq!(subs.len(), 2);
    assert_eq!(
        subs[0].ib_addr, subs[1].ib_addr,
        "buffer memory is reused in place between submissions"
    );
    for sub in &subs {
        let words = stream(&dev, sub);
        assert_eq!(words[0], pkt3(Pkt3Op::IndirectBuffer, 2));
        let draws = draw_packets(&words);
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].1, 3);
        let vs3 = sh_reg_writes(&words, USER_DATA_VS_3);
        assert_eq!(vs3[0].1[0], 0, "each stream draws from vertex zero");
    }
}

// =============================================================================
// FILL CONSTANTS
// =============================================================================

#[test]
fn solid_color_is_normalized_into_shader_constants() {
    let (dev, mut ctx) = backend();
    let a = ctx
        .create_image(64, 64, FOURCC_ARGB8888, ImageFlags::DST)
        .unwrap();
    ctx.setup(
        BlitOp::Src,
        Some(a),
        Some(solid(0xffff, 0, 0x8000, 0xffff)),
        None,
    )
    .unwrap();
    ctx.submit().unwrap();

    let words = stream(&dev, &dev.submissions()[0]);
    const USER_DATA_PS_2: u32 = (0xb038 - 0xb000) >> 2;
    let consts = sh_reg_writes(&words, USER_DATA_PS_2);
    assert_eq!(consts.len(), 1);
    let payload = &consts[0].1;
    assert_eq!(payload.len(), 4);
    assert_eq!(f32::from_bits(payload[0]), 1.0);
    assert_eq!(f32::from_bits(payload[1]), 0.0);
    let blue = f32::from_bits(payload[2]);
    assert!(blue > 0.5 && blue < 0.5001);
    assert_eq!(f32::from_bits(payload[3]), 1.0, "alpha is normalized too");
}
