//! # Native Backend Context
//!
//! The state machine driving the hand-encoded command stream. Two states:
//! Idle (no destination bound) and Active (a destination's draw context is
//! recording). Binding a destination replays the static init block and
//! programs the full pipeline for that target; binding a source flushes
//! the pending batch and switches the pixel shader. Nothing is emitted for
//! state that has not changed.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;

use cinder_cmd::vertex::{VERTS_PER_RECT, WORDS_PER_VERTEX};
use cinder_cmd::{CmdBuf, EventType, VertBuf};
use cinder_core::{
    BlitBackend, BlitOp, Box2, ChipClass, Color, Error, GpuAddr, GpuDevice, ImageFlags, ImageId,
    PixelFormat, Result, SolidOperand, Source,
};

use crate::image::{DrawConfig, DrawContext, Image};
use crate::profile::{apply_ops, ChipProfile, FIXED_FUNC_DEFAULTS};
use crate::regs::{self, cb_color_info, gcr, pgm_rsrc1, pgm_hi, prim_type, scissor};
use crate::shader::{
    Shader, ShaderInfo, COPY_CODE, COPY_INFO, FILL_CODE, FILL_INFO, VERT_CODE, VERT_INFO,
};

// =============================================================================
// PER-BIND STATE VALUES
// =============================================================================

/// DX10 diamond test for line rasterization
const LINE_CNTL_DIAMOND_TEST: u32 = 1 << 12;

/// 256x256 bins, no start-of-prim, 63 fpovs per batch, optimal bin
/// selection, flush on binning transition
const BINNER_CNTL_0: u32 = 1 << 3 | 2 << 4 | 2 << 6 | 63 << 16 | 1 << 24 | 1 << 25;

/// Deferred-shading punchout forced off
const DFSM_PUNCHOUT_FORCE_OFF: u32 = 2;

/// Overwrite-combiner watermark 6, constant-encode registers disabled
const DCC_CONTROL: u32 = 6 << 2 | 1 << 18;

/// Identity viewport transform: scale (1, 1, 0), offset (0, 0, 0)
const VIEWPORT_IDENTITY: [u32; 6] = [0x3f80_0000, 0, 0x3f80_0000, 0, 0, 0];

/// Guardband discard/clip adjustment, vertical and horizontal
const GUARDBAND: [u32; 4] = [0x4322_d5c3, 0x3f80_0000, 0x4322_d5c3, 0x3f80_0000];

#[inline]
fn f32_bits(value: i32) -> u32 {
    (value as f32).to_bits()
}

// =============================================================================
// SHADER SET
// =============================================================================

pub(crate) struct ShaderSet<D: GpuDevice> {
    pub(crate) vert: Shader<D>,
    pub(crate) fill: Shader<D>,
    pub(crate) copy: Shader<D>,
}

impl<D: GpuDevice> ShaderSet<D> {
    fn upload(dev: &Arc<D>) -> Result<Self> {
        Ok(Self {
            vert: Shader::upload(dev, VERT_CODE, VERT_INFO)?,
            fill: Shader::upload(dev, FILL_CODE, FILL_INFO)?,
            copy: Shader::upload(dev, COPY_CODE, COPY_INFO)?,
        })
    }
}

// =============================================================================
// NATIVE CONTEXT
// =============================================================================

/// The native direct-submission backend
///
/// Owns the device queue handle, the three preloaded shaders, the static
/// init block, every image created through it, and the currently bound
/// operands. Driven from exactly one thread; every call runs to completion.
pub struct NativeContext<D: GpuDevice> {
    pub(crate) dev: Arc<D>,
    pub(crate) profile: &'static ChipProfile,
    config: DrawConfig,
    pub(crate) shaders: ShaderSet<D>,
    pub(crate) init: CmdBuf<D>,
    pub(crate) images: BTreeMap<u64, Image<D>>,
    next_image: u64,
    op: BlitOp,
    pub(crate) dst: Option<ImageId>,
    pub(crate) src: Option<Source>,
    dst_off: (i32, i32),
    src_off: (i32, i32),
}

impl<D: GpuDevice> NativeContext<D> {
    /// Create a backend over an externally opened device
    pub fn new(dev: Arc<D>) -> Result<Self> {
        Self::with_config(dev, DrawConfig::default())
    }

    /// Create a backend with explicit buffer capacities
    pub fn with_config(dev: Arc<D>, config: DrawConfig) -> Result<Self> {
        let profile = ChipProfile::probe(dev.info().family)?;
        let shaders = ShaderSet::upload(&dev)?;

        // The static init block is built once and only ever replayed by
        // reference from per-destination streams.
        let mut init = CmdBuf::new(&dev, config.init_bytes)?;
        apply_ops(&mut init, profile.class, profile.init_ops);
        init.pad(cinder_cmd::packet::IB_ALIGN_WORDS);

        log::debug!(
            "native backend up: {:?}, init block {} words",
            profile.class,
            init.len()
        );

        Ok(Self {
            dev,
            profile,
            config,
            shaders,
            init,
            images: BTreeMap::new(),
            next_image: 1,
            op: BlitOp::Src,
            dst: None,
            src: None,
            dst_off: (0, 0),
            src_off: (0, 0),
        })
    }

    /// The translation applied to destination and source coordinates by
    /// the vertex shader; owned by the front end, forwarded here
    pub fn set_offsets(&mut self, dst: (i32, i32), src: (i32, i32)) {
        self.dst_off = dst;
        self.src_off = src;
    }

    /// The composite operation recorded by the last accepted `setup`
    pub fn op(&self) -> BlitOp {
        self.op
    }

    fn image(&self, id: ImageId) -> Result<&Image<D>> {
        self.images.get(&id.id()).ok_or(Error::UnknownImage)
    }

    pub(crate) fn draw_of(&mut self, id: ImageId) -> &mut DrawContext<D> {
        self.images
            .get_mut(&id.id())
            .and_then(Image::draw_mut)
            .expect("bound destination lost its draw context")
    }

    // =========================================================================
    // IMAGE LIFECYCLE
    // =========================================================================

    /// Create an image
    pub fn create_image(
        &mut self,
        width: u32,
        height: u32,
        fourcc: u32,
        flags: ImageFlags,
    ) -> Result<ImageId> {
        let format = PixelFormat::from_fourcc(fourcc).ok_or(Error::UnsupportedFormat)?;
        let image = Image::create(
            &self.dev,
            self.profile,
            &self.config,
            width,
            height,
            format,
            flags.contains(ImageFlags::DST),
        )?;
        let id = self.next_image;
        self.next_image += 1;
        self.images.insert(id, image);
        Ok(ImageId::new(id))
    }

    /// Create a solid-color source operand
    pub fn create_solid(&self, color: Color) -> SolidOperand {
        SolidOperand { color }
    }

    /// Destroy an image; rejected while the image is a bound operand
    pub fn destroy_image(&mut self, image: ImageId) -> Result<()> {
        if self.dst == Some(image) || self.src == Some(Source::Image(image)) {
            return Err(Error::ImageInUse);
        }
        self.images
            .remove(&image.id())
            .map(drop)
            .ok_or(Error::UnknownImage)
    }

    // =========================================================================
    // SETUP - THE STATE MACHINE
    // =========================================================================

    /// Bind the operands for subsequent rectangles
    pub fn setup(
        &mut self,
        op: BlitOp,
        dst: Option<ImageId>,
        src: Option<Source>,
        mask: Option<ImageId>,
    ) -> Result<()> {
        if mask.is_some() {
            return Err(Error::MaskUnsupported);
        }

        // Validate both operands before any packet is emitted or any batch
        // is flushed, so a rejected call leaves every recorded state and
        // stream untouched.
        if let Some(id) = dst {
            if self.image(id)?.draw().is_none() {
                return Err(Error::NotDrawable);
            }
        }
        let src_desc = match src {
            Some(Source::Image(id)) => {
                Some(*self.images.get(&id.id()).ok_or(Error::UnknownSource)?.descriptor())
            }
            _ => None,
        };

        if dst != self.dst {
            if self.dst.is_some() {
                self.submit()?;
            }
            match dst {
                None => {
                    self.op = op;
                    return Ok(());
                }
                Some(id) => self.bind_destination(id),
            }
        }

        if src != self.src {
            if let Some(dst_id) = self.dst {
                // Geometry batched so far must not be drawn with the new
                // source's shader.
                if self.draw_of(dst_id).vert.pending_vertices() > 0 {
                    self.flush_draw();
                }
                match src {
                    Some(Source::Image(_)) => {
                        let desc = src_desc.expect("validated above");
                        self.bind_copy_source(dst_id, &desc);
                    }
                    Some(Source::Solid(solid)) => self.bind_fill_source(dst_id, solid.color),
                    None => {}
                }
            }
            self.src = src;
        }

        self.op = op;
        Ok(())
    }

    /// Program the full pipeline for a freshly bound destination
    fn bind_destination(&mut self, id: ImageId) {
        let class = self.profile.class;
        let swizzle = self.profile.swizzle_mode;
        let init_addr = self.init.addr();
        let init_len = self.init.len();
        let vs_addr = self.shaders.vert.addr();
        let vs_info = self.shaders.vert.info();

        let img = self.images.get_mut(&id.id()).expect("validated by setup");
        let (width, height, target) = (img.width(), img.height(), img.addr());
        let DrawContext { cmd, vert } = img.draw_mut().expect("validated by setup");

        // Entering Active resets both recording positions; contents are
        // reused in place between submissions.
        cmd.reset();
        vert.reset();

        // Replay the static init block by reference.
        cmd.indirect_buffer(init_addr, init_len);

        // Quiesce the relevant shader stages, then invalidate every cache
        // so the new target state is observed.
        cmd.event_write(EventType::PsPartialFlush);
        cmd.event_write(EventType::CsPartialFlush);
        cmd.acquire_mem(gcr::INVALIDATE_ALL);
        cmd.event_write(EventType::PipelinestatStart);

        // Geometry source for the vertex shader: the buffer descriptor at
        // the head of this destination's vertex buffer.
        cmd.set_sh_reg(regs::SPI_SHADER_USER_DATA_VS_2, vert.addr().lo());

        // Multisample state: single sample, all mask bits, no centroids.
        cmd.set_context_regs(regs::PA_SC_LINE_CNTL, &[LINE_CNTL_DIAMOND_TEST, 0]);
        cmd.set_context_reg(
            regs::PA_SC_MODE_CNTL_0,
            // VPORT_SCISSOR_ENABLE; alternate RB selection per tile on gfx9+
            1 << 1 | (class.is_gfx9_plus() as u32) << 2,
        );
        cmd.set_context_regs(regs::PA_SC_CENTROID_PRIORITY_0, &[0, 0]);
        cmd.set_context_reg(regs::PA_SC_AA_SAMPLE_LOCS_X0Y0, 0);
        cmd.set_context_reg(regs::PA_SC_AA_SAMPLE_LOCS_X1Y0, 0);
        cmd.set_context_reg(regs::PA_SC_AA_SAMPLE_LOCS_X0Y1, 0);
        cmd.set_context_reg(regs::PA_SC_AA_SAMPLE_LOCS_X1Y1, 0);

        // Binning state.
        if class.is_gfx9_plus() {
            cmd.set_context_reg(regs::PA_SC_BINNER_CNTL_0, BINNER_CNTL_0);
            let dfsm = if class == ChipClass::Gfx10 {
                regs::DB_DFSM_CONTROL_GFX10
            } else {
                regs::DB_DFSM_CONTROL_GFX9
            };
            cmd.set_context_reg(dfsm, DFSM_PUNCHOUT_FORCE_OFF);
        }

        // Vertex shader program and resources.
        cmd.set_sh_regs(
            regs::SPI_SHADER_PGM_LO_VS,
            &[
                vs_addr.shifted(8),
                pgm_hi::mem_base(vs_addr.shifted(40)),
                vs_info.rsrc1
                    | pgm_rsrc1::float_mode(pgm_rsrc1::FP_64_DENORMS)
                    | pgm_rsrc1::dx10_clamp(1)
                    | pgm_rsrc1::vgpr_comp_cnt(0)
                    | pgm_rsrc1::mem_ordered((class == ChipClass::Gfx10) as u32),
                vs_info.rsrc2,
            ],
        );
        cmd.set_uconfig_reg_idx(class, regs::VGT_PRIMITIVE_TYPE, 1, prim_type::RECTLIST);

        emit_color_target(cmd, class, swizzle, target, width, height);

        // The long fixed-function defaults block.
        apply_ops(cmd, class, FIXED_FUNC_DEFAULTS);

        // Remaining color and depth targets are unused.
        for info in [
            regs::CB_COLOR1_INFO,
            regs::CB_COLOR2_INFO,
            regs::CB_COLOR3_INFO,
            regs::CB_COLOR4_INFO,
            regs::CB_COLOR5_INFO,
            regs::CB_COLOR6_INFO,
            regs::CB_COLOR7_INFO,
        ] {
            cmd.set_context_reg(info, cb_color_info::format(cb_color_info::COLOR_INVALID));
        }
        cmd.set_context_regs(regs::DB_Z_INFO, &[0, 0]); // Z and stencil invalid

        cmd.set_context_reg(
            regs::PA_SC_WINDOW_SCISSOR_BR,
            scissor::br_x(width) | scissor::br_y(height),
        );
        cmd.set_context_reg(regs::CB_DCC_CONTROL, DCC_CONTROL);

        // Identity viewport, flat depth range.
        cmd.set_context_regs(regs::PA_CL_VPORT_XSCALE, &VIEWPORT_IDENTITY);
        cmd.set_context_regs(regs::PA_SC_VPORT_ZMIN_0, &[0, 0]);

        // Scissor to the full destination extent.
        cmd.set_context_regs(
            regs::PA_SC_VPORT_SCISSOR_0_TL,
            &[
                scissor::tl_x(0) | scissor::tl_y(0) | scissor::WINDOW_OFFSET_DISABLE,
                scissor::br_x(width) | scissor::br_y(height),
            ],
        );
        cmd.set_context_regs(regs::PA_CL_GB_VERT_CLIP_ADJ, &GUARDBAND);

        self.dst = Some(id);
        self.src = None;
    }

    /// Bind an image source: texture descriptor + copy shader
    fn bind_copy_source(&mut self, dst_id: ImageId, desc: &[u32; 4]) {
        let class = self.profile.class;
        let (addr, info) = (self.shaders.copy.addr(), self.shaders.copy.info());
        let cmd = &mut self.draw_of(dst_id).cmd;
        cmd.set_sh_regs(regs::SPI_SHADER_USER_DATA_PS_0, desc);
        emit_pixel_shader(cmd, class, addr, info);
    }

    /// Bind a solid source: normalized color constants + fill shader
    fn bind_fill_source(&mut self, dst_id: ImageId, color: Color) {
        let class = self.profile.class;
        let (addr, info) = (self.shaders.fill.addr(), self.shaders.fill.info());
        let cmd = &mut self.draw_of(dst_id).cmd;
        cmd.set_sh_regs(
            regs::SPI_SHADER_USER_DATA_PS_2,
            &[
                Color::normalize(color.red).to_bits(),
                Color::normalize(color.green).to_bits(),
                Color::normalize(color.blue).to_bits(),
                Color::normalize(color.alpha).to_bits(),
            ],
        );
        emit_pixel_shader(cmd, class, addr, info);
    }

    // =========================================================================
    // GEOMETRY
    // =========================================================================

    /// Append rectangles to the current batch
    ///
    /// A batch that would overflow the vertex buffer is flushed first;
    /// capacities are sized so a single batch never exceeds them.
    pub fn append_rects(&mut self, rects: &[Box2]) -> Result<()> {
        let Some(dst_id) = self.dst else {
            return Err(Error::NoDestination);
        };
        for &rect in rects {
            let vert = &self.draw_of(dst_id).vert;
            if !vert.has_room(VERTS_PER_RECT * WORDS_PER_VERTEX) {
                self.flush_draw();
            }
            self.draw_of(dst_id).vert.append_rect(rect);
        }
        Ok(())
    }

    /// Emit exactly one draw packet covering the unflushed vertex range
    ///
    /// A zero-length range still emits the packet; the hardware treats it
    /// as a no-op and it keeps the boundary logic uniform.
    pub(crate) fn flush_draw(&mut self) {
        let Some(dst_id) = self.dst else { return };
        let class = self.profile.class;
        let (dst_off, src_off) = (self.dst_off, self.src_off);
        let DrawContext { cmd, vert } = self.draw_of(dst_id);
        emit_draw(cmd, vert, class, dst_off, src_off);
    }
}

// =============================================================================
// PACKET SEQUENCES
// =============================================================================

/// Bind the destination surface as color target 0
fn emit_color_target<D: GpuDevice>(
    cmd: &mut CmdBuf<D>,
    class: ChipClass,
    swizzle: u32,
    target: GpuAddr,
    width: u32,
    height: u32,
) {
    let base = target.shifted(8);
    if class == ChipClass::Gfx10 {
        let info = cb_color_info::format(cb_color_info::COLOR_8_8_8_8)
            | cb_color_info::comp_swap(cb_color_info::SWAP_ALT)
            | cb_color_info::blend_clamp(1)
            | cb_color_info::simple_float(1);
        cmd.set_context_regs(
            regs::CB_COLOR0_BASE,
            &[base, 0, 0, 0, info, 0, 0, base, 0, base, 0],
        );
        cmd.set_context_regs(regs::CB_COLOR0_DCC_BASE, &[base]);
        let base_ext = target.shifted(40);
        cmd.set_context_reg(regs::CB_COLOR0_BASE_EXT, base_ext);
        cmd.set_context_reg(regs::CB_COLOR0_CMASK_BASE_EXT, base_ext);
        cmd.set_context_reg(regs::CB_COLOR0_FMASK_BASE_EXT, base_ext);
        cmd.set_context_reg(regs::CB_COLOR0_DCC_BASE_EXT, base_ext);
        cmd.set_context_reg(
            regs::CB_COLOR0_ATTRIB2,
            regs::cb_color_attrib2::mip0_width(width - 1)
                | regs::cb_color_attrib2::mip0_height(height - 1),
        );
        cmd.set_context_reg(
            regs::CB_COLOR0_ATTRIB3,
            regs::cb_color_attrib3::color_sw_mode(swizzle)
                | regs::cb_color_attrib3::fmask_sw_mode(20)
                | regs::cb_color_attrib3::resource_type(1)
                | regs::cb_color_attrib3::resource_level(1),
        );
    } else {
        let info = cb_color_info::format(cb_color_info::COLOR_8_8_8_8)
            | cb_color_info::number_type(0) // unorm
            | cb_color_info::comp_swap(cb_color_info::SWAP_ALT)
            | cb_color_info::blend_clamp(1)
            | cb_color_info::simple_float(1);
        cmd.set_context_regs(
            regs::CB_COLOR0_BASE,
            &[
                base,
                0x3f | 0x3f << 16, // tile/fmask tile max
                0xfff,             // slice tile max
                0,                 // view
                info,
                0, // tile mode index
                0, // dcc control
                base,
                0xf, // cmask slice tile max
                base,
                0xfff, // fmask slice tile max
            ],
        );
        cmd.set_context_reg(regs::CB_COLOR0_DCC_BASE, base);
    }
}

/// Bind a pixel shader program and its resource registers
fn emit_pixel_shader<D: GpuDevice>(
    cmd: &mut CmdBuf<D>,
    class: ChipClass,
    addr: GpuAddr,
    info: ShaderInfo,
) {
    cmd.set_sh_regs(
        regs::SPI_SHADER_PGM_LO_PS,
        &[
            addr.shifted(8),
            pgm_hi::mem_base(addr.shifted(40)),
            info.rsrc1
                | pgm_rsrc1::float_mode(pgm_rsrc1::FP_64_DENORMS)
                | pgm_rsrc1::dx10_clamp(1)
                | pgm_rsrc1::mem_ordered((class == ChipClass::Gfx10) as u32),
            info.rsrc2,
        ],
    );
}

/// One draw packet over `[pos, len)`, then advance the flush boundary
fn emit_draw<D: GpuDevice>(
    cmd: &mut CmdBuf<D>,
    vert: &mut VertBuf<D>,
    class: ChipClass,
    dst_off: (i32, i32),
    src_off: (i32, i32),
) {
    if class.is_gfx9_plus() {
        cmd.set_uconfig_reg(regs::VGT_MULTI_PRIM_IB_RESET_EN, 0);
    } else {
        cmd.set_context_reg(regs::VGT_MULTI_PRIM_IB_RESET_EN_GFX8, 0);
    }
    cmd.set_sh_regs(
        regs::SPI_SHADER_USER_DATA_VS_3,
        &[
            vert.start_vertex(),
            f32_bits(dst_off.0),
            f32_bits(dst_off.1),
            f32_bits(src_off.0),
            f32_bits(src_off.1),
        ],
    );
    cmd.num_instances(1);
    cmd.draw_index_auto(vert.pending_vertices());
    vert.mark_flushed();
}

// =============================================================================
// BACKEND TRAIT
// =============================================================================

impl<D: GpuDevice> BlitBackend for NativeContext<D> {
    fn create_image(
        &mut self,
        width: u32,
        height: u32,
        fourcc: u32,
        flags: ImageFlags,
    ) -> Result<ImageId> {
        NativeContext::create_image(self, width, height, fourcc, flags)
    }

    fn create_solid(&self, color: Color) -> SolidOperand {
        NativeContext::create_solid(self, color)
    }

    fn destroy_image(&mut self, image: ImageId) -> Result<()> {
        NativeContext::destroy_image(self, image)
    }

    fn setup(
        &mut self,
        op: BlitOp,
        dst: Option<ImageId>,
        src: Option<Source>,
        mask: Option<ImageId>,
    ) -> Result<()> {
        NativeContext::setup(self, op, dst, src, mask)
    }

    fn append_rects(&mut self, rects: &[Box2]) -> Result<()> {
        NativeContext::append_rects(self, rects)
    }

    fn submit(&mut self) -> Result<()> {
        NativeContext::submit(self)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::{ChipFamily, FOURCC_ARGB8888, FOURCC_XRGB8888};
    use cinder_test_framework::{FailPoint, SoftDevice};

    fn backend() -> (Arc<SoftDevice>, NativeContext<SoftDevice>) {
        let dev = Arc::new(SoftDevice::new());
        let ctx = NativeContext::new(Arc::clone(&dev)).unwrap();
        (dev, ctx)
    }

    fn dst_image(ctx: &mut NativeContext<SoftDevice>) -> ImageId {
        ctx.create_image(256, 256, FOURCC_XRGB8888, ImageFlags::DST | ImageFlags::SRC)
            .unwrap()
    }

    fn red() -> Source {
        Source::Solid(SolidOperand {
            color: Color::new(0xffff, 0, 0, 0xffff),
        })
    }

    #[test]
    fn test_unsupported_family_is_rejected() {
        let dev = Arc::new(SoftDevice::with_family(ChipFamily::VolcanicIslands));
        let err = NativeContext::new(dev).err().unwrap();
        assert_eq!(err, Error::UnsupportedChip);
    }

    #[test]
    fn test_unsupported_format_is_rejected() {
        let (_dev, mut ctx) = backend();
        let err = ctx
            .create_image(64, 64, 0x3231_5258, ImageFlags::SRC) // 'XR12'
            .unwrap_err();
        assert_eq!(err, Error::UnsupportedFormat);
        assert!(ctx
            .create_image(64, 64, FOURCC_ARGB8888, ImageFlags::SRC)
            .is_ok());
    }

    #[test]
    fn test_mask_operand_fails_without_state_change() {
        let (dev, mut ctx) = backend();
        let a = dst_image(&mut ctx);
        let err = ctx.setup(BlitOp::Src, Some(a), Some(red()), Some(a));
        assert_eq!(err.unwrap_err(), Error::MaskUnsupported);
        assert!(dev.submissions().is_empty());
        // The rejected call bound nothing.
        assert_eq!(
            ctx.append_rects(&[Box2::new(0, 0, 1, 1)]).unwrap_err(),
            Error::NoDestination
        );
    }

    #[test]
    fn test_non_drawable_destination_is_rejected() {
        let (dev, mut ctx) = backend();
        let a = dst_image(&mut ctx);
        let plain = ctx
            .create_image(64, 64, FOURCC_XRGB8888, ImageFlags::SRC)
            .unwrap();
        ctx.setup(BlitOp::Src, Some(a), Some(red()), None).unwrap();
        ctx.append_rects(&[Box2::new(0, 0, 8, 8)]).unwrap();
        let err = ctx.setup(BlitOp::Src, Some(plain), Some(red()), None);
        assert_eq!(err.unwrap_err(), Error::NotDrawable);
        // Validation precedes the destination switch: nothing was submitted
        // and the pending batch survives.
        assert!(dev.submissions().is_empty());
        ctx.submit().unwrap();
        assert_eq!(dev.submissions().len(), 1);
    }

    #[test]
    fn test_unknown_source_handle_is_rejected() {
        let (_dev, mut ctx) = backend();
        let a = dst_image(&mut ctx);
        let stale = ImageId::new(0xdead);
        let err = ctx.setup(BlitOp::Src, Some(a), Some(Source::Image(stale)), None);
        assert_eq!(err.unwrap_err(), Error::UnknownSource);
    }

    #[test]
    fn test_rects_require_a_destination() {
        let (_dev, mut ctx) = backend();
        assert_eq!(
            ctx.append_rects(&[Box2::new(0, 0, 1, 1)]).unwrap_err(),
            Error::NoDestination
        );
    }

    #[test]
    fn test_destroy_bound_operand_is_rejected() {
        let (_dev, mut ctx) = backend();
        let a = dst_image(&mut ctx);
        ctx.setup(BlitOp::Src, Some(a), Some(red()), None).unwrap();
        assert_eq!(ctx.destroy_image(a).unwrap_err(), Error::ImageInUse);
        ctx.setup(BlitOp::Src, None, None, None).unwrap();
        ctx.destroy_image(a).unwrap();
        assert_eq!(ctx.destroy_image(a).unwrap_err(), Error::UnknownImage);
    }

    #[test]
    fn test_null_destination_submits_and_idles() {
        let (dev, mut ctx) = backend();
        let a = dst_image(&mut ctx);
        ctx.setup(BlitOp::Src, Some(a), Some(red()), None).unwrap();
        ctx.append_rects(&[Box2::new(0, 0, 16, 16)]).unwrap();
        ctx.setup(BlitOp::Src, None, None, None).unwrap();
        assert_eq!(dev.submissions().len(), 1);
        // Idle submit is a no-op.
        ctx.submit().unwrap();
        assert_eq!(dev.submissions().len(), 1);
    }

    #[test]
    fn test_queue_rejection_propagates_and_releases_list() {
        let (dev, mut ctx) = backend();
        let a = dst_image(&mut ctx);
        ctx.setup(BlitOp::Src, Some(a), Some(red()), None).unwrap();
        dev.fail_at(FailPoint::Submit);
        assert_eq!(ctx.submit().unwrap_err(), Error::SubmissionFailed);
        assert_eq!(dev.live_resource_lists(), 0);
    }

    #[test]
    #[should_panic(expected = "vertex buffer overflow")]
    fn test_vertex_capacity_overflow_is_fatal() {
        let dev = Arc::new(SoftDevice::new());
        let mut ctx = NativeContext::with_config(
            dev,
            DrawConfig {
                // Descriptor prefix plus exactly one rectangle.
                vert_bytes: 16 + 24,
                ..DrawConfig::default()
            },
        )
        .unwrap();
        let a = dst_image(&mut ctx);
        ctx.setup(BlitOp::Src, Some(a), Some(red()), None).unwrap();
        ctx.append_rects(&[Box2::new(0, 0, 4, 4)]).unwrap();
        // The boundary flush drains the pending batch, but capacity is
        // fixed: the next rectangle cannot fit.
        ctx.append_rects(&[Box2::new(4, 4, 8, 8)]).unwrap();
    }

    #[test]
    fn test_image_creation_failure_unwinds_cleanly() {
        let (dev, mut ctx) = backend();
        let ranges = dev.live_va_ranges();
        let allocs = dev.live_allocations();
        dev.fail_at(FailPoint::AllocMemory);
        let err = ctx
            .create_image(64, 64, FOURCC_XRGB8888, ImageFlags::DST)
            .unwrap_err();
        assert_eq!(err, Error::OutOfMemory);
        assert_eq!(dev.live_va_ranges(), ranges);
        assert_eq!(dev.live_allocations(), allocs);
    }
}
