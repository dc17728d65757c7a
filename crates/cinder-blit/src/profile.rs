//! # Chip Profiles
//!
//! Everything generation-dependent, expressed as data: the tiling/swizzle
//! parameters, the ordered init-block program replayed at the start of
//! every per-destination stream, and the long fixed-function defaults
//! table. One generic routine applies a profile's operations to a command
//! buffer; nothing else in the backend branches on the chip generation
//! except opcode selection inside the encoder.

use cinder_cmd::{CmdBuf, EventType, Reg};
use cinder_core::{ChipClass, ChipFamily, Error, GpuDevice, Result};

use crate::regs::*;

// =============================================================================
// STATE-SETTING OPERATIONS
// =============================================================================

/// One state-setting operation in a profile table
#[derive(Debug, Clone, Copy)]
pub enum InitOp {
    /// Reset most context state to hardware defaults
    ClearState,
    /// Write one context register
    Context(Reg, u32),
    /// Write a contiguous run of context registers
    ContextSeq(Reg, &'static [u32]),
    /// Write one shader register
    Sh(Reg, u32),
    /// Write a contiguous run of shader registers
    ShSeq(Reg, &'static [u32]),
    /// Write one shader register in a stage slot
    ShIdx(Reg, u32, u32),
    /// Write one user-config register
    Uconfig(Reg, u32),
    /// Fire a pipeline event
    Event(EventType),
}

/// Apply an ordered operation table to a command buffer
pub fn apply_ops<D: GpuDevice>(cmd: &mut CmdBuf<D>, chip: ChipClass, ops: &[InitOp]) {
    for op in ops {
        match *op {
            InitOp::ClearState => cmd.clear_state(),
            InitOp::Context(reg, value) => cmd.set_context_reg(reg, value),
            InitOp::ContextSeq(reg, values) => cmd.set_context_regs(reg, values),
            InitOp::Sh(reg, value) => cmd.set_sh_reg(reg, value),
            InitOp::ShSeq(reg, values) => cmd.set_sh_regs(reg, values),
            InitOp::ShIdx(reg, idx, value) => cmd.set_sh_reg_idx(chip, reg, idx, value),
            InitOp::Uconfig(reg, value) => cmd.set_uconfig_reg(reg, value),
            InitOp::Event(ev) => cmd.event_write(ev),
        }
    }
}

// =============================================================================
// CHIP PROFILE
// =============================================================================

/// The fixed parameter set for one hardware generation
#[derive(Debug)]
pub struct ChipProfile {
    /// Command-processor generation
    pub class: ChipClass,
    /// Tiling/swizzle mode written into image descriptors
    pub swizzle_mode: u32,
    /// Tiling metadata attached to image allocations for interop
    pub tiling_metadata: u64,
    /// The init-block program built once at backend init
    pub init_ops: &'static [InitOp],
}

impl ChipProfile {
    /// Select the profile for a hardware family
    ///
    /// Families without a command-stream profile are rejected at backend
    /// creation, before any resource is allocated.
    pub fn probe(family: ChipFamily) -> Result<&'static ChipProfile> {
        match family {
            ChipFamily::Navi => Ok(&GFX10_PROFILE),
            ChipFamily::ArcticIslands => Ok(&GFX9_PROFILE),
            _ => Err(Error::UnsupportedChip),
        }
    }
}

// =============================================================================
// INIT-BLOCK PROGRAMS
// =============================================================================

/// 64.0f, the tessellation ceiling the hardware expects at reset
const HOS_MAX_TESS_LEVEL: u32 = 0x4280_0000;

/// Disable hierarchical stencil forcing (FORCE_HIS_ENABLE0/1 = disable)
const RENDER_OVERRIDE_NO_HIS: u32 = 1 << 28 | 1 << 30;

/// CU_EN 0xffff + WAVE_LIMIT 0x3f
const RSRC3_ALL_CU: u32 = 0xffff | 0x3f << 16;
/// CU_EN 0xfff3 + WAVE_LIMIT 0x3f; two CUs reserved off the export path
const RSRC3_EXPORT_CU: u32 = 0xfff3 | 0x3f << 16;

/// ACCUM_ISOLINE 32, ACCUM_TRI 11, ACCUM_QUAD 11, DONUT_SPLIT 16, TRAP_SPLIT 3
const TESS_DISTRIBUTION: u32 = 32 | 11 << 8 | 11 << 16 | 16 << 24 | 3 << 29;

/// MAX_ALLOC_COUNT 340, MAX_PRIM_PER_BATCH 1023
const BINNER_CNTL_1: u32 = 340 | 1023 << 16;

/// HEIGHT 8, WIDTH 8 (quarter-pixel units)
const POINT_SIZE_8: u32 = 8 << 16 | 8;

/// All compute CUs enabled on both shader arrays
const COMPUTE_ALL_CU: &[u32] = &[0xffff_ffff, 0xffff_ffff];

static GFX10_INIT: &[InitOp] = &[
    InitOp::ClearState,
    InitOp::Context(VGT_HOS_MAX_TESS_LEVEL, HOS_MAX_TESS_LEVEL),
    InitOp::Context(DB_RENDER_OVERRIDE, RENDER_OVERRIDE_NO_HIS),
    InitOp::Context(VGT_DRAW_PAYLOAD_CNTL, 0),
    InitOp::Uconfig(GE_MAX_VTX_INDX, !0),
    InitOp::Uconfig(GE_MIN_VTX_INDX, 0),
    InitOp::Uconfig(GE_INDX_OFFSET, 0),
    InitOp::Uconfig(GE_STEREO_CNTL, 0),
    InitOp::Uconfig(GE_USER_VGPR_EN, 0),
    InitOp::ShIdx(SPI_SHADER_PGM_RSRC4_HS, 3, 0xffff),
    InitOp::ShIdx(SPI_SHADER_PGM_RSRC4_VS, 3, 0xffff),
    InitOp::ShIdx(SPI_SHADER_PGM_RSRC4_PS, 3, 0xffff),
    InitOp::ShIdx(SPI_SHADER_PGM_RSRC3_HS, 3, RSRC3_ALL_CU),
    InitOp::ShIdx(SPI_SHADER_PGM_RSRC3_VS, 3, RSRC3_EXPORT_CU),
    InitOp::Sh(SPI_SHADER_LATE_ALLOC_VS, 28),
    InitOp::ShIdx(SPI_SHADER_PGM_RSRC3_GS, 3, RSRC3_EXPORT_CU),
    InitOp::ShIdx(SPI_SHADER_PGM_RSRC4_GS, 3, 0xffff | 28 << 16),
    InitOp::ShIdx(SPI_SHADER_PGM_RSRC3_PS, 3, RSRC3_ALL_CU),
    InitOp::Context(PA_SC_NGG_MODE_CNTL, 512), // MAX_DEALLOCS_IN_WAVE
    InitOp::Context(VGT_VERTEX_REUSE_BLOCK_CNTL, 14),
    // Stream writes, no-allocate reads for the depth/color L2 interfaces
    InitOp::Context(DB_RMI_L2_CACHE_CONTROL, 0x2a55),
    InitOp::Context(CB_RMI_GL2_CACHE_CONTROL, 0xaa55),
    InitOp::Context(CB_COVERAGE_OUT_CONTROL, 0),
    // SOFT_GROUPING_EN, 4 requests per CU
    InitOp::Sh(SPI_SHADER_REQ_CTRL_PS, 1 | 3 << 1),
    InitOp::Sh(SPI_SHADER_REQ_CTRL_VS, 0),
    InitOp::Event(EventType::SqNonEvent),
    // OVERSUB_EN, 255 parameter-cache lines
    InitOp::Uconfig(GE_PC_ALLOC, 1 | 255 << 1),
    InitOp::Context(VGT_TESS_DISTRIBUTION, TESS_DISTRIBUTION),
    InitOp::Context(PA_SC_BINNER_CNTL_1, BINNER_CNTL_1),
    InitOp::Context(PA_SC_CONSERVATIVE_RAST_CNTL, 1), // NULL_SQUAD_AA_MASK_ENABLE
    InitOp::Uconfig(VGT_INSTANCE_BASE_ID, 0),
    InitOp::Context(PA_SU_POINT_SIZE, POINT_SIZE_8),
    InitOp::Context(PA_SU_POINT_MINMAX, 0xffff << 16),
    InitOp::Context(PA_SU_SMALL_PRIM_FILTER_CNTL, 1),
    InitOp::ShSeq(COMPUTE_START_X, &[0, 0, 0]),
    InitOp::ShSeq(COMPUTE_STATIC_THREAD_MGMT_SE0, COMPUTE_ALL_CU),
    InitOp::ShSeq(COMPUTE_STATIC_THREAD_MGMT_SE2, COMPUTE_ALL_CU),
    InitOp::Sh(COMPUTE_PGM_RSRC3, 0),
];

static GFX9_INIT: &[InitOp] = &[
    InitOp::ClearState,
    InitOp::Context(VGT_HOS_MAX_TESS_LEVEL, HOS_MAX_TESS_LEVEL),
    InitOp::Context(VGT_INSTANCE_STEP_RATE_0, 1),
    InitOp::Context(DB_RENDER_OVERRIDE, RENDER_OVERRIDE_NO_HIS),
    InitOp::Uconfig(VGT_MAX_VTX_INDX_GFX9, !0),
    InitOp::Uconfig(GE_MIN_VTX_INDX, 0),
    InitOp::Uconfig(GE_INDX_OFFSET, 0),
    InitOp::ShIdx(SPI_SHADER_PGM_RSRC3_HS, 3, RSRC3_ALL_CU),
    InitOp::ShIdx(SPI_SHADER_PGM_RSRC3_VS, 3, RSRC3_EXPORT_CU),
    InitOp::Sh(SPI_SHADER_LATE_ALLOC_VS, 28),
    InitOp::ShIdx(SPI_SHADER_PGM_RSRC3_GS, 3, RSRC3_EXPORT_CU),
    InitOp::ShIdx(SPI_SHADER_PGM_RSRC3_PS, 3, RSRC3_ALL_CU),
    InitOp::Context(VGT_TESS_DISTRIBUTION, TESS_DISTRIBUTION),
    InitOp::Context(PA_SC_BINNER_CNTL_1, BINNER_CNTL_1),
    InitOp::Context(PA_SC_CONSERVATIVE_RAST_CNTL, 1),
    InitOp::Uconfig(VGT_INSTANCE_BASE_ID, 0),
    InitOp::Context(PA_SU_POINT_SIZE, POINT_SIZE_8),
    InitOp::Context(PA_SU_POINT_MINMAX, 0xffff << 16),
    InitOp::Context(PA_SU_SMALL_PRIM_FILTER_CNTL, 1),
    InitOp::ShSeq(COMPUTE_START_X, &[0, 0, 0]),
    InitOp::ShSeq(COMPUTE_STATIC_THREAD_MGMT_SE0, COMPUTE_ALL_CU),
    InitOp::ShSeq(COMPUTE_STATIC_THREAD_MGMT_SE2, COMPUTE_ALL_CU),
];

static GFX10_PROFILE: ChipProfile = ChipProfile {
    class: ChipClass::Gfx10,
    swizzle_mode: 21, // 64KB standard swizzle, render-target variant
    tiling_metadata: 21,
    init_ops: GFX10_INIT,
};

static GFX9_PROFILE: ChipProfile = ChipProfile {
    class: ChipClass::Gfx9,
    swizzle_mode: 9, // 64KB standard swizzle
    tiling_metadata: 9,
    init_ops: GFX9_INIT,
};

// =============================================================================
// FIXED-FUNCTION DEFAULTS
// =============================================================================

/// The pipeline state that never changes between blits: depth/stencil off,
/// blending bypassed, rect-list rasterization, one linear-interpolated
/// pixel shader input. Replayed into every destination's stream after the
/// color target is bound.
pub static FIXED_FUNC_DEFAULTS: &[InitOp] = &[
    InitOp::Context(DB_DEPTH_CONTROL, 0),
    InitOp::Context(DB_STENCIL_CONTROL, 0),
    InitOp::Context(DB_RENDER_CONTROL, 0),
    InitOp::Context(DB_RENDER_OVERRIDE, RENDER_OVERRIDE_NO_HIS),
    InitOp::Context(DB_RENDER_OVERRIDE2, 0),
    InitOp::ContextSeq(CB_BLEND0_CONTROL, &[0; 8]),
    // MODE normal, ROP3 copy
    InitOp::Context(CB_COLOR_CONTROL, 1 << 4 | 0xcc << 16),
    // Alpha-to-mask dither offsets 3/1/0/2, offset rounding on
    InitOp::Context(DB_ALPHA_TO_MASK, 3 << 8 | 1 << 10 | 2 << 14 | 1 << 16),
    // Blend optimizer bypassed on every target
    InitOp::ContextSeq(SX_MRT0_BLEND_OPT, &[1 << 4 | 1 << 20; 8]),
    InitOp::Context(SPI_SHADER_COL_FORMAT, 1), // COL0 FP16_ABGR
    InitOp::Context(CB_TARGET_MASK, 0xf),
    InitOp::Context(CB_SHADER_MASK, 0xf),
    // DX clip space, linear attribute clipping
    InitOp::Context(PA_CL_CLIP_CNTL, 1 << 19 | 1 << 24),
    // Flat shading, point-sprite overrides S/T/0/1
    InitOp::Context(SPI_INTERP_CONTROL_0, 1 | 1 << 1 | 2 << 2 | 3 << 5 | 1 << 11),
    // Pixel-center offsets, round to even, 1/256 quantization
    InitOp::Context(PA_SU_VTX_CNTL, 1 | 5 << 3),
    // No culling, triangle fill both faces
    InitOp::Context(PA_SU_SC_MODE_CNTL, 2 << 5 | 2 << 8),
    InitOp::Context(PA_SC_CONSERVATIVE_RAST_CNTL, 1),
    InitOp::ContextSeq(PA_SC_AA_MASK_X0Y0_X1Y0, &[0xffff_ffff, 0xffff_ffff]),
    // High-quality intersections, incoherent EQAA reads, interpolated
    // compressed Z, static anchor associations
    InitOp::Context(DB_EQAA, 1 | 1 << 4 | 1 << 8 | 1 << 20),
    // Tile walk order, fence walking, EOV countdown forcing
    InitOp::Context(PA_SC_MODE_CNTL_1, 0x0602_0480),
    // Exclude the bottom/right exclusive edges from primitive filtering
    InitOp::Context(PA_SU_PRIM_FILTER_CNTL, 1 << 30 | 1 << 31),
    InitOp::Context(VGT_PRIMITIVEID_EN, 0),
    InitOp::Context(VGT_GS_MODE, 0),
    InitOp::Context(SPI_VS_OUT_CONFIG, 0),
    InitOp::Context(SPI_SHADER_POS_FORMAT, 2), // POS0 4-component
    // W0 format + every viewport scale/offset transform enabled
    InitOp::Context(PA_CL_VTE_CNTL, 0x3f | 1 << 10),
    InitOp::Context(PA_CL_VS_OUT_CNTL, 0),
    // Early Z then late Z, dual-quad packing off
    InitOp::Context(DB_SHADER_CONTROL, 1 << 4 | 1 << 9),
    InitOp::Context(SPI_PS_INPUT_ENA, 1 << 4), // LINEAR_CENTER_ENA
    InitOp::Context(SPI_PS_INPUT_ADDR, 1 << 4),
    InitOp::Context(SPI_PS_IN_CONTROL, 1), // NUM_INTERP
    InitOp::Context(SPI_BARYC_CNTL, 1 << 24), // FRONT_FACE_ALL_BITS
    InitOp::Context(SPI_SHADER_Z_FORMAT, 0),
    InitOp::Context(SPI_PS_INPUT_CNTL_0, 0),
    InitOp::Uconfig(GE_CNTL, 128), // PRIM_GRP_SIZE
    InitOp::Context(SPI_TMPRING_SIZE, 1152), // WAVES
    InitOp::Context(VGT_SHADER_STAGES_EN, 2 << 27), // MAX_PRIMGRP_IN_WAVE
    InitOp::Context(VGT_GS_OUT_PRIM_TYPE, 2), // OUTPRIM tristrip
    InitOp::Context(PA_SC_CLIPRECT_RULE, 0xffff),
];

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use cinder_test_framework::SoftDevice;

    #[test]
    fn test_probe_by_family() {
        assert_eq!(
            ChipProfile::probe(ChipFamily::Navi).unwrap().class,
            ChipClass::Gfx10
        );
        assert_eq!(
            ChipProfile::probe(ChipFamily::ArcticIslands).unwrap().class,
            ChipClass::Gfx9
        );
        assert_eq!(
            ChipProfile::probe(ChipFamily::VolcanicIslands).unwrap_err(),
            Error::UnsupportedChip
        );
    }

    #[test]
    fn test_profiles_differ_in_swizzle() {
        let gfx9 = ChipProfile::probe(ChipFamily::ArcticIslands).unwrap();
        let gfx10 = ChipProfile::probe(ChipFamily::Navi).unwrap();
        assert_ne!(gfx9.swizzle_mode, gfx10.swizzle_mode);
    }

    #[test]
    fn test_apply_starts_with_clear_state() {
        let dev = Arc::new(SoftDevice::new());
        let mut cmd = CmdBuf::new(&dev, 0x4000).unwrap();
        let profile = ChipProfile::probe(ChipFamily::Navi).unwrap();
        apply_ops(&mut cmd, profile.class, profile.init_ops);
        assert!(cmd.len() > 64, "init program should be substantial");
        let words = cmd.as_words();
        assert_eq!(words[0] >> 30, 3);
        assert_eq!((words[0] >> 8) & 0xff, 0x12); // CLEAR_STATE
    }
}
