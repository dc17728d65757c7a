//! # Register Layout Table
//!
//! Every hardware register the backend touches, as space-checked [`Reg`]
//! values, plus bitfield builders for the registers whose values are
//! assembled at run time. Packet emitters take these instead of inline
//! literals, so a misplaced offset fails at compile time rather than
//! hanging the command processor.

use cinder_cmd::Reg;

// =============================================================================
// CONTEXT REGISTERS - depth/stencil block
// =============================================================================

pub const DB_RENDER_CONTROL: Reg = Reg::context(0x2_8000);
pub const DB_RENDER_OVERRIDE: Reg = Reg::context(0x2_800c);
pub const DB_RENDER_OVERRIDE2: Reg = Reg::context(0x2_8010);
pub const DB_DFSM_CONTROL_GFX10: Reg = Reg::context(0x2_8038);
pub const DB_Z_INFO: Reg = Reg::context(0x2_8040);
pub const DB_DFSM_CONTROL_GFX9: Reg = Reg::context(0x2_8060);
pub const DB_RMI_L2_CACHE_CONTROL: Reg = Reg::context(0x2_807c);
pub const DB_DEPTH_CONTROL: Reg = Reg::context(0x2_8800);
pub const DB_EQAA: Reg = Reg::context(0x2_8804);
pub const DB_SHADER_CONTROL: Reg = Reg::context(0x2_880c);
pub const DB_STENCIL_CONTROL: Reg = Reg::context(0x2_842c);
pub const DB_ALPHA_TO_MASK: Reg = Reg::context(0x2_8b70);

// =============================================================================
// CONTEXT REGISTERS - color block
// =============================================================================

pub const CB_TARGET_MASK: Reg = Reg::context(0x2_8238);
pub const CB_SHADER_MASK: Reg = Reg::context(0x2_823c);
pub const CB_RMI_GL2_CACHE_CONTROL: Reg = Reg::context(0x2_8410);
pub const CB_DCC_CONTROL: Reg = Reg::context(0x2_8424);
pub const CB_COVERAGE_OUT_CONTROL: Reg = Reg::context(0x2_8428);
pub const CB_BLEND0_CONTROL: Reg = Reg::context(0x2_8780);
pub const CB_COLOR_CONTROL: Reg = Reg::context(0x2_8808);
pub const CB_COLOR0_BASE: Reg = Reg::context(0x2_8c60);
pub const CB_COLOR0_DCC_BASE: Reg = Reg::context(0x2_8c94);
pub const CB_COLOR1_INFO: Reg = Reg::context(0x2_8cac);
pub const CB_COLOR2_INFO: Reg = Reg::context(0x2_8ce8);
pub const CB_COLOR3_INFO: Reg = Reg::context(0x2_8d24);
pub const CB_COLOR4_INFO: Reg = Reg::context(0x2_8d60);
pub const CB_COLOR5_INFO: Reg = Reg::context(0x2_8d9c);
pub const CB_COLOR6_INFO: Reg = Reg::context(0x2_8dd8);
pub const CB_COLOR7_INFO: Reg = Reg::context(0x2_8e14);
pub const CB_COLOR0_BASE_EXT: Reg = Reg::context(0x2_8e40);
pub const CB_COLOR0_CMASK_BASE_EXT: Reg = Reg::context(0x2_8e60);
pub const CB_COLOR0_FMASK_BASE_EXT: Reg = Reg::context(0x2_8e80);
pub const CB_COLOR0_DCC_BASE_EXT: Reg = Reg::context(0x2_8ea0);
pub const CB_COLOR0_ATTRIB2: Reg = Reg::context(0x2_8ec0);
pub const CB_COLOR0_ATTRIB3: Reg = Reg::context(0x2_8ee0);

// =============================================================================
// CONTEXT REGISTERS - primitive assembly / scan converter
// =============================================================================

pub const PA_SC_WINDOW_SCISSOR_BR: Reg = Reg::context(0x2_8208);
pub const PA_SC_CLIPRECT_RULE: Reg = Reg::context(0x2_820c);
pub const PA_SC_VPORT_SCISSOR_0_TL: Reg = Reg::context(0x2_8250);
pub const PA_SC_VPORT_ZMIN_0: Reg = Reg::context(0x2_82d0);
pub const PA_CL_VPORT_XSCALE: Reg = Reg::context(0x2_843c);
pub const PA_CL_CLIP_CNTL: Reg = Reg::context(0x2_8810);
pub const PA_SU_SC_MODE_CNTL: Reg = Reg::context(0x2_8814);
pub const PA_CL_VTE_CNTL: Reg = Reg::context(0x2_8818);
pub const PA_CL_VS_OUT_CNTL: Reg = Reg::context(0x2_881c);
pub const PA_SU_PRIM_FILTER_CNTL: Reg = Reg::context(0x2_882c);
pub const PA_SU_SMALL_PRIM_FILTER_CNTL: Reg = Reg::context(0x2_8830);
pub const PA_SU_POINT_SIZE: Reg = Reg::context(0x2_8a00);
pub const PA_SU_POINT_MINMAX: Reg = Reg::context(0x2_8a04);
pub const PA_SC_MODE_CNTL_0: Reg = Reg::context(0x2_8a48);
pub const PA_SC_MODE_CNTL_1: Reg = Reg::context(0x2_8a4c);
pub const PA_SU_VTX_CNTL: Reg = Reg::context(0x2_8be4);
pub const PA_CL_GB_VERT_CLIP_ADJ: Reg = Reg::context(0x2_8be8);
pub const PA_SC_LINE_CNTL: Reg = Reg::context(0x2_8bdc);
pub const PA_SC_CENTROID_PRIORITY_0: Reg = Reg::context(0x2_8bd4);
pub const PA_SC_AA_SAMPLE_LOCS_X0Y0: Reg = Reg::context(0x2_8bf8);
pub const PA_SC_AA_SAMPLE_LOCS_X1Y0: Reg = Reg::context(0x2_8c08);
pub const PA_SC_AA_SAMPLE_LOCS_X0Y1: Reg = Reg::context(0x2_8c18);
pub const PA_SC_AA_SAMPLE_LOCS_X1Y1: Reg = Reg::context(0x2_8c28);
pub const PA_SC_AA_MASK_X0Y0_X1Y0: Reg = Reg::context(0x2_8c38);
pub const PA_SC_BINNER_CNTL_0: Reg = Reg::context(0x2_8c44);
pub const PA_SC_BINNER_CNTL_1: Reg = Reg::context(0x2_8c48);
pub const PA_SC_CONSERVATIVE_RAST_CNTL: Reg = Reg::context(0x2_8c4c);
pub const PA_SC_NGG_MODE_CNTL: Reg = Reg::context(0x2_8c50);

// =============================================================================
// CONTEXT REGISTERS - shader interpolator / export
// =============================================================================

pub const SPI_PS_INPUT_CNTL_0: Reg = Reg::context(0x2_8644);
pub const SPI_VS_OUT_CONFIG: Reg = Reg::context(0x2_86c4);
pub const SPI_PS_INPUT_ENA: Reg = Reg::context(0x2_86cc);
pub const SPI_PS_INPUT_ADDR: Reg = Reg::context(0x2_86d0);
pub const SPI_INTERP_CONTROL_0: Reg = Reg::context(0x2_86d4);
pub const SPI_PS_IN_CONTROL: Reg = Reg::context(0x2_86d8);
pub const SPI_BARYC_CNTL: Reg = Reg::context(0x2_86e0);
pub const SPI_TMPRING_SIZE: Reg = Reg::context(0x2_86e8);
pub const SPI_SHADER_POS_FORMAT: Reg = Reg::context(0x2_870c);
pub const SPI_SHADER_Z_FORMAT: Reg = Reg::context(0x2_8710);
pub const SPI_SHADER_COL_FORMAT: Reg = Reg::context(0x2_8714);
pub const SX_MRT0_BLEND_OPT: Reg = Reg::context(0x2_8760);

// =============================================================================
// CONTEXT REGISTERS - geometry engine
// =============================================================================

pub const VGT_HOS_MAX_TESS_LEVEL: Reg = Reg::context(0x2_8a18);
pub const VGT_GS_MODE: Reg = Reg::context(0x2_8a40);
pub const VGT_GS_ONCHIP_CNTL: Reg = Reg::context(0x2_8a44);
pub const VGT_GS_PER_ES: Reg = Reg::context(0x2_8a54);
pub const VGT_ES_PER_GS: Reg = Reg::context(0x2_8a58);
pub const VGT_GS_OUT_PRIM_TYPE: Reg = Reg::context(0x2_8a6c);
pub const VGT_PRIMITIVEID_EN: Reg = Reg::context(0x2_8a84);
pub const VGT_MULTI_PRIM_IB_RESET_EN_GFX8: Reg = Reg::context(0x2_8a94);
pub const VGT_DRAW_PAYLOAD_CNTL: Reg = Reg::context(0x2_8a98);
pub const VGT_INSTANCE_STEP_RATE_0: Reg = Reg::context(0x2_8aa0);
pub const VGT_SHADER_STAGES_EN: Reg = Reg::context(0x2_8b54);
pub const VGT_TESS_DISTRIBUTION: Reg = Reg::context(0x2_8b50);
pub const VGT_VERTEX_REUSE_BLOCK_CNTL: Reg = Reg::context(0x2_8c58);

// =============================================================================
// SHADER REGISTERS
// =============================================================================

pub const SPI_SHADER_REQ_CTRL_PS: Reg = Reg::sh(0x0_b0c0);
pub const SPI_SHADER_PGM_RSRC4_PS: Reg = Reg::sh(0x0_b004);
pub const SPI_SHADER_PGM_RSRC3_PS: Reg = Reg::sh(0x0_b01c);
pub const SPI_SHADER_PGM_LO_PS: Reg = Reg::sh(0x0_b020);
pub const SPI_SHADER_USER_DATA_PS_0: Reg = Reg::sh(0x0_b030);
pub const SPI_SHADER_USER_DATA_PS_2: Reg = Reg::sh(0x0_b038);
pub const SPI_SHADER_PGM_RSRC4_VS: Reg = Reg::sh(0x0_b104);
pub const SPI_SHADER_PGM_RSRC3_VS: Reg = Reg::sh(0x0_b118);
pub const SPI_SHADER_LATE_ALLOC_VS: Reg = Reg::sh(0x0_b11c);
pub const SPI_SHADER_PGM_LO_VS: Reg = Reg::sh(0x0_b120);
pub const SPI_SHADER_USER_DATA_VS_2: Reg = Reg::sh(0x0_b138);
pub const SPI_SHADER_USER_DATA_VS_3: Reg = Reg::sh(0x0_b13c);
pub const SPI_SHADER_REQ_CTRL_VS: Reg = Reg::sh(0x0_b1c0);
pub const SPI_SHADER_PGM_RSRC4_GS: Reg = Reg::sh(0x0_b204);
pub const SPI_SHADER_PGM_RSRC3_GS: Reg = Reg::sh(0x0_b21c);
pub const SPI_SHADER_PGM_RSRC3_ES: Reg = Reg::sh(0x0_b31c);
pub const SPI_SHADER_PGM_RSRC4_HS: Reg = Reg::sh(0x0_b404);
pub const SPI_SHADER_PGM_RSRC3_HS: Reg = Reg::sh(0x0_b41c);
pub const SPI_SHADER_PGM_RSRC3_LS: Reg = Reg::sh(0x0_b51c);
pub const COMPUTE_START_X: Reg = Reg::sh(0x0_b810);
pub const COMPUTE_STATIC_THREAD_MGMT_SE0: Reg = Reg::sh(0x0_b858);
pub const COMPUTE_STATIC_THREAD_MGMT_SE2: Reg = Reg::sh(0x0_b864);
pub const COMPUTE_PGM_RSRC3: Reg = Reg::sh(0x0_b8a0);

// =============================================================================
// USER-CONFIG REGISTERS
// =============================================================================

pub const VGT_PRIMITIVE_TYPE: Reg = Reg::uconfig(0x3_0908);
pub const GE_MIN_VTX_INDX: Reg = Reg::uconfig(0x3_0924);
pub const GE_INDX_OFFSET: Reg = Reg::uconfig(0x3_0928);
pub const VGT_MULTI_PRIM_IB_RESET_EN: Reg = Reg::uconfig(0x3_092c);
pub const GE_MAX_VTX_INDX: Reg = Reg::uconfig(0x3_0964);
pub const VGT_INSTANCE_BASE_ID: Reg = Reg::uconfig(0x3_0968);
pub const GE_CNTL: Reg = Reg::uconfig(0x3_096c);
pub const GE_STEREO_CNTL: Reg = Reg::uconfig(0x3_097c);
pub const GE_PC_ALLOC: Reg = Reg::uconfig(0x3_0980);
pub const GE_USER_VGPR_EN: Reg = Reg::uconfig(0x3_0988);

// gfx9 names for the geometry bounds registers share the gfx10 offsets
// where they overlap; the pre-gfx10 VGT_MAX/MIN_VTX_INDX live at the same
// word slots.
pub const VGT_MAX_VTX_INDX_GFX9: Reg = Reg::uconfig(0x3_0920);

// =============================================================================
// FIELD BUILDERS
// =============================================================================

/// CB_COLOR*_INFO
pub mod cb_color_info {
    /// Hardware color-buffer formats
    pub const COLOR_INVALID: u32 = 0;
    /// 32-bit, four 8-bit channels
    pub const COLOR_8_8_8_8: u32 = 10;
    /// Component swap: BGRA order ("alt")
    pub const SWAP_ALT: u32 = 1;

    pub const fn format(x: u32) -> u32 {
        x << 2
    }
    pub const fn number_type(x: u32) -> u32 {
        x << 8
    }
    pub const fn comp_swap(x: u32) -> u32 {
        x << 11
    }
    pub const fn blend_clamp(x: u32) -> u32 {
        x << 15
    }
    pub const fn simple_float(x: u32) -> u32 {
        x << 17
    }
}

/// CB_COLOR0_ATTRIB2 (gfx10)
pub mod cb_color_attrib2 {
    pub const fn mip0_width(x: u32) -> u32 {
        x
    }
    pub const fn mip0_height(x: u32) -> u32 {
        x << 14
    }
}

/// CB_COLOR0_ATTRIB3 (gfx10)
pub mod cb_color_attrib3 {
    pub const fn color_sw_mode(x: u32) -> u32 {
        x
    }
    pub const fn fmask_sw_mode(x: u32) -> u32 {
        x << 5
    }
    pub const fn resource_type(x: u32) -> u32 {
        x << 12
    }
    pub const fn resource_level(x: u32) -> u32 {
        x << 30
    }
}

/// PA_SC_WINDOW_SCISSOR_BR / PA_SC_VPORT_SCISSOR_0_BR
pub mod scissor {
    pub const fn br_x(x: u32) -> u32 {
        x
    }
    pub const fn br_y(y: u32) -> u32 {
        y << 16
    }
    pub const fn tl_x(x: u32) -> u32 {
        x
    }
    pub const fn tl_y(y: u32) -> u32 {
        y << 16
    }
    pub const WINDOW_OFFSET_DISABLE: u32 = 1 << 31;
}

/// SPI_SHADER_PGM_RSRC1_* (shader resource word 1)
pub mod pgm_rsrc1 {
    /// FP64 denormals kept, FP32 flushed
    pub const FP_64_DENORMS: u32 = 0xc;

    pub const fn vgprs(x: u32) -> u32 {
        x
    }
    pub const fn sgprs(x: u32) -> u32 {
        x << 6
    }
    pub const fn float_mode(x: u32) -> u32 {
        x << 12
    }
    pub const fn dx10_clamp(x: u32) -> u32 {
        x << 21
    }
    pub const fn vgpr_comp_cnt(x: u32) -> u32 {
        x << 24
    }
    pub const fn mem_ordered(x: u32) -> u32 {
        x << 25
    }
}

/// SPI_SHADER_PGM_RSRC2_* (shader resource word 2)
pub mod pgm_rsrc2 {
    pub const fn user_sgpr(x: u32) -> u32 {
        x << 1
    }
}

/// SPI_SHADER_PGM_HI_* (program address high word)
pub mod pgm_hi {
    pub const fn mem_base(x: u32) -> u32 {
        x & 0xff
    }
}

/// VGT_PRIMITIVE_TYPE values
pub mod prim_type {
    /// Rectangle list: three corners per primitive
    pub const RECTLIST: u32 = 17;
}

/// GCR_CNTL: gfx10 global cache control, the payload tail of ACQUIRE_MEM
pub mod gcr {
    pub const fn gl1_inv(x: u32) -> u32 {
        x
    }
    pub const fn glv_inv(x: u32) -> u32 {
        x << 1
    }
    pub const fn glk_inv(x: u32) -> u32 {
        x << 2
    }
    pub const fn glm_wb(x: u32) -> u32 {
        x << 4
    }
    pub const fn glm_inv(x: u32) -> u32 {
        x << 5
    }
    pub const fn gli_inv(x: u32) -> u32 {
        x << 14
    }
    pub const fn gl2_inv(x: u32) -> u32 {
        x << 20
    }
    pub const fn gl2_wb(x: u32) -> u32 {
        x << 21
    }

    /// Invalidate every instruction/constant/vector/metadata cache and
    /// write back + invalidate L2
    pub const INVALIDATE_ALL: u32 = gli_inv(1)
        | gl1_inv(1)
        | glk_inv(1)
        | gl2_inv(1)
        | gl2_wb(1)
        | glm_inv(1)
        | glm_wb(1)
        | glv_inv(1);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_info_fields_compose() {
        let info = cb_color_info::format(cb_color_info::COLOR_8_8_8_8)
            | cb_color_info::comp_swap(cb_color_info::SWAP_ALT)
            | cb_color_info::blend_clamp(1)
            | cb_color_info::simple_float(1);
        assert_eq!(info & 0xfc, 10 << 2);
        assert_ne!(info & (1 << 15), 0);
    }

    #[test]
    fn test_scissor_packing() {
        let br = scissor::br_x(256) | scissor::br_y(256);
        assert_eq!(br, 256 | 256 << 16);
    }

    #[test]
    fn test_register_spaces_hold() {
        use cinder_cmd::RegSpace;
        assert_eq!(DB_DEPTH_CONTROL.space(), RegSpace::Context);
        assert_eq!(SPI_SHADER_PGM_LO_VS.space(), RegSpace::Sh);
        assert_eq!(VGT_PRIMITIVE_TYPE.space(), RegSpace::Uconfig);
    }
}
