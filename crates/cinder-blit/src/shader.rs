//! # Shader Resources
//!
//! The three fixed shader programs the backend ever runs, uploaded once
//! into device-local memory at backend init and referenced by address
//! thereafter:
//!
//! - **vert**: positions rect-list corners from the vertex buffer, offset
//!   by the destination/source translation in its user registers
//! - **fill**: exports the solid color held in its constant registers
//! - **copy**: samples the bound source descriptor at the translated
//!   coordinate
//!
//! Each binary carries small register-configuration metadata (`rsrc1`,
//! `rsrc2`) that is written alongside the program address when the shader
//! is bound.

use alloc::sync::Arc;

use cinder_core::{align_up, GpuAddr, GpuDevice, MemFlags, MemoryHandle, Result};
use cinder_mem::{BoDesc, BufferObject};

use crate::regs::{pgm_rsrc1, pgm_rsrc2};

// =============================================================================
// SHADER METADATA
// =============================================================================

/// Fixed register-configuration metadata of a compiled shader
#[derive(Debug, Clone, Copy)]
pub struct ShaderInfo {
    /// PGM_RSRC1 register-count/mode bits
    pub rsrc1: u32,
    /// PGM_RSRC2 user-register bits
    pub rsrc2: u32,
}

// =============================================================================
// SHADER BINARIES
// =============================================================================

/// Instruction-cache prefetch marker padding the end of every program
pub const CODE_END: u32 = 0xbf9f_0000;

/// Slack appended past the code so the prefetcher never walks off the
/// allocation, plus the code-end markers themselves
const CODE_PAD_BYTES: u64 = 0xc0;

/// gfx10 vertex shader: reads an (x, y) pair through the buffer descriptor
/// in s\[2:3\], applies the translation in s\[4:7\], exports the position
pub const VERT_CODE: &[u32] = &[
    0xf4040100, 0xfa000000, // s_load_dwordx2 s[4:5], vertex fetch setup
    0xbf8cc07f, // s_waitcnt
    0xe00c2000, 0x80000100, // buffer_load_format_xy v[1:2]
    0x7e060280, // v_mov_b32 v3, 0
    0x7e0802f2, // v_mov_b32 v4, 1.0
    0xbf8c3f70, // s_waitcnt vmcnt(0)
    0x4a020304, // v_add_nc_u32 v1, v1, s4
    0x4a040505, // v_add_nc_u32 v2, v2, s5
    0x7e020901, // v_cvt_f32_i32 v1, v1
    0x7e040902, // v_cvt_f32_i32 v2, v2
    0xf80008cf, 0x04030201, // exp pos0 v1, v2, v3, v4 done
    0xbf810000, // s_endpgm
    CODE_END, CODE_END, CODE_END, CODE_END, CODE_END,
];

/// gfx10 fill shader: exports the color loaded from s\[2:5\]
pub const FILL_CODE: &[u32] = &[
    0x7e000202, // v_mov_b32 v0, s2
    0x7e020203, // v_mov_b32 v1, s3
    0x7e040204, // v_mov_b32 v2, s4
    0x7e060205, // v_mov_b32 v3, s5
    0xd7610000, 0x00020101, // v_cvt_pk_rtz_f16 v0, v0, v1
    0xd7610001, 0x00020503, // v_cvt_pk_rtz_f16 v1, v2, v3
    0xf8001407, 0x00000100, // exp mrt0 v0, v1 compr done
    0xbf810000, // s_endpgm
    CODE_END, CODE_END, CODE_END, CODE_END, CODE_END,
];

/// gfx10 copy shader: samples the image descriptor in s\[4:7\] at the
/// interpolated coordinate and exports the texel
pub const COPY_CODE: &[u32] = &[
    0xbf8cc07f, // s_waitcnt
    0xf0900f04, 0x00010100, // image_sample v[1:4], v0, s[4:11]
    0xbf8c3f70, // s_waitcnt vmcnt(0)
    0xd7610000, 0x00020301, // v_cvt_pk_rtz_f16 v0, v1, v2
    0xd7610001, 0x00020703, // v_cvt_pk_rtz_f16 v1, v3, v4
    0xf8001407, 0x00000100, // exp mrt0 v0, v1 compr done
    0xbf810000, // s_endpgm
    CODE_END, CODE_END, CODE_END, CODE_END, CODE_END,
];

/// Vertex shader metadata
///
/// s2 = buffer descriptor, s3 = vertex offset, s4 = dst_x, s5 = dst_y,
/// s6 = src_x, s7 = src_y
pub const VERT_INFO: ShaderInfo = ShaderInfo {
    rsrc1: pgm_rsrc1::vgprs(1) | pgm_rsrc1::sgprs(0),
    rsrc2: pgm_rsrc2::user_sgpr(8),
};

/// Fill shader metadata
///
/// s2 = red, s3 = green, s4 = blue, s5 = alpha
pub const FILL_INFO: ShaderInfo = ShaderInfo {
    rsrc1: pgm_rsrc1::vgprs(5) | pgm_rsrc1::sgprs(0),
    rsrc2: pgm_rsrc2::user_sgpr(6),
};

/// Copy shader metadata
///
/// s2 = texture descriptor
pub const COPY_INFO: ShaderInfo = ShaderInfo {
    rsrc1: pgm_rsrc1::vgprs(0) | pgm_rsrc1::sgprs(0),
    rsrc2: pgm_rsrc2::user_sgpr(4),
};

// =============================================================================
// SHADER OBJECT
// =============================================================================

/// A compiled shader resident in device-local memory
pub struct Shader<D: GpuDevice> {
    bo: BufferObject<D>,
    info: ShaderInfo,
}

impl<D: GpuDevice> Shader<D> {
    /// Upload `code` into device-local memory
    pub fn upload(dev: &Arc<D>, code: &[u32], info: ShaderInfo) -> Result<Self> {
        let size = align_up(core::mem::size_of_val(code) as u64 + CODE_PAD_BYTES, 0x100);
        let desc = BoDesc::device_local(size, 0x100).with_flags(MemFlags::HOST_MAPPABLE);
        let mut bo = BufferObject::allocate(dev, &desc)?;
        bo.upload(bytemuck::cast_slice(code))?;
        Ok(Self { bo, info })
    }

    /// Program address, as bound into the PGM_LO/PGM_HI registers
    #[inline]
    pub fn addr(&self) -> GpuAddr {
        self.bo.addr()
    }

    /// Device memory handle, for submission resource lists
    #[inline]
    pub fn memory(&self) -> MemoryHandle {
        self.bo.memory()
    }

    /// Register-configuration metadata
    #[inline]
    pub fn info(&self) -> ShaderInfo {
        self.info
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_test_framework::SoftDevice;

    #[test]
    fn test_upload_places_code_at_base() {
        let dev = Arc::new(SoftDevice::new());
        let sh = Shader::upload(&dev, FILL_CODE, FILL_INFO).unwrap();
        let words = dev.read_words(sh.addr(), FILL_CODE.len());
        assert_eq!(words, FILL_CODE);
        assert!(sh.addr().is_aligned(0x100));
    }

    #[test]
    fn test_every_program_ends_with_code_markers() {
        for code in [VERT_CODE, FILL_CODE, COPY_CODE] {
            assert_eq!(&code[code.len() - 5..], &[CODE_END; 5]);
        }
    }

    #[test]
    fn test_user_register_counts() {
        assert_eq!(VERT_INFO.rsrc2, 8 << 1);
        assert_eq!(FILL_INFO.rsrc2, 6 << 1);
        assert_eq!(COPY_INFO.rsrc2, 4 << 1);
    }
}
