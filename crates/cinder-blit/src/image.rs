//! # Images
//!
//! Rectangular pixel surfaces in device-local memory. An image created as a
//! destination owns a draw context: the command buffer its state and draw
//! packets are recorded into, and the vertex buffer its rectangle batches
//! accumulate in.

use alloc::sync::Arc;

use cinder_cmd::{CmdBuf, VertBuf};
use cinder_core::{align_up, GpuAddr, GpuDevice, MemoryHandle, PixelFormat, Result};
use cinder_mem::{BoDesc, BufferObject};

use crate::descriptor;
use crate::profile::ChipProfile;

// =============================================================================
// DRAW CONFIGURATION
// =============================================================================

/// Buffer capacities for a destination's draw context
///
/// Capacities are fixed at creation and sized generously for the expected
/// workload; overflowing one is a configuration error.
#[derive(Debug, Clone, Copy)]
pub struct DrawConfig {
    /// Command buffer capacity in bytes
    pub cmd_bytes: u64,
    /// Vertex buffer capacity in bytes (including the descriptor prefix)
    pub vert_bytes: u64,
    /// Static init block capacity in bytes
    pub init_bytes: u64,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            cmd_bytes: 80 * 1024,
            vert_bytes: 80 * 1024,
            init_bytes: 0x4000,
        }
    }
}

// =============================================================================
// DRAW CONTEXT
// =============================================================================

/// The recording state owned by one destination image
pub struct DrawContext<D: GpuDevice> {
    /// Command stream for this destination
    pub cmd: CmdBuf<D>,
    /// Rectangle batch for this destination
    pub vert: VertBuf<D>,
}

impl<D: GpuDevice> DrawContext<D> {
    fn new(dev: &Arc<D>, config: &DrawConfig) -> Result<Self> {
        let cmd = CmdBuf::new(dev, config.cmd_bytes)?;
        let vert = VertBuf::new(dev, config.vert_bytes, descriptor::vertex_buffer)?;
        Ok(Self { cmd, vert })
    }
}

// =============================================================================
// IMAGE
// =============================================================================

/// Image surface alignment: tiled layouts operate on 128-element blocks
const PITCH_ALIGN_PIXELS: u64 = 128;
/// Surface base alignment required by the tiled layouts
const SURFACE_ALIGN: u64 = 0x4_0000;

/// A pixel surface in device-local memory
pub struct Image<D: GpuDevice> {
    width: u32,
    height: u32,
    format: PixelFormat,
    stride_bytes: u32,
    bo: BufferObject<D>,
    desc: [u32; 4],
    draw: Option<DrawContext<D>>,
}

impl<D: GpuDevice> Image<D> {
    /// Allocate an image surface
    ///
    /// Builds the texture descriptor once - backing addresses never change
    /// after creation - and attaches a draw context iff the image can be a
    /// destination.
    pub fn create(
        dev: &Arc<D>,
        profile: &ChipProfile,
        config: &DrawConfig,
        width: u32,
        height: u32,
        format: PixelFormat,
        drawable: bool,
    ) -> Result<Self> {
        let stride_bytes =
            (align_up(width as u64, PITCH_ALIGN_PIXELS) * format.bytes_per_pixel() as u64) as u32;
        let size = stride_bytes as u64 * align_up(height as u64, PITCH_ALIGN_PIXELS);
        let bo = BufferObject::allocate(dev, &BoDesc::device_local(size, SURFACE_ALIGN))?;
        let desc = descriptor::image(bo.addr(), stride_bytes, height, profile.swizzle_mode);
        bo.set_tiling(profile.tiling_metadata)?;

        let draw = if drawable {
            Some(DrawContext::new(dev, config)?)
        } else {
            None
        };

        Ok(Self {
            width,
            height,
            format,
            stride_bytes,
            bo,
            desc,
            draw,
        })
    }

    /// Width in pixels
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Row stride in bytes
    #[inline]
    pub fn stride_bytes(&self) -> u32 {
        self.stride_bytes
    }

    /// Surface base address
    #[inline]
    pub fn addr(&self) -> GpuAddr {
        self.bo.addr()
    }

    /// Device memory handle of the surface
    #[inline]
    pub fn memory(&self) -> MemoryHandle {
        self.bo.memory()
    }

    /// The texture descriptor the pixel shader samples through
    #[inline]
    pub fn descriptor(&self) -> &[u32; 4] {
        &self.desc
    }

    /// Draw context, present iff the image is a drawable destination
    #[inline]
    pub fn draw(&self) -> Option<&DrawContext<D>> {
        self.draw.as_ref()
    }

    /// Mutable draw context
    #[inline]
    pub fn draw_mut(&mut self) -> Option<&mut DrawContext<D>> {
        self.draw.as_mut()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::ChipFamily;
    use cinder_test_framework::SoftDevice;

    fn create(width: u32, height: u32, drawable: bool) -> Image<SoftDevice> {
        let dev = Arc::new(SoftDevice::new());
        let profile = ChipProfile::probe(ChipFamily::Navi).unwrap();
        Image::create(
            &dev,
            profile,
            &DrawConfig::default(),
            width,
            height,
            PixelFormat::Bgrx8888,
            drawable,
        )
        .unwrap()
    }

    #[test]
    fn test_stride_is_pitch_aligned() {
        let img = create(200, 100, false);
        assert_eq!(img.stride_bytes(), 256 * 4);
        assert!(img.draw().is_none());
    }

    #[test]
    fn test_destination_owns_draw_context() {
        let img = create(64, 64, true);
        let draw = img.draw().unwrap();
        assert!(draw.cmd.is_empty());
        assert_eq!(draw.vert.pending_vertices(), 0);
    }

    #[test]
    fn test_descriptor_base_matches_surface() {
        let img = create(256, 256, false);
        assert_eq!(img.descriptor()[0], img.addr().shifted(8));
    }
}
