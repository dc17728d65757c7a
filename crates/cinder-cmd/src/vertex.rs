//! # Vertex Batch Accumulator
//!
//! Rectangles are recorded as vertex pairs and drawn in batches: appending
//! is cheap, and one draw packet covers everything accumulated since the
//! last flush boundary. Batching amortizes packet overhead across
//! rectangles that share the same pipeline and shader state.
//!
//! Layout: the first 16 bytes of the buffer hold the 4-word hardware
//! buffer descriptor the vertex shader fetches through; vertex data starts
//! right after it. Write (`len`) and flush (`pos`) positions are tracked in
//! words relative to the data region, with `pos <= len <= capacity`.

use alloc::sync::Arc;
use core::ptr::NonNull;

use cinder_core::{Box2, GpuAddr, GpuDevice, MemoryHandle, Result};
use cinder_mem::{BoDesc, BufferObject};

// =============================================================================
// GEOMETRY CONSTANTS
// =============================================================================

/// Words per vertex: packed (x, y)
pub const WORDS_PER_VERTEX: u32 = 2;

/// Vertices per rectangle: three corners of a rect-list primitive; the
/// hardware derives the fourth
pub const VERTS_PER_RECT: u32 = 3;

/// Bytes reserved at the buffer start for the hardware descriptor
pub const DESC_BYTES: u64 = 16;

// =============================================================================
// VERTEX BUFFER
// =============================================================================

/// Append-only rectangle geometry buffer with a flush boundary
///
/// `[pos, len)` is the unflushed region: vertices not yet referenced by an
/// emitted draw packet.
pub struct VertBuf<D: GpuDevice> {
    bo: BufferObject<D>,
    data: NonNull<u32>,
    len: u32,
    pos: u32,
    cap: u32,
}

impl<D: GpuDevice> VertBuf<D> {
    /// Allocate and map a vertex buffer of `capacity_bytes`
    ///
    /// `descriptor` receives the data region's address and size and returns
    /// the 4-word hardware buffer descriptor the vertex shader fetches
    /// through; it is written once and never regenerated. The address range
    /// is confined to 32 bits because the descriptor stores the base as a
    /// low word plus a short high field.
    pub fn new(
        dev: &Arc<D>,
        capacity_bytes: u64,
        descriptor: impl FnOnce(GpuAddr, u64) -> [u32; 4],
    ) -> Result<Self> {
        let desc = BoDesc::staging(capacity_bytes, 0x400).with_32bit_range();
        let mut bo = BufferObject::allocate(dev, &desc)?;
        let descriptor = descriptor(bo.addr().offset(DESC_BYTES), capacity_bytes - DESC_BYTES);
        let base = bo.map_cpu()?.cast::<u32>();
        // SAFETY: the mapping covers `capacity_bytes >= DESC_BYTES` bytes.
        let data = unsafe {
            for (i, word) in descriptor.iter().enumerate() {
                base.as_ptr().add(i).write(*word);
            }
            NonNull::new_unchecked(base.as_ptr().add((DESC_BYTES / 4) as usize))
        };
        Ok(Self {
            bo,
            data,
            len: 0,
            pos: 0,
            cap: ((capacity_bytes - DESC_BYTES) / 4) as u32,
        })
    }

    /// GPU address of the buffer start (the descriptor)
    #[inline]
    pub fn addr(&self) -> GpuAddr {
        self.bo.addr()
    }

    /// GPU address of the vertex data region
    #[inline]
    pub fn data_addr(&self) -> GpuAddr {
        self.bo.addr().offset(DESC_BYTES)
    }

    /// Device memory handle of the backing store
    #[inline]
    pub fn memory(&self) -> MemoryHandle {
        self.bo.memory()
    }

    /// Size of the data region in bytes
    #[inline]
    pub fn data_bytes(&self) -> u64 {
        self.cap as u64 * 4
    }

    /// Whether `words` more words fit
    #[inline]
    pub fn has_room(&self, words: u32) -> bool {
        self.len + words <= self.cap
    }

    /// Vertices appended since the last flush boundary
    #[inline]
    pub fn pending_vertices(&self) -> u32 {
        (self.len - self.pos) / WORDS_PER_VERTEX
    }

    /// Index of the first unflushed vertex, as passed to the vertex shader
    #[inline]
    pub fn start_vertex(&self) -> u32 {
        self.pos / WORDS_PER_VERTEX
    }

    /// Append one rectangle as three rect-list corners
    pub fn append_rect(&mut self, rect: Box2) {
        assert!(
            self.has_room(VERTS_PER_RECT * WORDS_PER_VERTEX),
            "vertex buffer overflow"
        );
        let words = [
            rect.x1 as u32,
            rect.y1 as u32,
            rect.x1 as u32,
            rect.y2 as u32,
            rect.x2 as u32,
            rect.y1 as u32,
        ];
        // SAFETY: room asserted above; the mapping is exclusively ours.
        unsafe {
            core::ptr::copy_nonoverlapping(
                words.as_ptr(),
                self.data.as_ptr().add(self.len as usize),
                words.len(),
            );
        }
        self.len += words.len() as u32;
    }

    /// Advance the flush boundary past everything appended so far
    ///
    /// The caller emits exactly one draw packet covering the region this
    /// consumes.
    pub fn mark_flushed(&mut self) {
        log::trace!("flush boundary: {} pending vertices", self.pending_vertices());
        self.pos = self.len;
    }

    /// Reset both positions to zero; contents are reused, not cleared
    #[inline]
    pub fn reset(&mut self) {
        self.len = 0;
        self.pos = 0;
    }

    /// The data-region words written so far, for inspection
    pub fn as_words(&self) -> &[u32] {
        // SAFETY: the mapping covers `cap` words past the descriptor and
        // `len <= cap`.
        unsafe { core::slice::from_raw_parts(self.data.as_ptr(), self.len as usize) }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_test_framework::SoftDevice;

    fn vertbuf(capacity: u64) -> (Arc<SoftDevice>, VertBuf<SoftDevice>) {
        let dev = Arc::new(SoftDevice::new());
        let vb = VertBuf::new(&dev, capacity, |_, _| [0xa, 0xb, 0xc, 0xd]).unwrap();
        (dev, vb)
    }

    #[test]
    fn test_descriptor_written_at_buffer_start() {
        let (dev, vb) = vertbuf(0x400);
        assert_eq!(dev.read_words(vb.addr(), 4), [0xa, 0xb, 0xc, 0xd]);
        assert_eq!(vb.data_addr().raw(), vb.addr().raw() + 16);
    }

    #[test]
    fn test_rect_encodes_three_corners() {
        let (_dev, mut vb) = vertbuf(0x400);
        vb.append_rect(Box2::new(1, 2, 30, 40));
        assert_eq!(vb.as_words(), &[1, 2, 1, 40, 30, 2]);
        assert_eq!(vb.pending_vertices(), 3);
    }

    #[test]
    fn test_vertex_count_tracks_rect_count() {
        let (_dev, mut vb) = vertbuf(0x400);
        for i in 0..5 {
            vb.append_rect(Box2::from_extent(i, i, 8, 8));
        }
        assert_eq!(vb.pending_vertices(), 5 * VERTS_PER_RECT);
    }

    #[test]
    fn test_flush_boundary_advances() {
        let (_dev, mut vb) = vertbuf(0x400);
        vb.append_rect(Box2::new(0, 0, 4, 4));
        vb.mark_flushed();
        assert_eq!(vb.pending_vertices(), 0);
        assert_eq!(vb.start_vertex(), 3);
        vb.append_rect(Box2::new(4, 4, 8, 8));
        assert_eq!(vb.pending_vertices(), 3);
        assert_eq!(vb.start_vertex(), 3);
    }

    #[test]
    fn test_reset_zeroes_both_positions() {
        let (_dev, mut vb) = vertbuf(0x400);
        vb.append_rect(Box2::new(0, 0, 4, 4));
        vb.mark_flushed();
        vb.reset();
        assert_eq!(vb.pending_vertices(), 0);
        assert_eq!(vb.start_vertex(), 0);
        assert!(vb.has_room(6));
    }

    #[test]
    fn test_capacity_excludes_descriptor() {
        let (_dev, vb) = vertbuf(64);
        // 64 bytes minus the 16-byte descriptor leaves room for 2 rects.
        assert!(vb.has_room(12));
        assert!(!vb.has_room(13));
    }

    #[test]
    #[should_panic(expected = "vertex buffer overflow")]
    fn test_overflow_is_fatal() {
        let (_dev, mut vb) = vertbuf(40);
        // One rect fits in the 24 data bytes; the second must not.
        vb.append_rect(Box2::new(0, 0, 1, 1));
        vb.append_rect(Box2::new(0, 0, 1, 1));
    }
}
