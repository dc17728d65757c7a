//! # Command Buffer
//!
//! An owned, growable-by-append sequence of 32-bit words encoding packets,
//! with a fixed capacity declared at creation.
//!
//! The backing store is a host-mapped buffer object; the GPU consumes it in
//! place after submission. Exceeding the declared capacity is a fatal
//! configuration error - capacities are sized generously up front - so
//! every emission asserts instead of returning an error.

use alloc::sync::Arc;
use core::ptr::NonNull;

use cinder_core::{ChipClass, GpuAddr, GpuDevice, MemoryHandle, Result};
use cinder_mem::{BoDesc, BufferObject};

use crate::packet::{pkt3, EventType, Pkt3Op, Reg, RegSpace, DI_SRC_SEL_AUTO_INDEX, NOP_FILLER};

// =============================================================================
// COMMAND BUFFER
// =============================================================================

/// A fixed-capacity PM4 word stream over a host-mapped buffer object
pub struct CmdBuf<D: GpuDevice> {
    bo: BufferObject<D>,
    ptr: NonNull<u32>,
    len: u32,
    cap: u32,
}

impl<D: GpuDevice> CmdBuf<D> {
    /// Allocate and map a command buffer of `capacity_bytes`
    pub fn new(dev: &Arc<D>, capacity_bytes: u64) -> Result<Self> {
        let mut bo = BufferObject::allocate(dev, &BoDesc::staging(capacity_bytes, 0x100))?;
        let ptr = bo.map_cpu()?.cast::<u32>();
        Ok(Self {
            bo,
            ptr,
            len: 0,
            cap: (capacity_bytes / 4) as u32,
        })
    }

    /// GPU address of the stream start
    #[inline]
    pub fn addr(&self) -> GpuAddr {
        self.bo.addr()
    }

    /// Device memory handle of the backing store
    #[inline]
    pub fn memory(&self) -> MemoryHandle {
        self.bo.memory()
    }

    /// Current length in words
    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    /// Whether nothing has been emitted
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Declared capacity in words
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.cap
    }

    /// Drop all recorded words; the backing store is reused in place
    #[inline]
    pub fn reset(&mut self) {
        self.len = 0;
    }

    /// The recorded words, for inspection
    pub fn as_words(&self) -> &[u32] {
        // SAFETY: the mapping covers `cap` words and `len <= cap`; all words
        // below `len` have been written.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len as usize) }
    }

    // =========================================================================
    // RAW EMISSION
    // =========================================================================

    /// Append one word
    #[inline]
    pub fn emit(&mut self, word: u32) {
        assert!(self.len < self.cap, "command buffer overflow");
        // SAFETY: bounds asserted above; the mapping is exclusively ours.
        unsafe {
            self.ptr.as_ptr().add(self.len as usize).write(word);
        }
        self.len += 1;
    }

    /// Append a run of words
    pub fn emit_all(&mut self, words: &[u32]) {
        assert!(
            self.len as usize + words.len() <= self.cap as usize,
            "command buffer overflow"
        );
        // SAFETY: bounds asserted above.
        unsafe {
            core::ptr::copy_nonoverlapping(
                words.as_ptr(),
                self.ptr.as_ptr().add(self.len as usize),
                words.len(),
            );
        }
        self.len += words.len() as u32;
    }

    // =========================================================================
    // REGISTER WRITES
    // =========================================================================

    fn set_reg_run(&mut self, op: Pkt3Op, reg: Reg, values: &[u32]) {
        self.emit(pkt3(op, values.len() as u32));
        self.emit(reg.packed_index());
        self.emit_all(values);
    }

    /// Write one context register
    pub fn set_context_reg(&mut self, reg: Reg, value: u32) {
        debug_assert_eq!(reg.space(), RegSpace::Context);
        self.set_reg_run(Pkt3Op::SetContextReg, reg, &[value]);
    }

    /// Write a contiguous run of context registers under one header
    pub fn set_context_regs(&mut self, first: Reg, values: &[u32]) {
        debug_assert_eq!(first.space(), RegSpace::Context);
        self.set_reg_run(Pkt3Op::SetContextReg, first, values);
    }

    /// Write one context register in a specific stage slot
    pub fn set_context_reg_idx(&mut self, reg: Reg, idx: u32, value: u32) {
        debug_assert_eq!(reg.space(), RegSpace::Context);
        self.emit(pkt3(Pkt3Op::SetContextReg, 1));
        self.emit(reg.packed_index() | idx << 28);
        self.emit(value);
    }

    /// Write one shader register
    pub fn set_sh_reg(&mut self, reg: Reg, value: u32) {
        debug_assert_eq!(reg.space(), RegSpace::Sh);
        self.set_reg_run(Pkt3Op::SetShReg, reg, &[value]);
    }

    /// Write a contiguous run of shader registers under one header
    pub fn set_sh_regs(&mut self, first: Reg, values: &[u32]) {
        debug_assert_eq!(first.space(), RegSpace::Sh);
        self.set_reg_run(Pkt3Op::SetShReg, first, values);
    }

    /// Write one shader register in a specific stage slot
    ///
    /// gfx10 grew a dedicated indexed opcode; earlier chips encode the slot
    /// in the offset word of the plain packet.
    pub fn set_sh_reg_idx(&mut self, chip: ChipClass, reg: Reg, idx: u32, value: u32) {
        debug_assert_eq!(reg.space(), RegSpace::Sh);
        let op = if chip.has_indexed_reg_packets() {
            Pkt3Op::SetShRegIndex
        } else {
            Pkt3Op::SetShReg
        };
        self.emit(pkt3(op, 1));
        self.emit(reg.packed_index() | idx << 28);
        self.emit(value);
    }

    /// Write one user-config register
    pub fn set_uconfig_reg(&mut self, reg: Reg, value: u32) {
        debug_assert_eq!(reg.space(), RegSpace::Uconfig);
        self.set_reg_run(Pkt3Op::SetUconfigReg, reg, &[value]);
    }

    /// Write one user-config register in a specific stage slot
    pub fn set_uconfig_reg_idx(&mut self, chip: ChipClass, reg: Reg, idx: u32, value: u32) {
        debug_assert_eq!(reg.space(), RegSpace::Uconfig);
        let op = if chip.has_indexed_reg_packets() {
            Pkt3Op::SetUconfigRegIndex
        } else {
            Pkt3Op::SetUconfigReg
        };
        self.emit(pkt3(op, 1));
        self.emit(reg.packed_index() | idx << 28);
        self.emit(value);
    }

    // =========================================================================
    // EVENTS, BARRIERS, CONTROL FLOW
    // =========================================================================

    /// Fire a pipeline event
    pub fn event_write(&mut self, event: EventType) {
        self.emit(pkt3(Pkt3Op::EventWrite, 0));
        self.emit(event.encode());
    }

    /// Full-range coherency barrier
    ///
    /// Invalidates/writes back the caches named by `gcr_cntl` over the whole
    /// address space before any later read proceeds.
    pub fn acquire_mem(&mut self, gcr_cntl: u32) {
        self.emit_all(&[
            pkt3(Pkt3Op::AcquireMem, 6),
            0,           // legacy coher_cntl; superseded by gcr_cntl
            0xffff_ffff, // coher_size lo
            0x00ff_ffff, // coher_size hi
            0,           // coher_base lo
            0,           // coher_base hi
            10,          // poll interval
            gcr_cntl,
        ]);
    }

    /// Reset most context state to hardware defaults
    pub fn clear_state(&mut self) {
        self.emit(pkt3(Pkt3Op::ClearState, 0));
        self.emit(0);
    }

    /// Jump into and replay another stream by address, without copying it
    pub fn indirect_buffer(&mut self, addr: GpuAddr, len_words: u32) {
        self.emit(pkt3(Pkt3Op::IndirectBuffer, 2));
        self.emit(addr.lo());
        self.emit(addr.hi());
        self.emit(len_words);
    }

    /// Set the instance count for the next draw
    pub fn num_instances(&mut self, count: u32) {
        self.emit(pkt3(Pkt3Op::NumInstances, 0));
        self.emit(count);
    }

    /// Issue `vertex_count` auto-generated indices
    pub fn draw_index_auto(&mut self, vertex_count: u32) {
        self.emit(pkt3(Pkt3Op::DrawIndexAuto, 1));
        self.emit(vertex_count);
        self.emit(DI_SRC_SEL_AUTO_INDEX);
    }

    /// Round the stream up to `granularity` words with no-op filler
    pub fn pad(&mut self, granularity: u32) {
        while self.len % granularity != 0 {
            self.emit(NOP_FILLER);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_test_framework::SoftDevice;

    fn cmdbuf() -> CmdBuf<SoftDevice> {
        CmdBuf::new(&Arc::new(SoftDevice::new()), 0x1000).unwrap()
    }

    #[test]
    fn test_single_reg_write() {
        let mut cmd = cmdbuf();
        cmd.set_context_reg(Reg::context(0x2_8800), 0x1234);
        assert_eq!(
            cmd.as_words(),
            &[pkt3(Pkt3Op::SetContextReg, 1), 0x200, 0x1234]
        );
    }

    #[test]
    fn test_reg_run_batches_under_one_header() {
        let mut cmd = cmdbuf();
        cmd.set_sh_regs(Reg::sh(0x0_b120), &[1, 2, 3, 4]);
        assert_eq!(
            cmd.as_words(),
            &[pkt3(Pkt3Op::SetShReg, 4), 0x48, 1, 2, 3, 4]
        );
    }

    #[test]
    fn test_indexed_write_selects_opcode_by_chip() {
        let mut cmd = cmdbuf();
        cmd.set_sh_reg_idx(ChipClass::Gfx10, Reg::sh(0x0_b118), 3, 7);
        cmd.set_sh_reg_idx(ChipClass::Gfx9, Reg::sh(0x0_b118), 3, 7);
        let words = cmd.as_words();
        assert_eq!(words[0], pkt3(Pkt3Op::SetShRegIndex, 1));
        assert_eq!(words[1], 0x46 | 3 << 28);
        assert_eq!(words[3], pkt3(Pkt3Op::SetShReg, 1));
    }

    #[test]
    fn test_pad_rounds_to_granularity() {
        let mut cmd = cmdbuf();
        cmd.event_write(EventType::PsPartialFlush);
        cmd.pad(8);
        assert_eq!(cmd.len(), 8);
        assert_eq!(cmd.as_words()[2..], [NOP_FILLER; 6]);
        cmd.pad(8);
        assert_eq!(cmd.len(), 8, "already aligned stream must not grow");
    }

    #[test]
    fn test_indirect_buffer_splits_address() {
        let mut cmd = cmdbuf();
        cmd.indirect_buffer(GpuAddr::new(0x1_2345_6780), 64);
        assert_eq!(
            cmd.as_words(),
            &[pkt3(Pkt3Op::IndirectBuffer, 2), 0x2345_6780, 0x1, 64]
        );
    }

    #[test]
    fn test_draw_packet_shape() {
        let mut cmd = cmdbuf();
        cmd.num_instances(1);
        cmd.draw_index_auto(6);
        assert_eq!(
            cmd.as_words(),
            &[
                pkt3(Pkt3Op::NumInstances, 0),
                1,
                pkt3(Pkt3Op::DrawIndexAuto, 1),
                6,
                DI_SRC_SEL_AUTO_INDEX,
            ]
        );
    }

    #[test]
    #[should_panic(expected = "command buffer overflow")]
    fn test_overflow_is_fatal() {
        let mut cmd = CmdBuf::new(&Arc::new(SoftDevice::new()), 16).unwrap();
        for _ in 0..5 {
            cmd.emit(0);
        }
    }

    #[test]
    fn test_reset_reuses_storage() {
        let mut cmd = cmdbuf();
        cmd.emit(0xaaaa);
        cmd.reset();
        assert!(cmd.is_empty());
        cmd.emit(0xbbbb);
        assert_eq!(cmd.as_words(), &[0xbbbb]);
    }
}
