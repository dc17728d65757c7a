//! # CINDER Test Framework
//!
//! A software implementation of the [`GpuDevice`] trait backed by host
//! memory. It gives tests three things real hardware cannot:
//!
//! - **Inspection**: every submission is recorded, and GPU virtual
//!   addresses resolve back to the bytes behind them, so tests can decode
//!   the exact packet stream a backend produced.
//! - **Fault injection**: any allocation step can be forced to fail, to
//!   exercise rollback paths.
//! - **Leak accounting**: live address ranges and allocations are counted,
//!   so a test can assert that an unwound acquisition left nothing behind.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

use std::collections::BTreeMap;
use std::ptr::NonNull;
use std::sync::Mutex;

use cinder_core::{
    Access, ChipFamily, DeviceInfo, Error, GpuAddr, GpuDevice, MemFlags, MemoryDomain,
    MemoryHandle, ResourceListHandle, Result, SubmitJob, VaFlags, VaRangeHandle, VaReservation,
};

// =============================================================================
// EVENTS & FAIL POINTS
// =============================================================================

/// One observed device call, for ordering assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A virtual-address range was reserved
    ReserveVa,
    /// A range was released
    ReleaseVa,
    /// Memory was allocated
    AllocMemory,
    /// Memory was freed
    FreeMemory,
    /// Memory was bound into a range
    BindVa,
    /// A binding was removed
    UnbindVa,
    /// A CPU mapping was created
    MapCpu,
    /// A CPU mapping was released
    UnmapCpu,
    /// A job was submitted
    Submit,
}

/// A device call that can be forced to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// Fail [`GpuDevice::reserve_va`]
    ReserveVa,
    /// Fail [`GpuDevice::alloc_memory`]
    AllocMemory,
    /// Fail [`GpuDevice::bind_va`]
    BindVa,
    /// Fail [`GpuDevice::map_cpu`]
    MapCpu,
    /// Fail [`GpuDevice::create_resource_list`]
    CreateResourceList,
    /// Fail [`GpuDevice::submit`]
    Submit,
}

// =============================================================================
// RECORDS
// =============================================================================

/// One recorded submission
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    /// Command buffer address
    pub ib_addr: GpuAddr,
    /// Command buffer length in words
    pub ib_len_words: u32,
    /// Contents of the resource list at submission time
    pub resources: Vec<MemoryHandle>,
}

#[derive(Debug)]
struct Allocation {
    data: Box<[u8]>,
    mappable: bool,
    mapped: bool,
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    mem: u64,
    addr: u64,
    size: u64,
}

#[derive(Default)]
struct State {
    next_id: u64,
    next_va_high: u64,
    next_va_low: u64,
    allocations: BTreeMap<u64, Allocation>,
    ranges: BTreeMap<u64, u64>, // range id -> start addr
    bindings: Vec<Binding>,
    lists: BTreeMap<u64, Vec<MemoryHandle>>,
    submissions: Vec<SubmissionRecord>,
    events: Vec<DeviceEvent>,
    fail: Option<FailPoint>,
}

// =============================================================================
// SOFT DEVICE
// =============================================================================

/// Software GPU device for tests
pub struct SoftDevice {
    family: ChipFamily,
    state: Mutex<State>,
}

impl SoftDevice {
    /// Create a device reporting the Navi (gfx10) family
    pub fn new() -> Self {
        Self::with_family(ChipFamily::Navi)
    }

    /// Create a device reporting a specific family
    pub fn with_family(family: ChipFamily) -> Self {
        Self {
            family,
            state: Mutex::new(State {
                next_id: 1,
                next_va_high: 0x1_0000_0000,
                next_va_low: 0x40_0000,
                ..State::default()
            }),
        }
    }

    /// Arm a one-shot failure at the given call
    pub fn fail_at(&self, point: FailPoint) {
        self.state.lock().unwrap().fail = Some(point);
    }

    fn take_failure(&self, point: FailPoint) -> bool {
        let mut st = self.state.lock().unwrap();
        if st.fail == Some(point) {
            st.fail = None;
            true
        } else {
            false
        }
    }

    /// Observed call sequence since creation or [`SoftDevice::clear_events`]
    pub fn events(&self) -> Vec<DeviceEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Forget recorded events
    pub fn clear_events(&self) {
        self.state.lock().unwrap().events.clear();
    }

    /// Number of reserved address ranges still live
    pub fn live_va_ranges(&self) -> usize {
        self.state.lock().unwrap().ranges.len()
    }

    /// Number of memory allocations still live
    pub fn live_allocations(&self) -> usize {
        self.state.lock().unwrap().allocations.len()
    }

    /// Handles of every live memory allocation, in creation order
    pub fn live_allocation_handles(&self) -> Vec<MemoryHandle> {
        self.state
            .lock()
            .unwrap()
            .allocations
            .keys()
            .map(|id| MemoryHandle::new(*id))
            .collect()
    }

    /// Number of resource lists not yet destroyed
    pub fn live_resource_lists(&self) -> usize {
        self.state.lock().unwrap().lists.len()
    }

    /// All submissions recorded so far
    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.state.lock().unwrap().submissions.clone()
    }

    /// Read bytes back through a GPU virtual address
    ///
    /// Panics if the address range is not covered by a live binding; a
    /// command stream referencing such an address is broken by definition.
    pub fn read_bytes(&self, addr: GpuAddr, len: usize) -> Vec<u8> {
        let st = self.state.lock().unwrap();
        let a = addr.raw();
        let binding = st
            .bindings
            .iter()
            .find(|b| a >= b.addr && a + len as u64 <= b.addr + b.size)
            .copied()
            .unwrap_or_else(|| panic!("no binding covers {addr}..+{len}"));
        let alloc = &st.allocations[&binding.mem];
        let off = (a - binding.addr) as usize;
        alloc.data[off..off + len].to_vec()
    }

    /// Read 32-bit words back through a GPU virtual address
    pub fn read_words(&self, addr: GpuAddr, words: usize) -> Vec<u32> {
        self.read_bytes(addr, words * 4)
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn push_event(&self, ev: DeviceEvent) {
        self.state.lock().unwrap().events.push(ev);
    }
}

impl Default for SoftDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDevice for SoftDevice {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            family: self.family,
        }
    }

    fn reserve_va(&self, size: u64, alignment: u64, flags: VaFlags) -> Result<VaReservation> {
        self.push_event(DeviceEvent::ReserveVa);
        if self.take_failure(FailPoint::ReserveVa) {
            return Err(Error::OutOfRanges);
        }
        let mut st = self.state.lock().unwrap();
        let alignment = alignment.max(0x1000);
        let addr = if flags.contains(VaFlags::RANGE_32BIT) {
            let addr = cinder_core::align_up(st.next_va_low, alignment);
            st.next_va_low = addr + size;
            assert!(st.next_va_low <= u32::MAX as u64, "32-bit range exhausted");
            addr
        } else {
            let addr = cinder_core::align_up(st.next_va_high, alignment);
            st.next_va_high = addr + size;
            addr
        };
        let id = st.next_id;
        st.next_id += 1;
        st.ranges.insert(id, addr);
        Ok(VaReservation {
            handle: VaRangeHandle::new(id),
            addr: GpuAddr::new(addr),
        })
    }

    fn release_va(&self, range: VaRangeHandle) {
        self.push_event(DeviceEvent::ReleaseVa);
        let mut st = self.state.lock().unwrap();
        st.ranges.remove(&range.id());
    }

    fn alloc_memory(
        &self,
        size: u64,
        _alignment: u64,
        _domain: MemoryDomain,
        flags: MemFlags,
    ) -> Result<MemoryHandle> {
        self.push_event(DeviceEvent::AllocMemory);
        if self.take_failure(FailPoint::AllocMemory) {
            return Err(Error::OutOfMemory);
        }
        let mut st = self.state.lock().unwrap();
        let id = st.next_id;
        st.next_id += 1;
        st.allocations.insert(
            id,
            Allocation {
                data: vec![0u8; size as usize].into_boxed_slice(),
                mappable: flags.contains(MemFlags::HOST_MAPPABLE),
                mapped: false,
            },
        );
        Ok(MemoryHandle::new(id))
    }

    fn free_memory(&self, mem: MemoryHandle) {
        self.push_event(DeviceEvent::FreeMemory);
        let mut st = self.state.lock().unwrap();
        if let Some(alloc) = st.allocations.remove(&mem.id()) {
            assert!(!alloc.mapped, "free of a still-mapped allocation");
        }
    }

    fn bind_va(&self, mem: MemoryHandle, addr: GpuAddr, size: u64, _access: Access) -> Result<()> {
        self.push_event(DeviceEvent::BindVa);
        if self.take_failure(FailPoint::BindVa) {
            return Err(Error::BindFailed);
        }
        let mut st = self.state.lock().unwrap();
        assert!(
            st.allocations.contains_key(&mem.id()),
            "bind of unknown allocation {mem:?}"
        );
        st.bindings.push(Binding {
            mem: mem.id(),
            addr: addr.raw(),
            size,
        });
        Ok(())
    }

    fn unbind_va(&self, mem: MemoryHandle, addr: GpuAddr, _size: u64) {
        self.push_event(DeviceEvent::UnbindVa);
        let mut st = self.state.lock().unwrap();
        // Tolerate a binding that is already gone.
        st.bindings
            .retain(|b| !(b.mem == mem.id() && b.addr == addr.raw()));
    }

    fn map_cpu(&self, mem: MemoryHandle) -> Result<NonNull<u8>> {
        self.push_event(DeviceEvent::MapCpu);
        if self.take_failure(FailPoint::MapCpu) {
            return Err(Error::MapFailed);
        }
        let mut st = self.state.lock().unwrap();
        let alloc = st.allocations.get_mut(&mem.id()).ok_or(Error::MapFailed)?;
        if !alloc.mappable {
            return Err(Error::MapFailed);
        }
        alloc.mapped = true;
        // The boxed slice's heap storage never moves while the allocation
        // lives, so the pointer stays valid until free_memory.
        NonNull::new(alloc.data.as_mut_ptr()).ok_or(Error::MapFailed)
    }

    fn unmap_cpu(&self, mem: MemoryHandle) {
        self.push_event(DeviceEvent::UnmapCpu);
        let mut st = self.state.lock().unwrap();
        if let Some(alloc) = st.allocations.get_mut(&mem.id()) {
            alloc.mapped = false;
        }
    }

    fn set_tiling(&self, mem: MemoryHandle, _tiling: u64) -> Result<()> {
        let st = self.state.lock().unwrap();
        if st.allocations.contains_key(&mem.id()) {
            Ok(())
        } else {
            Err(Error::UnknownImage)
        }
    }

    fn create_resource_list(&self, handles: &[MemoryHandle]) -> Result<ResourceListHandle> {
        if self.take_failure(FailPoint::CreateResourceList) {
            return Err(Error::ResourceListFailed);
        }
        let mut st = self.state.lock().unwrap();
        for h in handles {
            assert!(
                st.allocations.contains_key(&h.id()),
                "resource list names unknown allocation {h:?}"
            );
        }
        let id = st.next_id;
        st.next_id += 1;
        st.lists.insert(id, handles.to_vec());
        Ok(ResourceListHandle::new(id))
    }

    fn destroy_resource_list(&self, list: ResourceListHandle) {
        let mut st = self.state.lock().unwrap();
        st.lists.remove(&list.id());
    }

    fn submit(&self, job: &SubmitJob) -> Result<()> {
        self.push_event(DeviceEvent::Submit);
        if self.take_failure(FailPoint::Submit) {
            return Err(Error::SubmissionFailed);
        }
        let mut st = self.state.lock().unwrap();
        assert_eq!(
            job.ib_len_words % 8,
            0,
            "command buffer length not padded to the submission granularity"
        );
        let resources = st
            .lists
            .get(&job.resources.id())
            .expect("submission references a destroyed resource list")
            .clone();
        st.submissions.push(SubmissionRecord {
            ib_addr: job.ib_addr,
            ib_len_words: job.ib_len_words,
            resources,
        });
        log::debug!(
            "soft submit: ib {} len {} words, {} resources",
            job.ib_addr,
            job.ib_len_words,
            st.submissions.last().unwrap().resources.len()
        );
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_va_readback() {
        let dev = SoftDevice::new();
        let va = dev.reserve_va(0x1000, 0x1000, VaFlags::HIGH).unwrap();
        let mem = dev
            .alloc_memory(
                0x1000,
                0x1000,
                MemoryDomain::HostStaging,
                MemFlags::HOST_MAPPABLE,
            )
            .unwrap();
        dev.bind_va(mem, va.addr, 0x1000, Access::RWX).unwrap();
        let ptr = dev.map_cpu(mem).unwrap();
        unsafe { ptr.as_ptr().cast::<u32>().write(0xc0ffee) };
        assert_eq!(dev.read_words(va.addr, 1), [0xc0ffee]);
    }

    #[test]
    fn test_low_range_stays_32bit() {
        let dev = SoftDevice::new();
        let va = dev
            .reserve_va(0x1000, 0x400, VaFlags::HIGH | VaFlags::RANGE_32BIT)
            .unwrap();
        assert!(va.addr.raw() <= u32::MAX as u64);
    }

    #[test]
    fn test_fail_point_is_one_shot() {
        let dev = SoftDevice::new();
        dev.fail_at(FailPoint::ReserveVa);
        assert!(dev.reserve_va(0x1000, 0x1000, VaFlags::HIGH).is_err());
        assert!(dev.reserve_va(0x1000, 0x1000, VaFlags::HIGH).is_ok());
    }
}
