//! # Buffer Objects
//!
//! A [`BufferObject`] owns a region of device memory and the reserved
//! virtual-address range it is bound into. The address range exists before
//! the memory, and the memory is bound into the range before any command
//! referencing the address may be submitted.

use alloc::sync::Arc;
use core::ptr::NonNull;

use cinder_core::{
    Access, Error, GpuAddr, GpuDevice, MemFlags, MemoryDomain, MemoryHandle, Result, VaFlags,
    VaRangeHandle,
};

// =============================================================================
// ALLOCATION DESCRIPTOR
// =============================================================================

/// Parameters for one buffer object allocation
#[derive(Debug, Clone, Copy)]
pub struct BoDesc {
    /// Size in bytes
    pub size: u64,
    /// Alignment of both the address range and the physical allocation
    pub alignment: u64,
    /// Memory domain
    pub domain: MemoryDomain,
    /// Allocation flags
    pub flags: MemFlags,
    /// Address-range flags (in addition to the high-range preference)
    pub va_flags: VaFlags,
}

impl BoDesc {
    /// Descriptor for a host-written buffer in the staging domain
    pub const fn staging(size: u64, alignment: u64) -> Self {
        Self {
            size,
            alignment,
            domain: MemoryDomain::HostStaging,
            flags: MemFlags::HOST_MAPPABLE,
            va_flags: VaFlags::empty(),
        }
    }

    /// Descriptor for a device-local buffer
    pub const fn device_local(size: u64, alignment: u64) -> Self {
        Self {
            size,
            alignment,
            domain: MemoryDomain::DeviceLocal,
            flags: MemFlags::empty(),
            va_flags: VaFlags::empty(),
        }
    }

    /// Restrict the address range to the low 32 bits
    pub const fn with_32bit_range(mut self) -> Self {
        self.va_flags = self.va_flags.union(VaFlags::RANGE_32BIT);
        self
    }

    /// Add allocation flags
    pub const fn with_flags(mut self, flags: MemFlags) -> Self {
        self.flags = self.flags.union(flags);
        self
    }
}

// =============================================================================
// BUFFER OBJECT
// =============================================================================

/// Device memory bound into a reserved virtual-address range
///
/// Dropping the object tears the triple down in exactly the reverse of
/// acquisition order: CPU mapping, binding, memory, address range.
pub struct BufferObject<D: GpuDevice> {
    dev: Arc<D>,
    mem: MemoryHandle,
    va: VaRangeHandle,
    addr: GpuAddr,
    size: u64,
    mapping: Option<NonNull<u8>>,
}

impl<D: GpuDevice> core::fmt::Debug for BufferObject<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferObject")
            .field("mem", &self.mem)
            .field("va", &self.va)
            .field("addr", &self.addr)
            .field("size", &self.size)
            .field("mapping", &self.mapping)
            .finish()
    }
}

impl<D: GpuDevice> BufferObject<D> {
    /// Allocate a buffer object
    ///
    /// Reserves the address range, allocates memory, and binds it with
    /// read+write+execute access. Atomic from the caller's perspective: a
    /// failure at any step unwinds the previously acquired sub-resources in
    /// reverse before the error is returned.
    pub fn allocate(dev: &Arc<D>, desc: &BoDesc) -> Result<Self> {
        let va = dev.reserve_va(desc.size, desc.alignment, VaFlags::HIGH | desc.va_flags)?;

        let mem = match dev.alloc_memory(desc.size, desc.alignment, desc.domain, desc.flags) {
            Ok(mem) => mem,
            Err(err) => {
                dev.release_va(va.handle);
                return Err(err);
            }
        };

        if let Err(err) = dev.bind_va(mem, va.addr, desc.size, Access::RWX) {
            dev.free_memory(mem);
            dev.release_va(va.handle);
            return Err(err);
        }

        Ok(Self {
            dev: Arc::clone(dev),
            mem,
            va: va.handle,
            addr: va.addr,
            size: desc.size,
            mapping: None,
        })
    }

    /// GPU virtual address of the buffer
    #[inline]
    pub fn addr(&self) -> GpuAddr {
        self.addr
    }

    /// Size in bytes
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Device memory handle, as referenced in submission resource lists
    #[inline]
    pub fn memory(&self) -> MemoryHandle {
        self.mem
    }

    /// Map the buffer into CPU address space
    ///
    /// Valid only for host-mappable allocations; the pointer stays valid
    /// until [`BufferObject::unmap_cpu`] or drop.
    pub fn map_cpu(&mut self) -> Result<NonNull<u8>> {
        if let Some(ptr) = self.mapping {
            return Ok(ptr);
        }
        let ptr = self.dev.map_cpu(self.mem).inspect_err(|err| {
            log::debug!("cpu map of {:?} failed: {}", self.mem, err);
        })?;
        self.mapping = Some(ptr);
        Ok(ptr)
    }

    /// Release the CPU mapping, if any
    pub fn unmap_cpu(&mut self) {
        if self.mapping.take().is_some() {
            self.dev.unmap_cpu(self.mem);
        }
    }

    /// Copy `bytes` into the buffer through a transient CPU mapping
    pub fn upload(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() as u64 > self.size {
            return Err(Error::MapFailed);
        }
        let ptr = self.map_cpu()?;
        // SAFETY: the mapping covers `size` bytes and `bytes` fits; the
        // device guarantees the pointer until unmap.
        unsafe {
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
        }
        self.unmap_cpu();
        Ok(())
    }

    /// Attach tiling metadata for cross-process consumers
    pub fn set_tiling(&self, tiling: u64) -> Result<()> {
        self.dev.set_tiling(self.mem, tiling)
    }
}

impl<D: GpuDevice> Drop for BufferObject<D> {
    fn drop(&mut self) {
        self.unmap_cpu();
        // The binding may already be gone if the device tore it down with
        // the unmap; unbind_va tolerates that.
        self.dev.unbind_va(self.mem, self.addr, self.size);
        self.dev.free_memory(self.mem);
        self.dev.release_va(self.va);
    }
}

// SAFETY: the CPU mapping pointer is exclusively owned by this object and
// only dereferenced through &mut access.
unsafe impl<D: GpuDevice> Send for BufferObject<D> {}

// =============================================================================
// TESTS
// =============================================================================
