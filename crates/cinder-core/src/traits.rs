//! # CINDER Core Traits
//!
//! The two seams of the engine:
//!
//! - [`GpuDevice`]: abstraction over an externally opened device handle.
//!   Backends drive the device exclusively through this trait, which mirrors
//!   the kernel driver interface: virtual-address reservation, memory
//!   allocation, binding, CPU mapping, and queue submission.
//! - [`BlitBackend`]: the contract a rendering backend fulfils. The native
//!   command-stream backend implements it by hand-encoding packets; a
//!   graphics-API backend can implement the same contract. Calling code is
//!   generic over this trait and picks one implementation at startup.

use core::ptr::NonNull;

use crate::error::Result;
use crate::format::{BlitOp, Color, ImageFlags, SolidOperand, Source};
use crate::types::*;

// =============================================================================
// MEMORY DOMAINS & FLAGS
// =============================================================================

/// Where a device memory allocation should live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryDomain {
    /// Device-local memory (VRAM); fastest for GPU access
    DeviceLocal,
    /// CPU-visible staging memory (GTT); for buffers written by the host
    HostStaging,
}

bitflags::bitflags! {
    /// Flags for device memory allocation
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemFlags: u32 {
        /// Allocation must be mappable into the CPU address space
        const HOST_MAPPABLE = 1 << 0;
        /// Synchronization is managed explicitly, not by the kernel
        const EXPLICIT_SYNC = 1 << 1;
        /// Allocation is never shared across processes
        const NO_SHARING = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Flags for virtual-address range reservation
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VaFlags: u32 {
        /// Prefer the high end of the address space
        const HIGH = 1 << 0;
        /// Range must be addressable with 32 bits (hardware descriptors
        /// that store only a low word plus a short high field)
        const RANGE_32BIT = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Page access permissions for a virtual-address binding
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u32 {
        /// GPU reads
        const READ = 1 << 0;
        /// GPU writes
        const WRITE = 1 << 1;
        /// GPU instruction fetch (shader code)
        const EXECUTE = 1 << 2;
    }
}

impl Access {
    /// Read + write + execute; the binding mode used for every engine buffer
    pub const RWX: Self = Self::READ.union(Self::WRITE).union(Self::EXECUTE);
}

// =============================================================================
// DEVICE INFO & RESERVATIONS
// =============================================================================

/// Static device information queried once at backend creation
#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    /// Hardware family reported by the kernel driver
    pub family: ChipFamily,
}

/// A reserved (but not yet backed) virtual-address range
#[derive(Debug, Clone, Copy)]
pub struct VaReservation {
    /// Handle used to release the range
    pub handle: VaRangeHandle,
    /// Start address of the range
    pub addr: GpuAddr,
}

// =============================================================================
// SUBMISSION
// =============================================================================

/// A single job handed to the graphics queue
///
/// The queue executes jobs in order; the engine relies on that ordering
/// instead of completion fences when reusing buffer memory.
#[derive(Debug, Clone, Copy)]
pub struct SubmitJob {
    /// Address of the command buffer to execute
    pub ib_addr: GpuAddr,
    /// Length of the command buffer in words (must be a multiple of the
    /// hardware submission granularity)
    pub ib_len_words: u32,
    /// Every buffer the command stream touches
    pub resources: ResourceListHandle,
}

// =============================================================================
// GPU DEVICE TRAIT
// =============================================================================

/// Abstraction over the externally opened GPU device handle
///
/// All methods are synchronous; `submit` enqueues work and returns
/// immediately. Implementations must serialize producer/consumer access to
/// submitted buffers via in-order queue execution.
pub trait GpuDevice: Send + Sync {
    /// Query static device information
    fn info(&self) -> DeviceInfo;

    /// Reserve a virtual-address range of `size` bytes aligned to `alignment`
    fn reserve_va(&self, size: u64, alignment: u64, flags: VaFlags) -> Result<VaReservation>;

    /// Release a reserved range
    fn release_va(&self, range: VaRangeHandle);

    /// Allocate device memory in the given domain
    fn alloc_memory(
        &self,
        size: u64,
        alignment: u64,
        domain: MemoryDomain,
        flags: MemFlags,
    ) -> Result<MemoryHandle>;

    /// Free a device memory allocation
    fn free_memory(&self, mem: MemoryHandle);

    /// Bind `mem` into the address range starting at `addr`
    fn bind_va(&self, mem: MemoryHandle, addr: GpuAddr, size: u64, access: Access) -> Result<()>;

    /// Remove a binding; must tolerate a binding that is already gone
    fn unbind_va(&self, mem: MemoryHandle, addr: GpuAddr, size: u64);

    /// Map a host-mappable allocation into CPU address space
    ///
    /// The pointer stays valid until [`GpuDevice::unmap_cpu`].
    fn map_cpu(&self, mem: MemoryHandle) -> Result<NonNull<u8>>;

    /// Release a CPU mapping
    fn unmap_cpu(&self, mem: MemoryHandle);

    /// Attach tiling metadata to an allocation for cross-process interop
    fn set_tiling(&self, mem: MemoryHandle, tiling: u64) -> Result<()>;

    /// Build the dependency list for a submission
    fn create_resource_list(&self, handles: &[MemoryHandle]) -> Result<ResourceListHandle>;

    /// Release a dependency list
    fn destroy_resource_list(&self, list: ResourceListHandle);

    /// Enqueue one job on the graphics queue with no wait-dependencies
    fn submit(&self, job: &SubmitJob) -> Result<()>;
}

// =============================================================================
// BLIT BACKEND TRAIT
// =============================================================================

/// The rendering contract every acceleration backend implements
///
/// A front end drives the sequence `setup → append_rects* → (next setup or
/// submit)` and records the accepted operation/operand state itself; it must
/// not record operands from a `setup` call that returned an error.
pub trait BlitBackend {
    /// Create an image; `fourcc` must name a supported pixel format
    fn create_image(
        &mut self,
        width: u32,
        height: u32,
        fourcc: u32,
        flags: ImageFlags,
    ) -> Result<ImageId>;

    /// Create a solid-color source operand
    fn create_solid(&self, color: Color) -> SolidOperand;

    /// Destroy an image and release its device resources
    fn destroy_image(&mut self, image: ImageId) -> Result<()>;

    /// Bind the operands for subsequent rectangles
    ///
    /// Changing the destination flushes and submits the previous one.
    /// A non-null mask fails the call.
    fn setup(
        &mut self,
        op: BlitOp,
        dst: Option<ImageId>,
        src: Option<Source>,
        mask: Option<ImageId>,
    ) -> Result<()>;

    /// Append rectangles to the current batch
    fn append_rects(&mut self, rects: &[Box2]) -> Result<()>;

    /// Flush the pending batch and enqueue it on the graphics queue
    fn submit(&mut self) -> Result<()>;
}

// =============================================================================
// STATIC ASSERTIONS
// =============================================================================

// Ensure key types stay cheap to copy and safe to share
static_assertions::assert_impl_all!(GpuAddr: Send, Sync, Copy);
static_assertions::assert_impl_all!(MemoryHandle: Send, Sync, Copy);
static_assertions::assert_impl_all!(SubmitJob: Send, Sync, Copy);
