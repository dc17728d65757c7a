//! # CINDER Error Handling
//!
//! Unified error type for the blit engine.
//!
//! Error handling follows these principles:
//! - Errors are returned values, never faults; no panics on user input
//! - A failed call mutates no recorded operand state
//! - Resource-acquisition failures roll back partial acquisitions before
//!   the error is reported
//! - Errors are `no_std` compatible

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// CINDER Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// ERROR ENUM
// =============================================================================

/// CINDER unified error type
///
/// Covers all error conditions across the engine, grouped by subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Resource Exhaustion
    // =========================================================================
    /// No virtual-address range of the requested size/alignment available
    OutOfRanges,
    /// Device memory allocation failed
    OutOfMemory,
    /// Binding memory into a reserved range failed
    BindFailed,
    /// CPU mapping of a host-visible allocation failed
    MapFailed,

    // =========================================================================
    // Protocol Violations
    // =========================================================================
    /// A mask operand was supplied; masks are not supported
    MaskUnsupported,
    /// The destination image was not created with the DST flag
    NotDrawable,
    /// An image handle does not belong to this context
    UnknownImage,
    /// The source operand kind is not recognized by this backend
    UnknownSource,
    /// Geometry was appended with no destination bound
    NoDestination,
    /// The image is currently bound as an operand
    ImageInUse,
    /// The pixel format is not supported
    UnsupportedFormat,
    /// The device's hardware family has no command-stream profile
    UnsupportedChip,

    // =========================================================================
    // Submission
    // =========================================================================
    /// The execution queue rejected the job; affected buffers must be
    /// re-recorded, not replayed
    SubmissionFailed,
    /// Building the submission dependency list failed
    ResourceListFailed,
}

impl Error {
    /// Whether this error is a resource-exhaustion condition (propagated,
    /// never retried)
    pub const fn is_exhaustion(self) -> bool {
        matches!(
            self,
            Self::OutOfRanges | Self::OutOfMemory | Self::BindFailed | Self::MapFailed
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Exhaustion
            Self::OutOfRanges => write!(f, "out of virtual-address ranges"),
            Self::OutOfMemory => write!(f, "out of device memory"),
            Self::BindFailed => write!(f, "virtual-address binding failed"),
            Self::MapFailed => write!(f, "CPU mapping failed"),

            // Protocol
            Self::MaskUnsupported => write!(f, "mask operands are not supported"),
            Self::NotDrawable => write!(f, "image is not a drawable destination"),
            Self::UnknownImage => write!(f, "image handle not owned by this context"),
            Self::UnknownSource => write!(f, "unrecognized source operand"),
            Self::NoDestination => write!(f, "no destination bound"),
            Self::ImageInUse => write!(f, "image is bound as an operand"),
            Self::UnsupportedFormat => write!(f, "unsupported pixel format"),
            Self::UnsupportedChip => write!(f, "unsupported hardware family"),

            // Submission
            Self::SubmissionFailed => write!(f, "queue rejected the submission"),
            Self::ResourceListFailed => write!(f, "resource list creation failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

// =============================================================================
// TESTS
// =============================================================================
