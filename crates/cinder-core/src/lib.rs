//! # CINDER Core
//!
//! Foundational traits, types, and error handling for the CINDER blit engine.
//!
//! CINDER copies and fills rectangular pixel regions between images on the
//! GPU. This crate holds everything the acceleration backends share:
//!
//! - Strongly typed GPU addresses, sizes, and resource handles
//! - The [`GpuDevice`] trait: the seam between the engine and the kernel
//!   driver interface that actually owns the hardware
//! - The [`BlitBackend`] trait: the contract every backend implements,
//!   whether it hand-encodes command streams or goes through a graphics API
//! - The unified [`Error`] type
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      cinder-core                         │
//! │  ┌────────────┐  ┌─────────────┐  ┌───────────────────┐  │
//! │  │  Traits    │  │   Types     │  │      Error        │  │
//! │  │ (GpuDevice,│  │ (GpuAddr,   │  │     Handling      │  │
//! │  │  Backend)  │  │  Handles)   │  │                   │  │
//! │  └────────────┘  └─────────────┘  └───────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod error;
pub mod format;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use error::{Error, Result};
pub use format::*;
pub use traits::*;
pub use types::*;
