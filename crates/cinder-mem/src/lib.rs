//! # CINDER Memory Management
//!
//! Buffer objects: device memory paired with an explicitly managed
//! virtual-address range.
//!
//! Every GPU-visible resource in the engine (command buffers, vertex
//! buffers, images, shaders, the static init block) is backed by one
//! [`BufferObject`]. Acquisition is a fixed three-step sequence - reserve
//! address range, allocate memory, bind - and teardown reverses it exactly.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bo;

pub use bo::{BoDesc, BufferObject};
