//! # CINDER Native Backend
//!
//! The direct-submission acceleration backend: rectangle copy/fill/blend
//! with hand-encoded command streams, no graphics API in between.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       NativeContext                          │
//! │                                                              │
//! │  setup ──▶ state machine ──▶ packet sequences ──┐            │
//! │  rects ──▶ vertex batch   ──▶ draw packets    ──┼─▶ CmdBuf   │
//! │  submit ─▶ pad + resource list ─────────────────┘     │      │
//! │                                                       ▼      │
//! │                 GpuDevice (graphics queue, in-order)         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Module map:
//! - [`regs`]: the register-layout table and bitfield builders
//! - [`descriptor`]: hardware buffer/image descriptor builders
//! - [`profile`]: generation-keyed parameter tables and init programs
//! - [`shader`]: the three fixed shader binaries
//! - [`image`]: surfaces and their draw contexts
//! - [`context`]: the Idle/Active state machine
//! - [`submit`]: padding, dependency lists, enqueue

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod context;
pub mod descriptor;
pub mod image;
pub mod profile;
#[allow(missing_docs)]
pub mod regs;
pub mod shader;
pub mod submit;

// Re-exports
pub use context::NativeContext;
pub use image::{DrawConfig, Image};
pub use profile::ChipProfile;
pub use shader::Shader;
