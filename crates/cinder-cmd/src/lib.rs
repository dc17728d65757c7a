//! # CINDER Command Streams
//!
//! Hand-encoded GPU command buffers and the vertex batch that feeds them.
//!
//! The GPU's command processor consumes a flat stream of 32-bit words
//! grouped into self-describing packets (opcode + length + payload). This
//! crate provides:
//!
//! - [`packet`]: the type-3 packet vocabulary, register spaces, and event
//!   encodings
//! - [`CmdBuf`]: an owned, fixed-capacity, host-mapped word stream with
//!   typed packet emitters
//! - [`VertBuf`]: an append-only rectangle geometry buffer with a flush
//!   boundary, drawn from by auto-indexed draw packets
//!
//! Capacity overflow is a configuration error, not a runtime condition:
//! buffers are sized generously at creation and every emission asserts.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod buffer;
pub mod packet;
pub mod vertex;

pub use buffer::CmdBuf;
pub use packet::{EventType, Pkt3Op, Reg, RegSpace};
pub use vertex::VertBuf;
