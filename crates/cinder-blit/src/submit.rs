//! # Submission Pipeline
//!
//! Turns the active destination's recorded stream into one job on the
//! graphics queue: flush the pending batch, pad to the submission
//! granularity, list every buffer the stream touches, enqueue.
//!
//! The queue executes in order and the engine never waits on completion:
//! buffer memory is reused in place for the next recording rather than
//! freed and reallocated.

use arrayvec::ArrayVec;
use cinder_core::{GpuDevice, MemoryHandle, Result, SubmitJob};

use crate::context::NativeContext;
use crate::image::DrawContext;

/// Buffers referenced by any single stream: command, vertex, the three
/// shaders, the static init block, and the destination surface
const RESOURCES_PER_SUBMIT: usize = 7;

impl<D: GpuDevice> NativeContext<D> {
    /// Flush the pending batch and enqueue the stream
    ///
    /// A no-op in the Idle state. An empty pending batch still emits one
    /// zero-length draw packet - harmless, and simpler than special-casing
    /// it. On success the vertex positions are reset and the context
    /// returns to Idle; on queue rejection the command buffer is left
    /// indeterminate and must be re-recorded, not replayed.
    pub fn submit(&mut self) -> Result<()> {
        let Some(dst_id) = self.dst else {
            return Ok(());
        };
        self.flush_draw();

        let img = self
            .images
            .get_mut(&dst_id.id())
            .expect("bound destination disappeared");
        let target_mem = img.memory();
        let DrawContext { cmd, vert } = img.draw_mut().expect("destination is drawable");

        cmd.pad(cinder_cmd::packet::IB_ALIGN_WORDS);
        let (ib_addr, ib_len_words) = (cmd.addr(), cmd.len());

        let mut resources = ArrayVec::<MemoryHandle, RESOURCES_PER_SUBMIT>::new();
        resources.push(cmd.memory());
        resources.push(vert.memory());
        resources.push(self.shaders.vert.memory());
        resources.push(self.shaders.fill.memory());
        resources.push(self.shaders.copy.memory());
        resources.push(self.init.memory());
        resources.push(target_mem);

        let list = self.dev.create_resource_list(&resources)?;
        let job = SubmitJob {
            ib_addr,
            ib_len_words,
            resources: list,
        };
        let outcome = self.dev.submit(&job);
        self.dev.destroy_resource_list(list);
        outcome.inspect_err(|err| log::debug!("submission rejected: {err}"))?;

        // In-order queue execution serializes the GPU's reads against the
        // next recording; positions reset, contents reused in place.
        self.draw_of(dst_id).vert.reset();
        self.dst = None;
        self.src = None;

        log::trace!("submitted {ib_len_words} words to the graphics queue");
        Ok(())
    }
}
