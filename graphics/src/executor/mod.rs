//! Per-frame execution of a compiled plan.
//!
//! Each call to [`Executor::execute_frame`]:
//!
//! 1. Selects `frame % 2` as the write buffer of every temporal slot
//! 2. Walks the steps in order, acquiring output storage, binding inputs
//!    (current values for immediate edges, previous-frame buffers for
//!    feedback edges) and invoking or bypassing the pass
//! 3. Returns transient storage to the pool once its last reader has retired
//! 4. Reads the final outputs out into [`FrameOutputs`]
//! 5. Advances the frame index, which rotates the temporal buffers
//!
//! A failing pass aborts the frame. Everything acquired during the frame is
//! released by a scope guard, and the frame index is not advanced, so the
//! next frame's feedback reads still see the last completed frame.

mod sync;

use crate::compiler::{
    compile, BypassFill, CompileOptions, CompiledPlan, InputBinding, ResourceSlot, SlotId, StepKind,
};
use crate::device::Device;
use crate::error::{CompileError, DeviceError, FrameError};
use crate::graph::{EdgeKind, PassContext, RenderGraph, Submission};
use crate::resources::{ResourcePool, TemporalPair, Texture, TextureDesc};
use crate::types::{luminance, Extent2d, Lifetime, ResourceFormat, Texel};

pub use sync::{Fence, FenceStatus};

/// One final output read back at the end of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputImage {
    /// `"<pass>.<port>"`.
    pub name: String,
    /// Image size.
    pub extent: Extent2d,
    /// Negotiated format.
    pub format: ResourceFormat,
    /// Texels, row-major.
    pub texels: Vec<Texel>,
}

impl OutputImage {
    /// Read one texel. Returns `None` outside the image.
    pub fn texel(&self, x: u32, y: u32) -> Option<Texel> {
        if x >= self.extent.width || y >= self.extent.height {
            return None;
        }
        self.texels
            .get(y as usize * self.extent.width as usize + x as usize)
            .copied()
    }

    /// Per-channel mean over the image.
    pub fn average(&self) -> Texel {
        let mut sum = [0.0f64; 4];
        for texel in &self.texels {
            for (acc, value) in sum.iter_mut().zip(texel) {
                *acc += f64::from(*value);
            }
        }
        let count = self.texels.len().max(1) as f64;
        sum.map(|v| (v / count) as f32)
    }

    /// Luminance of the mean texel.
    pub fn mean_luminance(&self) -> f32 {
        luminance(&self.average())
    }
}

/// Final outputs of a completed frame, in presentation order.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutputs {
    /// Index of the frame that produced the images.
    pub frame: u64,
    /// Images in the order their ports were marked.
    pub images: Vec<OutputImage>,
}

impl FrameOutputs {
    /// Find an image by port name.
    pub fn get(&self, name: &str) -> Option<&OutputImage> {
        self.images.iter().find(|image| image.name == name)
    }
}

/// Counters over the executor's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames that completed.
    pub completed: u64,
    /// Frames aborted by a failing pass or allocation.
    pub aborted: u64,
    /// Successful compilations installed.
    pub compilations: u64,
}

/// Scoped acquisition for one frame.
///
/// Dropping the scope joins every pending submission and returns every
/// transient texture it still holds to the pool, whether the frame completed
/// or was aborted.
struct FrameScope<'p> {
    pool: &'p mut ResourcePool,
    held: Vec<Texture>,
    pending: Vec<Fence>,
}

impl<'p> FrameScope<'p> {
    fn new(pool: &'p mut ResourcePool) -> Self {
        Self {
            pool,
            held: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn acquire(&mut self, desc: &TextureDesc, device: &dyn Device) -> Result<Texture, DeviceError> {
        let texture = self.pool.acquire(desc, device)?;
        self.held.push(texture.clone());
        Ok(texture)
    }

    fn release(&mut self, texture: &Texture) {
        if let Some(index) = self.held.iter().position(|t| t.same_storage(texture)) {
            let texture = self.held.swap_remove(index);
            self.pool.release(texture);
        }
    }

    fn track(&mut self, fence: &Fence) {
        self.pending.push(fence.clone());
    }

    fn temporal(&self, slot: &ResourceSlot) -> Option<&TemporalPair> {
        self.pool.temporal(&slot.name)
    }

    fn join_all(&mut self) {
        for fence in self.pending.drain(..) {
            fence.wait();
        }
    }
}

impl Drop for FrameScope<'_> {
    fn drop(&mut self) {
        self.join_all();
        for texture in self.held.drain(..) {
            self.pool.release(texture);
        }
    }
}

/// Per-slot state while a frame runs.
#[derive(Default, Clone)]
struct SlotState {
    texture: Option<Texture>,
    /// Submission that writes the slot.
    fence: Option<Fence>,
    /// Pending submissions that read the slot.
    readers: Vec<Fence>,
}

impl SlotState {
    /// Wait for the producer.
    fn join(&self) {
        if let Some(fence) = &self.fence {
            fence.wait();
        }
    }

    /// Wait for the producer and every reader, before the storage changes hands.
    fn retire(&mut self) {
        self.join();
        for fence in self.readers.drain(..) {
            fence.wait();
        }
    }
}

/// Runs a compiled plan once per frame.
///
/// # Example
///
/// ```
/// use passgraph_graphics::{presets, CompileOptions, Executor, Extent2d, HostDevice, PassRegistry};
///
/// let registry = PassRegistry::with_builtin_passes();
/// let mut graph = presets::restir_dlss(&registry)?;
/// let device = HostDevice::new();
/// let options = CompileOptions::default().with_extent(Extent2d::new(32, 18));
///
/// let mut executor = Executor::new();
/// executor.ensure_compiled(&graph, &options, &device)?;
/// let outputs = executor.execute_frame(&mut graph, &device)?;
/// assert!(outputs.get("ToneMapper.dst").is_some());
/// assert_eq!(executor.frame_index(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Default)]
pub struct Executor {
    plan: Option<CompiledPlan>,
    pool: ResourcePool,
    frame_index: u64,
    stats: FrameStats,
}

impl Executor {
    /// Create an executor with no plan installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a compiled plan, allocating its temporal storage.
    ///
    /// On error the previously installed plan stays in place.
    pub fn install(&mut self, plan: CompiledPlan, device: &dyn Device) -> Result<(), CompileError> {
        self.pool.prepare_temporal(&plan, device)?;
        log::debug!(
            "Executor: installed plan rev {} ({} temporal slots)",
            plan.revision(),
            self.pool.temporal_count()
        );
        self.plan = Some(plan);
        self.stats.compilations += 1;
        Ok(())
    }

    /// Compile and install `graph` unless the installed plan already matches it.
    ///
    /// Returns `true` if a new plan was installed. On a compile error the
    /// previously installed plan remains usable.
    pub fn ensure_compiled(
        &mut self,
        graph: &RenderGraph,
        options: &CompileOptions,
        device: &dyn Device,
    ) -> Result<bool, CompileError> {
        let up_to_date = self.plan.as_ref().is_some_and(|plan| {
            plan.revision() == graph.revision()
                && plan.extent() == options.extent
                && plan.trim_frames() == options.trim_frames
        });
        if up_to_date {
            return Ok(false);
        }
        let plan = compile(graph, options)?;
        self.install(plan, device)?;
        Ok(true)
    }

    /// The installed plan.
    pub fn plan(&self) -> Option<&CompiledPlan> {
        self.plan.as_ref()
    }

    /// Index of the next frame to run.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// The resource pool.
    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    /// Lifetime counters.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Run the installed plan for one frame.
    ///
    /// # Errors
    ///
    /// * [`FrameError::NoPlan`] - Nothing was installed
    /// * [`FrameError::StalePlan`] - The plan names a pass the graph no longer has
    /// * [`FrameError::PassFailed`] - A pass returned an error
    /// * [`FrameError::Allocation`] - Storage for a slot could not be acquired
    pub fn execute_frame(
        &mut self,
        graph: &mut RenderGraph,
        device: &dyn Device,
    ) -> Result<FrameOutputs, FrameError> {
        let frame = self.frame_index;
        let result = match self.plan.as_ref() {
            Some(plan) => run_frame(plan, &mut self.pool, graph, device, frame),
            None => Err(FrameError::NoPlan),
        };

        match &result {
            Ok(_) => {
                self.frame_index += 1;
                self.stats.completed += 1;
                log::trace!("Executor: frame {} complete", frame);
            }
            Err(FrameError::NoPlan) => {}
            Err(err) => {
                self.stats.aborted += 1;
                log::warn!("Executor: frame {} aborted: {}", frame, err);
            }
        }
        result
    }
}

fn run_frame(
    plan: &CompiledPlan,
    pool: &mut ResourcePool,
    graph: &mut RenderGraph,
    device: &dyn Device,
    frame: u64,
) -> Result<FrameOutputs, FrameError> {
    let mut scope = FrameScope::new(pool);
    let mut state = vec![SlotState::default(); plan.slots().len()];

    for step in plan.steps() {
        let stale = || FrameError::StalePlan {
            pass: step.name.clone(),
        };
        let node = graph
            .pass_mut(step.pass)
            .filter(|node| node.name() == step.name)
            .ok_or_else(stale)?;
        log::trace!("frame {}: {:?} '{}'", frame, step.kind, step.name);

        for output in &step.outputs {
            let slot = &plan.slots()[output.slot.index()];
            let texture = match slot.lifetime {
                Lifetime::Temporal => scope
                    .temporal(slot)
                    .ok_or_else(stale)?
                    .current(frame)
                    .clone(),
                Lifetime::Transient => scope.acquire(&slot.desc, device)?,
            };
            state[output.slot.index()].texture = Some(texture);
        }

        match step.kind {
            StepKind::Execute => {
                let mut ctx = PassContext::new(frame, plan.extent());
                let mut read = Vec::new();
                for input in &step.inputs {
                    let texture = match input.binding {
                        InputBinding::Slot { slot, kind } => {
                            if kind == EdgeKind::Immediate {
                                read.push(slot);
                            }
                            read_slot(plan, &scope, &state, slot, kind, frame)
                        }
                        InputBinding::Constant(value) => {
                            let desc = TextureDesc::new(
                                format!("{}.{}", step.name, input.port),
                                plan.extent(),
                                ResourceFormat::Rgba32Float,
                            );
                            let texture = scope.acquire(&desc, device)?;
                            texture.fill(value);
                            Some(texture)
                        }
                        InputBinding::Unbound => None,
                    };
                    if let Some(texture) = texture {
                        ctx.bind_input(input.port.as_str(), texture);
                    }
                }
                for output in &step.outputs {
                    if let Some(texture) = &state[output.slot.index()].texture {
                        ctx.bind_output(output.port.as_str(), texture.clone());
                    }
                }

                let submission =
                    node.pass_mut()
                        .execute(&ctx)
                        .map_err(|source| FrameError::PassFailed {
                            pass: step.name.clone(),
                            frame,
                            source,
                        })?;
                if let Submission::Pending(fence) = submission {
                    scope.track(&fence);
                    for output in &step.outputs {
                        state[output.slot.index()].fence = Some(fence.clone());
                    }
                    for slot in read {
                        state[slot.index()].readers.push(fence.clone());
                    }
                }
            }
            StepKind::Bypass => {
                for output in &step.outputs {
                    let Some(target) = state[output.slot.index()].texture.clone() else {
                        continue;
                    };
                    match output.bypass.unwrap_or(BypassFill::Constant([0.0; 4])) {
                        BypassFill::Copy { slot, kind } => {
                            match read_slot(plan, &scope, &state, slot, kind, frame) {
                                Some(source) => target.copy_from(&source),
                                None => target.fill([0.0; 4]),
                            }
                        }
                        BypassFill::Constant(value) => target.fill(value),
                    }
                }
            }
        }

        for slot in &step.releases {
            let slot_state = &mut state[slot.index()];
            slot_state.retire();
            if let Some(texture) = slot_state.texture.take() {
                scope.release(&texture);
            }
        }
    }

    let mut images = Vec::with_capacity(plan.outputs().len());
    for output in plan.outputs() {
        let slot = &plan.slots()[output.slot.index()];
        let slot_state = &state[output.slot.index()];
        slot_state.join();
        let texels = slot_state
            .texture
            .as_ref()
            .map(Texture::snapshot)
            .unwrap_or_default();
        images.push(OutputImage {
            name: output.name.clone(),
            extent: slot.desc.extent,
            format: slot.desc.format,
            texels,
        });
    }

    scope.join_all();
    drop(scope);
    pool.end_frame(plan.trim_frames());

    Ok(FrameOutputs { frame, images })
}

/// Texture an input sees: the current value (after the producer retired) for
/// immediate edges, the previous frame's buffer for feedback edges.
fn read_slot(
    plan: &CompiledPlan,
    scope: &FrameScope<'_>,
    state: &[SlotState],
    slot: SlotId,
    kind: EdgeKind,
    frame: u64,
) -> Option<Texture> {
    match kind {
        EdgeKind::Immediate => {
            let slot_state = &state[slot.index()];
            slot_state.join();
            slot_state.texture.clone()
        }
        EdgeKind::Feedback => plan
            .slot(slot)
            .and_then(|s| scope.temporal(s))
            .map(|pair| pair.previous(frame).clone()),
    }
}
