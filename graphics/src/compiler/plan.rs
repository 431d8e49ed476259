//! The compiled plan.

use crate::graph::{EdgeKind, PassHandle};
use crate::resources::TextureDesc;
use crate::types::{Extent2d, Lifetime, Texel};

/// Index of a resource slot in a [`CompiledPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u32);

impl SlotId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Position in [`CompiledPlan::slots`].
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An input port reading a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotReader {
    /// Consuming pass.
    pub pass: PassHandle,
    /// Consuming input port.
    pub port: String,
    /// Whether the read is same-frame or delayed.
    pub kind: EdgeKind,
}

/// Concrete storage descriptor for one output port.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSlot {
    /// Slot index.
    pub id: SlotId,
    /// `"<pass>.<port>"` of the producing output.
    pub name: String,
    /// Producing pass.
    pub producer: PassHandle,
    /// Producing output port.
    pub port: String,
    /// Negotiated format and resolved extent.
    pub desc: TextureDesc,
    /// Lifetime class.
    pub lifetime: Lifetime,
    /// Step that writes the slot.
    pub first_use: usize,
    /// Last step reading the slot in the same frame. Equal to the step count
    /// for final outputs, which live until readout.
    pub last_use: usize,
    /// Consumers, in edge declaration order.
    pub readers: Vec<SlotReader>,
}

/// What an input port is bound to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputBinding {
    /// Read a slot: the current value for immediate edges, the previous
    /// frame's for feedback edges.
    Slot {
        /// Source slot.
        slot: SlotId,
        /// Edge kind.
        kind: EdgeKind,
    },
    /// The port's declared default value.
    Constant(Texel),
    /// Nothing; only possible for optional inputs and disabled passes.
    Unbound,
}

/// An input port and its binding.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundInput {
    /// Input port name.
    pub port: String,
    /// Binding.
    pub binding: InputBinding,
}

/// How a bypassed step fills one of its outputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BypassFill {
    /// Copy a slot into the output.
    Copy {
        /// Source slot.
        slot: SlotId,
        /// Edge kind of the pass-through input.
        kind: EdgeKind,
    },
    /// Fill the output with a constant.
    Constant(Texel),
}

/// An output port and its slot.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundOutput {
    /// Output port name.
    pub port: String,
    /// Slot the output writes.
    pub slot: SlotId,
    /// Fill used when the step is bypassed.
    pub bypass: Option<BypassFill>,
}

/// Whether a step runs its pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// Invoke the pass.
    Execute,
    /// The pass is disabled; outputs are filled from its bypass rule.
    Bypass,
}

/// One pass in topological order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    /// Pass handle in the compiled graph.
    pub pass: PassHandle,
    /// Pass instance name.
    pub name: String,
    /// Execute or bypass.
    pub kind: StepKind,
    /// Every declared input, in declaration order.
    pub inputs: Vec<BoundInput>,
    /// Outputs that have a slot, in declaration order.
    pub outputs: Vec<BoundOutput>,
    /// Transient slots whose last reader is this step.
    pub releases: Vec<SlotId>,
}

/// An input reading the previous frame's value of a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEdge {
    /// Temporal slot read.
    pub slot: SlotId,
    /// Consuming pass.
    pub pass: PassHandle,
    /// Consuming input port.
    pub port: String,
}

/// A designated final output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalOutput {
    /// `"<pass>.<port>"`.
    pub name: String,
    /// Slot read out at the end of the frame.
    pub slot: SlotId,
}

/// The validated, ordered, resource-resolved artifact the executor runs.
///
/// Plans are immutable. Compiling the same graph twice yields equal plans.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPlan {
    pub(crate) steps: Vec<PlanStep>,
    pub(crate) slots: Vec<ResourceSlot>,
    pub(crate) feedback: Vec<FeedbackEdge>,
    pub(crate) outputs: Vec<FinalOutput>,
    pub(crate) revision: u64,
    pub(crate) extent: Extent2d,
    pub(crate) trim_frames: u32,
}

impl CompiledPlan {
    /// Steps in topological order, bypassed passes included.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Pass names in topological order, bypassed passes included.
    pub fn pass_order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Names of the passes that are actually invoked, in order.
    pub fn execution_order(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.kind == StepKind::Execute)
            .map(|s| s.name.as_str())
            .collect()
    }

    /// The resource slot table.
    pub fn slots(&self) -> &[ResourceSlot] {
        &self.slots
    }

    /// Get a slot by id.
    pub fn slot(&self, id: SlotId) -> Option<&ResourceSlot> {
        self.slots.get(id.index())
    }

    /// Find the slot produced by `"<pass>.<port>"`.
    pub fn slot_named(&self, name: &str) -> Option<&ResourceSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Inputs reading the previous frame's value.
    pub fn feedback(&self) -> &[FeedbackEdge] {
        &self.feedback
    }

    /// Final outputs in presentation order.
    pub fn outputs(&self) -> &[FinalOutput] {
        &self.outputs
    }

    /// Graph revision the plan was compiled from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Swap-chain extent sizes were resolved against.
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    /// Frames a free transient texture may stay idle before it is dropped.
    pub fn trim_frames(&self) -> u32 {
        self.trim_frames
    }
}

// Plans may be cached and shared across threads.
static_assertions::assert_impl_all!(CompiledPlan: Send, Sync);
