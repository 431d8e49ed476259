//! Render graph compilation.
//!
//! This module turns a [`RenderGraph`] into a [`CompiledPlan`]. It performs:
//!
//! 1. **Connectivity check** - Every required input of an enabled pass is bound
//! 2. **Topological sort** - Order passes over immediate edges only
//! 3. **Cycle detection** - Immediate edges must form a DAG
//! 4. **Bypass resolution** - Disabled passes keep their slots, filled by rule
//! 5. **Resource negotiation** - One slot per consumed or final output
//! 6. **Lifetime analysis** - First and last use of every transient slot
//!
//! Feedback edges are exempt from the acyclicity check: they read the
//! previous frame's value, so a pass may feed itself.
//!
//! # Example
//!
//! ```
//! use passgraph_graphics::{compile, presets, CompileOptions, PassRegistry};
//!
//! let registry = PassRegistry::with_builtin_passes();
//! let graph = presets::restir_dlss(&registry)?;
//! let plan = compile(&graph, &CompileOptions::default())?;
//! assert_eq!(
//!     plan.pass_order(),
//!     ["VBufferRT", "ReSTIRPass", "AccumulatePass", "DLSSPass", "ToneMapper"]
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod plan;

use std::collections::BTreeSet;

use crate::error::CompileError;
use crate::graph::{BypassRule, Edge, EdgeKind, PassHandle, PassNode, PortRef, RenderGraph};
use crate::resources::TextureDesc;
use crate::types::{Extent2d, FormatSet, Lifetime};

pub use plan::{
    BoundInput, BoundOutput, BypassFill, CompiledPlan, FeedbackEdge, FinalOutput, InputBinding,
    PlanStep, ResourceSlot, SlotId, SlotReader, StepKind,
};

/// Compile-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Swap-chain extent that size policies resolve against.
    pub extent: Extent2d,
    /// Frames a free transient texture may stay idle before it is dropped.
    pub trim_frames: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            extent: Extent2d::new(1920, 1080),
            trim_frames: 3,
        }
    }
}

impl CompileOptions {
    /// Options for a swap chain of the given size.
    pub fn with_extent(mut self, extent: Extent2d) -> Self {
        self.extent = extent;
        self
    }

    /// Set the idle-frame threshold for free transient textures.
    pub fn with_trim_frames(mut self, frames: u32) -> Self {
        self.trim_frames = frames;
        self
    }
}

/// Compile a render graph into an execution plan.
///
/// # Errors
///
/// * [`CompileError::UnboundRequiredInput`] - An enabled pass misses an input
/// * [`CompileError::CycleDetected`] - Immediate edges form a cycle
/// * [`CompileError::IncompatibleResourceFormat`] - Producer and consumers share no format
/// * [`CompileError::NoFinalOutput`] - No output was marked
pub fn compile(graph: &RenderGraph, options: &CompileOptions) -> Result<CompiledPlan, CompileError> {
    check_connectivity(graph)?;
    let order = topological_order(graph)?;

    let mut step_of = vec![0usize; graph.pass_count()];
    for (step, handle) in order.iter().enumerate() {
        step_of[handle.index()] = step;
    }

    let mut slots = negotiate_slots(graph, &order, &step_of, options)?;
    let slot_of = |port: &PortRef| {
        slots
            .iter()
            .find(|s| s.producer == port.pass && s.port == port.port)
            .map(|s| s.id)
    };

    let mut steps = Vec::with_capacity(order.len());
    for &handle in &order {
        let node = &graph.passes()[handle.index()];
        steps.push(build_step(graph, node, handle, &slot_of));
    }

    let feedback = graph
        .edges()
        .iter()
        .filter(|e| e.kind == EdgeKind::Feedback)
        .filter_map(|e| {
            slot_of(&e.src).map(|slot| FeedbackEdge {
                slot,
                pass: e.dst.pass,
                port: e.dst.port.clone(),
            })
        })
        .collect::<Vec<_>>();

    let outputs = graph
        .outputs()
        .iter()
        .filter_map(|port| {
            slot_of(port).map(|slot| FinalOutput {
                name: graph.port_name(port),
                slot,
            })
        })
        .collect::<Vec<_>>();
    if outputs.is_empty() {
        return Err(CompileError::NoFinalOutput);
    }

    assign_lifetimes(&mut slots, &mut steps, &outputs);

    log::debug!(
        "compiled graph rev {}: {} steps ({} bypassed), {} slots ({} temporal), {} feedback edges",
        graph.revision(),
        steps.len(),
        steps.iter().filter(|s| s.kind == StepKind::Bypass).count(),
        slots.len(),
        slots.iter().filter(|s| s.lifetime == Lifetime::Temporal).count(),
        feedback.len()
    );

    Ok(CompiledPlan {
        steps,
        slots,
        feedback,
        outputs,
        revision: graph.revision(),
        extent: options.extent,
        trim_frames: options.trim_frames,
    })
}

fn check_connectivity(graph: &RenderGraph) -> Result<(), CompileError> {
    for (index, node) in graph.passes().iter().enumerate() {
        if !node.is_enabled() {
            continue;
        }
        let handle = PassHandle::new(index as u32);
        for input in node.reflection().inputs() {
            if input.optional || input.default.is_some() {
                continue;
            }
            if graph
                .incoming_edge(&PortRef::new(handle, input.name.as_str()))
                .is_none()
            {
                return Err(CompileError::UnboundRequiredInput {
                    pass: node.name().to_string(),
                    port: input.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm over immediate edges. Ready passes are taken in
/// declaration order, so independent passes keep their declared order.
fn topological_order(graph: &RenderGraph) -> Result<Vec<PassHandle>, CompileError> {
    let n = graph.pass_count();
    let immediate: Vec<&Edge> = graph
        .edges()
        .iter()
        .filter(|e| e.kind == EdgeKind::Immediate)
        .collect();

    let mut in_degree = vec![0u32; n];
    for edge in &immediate {
        in_degree[edge.dst.pass.index()] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(index) = ready.pop_first() {
        order.push(PassHandle::new(index as u32));
        for edge in immediate.iter().filter(|e| e.src.pass.index() == index) {
            let dst = edge.dst.pass.index();
            in_degree[dst] -= 1;
            if in_degree[dst] == 0 {
                ready.insert(dst);
            }
        }
    }

    if order.len() != n {
        let passes = graph
            .passes()
            .iter()
            .enumerate()
            .filter(|(i, _)| in_degree[*i] > 0)
            .map(|(_, node)| node.name().to_string())
            .collect();
        return Err(CompileError::CycleDetected { passes });
    }
    Ok(order)
}

fn negotiate_slots(
    graph: &RenderGraph,
    order: &[PassHandle],
    step_of: &[usize],
    options: &CompileOptions,
) -> Result<Vec<ResourceSlot>, CompileError> {
    let mut slots = Vec::new();

    for &handle in order {
        let node = &graph.passes()[handle.index()];
        for output in node.reflection().outputs() {
            let port = PortRef::new(handle, output.name.as_str());
            let consumers: Vec<&Edge> = graph.edges().iter().filter(|e| e.src == port).collect();
            let is_final = graph.outputs().contains(&port);
            if consumers.is_empty() && !is_final {
                continue;
            }

            let mut common = output.formats;
            for edge in &consumers {
                common &= consumer_accepts(graph, &edge.dst);
            }
            let format = if common.contains_format(output.preferred) {
                output.preferred
            } else {
                common
                    .first()
                    .ok_or_else(|| CompileError::IncompatibleResourceFormat {
                        port: graph.port_name(&port),
                        consumers: consumers.iter().map(|e| graph.port_name(&e.dst)).collect(),
                    })?
            };

            let feedback_read = consumers.iter().any(|e| e.kind == EdgeKind::Feedback);
            let lifetime = if output.lifetime == Lifetime::Temporal || feedback_read {
                Lifetime::Temporal
            } else {
                Lifetime::Transient
            };

            let name = graph.port_name(&port);
            let step = step_of[handle.index()];
            slots.push(ResourceSlot {
                id: SlotId::new(slots.len()),
                desc: TextureDesc::new(name.as_str(), output.size.resolve(options.extent), format),
                name,
                producer: handle,
                port: output.name.clone(),
                lifetime,
                first_use: step,
                last_use: step,
                readers: consumers
                    .iter()
                    .map(|e| SlotReader {
                        pass: e.dst.pass,
                        port: e.dst.port.clone(),
                        kind: e.kind,
                    })
                    .collect(),
            });
        }
    }
    Ok(slots)
}

fn consumer_accepts(graph: &RenderGraph, dst: &PortRef) -> FormatSet {
    graph
        .pass(dst.pass)
        .and_then(|node| node.reflection().input(&dst.port))
        .map(|input| input.accepts)
        .unwrap_or_else(FormatSet::empty)
}

fn build_step(
    graph: &RenderGraph,
    node: &PassNode,
    handle: PassHandle,
    slot_of: &impl Fn(&PortRef) -> Option<SlotId>,
) -> PlanStep {
    let inputs: Vec<BoundInput> = node
        .reflection()
        .inputs()
        .iter()
        .map(|input| {
            let port = PortRef::new(handle, input.name.as_str());
            let edge_binding = graph.incoming_edge(&port).and_then(|edge| {
                slot_of(&edge.src).map(|slot| InputBinding::Slot {
                    slot,
                    kind: edge.kind,
                })
            });
            let binding = edge_binding
                .or(input.default.map(InputBinding::Constant))
                .unwrap_or(InputBinding::Unbound);
            BoundInput {
                port: input.name.clone(),
                binding,
            }
        })
        .collect();

    let kind = if node.is_enabled() {
        StepKind::Execute
    } else {
        StepKind::Bypass
    };

    let outputs = node
        .reflection()
        .outputs()
        .iter()
        .filter_map(|output| {
            let slot = slot_of(&PortRef::new(handle, output.name.as_str()))?;
            let bypass = (kind == StepKind::Bypass)
                .then(|| bypass_fill(node, &output.name, &inputs));
            Some(BoundOutput {
                port: output.name.clone(),
                slot,
                bypass,
            })
        })
        .collect();

    PlanStep {
        pass: handle,
        name: node.name().to_string(),
        kind,
        inputs,
        outputs,
        releases: Vec::new(),
    }
}

fn bypass_fill(node: &PassNode, output: &str, inputs: &[BoundInput]) -> BypassFill {
    match node.pass().bypass(output) {
        BypassRule::Neutral(value) => BypassFill::Constant(value),
        BypassRule::PassThrough(input) => {
            match inputs.iter().find(|i| i.port == input).map(|i| i.binding) {
                Some(InputBinding::Slot { slot, kind }) => BypassFill::Copy { slot, kind },
                Some(InputBinding::Constant(value)) => BypassFill::Constant(value),
                Some(InputBinding::Unbound) | None => {
                    log::warn!(
                        "pass '{}' passes '{}' through to '{}' but the input is not bound; using black",
                        node.name(),
                        input,
                        output
                    );
                    BypassFill::Constant([0.0; 4])
                }
            }
        }
    }
}

/// Compute first and last use of every transient slot and schedule releases.
fn assign_lifetimes(slots: &mut [ResourceSlot], steps: &mut [PlanStep], outputs: &[FinalOutput]) {
    for (index, step) in steps.iter().enumerate() {
        let reads: Vec<SlotId> = match step.kind {
            StepKind::Execute => step
                .inputs
                .iter()
                .filter_map(|i| match i.binding {
                    InputBinding::Slot {
                        slot,
                        kind: EdgeKind::Immediate,
                    } => Some(slot),
                    _ => None,
                })
                .collect(),
            StepKind::Bypass => step
                .outputs
                .iter()
                .filter_map(|o| match o.bypass {
                    Some(BypassFill::Copy {
                        slot,
                        kind: EdgeKind::Immediate,
                    }) => Some(slot),
                    _ => None,
                })
                .collect(),
        };
        for slot in reads {
            let slot = &mut slots[slot.index()];
            slot.last_use = slot.last_use.max(index);
        }
    }

    let end_of_frame = steps.len();
    for output in outputs {
        slots[output.slot.index()].last_use = end_of_frame;
    }

    for slot in slots.iter().filter(|s| s.lifetime == Lifetime::Transient) {
        if slot.last_use < end_of_frame {
            steps[slot.last_use].releases.push(slot.id);
        }
    }
}
