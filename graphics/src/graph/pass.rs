//! The pass interface.
//!
//! A pass declares a fixed set of ports through [`RenderPass::reflect`] and is
//! invoked once per frame with a [`PassContext`] holding the textures bound to
//! those ports. Invocation is a *submission*: a pass may hand its work to
//! another thread and return [`Submission::Pending`] with a [`Fence`] that is
//! signaled when every output has been fully written.

use crate::error::PassError;
use crate::executor::Fence;
use crate::resources::Texture;
use crate::types::{Extent2d, Texel};

use super::PassReflection;

/// What a disabled pass provides on one of its outputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BypassRule {
    /// Copy the named input unchanged (resampled to the output's extent).
    PassThrough(&'static str),
    /// Fill with a constant.
    Neutral(Texel),
}

/// Result of invoking a pass.
#[derive(Debug, Clone)]
pub enum Submission {
    /// All outputs are written.
    Complete,
    /// Outputs are written once the fence is signaled.
    Pending(Fence),
}

impl Submission {
    /// Fence to join, if the work has not retired yet.
    pub fn fence(&self) -> Option<&Fence> {
        match self {
            Self::Complete => None,
            Self::Pending(fence) => Some(fence),
        }
    }
}

/// A processing stage in a render graph.
///
/// Implementations are created by a [`PassRegistry`](crate::registry::PassRegistry)
/// factory from a validated configuration, or inserted directly with
/// [`RenderGraph::add_pass`](crate::graph::RenderGraph::add_pass).
pub trait RenderPass: Send {
    /// Registered type name of the pass.
    fn type_name(&self) -> &str;

    /// The pass's port interface. Must return the same ports on every call.
    fn reflect(&self) -> PassReflection;

    /// Initial value of the graph's `enabled` flag for this pass.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Substitute provided on `output` while the pass is disabled.
    fn bypass(&self, _output: &str) -> BypassRule {
        BypassRule::Neutral([0.0; 4])
    }

    /// Run the pass for one frame.
    ///
    /// Texture handles in `ctx` are valid for this invocation only and must
    /// not be kept once the returned submission has retired.
    fn execute(&mut self, ctx: &PassContext) -> Result<Submission, PassError>;
}

/// Textures bound to a pass for one invocation.
#[derive(Debug, Clone)]
pub struct PassContext {
    frame: u64,
    extent: Extent2d,
    inputs: Vec<(String, Texture)>,
    outputs: Vec<(String, Texture)>,
}

impl PassContext {
    /// Create a context for `frame` with the swap-chain `extent`.
    pub fn new(frame: u64, extent: Extent2d) -> Self {
        Self {
            frame,
            extent,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Bind an input texture.
    pub fn with_input(mut self, name: impl Into<String>, texture: Texture) -> Self {
        self.bind_input(name, texture);
        self
    }

    /// Bind an output texture.
    pub fn with_output(mut self, name: impl Into<String>, texture: Texture) -> Self {
        self.bind_output(name, texture);
        self
    }

    pub(crate) fn bind_input(&mut self, name: impl Into<String>, texture: Texture) {
        self.inputs.push((name.into(), texture));
    }

    pub(crate) fn bind_output(&mut self, name: impl Into<String>, texture: Texture) {
        self.outputs.push((name.into(), texture));
    }

    /// Index of the frame being rendered.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Swap-chain extent the plan was compiled for.
    pub fn extent(&self) -> Extent2d {
        self.extent
    }

    /// Texture bound to an input, if any.
    pub fn input(&self, name: &str) -> Option<&Texture> {
        self.inputs.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Texture bound to an input, or [`PassError::MissingInput`].
    pub fn require_input(&self, name: &str) -> Result<&Texture, PassError> {
        self.input(name)
            .ok_or_else(|| PassError::MissingInput(name.to_string()))
    }

    /// Texture bound to an output, if the output has consumers.
    pub fn output(&self, name: &str) -> Option<&Texture> {
        self.outputs.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Bound outputs, in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &Texture)> {
        self.outputs.iter().map(|(n, t)| (n.as_str(), t))
    }
}
