//! Render graph description.
//!
//! A [`RenderGraph`] holds passes (by unique instance name), edges from output
//! ports to input ports, and an ordered list of final outputs. Building a
//! graph validates only what can be checked locally: names, port existence,
//! port directions, and single-edge inputs. Whole-graph checks happen in the
//! [`compiler`](crate::compiler).
//!
//! # Architecture
//!
//! | Layer | Type | Purpose |
//! |-------|------|---------|
//! | Executor | [`Executor`](crate::executor::Executor) | Runs the installed plan once per frame |
//! | Plan | [`CompiledPlan`](crate::compiler::CompiledPlan) | Ordered steps and resolved slots |
//! | **Graph** | [`RenderGraph`] | Passes, edges and final outputs (this module) |
//! | Pass | [`RenderPass`] | Single processing stage |
//!
//! # Example
//!
//! ```
//! use passgraph_core::config::ConfigRecord;
//! use passgraph_graphics::{GraphBuilder, PassRegistry};
//!
//! let registry = PassRegistry::with_builtin_passes();
//! let mut builder = GraphBuilder::new(&registry);
//! builder.add_pass("VBufferRT", "VBufferRT", &ConfigRecord::new())?;
//! builder.add_pass("ReSTIRPass", "ReSTIRPass", &ConfigRecord::new())?;
//! builder.add_edge("VBufferRT.vbuffer", "ReSTIRPass.vbuffer")?;
//! builder.add_edge("VBufferRT.mvec", "ReSTIRPass.mvec")?;
//! builder.mark_output("ReSTIRPass.color")?;
//! let graph = builder.build();
//! assert_eq!(graph.pass_count(), 2);
//! # Ok::<(), passgraph_graphics::BuildError>(())
//! ```

mod pass;
mod port;

use std::fmt;

use passgraph_core::config::ConfigRecord;

use crate::error::BuildError;
use crate::registry::PassRegistry;

pub use pass::{BypassRule, PassContext, RenderPass, Submission};
pub use port::{InputPort, OutputPort, PassReflection, PortDirection, PortRef, PortSpec};

/// Handle to a pass in the render graph.
///
/// `PassHandle` is `Copy` and cheap to pass around. It is the pass's
/// declaration index and is only valid within the graph that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(u32);

impl PassHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// Declaration index of the pass.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Same-frame dependency; constrains the execution order.
    Immediate,
    /// Delivers the producer's value from the previous frame.
    Feedback,
}

/// A directed connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Producing output.
    pub src: PortRef,
    /// Consuming input.
    pub dst: PortRef,
    /// Whether the edge is same-frame or delayed.
    pub kind: EdgeKind,
}

/// A pass instance stored in a graph.
pub struct PassNode {
    name: String,
    type_name: String,
    enabled: bool,
    reflection: PassReflection,
    pass: Box<dyn RenderPass>,
}

impl PassNode {
    /// Unique instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Whether the pass runs, or is replaced by its bypass rule.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Port interface captured when the pass was added.
    pub fn reflection(&self) -> &PassReflection {
        &self.reflection
    }

    /// The pass implementation.
    pub fn pass(&self) -> &dyn RenderPass {
        self.pass.as_ref()
    }

    pub(crate) fn pass_mut(&mut self) -> &mut dyn RenderPass {
        self.pass.as_mut()
    }
}

impl fmt::Debug for PassNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassNode")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("enabled", &self.enabled)
            .field("reflection", &self.reflection)
            .finish_non_exhaustive()
    }
}

/// Passes, edges and final outputs of one pipeline.
///
/// Every mutation bumps [`revision`](Self::revision), which invalidates plans
/// compiled from an earlier state.
#[derive(Debug, Default)]
pub struct RenderGraph {
    passes: Vec<PassNode>,
    edges: Vec<Edge>,
    outputs: Vec<PortRef>,
    revision: u64,
}

impl RenderGraph {
    /// Create a new empty render graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an already constructed pass.
    ///
    /// The pass's reflection and initial enabled state are captured here.
    pub fn add_pass(
        &mut self,
        name: impl Into<String>,
        pass: Box<dyn RenderPass>,
    ) -> Result<PassHandle, BuildError> {
        let name = name.into();
        if self.find_pass(&name).is_some() {
            return Err(BuildError::DuplicateName(name));
        }
        let handle = PassHandle::new(self.passes.len() as u32);
        log::trace!("RenderGraph: adding pass '{}' ({})", name, pass.type_name());
        self.passes.push(PassNode {
            type_name: pass.type_name().to_string(),
            enabled: pass.is_enabled(),
            reflection: pass.reflect(),
            name,
            pass,
        });
        self.revision += 1;
        Ok(handle)
    }

    /// Connect an output to an input.
    ///
    /// The edge is a feedback edge if the input is declared temporal,
    /// otherwise it is immediate.
    pub fn add_edge(&mut self, src: &str, dst: &str) -> Result<(), BuildError> {
        self.insert_edge(src, dst, None)
    }

    /// Connect an output to an input, delivering the previous frame's value.
    pub fn add_feedback_edge(&mut self, src: &str, dst: &str) -> Result<(), BuildError> {
        self.insert_edge(src, dst, Some(EdgeKind::Feedback))
    }

    fn insert_edge(
        &mut self,
        src: &str,
        dst: &str,
        kind: Option<EdgeKind>,
    ) -> Result<(), BuildError> {
        let src_ref = self.resolve_port(src, PortDirection::Output)?;
        let dst_ref = self.resolve_port(dst, PortDirection::Input)?;
        if self.incoming_edge(&dst_ref).is_some() {
            return Err(BuildError::InputAlreadyBound(dst.to_string()));
        }

        let kind = kind.unwrap_or_else(|| {
            let temporal = self.passes[dst_ref.pass.index()]
                .reflection
                .input(&dst_ref.port)
                .is_some_and(|p| p.temporal);
            if temporal {
                EdgeKind::Feedback
            } else {
                EdgeKind::Immediate
            }
        });

        log::trace!("RenderGraph: edge {} -> {} ({:?})", src, dst, kind);
        self.edges.push(Edge {
            src: src_ref,
            dst: dst_ref,
            kind,
        });
        self.revision += 1;
        Ok(())
    }

    /// Remove the edge feeding `dst`. Returns the removed edge, if any.
    pub fn remove_edge(&mut self, dst: &str) -> Result<Option<Edge>, BuildError> {
        let dst_ref = self.resolve_port(dst, PortDirection::Input)?;
        let position = self.edges.iter().position(|e| e.dst == dst_ref);
        let removed = position.map(|index| self.edges.remove(index));
        if removed.is_some() {
            self.revision += 1;
        }
        Ok(removed)
    }

    /// Append a port to the ordered final-output list.
    ///
    /// Marking an already marked port is a no-op.
    pub fn mark_output(&mut self, port: &str) -> Result<(), BuildError> {
        let port_ref = self.resolve_port(port, PortDirection::Output)?;
        if !self.outputs.contains(&port_ref) {
            self.outputs.push(port_ref);
            self.revision += 1;
        }
        Ok(())
    }

    /// Remove a port from the final-output list.
    pub fn unmark_output(&mut self, port: &str) -> Result<(), BuildError> {
        let port_ref = self.resolve_port(port, PortDirection::Output)?;
        let before = self.outputs.len();
        self.outputs.retain(|p| *p != port_ref);
        if self.outputs.len() != before {
            self.revision += 1;
        }
        Ok(())
    }

    /// Enable or disable a pass. Disabled passes provide their bypass value.
    ///
    /// Returns `false` if no pass has this name.
    pub fn set_pass_enabled(&mut self, name: &str, enabled: bool) -> bool {
        let Some(handle) = self.find_pass(name) else {
            return false;
        };
        let node = &mut self.passes[handle.index()];
        if node.enabled != enabled {
            log::debug!("RenderGraph: pass '{}' enabled = {}", name, enabled);
            node.enabled = enabled;
            self.revision += 1;
        }
        true
    }

    /// Resolve a `"<pass>.<port>"` spec to a port of the expected direction.
    pub fn resolve_port(
        &self,
        spec: &str,
        expected: PortDirection,
    ) -> Result<PortRef, BuildError> {
        let unknown = || BuildError::UnknownPort(spec.to_string());
        let parsed = PortSpec::parse(spec).ok_or_else(unknown)?;
        let handle = self.find_pass(parsed.pass).ok_or_else(unknown)?;
        let actual = self.passes[handle.index()]
            .reflection
            .direction(parsed.port)
            .ok_or_else(unknown)?;
        if actual != expected {
            return Err(BuildError::PortDirectionMismatch {
                port: spec.to_string(),
                expected,
                actual,
            });
        }
        Ok(PortRef::new(handle, parsed.port))
    }

    /// Find a pass by instance name.
    pub fn find_pass(&self, name: &str) -> Option<PassHandle> {
        self.passes
            .iter()
            .position(|p| p.name == name)
            .map(|index| PassHandle::new(index as u32))
    }

    /// Get a pass by handle.
    pub fn pass(&self, handle: PassHandle) -> Option<&PassNode> {
        self.passes.get(handle.index())
    }

    pub(crate) fn pass_mut(&mut self, handle: PassHandle) -> Option<&mut PassNode> {
        self.passes.get_mut(handle.index())
    }

    /// Edge feeding an input, if any.
    pub fn incoming_edge(&self, dst: &PortRef) -> Option<&Edge> {
        self.edges.iter().find(|e| e.dst == *dst)
    }

    /// Format a port reference as `"<pass>.<port>"`.
    pub fn port_name(&self, port: &PortRef) -> String {
        match self.pass(port.pass) {
            Some(node) => format!("{}.{}", node.name, port.port),
            None => format!("#{}.{}", port.pass.index(), port.port),
        }
    }

    /// Get all passes in declaration order.
    pub fn passes(&self) -> &[PassNode] {
        &self.passes
    }

    /// Get all edges in declaration order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Get the ordered final outputs.
    pub fn outputs(&self) -> &[PortRef] {
        &self.outputs
    }

    /// Get the number of passes in the graph.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Monotonic counter bumped by every change to the graph.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Builds a [`RenderGraph`] from pass type names and configuration records.
pub struct GraphBuilder<'r> {
    registry: &'r PassRegistry,
    graph: RenderGraph,
}

impl<'r> GraphBuilder<'r> {
    /// Create a builder resolving pass types through `registry`.
    pub fn new(registry: &'r PassRegistry) -> Self {
        Self {
            registry,
            graph: RenderGraph::new(),
        }
    }

    /// Create a pass of a registered type and add it under `name`.
    pub fn add_pass(
        &mut self,
        name: &str,
        type_name: &str,
        config: &ConfigRecord,
    ) -> Result<PassHandle, BuildError> {
        if self.graph.find_pass(name).is_some() {
            return Err(BuildError::DuplicateName(name.to_string()));
        }
        let pass = self.registry.create(type_name, config)?;
        self.graph.add_pass(name, pass)
    }

    /// Add an already constructed pass.
    pub fn insert_pass(
        &mut self,
        name: &str,
        pass: Box<dyn RenderPass>,
    ) -> Result<PassHandle, BuildError> {
        self.graph.add_pass(name, pass)
    }

    /// See [`RenderGraph::add_edge`].
    pub fn add_edge(&mut self, src: &str, dst: &str) -> Result<(), BuildError> {
        self.graph.add_edge(src, dst)
    }

    /// See [`RenderGraph::add_feedback_edge`].
    pub fn add_feedback_edge(&mut self, src: &str, dst: &str) -> Result<(), BuildError> {
        self.graph.add_feedback_edge(src, dst)
    }

    /// See [`RenderGraph::mark_output`].
    pub fn mark_output(&mut self, port: &str) -> Result<(), BuildError> {
        self.graph.mark_output(port)
    }

    /// The graph built so far.
    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    /// Finish building.
    pub fn build(self) -> RenderGraph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PassError;
    use crate::types::{FormatSet, ResourceFormat};
    use rstest::rstest;

    struct Stub {
        reflection: PassReflection,
    }

    impl RenderPass for Stub {
        fn type_name(&self) -> &str {
            "Stub"
        }

        fn reflect(&self) -> PassReflection {
            self.reflection.clone()
        }

        fn execute(&mut self, _ctx: &PassContext) -> Result<Submission, PassError> {
            Ok(Submission::Complete)
        }
    }

    fn stub() -> Box<dyn RenderPass> {
        Box::new(Stub {
            reflection: PassReflection::new()
                .with_input(InputPort::new("in", FormatSet::COLOR))
                .with_input(InputPort::new("history", FormatSet::COLOR).temporal())
                .with_output(OutputPort::new("out", ResourceFormat::Rgba32Float)),
        })
    }

    fn two_pass_graph() -> RenderGraph {
        let mut graph = RenderGraph::new();
        graph.add_pass("A", stub()).unwrap();
        graph.add_pass("B", stub()).unwrap();
        graph
    }

    #[test]
    fn test_add_pass_duplicate() {
        let mut graph = two_pass_graph();
        let revision = graph.revision();
        assert_eq!(
            graph.add_pass("A", stub()).unwrap_err(),
            BuildError::DuplicateName("A".into())
        );
        assert_eq!(graph.pass_count(), 2);
        assert_eq!(graph.revision(), revision);
    }

    #[test]
    fn test_edge_kind_from_port() {
        let mut graph = two_pass_graph();
        graph.add_edge("A.out", "B.in").unwrap();
        graph.add_edge("B.out", "B.history").unwrap();
        graph.add_feedback_edge("B.out", "A.in").unwrap();

        let kinds: Vec<_> = graph.edges().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EdgeKind::Immediate, EdgeKind::Feedback, EdgeKind::Feedback]
        );
    }

    #[rstest]
    #[case::missing_pass("C.out", "B.in")]
    #[case::missing_port("A.color", "B.in")]
    #[case::malformed("A", "B.in")]
    #[case::missing_dst_port("A.out", "B.depth")]
    fn test_add_edge_unknown_port(#[case] src: &str, #[case] dst: &str) {
        let mut graph = two_pass_graph();
        assert!(matches!(
            graph.add_edge(src, dst),
            Err(BuildError::UnknownPort(_))
        ));
        assert!(graph.edges().is_empty());
    }

    #[rstest]
    #[case::src_is_input("A.in", "B.in", PortDirection::Output)]
    #[case::dst_is_output("A.out", "B.out", PortDirection::Input)]
    fn test_add_edge_direction(
        #[case] src: &str,
        #[case] dst: &str,
        #[case] expected_dir: PortDirection,
    ) {
        let mut graph = two_pass_graph();
        match graph.add_edge(src, dst) {
            Err(BuildError::PortDirectionMismatch { expected, .. }) => {
                assert_eq!(expected, expected_dir)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_input_already_bound() {
        let mut graph = two_pass_graph();
        graph.add_edge("A.out", "B.in").unwrap();
        assert_eq!(
            graph.add_edge("B.out", "B.in").unwrap_err(),
            BuildError::InputAlreadyBound("B.in".into())
        );

        // Fan-out is fine.
        graph.add_edge("A.out", "A.history").unwrap();
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_mark_output() {
        let mut graph = two_pass_graph();
        graph.mark_output("B.out").unwrap();
        graph.mark_output("A.out").unwrap();
        graph.mark_output("B.out").unwrap();

        let names: Vec<_> = graph.outputs().iter().map(|p| graph.port_name(p)).collect();
        assert_eq!(names, vec!["B.out", "A.out"]);
        assert!(matches!(
            graph.mark_output("B.in"),
            Err(BuildError::PortDirectionMismatch { .. })
        ));
        assert!(matches!(
            graph.mark_output("Z.out"),
            Err(BuildError::UnknownPort(_))
        ));

        graph.unmark_output("A.out").unwrap();
        assert_eq!(graph.outputs().len(), 1);
    }

    #[test]
    fn test_remove_edge() {
        let mut graph = two_pass_graph();
        graph.add_edge("A.out", "B.in").unwrap();
        let removed = graph.remove_edge("B.in").unwrap().unwrap();
        assert_eq!(removed.src, PortRef::new(PassHandle::new(0), "out"));
        assert!(graph.remove_edge("B.in").unwrap().is_none());
        graph.add_edge("B.out", "B.in").unwrap();
    }

    #[test]
    fn test_set_pass_enabled_bumps_revision() {
        let mut graph = two_pass_graph();
        let revision = graph.revision();

        assert!(graph.set_pass_enabled("A", true));
        assert_eq!(graph.revision(), revision);
        assert!(graph.set_pass_enabled("A", false));
        assert_eq!(graph.revision(), revision + 1);
        assert!(!graph.pass(PassHandle::new(0)).unwrap().is_enabled());
        assert!(!graph.set_pass_enabled("missing", false));
    }
}
