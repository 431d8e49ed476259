//! Graph error types.
//!
//! Errors are grouped by the stage that reports them: building the graph,
//! compiling it, creating device resources, running a single pass, and
//! running a whole frame.

use passgraph_core::config::ConfigError;
use thiserror::Error;

use crate::graph::PortDirection;

/// Errors reported while building a graph. The graph is left unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// A pass with this instance name already exists.
    #[error("duplicate pass name '{0}'")]
    DuplicateName(String),
    /// The port spec does not name an existing pass and port.
    #[error("unknown port '{0}'")]
    UnknownPort(String),
    /// The port exists but has the wrong direction.
    #[error("port '{port}' is an {actual}, expected an {expected}")]
    PortDirectionMismatch {
        /// Offending port spec.
        port: String,
        /// Direction required at this position.
        expected: PortDirection,
        /// Direction the port actually has.
        actual: PortDirection,
    },
    /// The destination input already has an incoming edge.
    #[error("input '{0}' already has an incoming edge")]
    InputAlreadyBound(String),
    /// No factory is registered for the type name.
    #[error("unknown pass type '{0}'")]
    UnknownPassType(String),
    /// The pass rejected its configuration record.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors reported while compiling a graph into a plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// A required input of an enabled pass has no edge and no default.
    #[error("required input '{pass}.{port}' is not bound")]
    UnboundRequiredInput {
        /// Pass instance name.
        pass: String,
        /// Input port name.
        port: String,
    },
    /// Immediate edges form a cycle.
    #[error("cycle detected between passes: {}", passes.join(", "))]
    CycleDetected {
        /// Passes that could not be ordered, in declaration order.
        passes: Vec<String>,
    },
    /// No single format satisfies the producer and all of its consumers.
    #[error("no format of '{port}' is accepted by all of: {}", consumers.join(", "))]
    IncompatibleResourceFormat {
        /// Producing output port.
        port: String,
        /// Consuming input ports.
        consumers: Vec<String>,
    },
    /// The graph has no designated final output.
    #[error("graph has no final output")]
    NoFinalOutput,
    /// Allocating persistent storage for the plan failed.
    #[error("failed to allocate plan resources: {0}")]
    ResourceAllocation(#[from] DeviceError),
}

/// Errors reported by a [`Device`](crate::device::Device).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Out of device memory.
    #[error("out of device memory")]
    OutOfMemory,
    /// The device was lost.
    #[error("device lost")]
    DeviceLost,
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
}

/// Errors returned by a single pass invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassError {
    /// A device operation inside the pass failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// The pass requires an input that was not bound.
    #[error("missing input '{0}'")]
    MissingInput(String),
    /// Pass specific failure.
    #[error("{0}")]
    Failed(String),
}

/// Errors that abort a frame. The installed plan stays valid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    /// No plan has been installed.
    #[error("no compiled plan installed")]
    NoPlan,
    /// The installed plan does not match the graph it is run against.
    #[error("compiled plan does not match the graph (pass '{pass}')")]
    StalePlan {
        /// First pass that failed to match.
        pass: String,
    },
    /// A pass failed; the frame was aborted.
    #[error("pass '{pass}' failed on frame {frame}")]
    PassFailed {
        /// Pass instance name.
        pass: String,
        /// Frame index that was aborted.
        frame: u64,
        /// Underlying pass error.
        #[source]
        source: PassError,
    },
    /// Acquiring per-frame storage failed.
    #[error("frame allocation failed: {0}")]
    Allocation(#[from] DeviceError),
}
