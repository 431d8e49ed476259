//! # passgraph graphics
//!
//! Render-graph compiler and per-frame scheduler.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`PassRegistry`] - Pass types by name, built from validated option records
//! - [`RenderGraph`] / [`GraphBuilder`] - Passes, port-to-port edges and final outputs
//! - [`compile`] - Validation, topological ordering and resource negotiation into a [`CompiledPlan`]
//! - [`Executor`] - Runs a plan once per frame over pooled, double-buffered resources
//! - [`passes`] - The built-in pass types
//! - [`presets`] - The reference ReSTIR + DLSS graph
//!
//! ## Example
//!
//! ```
//! use passgraph_graphics::{presets, CompileOptions, Executor, Extent2d, HostDevice, PassRegistry};
//!
//! let registry = PassRegistry::with_builtin_passes();
//! let mut graph = presets::restir_dlss(&registry)?;
//! let device = HostDevice::new();
//!
//! let mut executor = Executor::new();
//! let options = CompileOptions::default().with_extent(Extent2d::new(32, 18));
//! executor.ensure_compiled(&graph, &options, &device)?;
//!
//! for _ in 0..3 {
//!     let frame = executor.execute_frame(&mut graph, &device)?;
//!     assert!(frame.get(presets::RESTIR_DLSS_OUTPUT).is_some());
//! }
//! assert_eq!(executor.frame_index(), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compiler;
pub mod device;
pub mod error;
pub mod executor;
pub mod graph;
pub mod passes;
pub mod presets;
pub mod registry;
pub mod resources;
pub mod types;

// Re-export main types for convenience
pub use compiler::{compile, CompileOptions, CompiledPlan};
pub use device::{Device, HostDevice};
pub use error::{BuildError, CompileError, DeviceError, FrameError, PassError};
pub use executor::{Executor, Fence, FenceStatus, FrameOutputs, OutputImage};
pub use graph::{
    BypassRule, EdgeKind, GraphBuilder, InputPort, OutputPort, PassContext, PassHandle,
    PassReflection, RenderGraph, RenderPass, Submission,
};
pub use registry::PassRegistry;
pub use resources::{ResourcePool, Texture, TextureDesc};
pub use types::{
    luminance, Extent2d, FormatSet, IoSize, Lifetime, ResourceFormat, SizePolicy, Texel,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// Logs the graphics and core library versions.
pub fn init() {
    log::info!("passgraph graphics v{} initialized", VERSION);
    passgraph_core::init();
}
