//! # passgraph demos
//!
//! Headless drivers for the preset render graphs.
//!
//! ## Available Demos
//!
//! - `restir_dlss` - Runs the ReSTIR + DLSS graph for a number of frames and
//!   logs the mean luminance of every frame

mod args;

pub use args::DemoArgs;

use passgraph_graphics::{
    presets, BuildError, CompileError, CompileOptions, Executor, Extent2d, FrameError, HostDevice,
    OutputImage, PassRegistry,
};
use thiserror::Error;

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors that stop a demo run.
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("failed to build graph: {0}")]
    Build(#[from] BuildError),
    #[error("failed to compile graph: {0}")]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("no pass named '{0}' in the graph")]
    UnknownPass(String),
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Frames completed.
    pub frames: u64,
    /// Execution order of the compiled plan.
    pub execution_order: Vec<String>,
    /// Mean luminance of the final output, per frame.
    pub luminance: Vec<f32>,
    /// Textures the device created over the whole run.
    pub allocations: u64,
}

/// Build the ReSTIR + DLSS graph and run it as configured by `args`.
pub fn run_restir_dlss(args: &DemoArgs) -> Result<RunSummary, DemoError> {
    let registry = PassRegistry::with_builtin_passes();
    let mut graph = presets::restir_dlss(&registry)?;
    for (pass, enabled) in [
        ("AccumulatePass", args.enable_accumulate),
        ("DLSSPass", !args.disable_dlss),
    ] {
        if !graph.set_pass_enabled(pass, enabled) {
            return Err(DemoError::UnknownPass(pass.to_string()));
        }
    }

    let device = HostDevice::new();
    let options = CompileOptions::default()
        .with_extent(Extent2d::new(args.width, args.height))
        .with_trim_frames(args.trim_frames);
    let mut executor = Executor::new();
    executor.ensure_compiled(&graph, &options, &device)?;

    let execution_order: Vec<String> = executor
        .plan()
        .map(|plan| plan.execution_order().into_iter().map(String::from).collect())
        .unwrap_or_default();
    log::info!("Execution order: {}", execution_order.join(" -> "));

    let mut luminance_per_frame = Vec::with_capacity(args.frames as usize);
    for _ in 0..args.frames {
        let outputs = executor.execute_frame(&mut graph, &device)?;
        let mean = outputs
            .get(presets::RESTIR_DLSS_OUTPUT)
            .map(OutputImage::mean_luminance)
            .unwrap_or_default();
        log::info!("Frame {}: mean luminance {:.4}", outputs.frame, mean);
        luminance_per_frame.push(mean);
    }

    let stats = executor.stats();
    log::info!(
        "{} frames completed, {} textures allocated",
        stats.completed,
        device.allocation_count()
    );
    Ok(RunSummary {
        frames: stats.completed,
        execution_order,
        luminance: luminance_per_frame,
        allocations: device.allocation_count(),
    })
}
