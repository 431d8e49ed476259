//! Common utilities for graph integration tests.
//!
//! Small passes with observable behavior, shared by the test binaries.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use passgraph_graphics::{
    CompileOptions, Extent2d, Fence, FormatSet, InputPort, OutputPort, PassContext, PassError,
    PassReflection, RenderPass, ResourceFormat, Submission,
};

/// Initialize logging once for the test binary.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Compile options with a small swap-chain extent.
pub fn small_options() -> CompileOptions {
    CompileOptions::default().with_extent(Extent2d::new(8, 4))
}

fn require_output<'a>(
    ctx: &'a PassContext,
    name: &str,
) -> Result<&'a passgraph_graphics::Texture, PassError> {
    ctx.output(name)
        .ok_or_else(|| PassError::Failed(format!("output '{name}' not bound")))
}

// ============================================================================
// Sources and filters
// ============================================================================

/// Fills `out` with a constant, or with `frame + 1` when no constant is set.
pub struct Source {
    value: Option<f32>,
}

impl Source {
    pub fn frame_counter() -> Box<dyn RenderPass> {
        Box::new(Self { value: None })
    }

    pub fn constant(value: f32) -> Box<dyn RenderPass> {
        Box::new(Self { value: Some(value) })
    }
}

impl RenderPass for Source {
    fn type_name(&self) -> &str {
        "Source"
    }

    fn reflect(&self) -> PassReflection {
        PassReflection::new().with_output(OutputPort::new("out", ResourceFormat::Rgba32Float))
    }

    fn execute(&mut self, ctx: &PassContext) -> Result<Submission, PassError> {
        let value = self.value.unwrap_or((ctx.frame() + 1) as f32);
        require_output(ctx, "out")?.fill([value, value, value, 1.0]);
        Ok(Submission::Complete)
    }
}

/// Copies `in` to `out`.
pub struct CopyPass;

impl CopyPass {
    pub fn boxed() -> Box<dyn RenderPass> {
        Box::new(Self)
    }
}

impl RenderPass for CopyPass {
    fn type_name(&self) -> &str {
        "Copy"
    }

    fn reflect(&self) -> PassReflection {
        PassReflection::new()
            .with_input(InputPort::new("in", FormatSet::COLOR))
            .with_output(OutputPort::new("out", ResourceFormat::Rgba32Float))
    }

    fn execute(&mut self, ctx: &PassContext) -> Result<Submission, PassError> {
        let src = ctx.require_input("in")?;
        require_output(ctx, "out")?.copy_from(src);
        Ok(Submission::Complete)
    }
}

/// Writes `prev + 1`, where `prev` is its own output from the previous frame.
pub struct Counter;

impl Counter {
    pub fn boxed() -> Box<dyn RenderPass> {
        Box::new(Self)
    }
}

impl RenderPass for Counter {
    fn type_name(&self) -> &str {
        "Counter"
    }

    fn reflect(&self) -> PassReflection {
        PassReflection::new()
            .with_input(InputPort::new("prev", FormatSet::RGBA32_FLOAT).temporal())
            .with_output(OutputPort::new("count", ResourceFormat::Rgba32Float))
    }

    fn execute(&mut self, ctx: &PassContext) -> Result<Submission, PassError> {
        let prev = ctx.require_input("prev")?.load(0, 0)[0];
        require_output(ctx, "count")?.fill([prev + 1.0; 4]);
        Ok(Submission::Complete)
    }
}

/// Copies `in` to `out`, or fails while its switch is on.
pub struct Failing {
    fail: Arc<AtomicBool>,
}

impl Failing {
    /// The pass and the switch controlling it.
    pub fn switchable() -> (Box<dyn RenderPass>, Arc<AtomicBool>) {
        let fail = Arc::new(AtomicBool::new(false));
        (Box::new(Self { fail: fail.clone() }), fail)
    }
}

impl RenderPass for Failing {
    fn type_name(&self) -> &str {
        "Failing"
    }

    fn reflect(&self) -> PassReflection {
        PassReflection::new()
            .with_input(InputPort::new("in", FormatSet::COLOR))
            .with_output(OutputPort::new("out", ResourceFormat::Rgba32Float))
    }

    fn execute(&mut self, ctx: &PassContext) -> Result<Submission, PassError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PassError::Failed("switched off".into()));
        }
        require_output(ctx, "out")?.copy_from(ctx.require_input("in")?);
        Ok(Submission::Complete)
    }
}

/// Writes `value` into `out` from a worker thread after a delay.
pub struct AsyncSource {
    value: f32,
    delay: Duration,
}

impl AsyncSource {
    pub fn boxed(value: f32, delay: Duration) -> Box<dyn RenderPass> {
        Box::new(Self { value, delay })
    }
}

impl RenderPass for AsyncSource {
    fn type_name(&self) -> &str {
        "AsyncSource"
    }

    fn reflect(&self) -> PassReflection {
        PassReflection::new().with_output(OutputPort::new("out", ResourceFormat::Rgba32Float))
    }

    fn execute(&mut self, ctx: &PassContext) -> Result<Submission, PassError> {
        let out = require_output(ctx, "out")?.clone();
        let fence = Fence::new_unsignaled();
        let signal = fence.clone();
        let (value, delay) = (self.value, self.delay);
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            out.fill([value; 4]);
            signal.signal();
        });
        Ok(Submission::Pending(fence))
    }
}

/// Copies `in` to `out` from a worker thread after a delay.
pub struct AsyncCopy {
    delay: Duration,
}

impl AsyncCopy {
    pub fn boxed(delay: Duration) -> Box<dyn RenderPass> {
        Box::new(Self { delay })
    }
}

impl RenderPass for AsyncCopy {
    fn type_name(&self) -> &str {
        "AsyncCopy"
    }

    fn reflect(&self) -> PassReflection {
        PassReflection::new()
            .with_input(InputPort::new("in", FormatSet::COLOR))
            .with_output(OutputPort::new("out", ResourceFormat::Rgba32Float))
    }

    fn execute(&mut self, ctx: &PassContext) -> Result<Submission, PassError> {
        let src = ctx.require_input("in")?.clone();
        let dst = require_output(ctx, "out")?.clone();
        let fence = Fence::new_unsignaled();
        let signal = fence.clone();
        let delay = self.delay;
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            dst.copy_from(&src);
            signal.signal();
        });
        Ok(Submission::Pending(fence))
    }
}
