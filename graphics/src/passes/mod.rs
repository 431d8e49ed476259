//! Built-in pass types.
//!
//! Each pass validates its options once, in `from_config`, into a settings
//! struct, and declares a fixed port interface. The bodies are small
//! deterministic CPU stand-ins for the real shading work so that graphs built
//! from these types can be executed and inspected.
//!
//! | Type | Inputs | Outputs | Bypass |
//! |------|--------|---------|--------|
//! | [`VBufferRT`] | | `vbuffer`, `depth`, `mvec` | neutral: 0, depth 1.0 (far plane), 0 |
//! | [`ReSTIRPass`] | `vbuffer`, `mvec` | `color` | neutral black |
//! | [`AccumulatePass`] | `input` | `output` | pass-through `input` |
//! | [`DLSSPass`] | `color`, `depth`, `mvec` | `output` | pass-through `color` |
//! | [`ToneMapper`] | `src` | `dst` | pass-through `src` |

mod accumulate;
mod dlss;
mod restir;
mod tone_mapper;
mod vbuffer;

use passgraph_core::config::{ConfigError, ConfigReader};

use crate::graph::RenderPass;
use crate::registry::PassRegistry;
use crate::types::{IoSize, SizePolicy};

pub use accumulate::{AccumulateConfig, AccumulatePass, AccumulatePrecision};
pub use dlss::{DLSSPass, DlssConfig, DlssProfile, MotionVectorScale};
pub use restir::{ReSTIRConfig, ReSTIRPass};
pub use tone_mapper::{ExposureMode, ToneMapOperator, ToneMapper, ToneMapperConfig};
pub use vbuffer::{CullMode, SamplePattern, VBufferConfig, VBufferRT};

/// Register every built-in pass type.
pub fn register_builtin_passes(registry: &mut PassRegistry) {
    registry.register(VBufferRT::TYPE_NAME, |config| {
        Ok(Box::new(VBufferRT::from_config(config)?) as Box<dyn RenderPass>)
    });
    registry.register(ReSTIRPass::TYPE_NAME, |config| {
        Ok(Box::new(ReSTIRPass::from_config(config)?) as Box<dyn RenderPass>)
    });
    registry.register(AccumulatePass::TYPE_NAME, |config| {
        Ok(Box::new(AccumulatePass::from_config(config)?) as Box<dyn RenderPass>)
    });
    registry.register(DLSSPass::TYPE_NAME, |config| {
        Ok(Box::new(DLSSPass::from_config(config)?) as Box<dyn RenderPass>)
    });
    registry.register(ToneMapper::TYPE_NAME, |config| {
        Ok(Box::new(ToneMapper::from_config(config)?) as Box<dyn RenderPass>)
    });
}

const OUTPUT_SIZE: &str = "outputSize";
const FIXED_OUTPUT_SIZE: &str = "fixedOutputSize";
const DEFAULT_FIXED_SIZE: [u32; 2] = [512, 512];

/// Read the `outputSize`/`fixedOutputSize` pair.
fn read_output_size(reader: &ConfigReader<'_>) -> Result<SizePolicy, ConfigError> {
    let size = reader.enumeration(OUTPUT_SIZE, IoSize::Default)?;
    let fixed = reader.uint2(FIXED_OUTPUT_SIZE, DEFAULT_FIXED_SIZE)?;
    if size == IoSize::Fixed && (fixed[0] == 0 || fixed[1] == 0) {
        return Err(reader.invalid(
            FIXED_OUTPUT_SIZE,
            format!("fixed size ({}, {}) has a zero dimension", fixed[0], fixed[1]),
        ));
    }
    Ok(SizePolicy::from_io_size(size, fixed))
}

/// Deterministic white noise in `[0, 1)` per texel and frame.
fn noise(x: u32, y: u32, frame: u64) -> f32 {
    let mut h = x
        .wrapping_mul(0x8da6_b343)
        ^ y.wrapping_mul(0xd816_3841)
        ^ (frame as u32).wrapping_mul(0xcb1a_b31f);
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb_352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846c_a68b);
    h ^= h >> 16;
    (h >> 8) as f32 / (1u32 << 24) as f32
}

/// Per-pass state carried from one frame to the next.
///
/// State produced while executing frame `k` is staged and only becomes
/// visible to frames after `k`. Re-running frame `k` after an aborted attempt
/// discards the staged value, so a retried frame sees the same history as
/// the failed attempt did.
#[derive(Debug, Clone)]
struct FrameHistory<T> {
    committed: Option<T>,
    staged: Option<(u64, T)>,
}

impl<T> Default for FrameHistory<T> {
    fn default() -> Self {
        Self {
            committed: None,
            staged: None,
        }
    }
}

impl<T> FrameHistory<T> {
    /// State left by the most recent frame before `frame`.
    fn previous(&mut self, frame: u64) -> Option<&T> {
        if let Some((staged_frame, value)) = self.staged.take() {
            if staged_frame < frame {
                self.committed = Some(value);
            }
        }
        self.committed.as_ref()
    }

    /// Stage the state produced by `frame`.
    fn stage(&mut self, frame: u64, value: T) {
        self.staged = Some((frame, value));
    }

    fn clear(&mut self) {
        self.committed = None;
        self.staged = None;
    }
}
