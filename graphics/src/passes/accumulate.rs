//! Temporal accumulation.

use passgraph_core::config::{ConfigError, ConfigReader, ConfigRecord};
use passgraph_core::option_enum;

use crate::error::PassError;
use crate::graph::{
    BypassRule, InputPort, OutputPort, PassContext, PassReflection, RenderPass, Submission,
};
use crate::types::{Extent2d, FormatSet, ResourceFormat, SizePolicy};

use super::{read_output_size, FrameHistory, FIXED_OUTPUT_SIZE, OUTPUT_SIZE};

option_enum! {
    /// Arithmetic used for the running sum.
    #[derive(Default)]
    pub enum AccumulatePrecision {
        #[default]
        Single,
        Double,
    }
}

/// Validated `AccumulatePass` options.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulateConfig {
    pub enabled: bool,
    pub output_size: SizePolicy,
    pub auto_reset: bool,
    pub precision_mode: AccumulatePrecision,
    /// Frames per accumulation group; 0 accumulates across all frames.
    pub sub_frame_count: u32,
    /// Frames after which the result is frozen; 0 is unbounded.
    pub max_accumulated_frames: u32,
}

impl Default for AccumulateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_size: SizePolicy::Default,
            auto_reset: true,
            precision_mode: AccumulatePrecision::Single,
            sub_frame_count: 0,
            max_accumulated_frames: 0,
        }
    }
}

impl AccumulateConfig {
    const KEYS: &'static [&'static str] = &[
        "enabled",
        OUTPUT_SIZE,
        FIXED_OUTPUT_SIZE,
        "autoReset",
        "precisionMode",
        "subFrameCount",
        "maxAccumulatedFrames",
    ];

    /// Validate a configuration record.
    pub fn from_record(record: &ConfigRecord) -> Result<Self, ConfigError> {
        let d = Self::default();
        let r = ConfigReader::new(AccumulatePass::TYPE_NAME, record, Self::KEYS)?;
        Ok(Self {
            enabled: r.bool("enabled", d.enabled)?,
            output_size: read_output_size(&r)?,
            auto_reset: r.bool("autoReset", d.auto_reset)?,
            precision_mode: r.enumeration("precisionMode", d.precision_mode)?,
            sub_frame_count: r.uint("subFrameCount", d.sub_frame_count, 0..=u32::MAX)?,
            max_accumulated_frames: r.uint(
                "maxAccumulatedFrames",
                d.max_accumulated_frames,
                0..=u32::MAX,
            )?,
        })
    }
}

#[derive(Debug, Clone)]
struct Accumulation {
    extent: Extent2d,
    frames: u32,
    sum: Vec<[f64; 4]>,
}

impl Accumulation {
    fn empty(extent: Extent2d) -> Self {
        Self {
            extent,
            frames: 0,
            sum: vec![[0.0; 4]; extent.texel_count()],
        }
    }
}

/// Progressive average of its input over frames.
///
/// The average restarts when the output extent changes (with `autoReset`)
/// and at the start of every group of `subFrameCount` frames. Once
/// `maxAccumulatedFrames` frames are in the sum, further input is ignored.
///
/// Disabled, the pass forwards `input` unchanged.
#[derive(Debug, Clone, Default)]
pub struct AccumulatePass {
    config: AccumulateConfig,
    history: FrameHistory<Accumulation>,
}

impl AccumulatePass {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "AccumulatePass";

    pub fn new(config: AccumulateConfig) -> Self {
        Self {
            config,
            history: FrameHistory::default(),
        }
    }

    /// Create the pass from a configuration record.
    pub fn from_config(record: &ConfigRecord) -> Result<Self, ConfigError> {
        AccumulateConfig::from_record(record).map(Self::new)
    }

    pub fn config(&self) -> &AccumulateConfig {
        &self.config
    }

    /// Drop the running sum.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

fn starts_new_group(config: &AccumulateConfig, previous: &Accumulation, extent: Extent2d) -> bool {
    if previous.extent != extent {
        return config.auto_reset || previous.sum.len() != extent.texel_count();
    }
    config.sub_frame_count > 0 && previous.frames >= config.sub_frame_count
}

impl RenderPass for AccumulatePass {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self) -> PassReflection {
        PassReflection::new()
            .with_input(InputPort::new("input", FormatSet::COLOR | FormatSet::HDR_COLOR))
            .with_output(
                OutputPort::new("output", ResourceFormat::Rgba32Float)
                    .with_formats(FormatSet::HDR_COLOR)
                    .with_size(self.config.output_size),
            )
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn bypass(&self, _output: &str) -> BypassRule {
        BypassRule::PassThrough("input")
    }

    fn execute(&mut self, ctx: &PassContext) -> Result<Submission, PassError> {
        let input = ctx.require_input("input")?;
        let Some(output) = ctx.output("output") else {
            return Ok(Submission::Complete);
        };
        let extent = output.extent();
        let frame = ctx.frame();

        let mut acc = match self.history.previous(frame) {
            Some(previous) if !starts_new_group(&self.config, previous, extent) => previous.clone(),
            _ => Accumulation::empty(extent),
        };
        acc.extent = extent;

        let max = self.config.max_accumulated_frames;
        if max == 0 || acc.frames < max {
            let src = input.extent();
            let single = self.config.precision_mode == AccumulatePrecision::Single;
            input.with_texels(|texels| {
                for (i, sum) in acc.sum.iter_mut().enumerate() {
                    let (x, y) = (i as u32 % extent.width, i as u32 / extent.width);
                    let sx = (x * src.width / extent.width).min(src.width - 1);
                    let sy = (y * src.height / extent.height).min(src.height - 1);
                    let texel = texels[(sy * src.width + sx) as usize];
                    for c in 0..4 {
                        sum[c] = if single {
                            f64::from(sum[c] as f32 + texel[c])
                        } else {
                            sum[c] + f64::from(texel[c])
                        };
                    }
                }
            });
            acc.frames += 1;
        }

        let scale = 1.0 / f64::from(acc.frames.max(1));
        output.with_texels_mut(|texels| {
            for (out, sum) in texels.iter_mut().zip(&acc.sum) {
                *out = sum.map(|c| (c * scale) as f32);
            }
        });
        log::trace!("AccumulatePass: frame {} averages {} frames", frame, acc.frames);

        self.history.stage(frame, acc);
        Ok(Submission::Complete)
    }
}
