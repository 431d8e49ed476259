//! Temporal upscaler.

use passgraph_core::config::{ConfigError, ConfigReader, ConfigRecord};
use passgraph_core::option_enum;

use crate::error::PassError;
use crate::graph::{
    BypassRule, InputPort, OutputPort, PassContext, PassReflection, RenderPass, Submission,
};
use crate::types::{FormatSet, ResourceFormat, SizePolicy, Texel};

use super::{read_output_size, FIXED_OUTPUT_SIZE, OUTPUT_SIZE};

option_enum! {
    /// Quality/performance trade-off.
    #[derive(Default)]
    pub enum DlssProfile {
        MaxPerf,
        #[default]
        Balanced,
        MaxQuality,
    }
}

option_enum! {
    /// Units of the `mvec` input.
    #[derive(Default)]
    pub enum MotionVectorScale {
        /// Motion in pixels.
        Absolute,
        /// Motion in fractions of the image size.
        #[default]
        Relative,
    }
}

/// Validated `DLSSPass` options.
#[derive(Debug, Clone, PartialEq)]
pub struct DlssConfig {
    pub enabled: bool,
    pub output_size: SizePolicy,
    pub profile: DlssProfile,
    pub motion_vector_scale: MotionVectorScale,
    pub is_hdr: bool,
    pub sharpness: f32,
    /// Exposure in EV applied before the upscale.
    pub exposure: f32,
}

impl Default for DlssConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_size: SizePolicy::Default,
            profile: DlssProfile::Balanced,
            motion_vector_scale: MotionVectorScale::Relative,
            is_hdr: true,
            sharpness: 0.0,
            exposure: 0.0,
        }
    }
}

impl DlssConfig {
    const KEYS: &'static [&'static str] = &[
        "enabled",
        OUTPUT_SIZE,
        FIXED_OUTPUT_SIZE,
        "profile",
        "motionVectorScale",
        "isHDR",
        "sharpness",
        "exposure",
    ];

    /// Validate a configuration record.
    pub fn from_record(record: &ConfigRecord) -> Result<Self, ConfigError> {
        let d = Self::default();
        let r = ConfigReader::new(DLSSPass::TYPE_NAME, record, Self::KEYS)?;
        Ok(Self {
            enabled: r.bool("enabled", d.enabled)?,
            output_size: read_output_size(&r)?,
            profile: r.enumeration("profile", d.profile)?,
            motion_vector_scale: r.enumeration("motionVectorScale", d.motion_vector_scale)?,
            is_hdr: r.bool("isHDR", d.is_hdr)?,
            sharpness: r.float("sharpness", d.sharpness, -1.0..=1.0)?,
            exposure: r.float("exposure", d.exposure, -16.0..=16.0)?,
        })
    }
}

/// Upscales `color` to the output extent.
///
/// The stand-in resolves with a bilinear filter, sharpens against a 4-tap
/// neighbourhood and rejects texels whose depth is at the far plane from
/// sharpening. Without HDR input the result is clamped to `[0, 1]`.
#[derive(Debug, Clone, Default)]
#[allow(clippy::upper_case_acronyms)]
pub struct DLSSPass {
    config: DlssConfig,
}

impl DLSSPass {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "DLSSPass";

    pub fn new(config: DlssConfig) -> Self {
        Self { config }
    }

    /// Create the pass from a configuration record.
    pub fn from_config(record: &ConfigRecord) -> Result<Self, ConfigError> {
        DlssConfig::from_record(record).map(Self::new)
    }

    pub fn config(&self) -> &DlssConfig {
        &self.config
    }
}

/// Bilinear sample of a texel grid at continuous coordinates.
fn bilinear(texels: &[Texel], width: u32, height: u32, x: f32, y: f32) -> Texel {
    let x = (x - 0.5).clamp(0.0, (width - 1) as f32);
    let y = (y - 0.5).clamp(0.0, (height - 1) as f32);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(width - 1), (y0 + 1).min(height - 1));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);
    let at = |x: u32, y: u32| texels[(y * width + x) as usize];
    let (a, b, c, d) = (at(x0, y0), at(x1, y0), at(x0, y1), at(x1, y1));
    let mut out = [0.0; 4];
    for i in 0..4 {
        let top = a[i] + (b[i] - a[i]) * fx;
        let bottom = c[i] + (d[i] - c[i]) * fx;
        out[i] = top + (bottom - top) * fy;
    }
    out
}

impl RenderPass for DLSSPass {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self) -> PassReflection {
        PassReflection::new()
            .with_input(InputPort::new("color", FormatSet::COLOR | FormatSet::HDR_COLOR))
            .with_input(InputPort::new("depth", FormatSet::DEPTH))
            .with_input(InputPort::new("mvec", FormatSet::MOTION))
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
        BypassRule::PassThrough("color")
    }

    fn execute(&mut self, ctx: &PassContext) -> Result<Submission, PassError> {
        let color = ctx.require_input("color")?;
        let depth = ctx.require_input("depth")?;
        ctx.require_input("mvec")?;
        let Some(output) = ctx.output("output") else {
            return Ok(Submission::Complete);
        };

        let src = color.extent();
        let dst = output.extent();
        let scale = 2f32.powf(self.config.exposure);
        let sharpness = self.config.sharpness;
        let clamp = !self.config.is_hdr;
        let source = color.snapshot();
        let depth_extent = depth.extent();
        let far: Vec<bool> = depth.with_texels(|texels| texels.iter().map(|t| t[0] >= 1.0).collect());

        let sample = |x: f32, y: f32| bilinear(&source, src.width, src.height, x, y);
        output.with_texels_mut(|texels| {
            for y in 0..dst.height {
                for x in 0..dst.width {
                    let sx = (x as f32 + 0.5) * src.width as f32 / dst.width as f32;
                    let sy = (y as f32 + 0.5) * src.height as f32 / dst.height as f32;
                    let center = sample(sx, sy);
                    let dx = (x * depth_extent.width / dst.width).min(depth_extent.width - 1);
                    let dy = (y * depth_extent.height / dst.height).min(depth_extent.height - 1);
                    let sharpen = sharpness != 0.0 && !far[(dy * depth_extent.width + dx) as usize];
                    let mut texel = center;
                    if sharpen {
                        let n = [
                            sample(sx - 1.0, sy),
                            sample(sx + 1.0, sy),
                            sample(sx, sy - 1.0),
                            sample(sx, sy + 1.0),
                        ];
                        for c in 0..3 {
                            let blur = (n[0][c] + n[1][c] + n[2][c] + n[3][c]) * 0.25;
                            texel[c] = center[c] + (center[c] - blur) * sharpness;
                        }
                    }
                    for c in texel.iter_mut().take(3) {
                        *c *= scale;
                        if clamp {
                            *c = c.clamp(0.0, 1.0);
                        }
                    }
                    texels[(y * dst.width + x) as usize] = texel;
                }
            }
        });
        Ok(Submission::Complete)
    }
}
