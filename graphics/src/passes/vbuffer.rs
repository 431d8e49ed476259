//! Ray traced visibility buffer.

use passgraph_core::config::{ConfigError, ConfigReader, ConfigRecord};
use passgraph_core::option_enum;

use crate::error::PassError;
use crate::graph::{BypassRule, OutputPort, PassContext, PassReflection, RenderPass, Submission};
use crate::types::{FormatSet, ResourceFormat, SizePolicy};

use super::{read_output_size, FIXED_OUTPUT_SIZE, OUTPUT_SIZE};

option_enum! {
    /// Sub-pixel sample pattern used for camera jitter.
    #[derive(Default)]
    pub enum SamplePattern {
        #[default]
        Center,
        DirectX,
        Halton,
        Stratified,
    }
}

option_enum! {
    /// Triangle culling mode.
    #[derive(Default)]
    pub enum CullMode {
        CullNone,
        CullFront,
        #[default]
        CullBack,
    }
}

/// Validated `VBufferRT` options.
#[derive(Debug, Clone, PartialEq)]
pub struct VBufferConfig {
    pub output_size: SizePolicy,
    pub sample_pattern: SamplePattern,
    pub sample_count: u32,
    pub use_alpha_test: bool,
    pub adjust_shading_normals: bool,
    pub force_cull_mode: bool,
    pub cull: CullMode,
    pub use_trace_ray_inline: bool,
    pub use_dof: bool,
}

impl Default for VBufferConfig {
    fn default() -> Self {
        Self {
            output_size: SizePolicy::Default,
            sample_pattern: SamplePattern::Center,
            sample_count: 16,
            use_alpha_test: true,
            adjust_shading_normals: true,
            force_cull_mode: false,
            cull: CullMode::CullBack,
            use_trace_ray_inline: false,
            use_dof: true,
        }
    }
}

impl VBufferConfig {
    const KEYS: &'static [&'static str] = &[
        OUTPUT_SIZE,
        FIXED_OUTPUT_SIZE,
        "samplePattern",
        "sampleCount",
        "useAlphaTest",
        "adjustShadingNormals",
        "forceCullMode",
        "cull",
        "useTraceRayInline",
        "useDOF",
    ];

    /// Validate a configuration record.
    pub fn from_record(record: &ConfigRecord) -> Result<Self, ConfigError> {
        let d = Self::default();
        let r = ConfigReader::new(VBufferRT::TYPE_NAME, record, Self::KEYS)?;
        Ok(Self {
            output_size: read_output_size(&r)?,
            sample_pattern: r.enumeration("samplePattern", d.sample_pattern)?,
            sample_count: r.uint("sampleCount", d.sample_count, 1..=1024)?,
            use_alpha_test: r.bool("useAlphaTest", d.use_alpha_test)?,
            adjust_shading_normals: r.bool("adjustShadingNormals", d.adjust_shading_normals)?,
            force_cull_mode: r.bool("forceCullMode", d.force_cull_mode)?,
            cull: r.enumeration("cull", d.cull)?,
            use_trace_ray_inline: r.bool("useTraceRayInline", d.use_trace_ray_inline)?,
            use_dof: r.bool("useDOF", d.use_dof)?,
        })
    }
}

/// Generates the visibility buffer, depth and motion vectors.
///
/// The stand-in scene is a single sphere centred in the view. `vbuffer`
/// holds `[instance, primitive, u, v]` with instance 0 meaning a miss,
/// `depth` is normalized to `[0, 1]` with 1 at the far plane, and `mvec`
/// carries the screen-space jitter delta between frames.
#[derive(Debug, Clone, Default)]
pub struct VBufferRT {
    config: VBufferConfig,
}

impl VBufferRT {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "VBufferRT";

    /// Create the pass from validated options.
    pub fn new(config: VBufferConfig) -> Self {
        Self { config }
    }

    /// Create the pass from a configuration record.
    pub fn from_config(record: &ConfigRecord) -> Result<Self, ConfigError> {
        VBufferConfig::from_record(record).map(Self::new)
    }

    /// The validated options.
    pub fn config(&self) -> &VBufferConfig {
        &self.config
    }

    /// Sub-pixel camera offset in `[-0.5, 0.5]` for `frame`.
    fn jitter(&self, frame: u64) -> [f32; 2] {
        let index = frame % u64::from(self.config.sample_count);
        match self.config.sample_pattern {
            SamplePattern::Center => [0.0, 0.0],
            SamplePattern::Halton => [halton(index + 1, 2) - 0.5, halton(index + 1, 3) - 0.5],
            SamplePattern::DirectX | SamplePattern::Stratified => {
                let side = (self.config.sample_count as f32).sqrt().ceil().max(1.0) as u64;
                let (sx, sy) = (index % side, index / side);
                [
                    (sx as f32 + 0.5) / side as f32 - 0.5,
                    (sy as f32 + 0.5) / side as f32 - 0.5,
                ]
            }
        }
    }
}

const SPHERE_RADIUS_SQ: f32 = 0.5;

/// Normalized depth of a visibility sample, 1.0 on a miss.
fn sphere_depth(hit: &[f32; 4], back_face: bool) -> f32 {
    if hit[0] == 0.0 {
        return 1.0;
    }
    let (u, v) = (hit[2] * 2.0 - 1.0, hit[3] * 2.0 - 1.0);
    let bulge = (1.0 - (u * u + v * v) / SPHERE_RADIUS_SQ).max(0.0).sqrt();
    if back_face {
        0.5 + 0.25 * bulge
    } else {
        0.5 - 0.25 * bulge
    }
}

/// Radical inverse in `base`.
fn halton(mut index: u64, base: u64) -> f32 {
    let mut result = 0.0;
    let mut f = 1.0 / base as f32;
    while index > 0 {
        result += f * (index % base) as f32;
        index /= base;
        f /= base as f32;
    }
    result
}

impl RenderPass for VBufferRT {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self) -> PassReflection {
        let size = self.config.output_size;
        PassReflection::new()
            .with_output(OutputPort::new("vbuffer", ResourceFormat::Rgba32Uint).with_size(size))
            .with_output(
                OutputPort::new("depth", ResourceFormat::R32Float)
                    .with_formats(FormatSet::DEPTH)
                    .with_size(size),
            )
            .with_output(
                OutputPort::new("mvec", ResourceFormat::Rg32Float)
                    .with_formats(FormatSet::MOTION)
                    .with_size(size),
            )
    }

    fn bypass(&self, output: &str) -> BypassRule {
        match output {
            "depth" => BypassRule::Neutral([1.0, 0.0, 0.0, 0.0]),
            _ => BypassRule::Neutral([0.0; 4]),
        }
    }

    fn execute(&mut self, ctx: &PassContext) -> Result<Submission, PassError> {
        let jitter = self.jitter(ctx.frame());
        let previous = self.jitter(ctx.frame().wrapping_sub(1));

        // Culling front faces leaves the inside of the far hemisphere visible.
        let back_face = self.config.force_cull_mode && self.config.cull == CullMode::CullFront;
        if let Some(vbuffer) = ctx.output("vbuffer") {
            let extent = vbuffer.extent();
            vbuffer.with_texels_mut(|texels| {
                for y in 0..extent.height {
                    for x in 0..extent.width {
                        let u = ((x as f32 + 0.5 + jitter[0]) / extent.width as f32) * 2.0 - 1.0;
                        let v = ((y as f32 + 0.5 + jitter[1]) / extent.height as f32) * 2.0 - 1.0;
                        let index = (y * extent.width + x) as usize;
                        texels[index] = if u * u + v * v < SPHERE_RADIUS_SQ {
                            let primitive = if back_face { 1.0 } else { 0.0 };
                            [1.0, primitive, (u + 1.0) * 0.5, (v + 1.0) * 0.5]
                        } else {
                            [0.0; 4]
                        };
                    }
                }
            });
            if let Some(depth) = ctx.output("depth") {
                let hits = vbuffer.snapshot();
                depth.with_texels_mut(|texels| {
                    for (out, hit) in texels.iter_mut().zip(hits.iter()) {
                        *out = [sphere_depth(hit, back_face), 0.0, 0.0, 0.0];
                    }
                });
            }
        } else if let Some(depth) = ctx.output("depth") {
            depth.fill([1.0, 0.0, 0.0, 0.0]);
        }

        if let Some(mvec) = ctx.output("mvec") {
            let extent = mvec.extent();
            let motion = [
                (previous[0] - jitter[0]) / extent.width as f32,
                (previous[1] - jitter[1]) / extent.height as f32,
            ];
            mvec.fill([motion[0], motion[1], 0.0, 0.0]);
        }
        Ok(Submission::Complete)
    }
}
