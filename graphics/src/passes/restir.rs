//! Reservoir-based direct lighting.

use passgraph_core::config::{ConfigError, ConfigReader, ConfigRecord};

use crate::error::PassError;
use crate::graph::{
    BypassRule, InputPort, OutputPort, PassContext, PassReflection, RenderPass, Submission,
};
use crate::types::{Extent2d, FormatSet, ResourceFormat, Texel};

use super::{noise, FrameHistory};

/// Validated `ReSTIRPass` options.
#[derive(Debug, Clone, PartialEq)]
pub struct ReSTIRConfig {
    pub enabled: bool,
    pub temporal_reuse: bool,
    pub spatial_reuse: bool,
    pub spatial_iterations: u32,
    pub candidate_count: u32,
}

impl Default for ReSTIRConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            temporal_reuse: true,
            spatial_reuse: true,
            spatial_iterations: 1,
            candidate_count: 32,
        }
    }
}

impl ReSTIRConfig {
    const KEYS: &'static [&'static str] = &[
        "enabled",
        "temporalReuse",
        "spatialReuse",
        "spatialIterations",
        "candidateCount",
    ];

    /// Validate a configuration record.
    pub fn from_record(record: &ConfigRecord) -> Result<Self, ConfigError> {
        let d = Self::default();
        let r = ConfigReader::new(ReSTIRPass::TYPE_NAME, record, Self::KEYS)?;
        Ok(Self {
            enabled: r.bool("enabled", d.enabled)?,
            temporal_reuse: r.bool("temporalReuse", d.temporal_reuse)?,
            spatial_reuse: r.bool("spatialReuse", d.spatial_reuse)?,
            spatial_iterations: r.uint("spatialIterations", d.spatial_iterations, 0..=8)?,
            candidate_count: r.uint("candidateCount", d.candidate_count, 1..=64)?,
        })
    }
}

/// Per-pixel reservoir: running radiance estimate and its sample count.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Reservoir {
    radiance: f32,
    samples: f32,
}

impl Reservoir {
    fn merge(&mut self, other: Reservoir) {
        let total = self.samples + other.samples;
        if total > 0.0 {
            self.radiance = (self.radiance * self.samples + other.radiance * other.samples) / total;
            self.samples = total;
        }
    }
}

/// History samples are capped relative to the fresh candidates.
const TEMPORAL_HISTORY_CAP: f32 = 20.0;

/// Direct illumination from resampled light candidates.
///
/// Reads the visibility buffer and motion vectors and writes HDR radiance to
/// `color`. Misses are black. Reservoirs are reprojected from the previous
/// frame when temporal reuse is on and blurred over hit neighbours for each
/// spatial iteration.
#[derive(Debug, Clone, Default)]
pub struct ReSTIRPass {
    config: ReSTIRConfig,
    history: FrameHistory<(Extent2d, Vec<Reservoir>)>,
}

impl ReSTIRPass {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "ReSTIRPass";

    pub fn new(config: ReSTIRConfig) -> Self {
        Self {
            config,
            history: FrameHistory::default(),
        }
    }

    /// Create the pass from a configuration record.
    pub fn from_config(record: &ConfigRecord) -> Result<Self, ConfigError> {
        ReSTIRConfig::from_record(record).map(Self::new)
    }

    pub fn config(&self) -> &ReSTIRConfig {
        &self.config
    }

    /// Average of `candidate_count` random light samples at a hit point.
    fn sample_lights(&self, hit: &Texel, x: u32, y: u32, frame: u64) -> f32 {
        let (u, v) = (hit[2] * 2.0 - 1.0, hit[3] * 2.0 - 1.0);
        let normal = [u, v, (1.0 - u * u - v * v).max(0.0).sqrt()];
        let mut sum = 0.0;
        for i in 0..self.config.candidate_count {
            let seed = frame.wrapping_mul(64).wrapping_add(u64::from(i));
            let phi = noise(x, y, seed) * std::f32::consts::TAU;
            let cos_theta = noise(y, x, seed);
            let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
            let light = [sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta];
            let n_dot_l = normal[0] * light[0] + normal[1] * light[1] + normal[2] * light[2];
            sum += n_dot_l.max(0.0);
        }
        sum / self.config.candidate_count as f32
    }
}

impl RenderPass for ReSTIRPass {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self) -> PassReflection {
        PassReflection::new()
            .with_input(InputPort::new("vbuffer", FormatSet::RGBA32_UINT))
            .with_input(InputPort::new("mvec", FormatSet::MOTION).optional())
            .with_output(
                OutputPort::new("color", ResourceFormat::Rgba32Float)
                    .with_formats(FormatSet::HDR_COLOR),
            )
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn bypass(&self, _output: &str) -> BypassRule {
        BypassRule::Neutral([0.0, 0.0, 0.0, 1.0])
    }

    fn execute(&mut self, ctx: &PassContext) -> Result<Submission, PassError> {
        let vbuffer = ctx.require_input("vbuffer")?;
        let Some(color) = ctx.output("color") else {
            return Ok(Submission::Complete);
        };
        let extent = color.extent();
        let src = vbuffer.extent();
        let frame = ctx.frame();
        let hits: Vec<Texel> = (0..extent.height)
            .flat_map(|y| (0..extent.width).map(move |x| (x, y)))
            .map(|(x, y)| {
                vbuffer.load(
                    x * src.width / extent.width,
                    y * src.height / extent.height,
                )
            })
            .collect();

        let candidates = self.config.candidate_count as f32;
        let mut reservoirs: Vec<Reservoir> = hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                if hit[0] == 0.0 {
                    return Reservoir::default();
                }
                let (x, y) = (i as u32 % extent.width, i as u32 / extent.width);
                Reservoir {
                    radiance: self.sample_lights(hit, x, y, frame),
                    samples: candidates,
                }
            })
            .collect();

        if self.config.temporal_reuse {
            let motion = ctx.input("mvec").map(|mvec| mvec.load(0, 0)).unwrap_or([0.0; 4]);
            if let Some((prev_extent, previous)) = self.history.previous(frame) {
                if *prev_extent == extent {
                    let dx = (motion[0] * extent.width as f32).round() as i64;
                    let dy = (motion[1] * extent.height as f32).round() as i64;
                    for (i, reservoir) in reservoirs.iter_mut().enumerate() {
                        if reservoir.samples == 0.0 {
                            continue;
                        }
                        let px = (i as u32 % extent.width) as i64 + dx;
                        let py = (i as u32 / extent.width) as i64 + dy;
                        if px < 0 || py < 0 || px >= extent.width as i64 || py >= extent.height as i64 {
                            continue;
                        }
                        let mut prev = previous[(py as u32 * extent.width + px as u32) as usize];
                        prev.samples = prev.samples.min(TEMPORAL_HISTORY_CAP * candidates);
                        reservoir.merge(prev);
                    }
                }
            }
        } else {
            self.history.clear();
        }

        if self.config.spatial_reuse {
            for _ in 0..self.config.spatial_iterations {
                reservoirs = spatial_pass(&reservoirs, extent);
            }
        }

        color.with_texels_mut(|texels| {
            for ((out, hit), reservoir) in texels.iter_mut().zip(&hits).zip(&reservoirs) {
                *out = if hit[0] == 0.0 {
                    [0.0, 0.0, 0.0, 1.0]
                } else {
                    let albedo = [0.8, 0.4 + 0.4 * hit[2], 0.4 + 0.4 * hit[3]];
                    let l = reservoir.radiance;
                    [albedo[0] * l, albedo[1] * l, albedo[2] * l, 1.0]
                };
            }
        });

        self.history.stage(frame, (extent, reservoirs));
        Ok(Submission::Complete)
    }
}

/// One 3x3 neighbourhood merge over valid reservoirs.
fn spatial_pass(reservoirs: &[Reservoir], extent: Extent2d) -> Vec<Reservoir> {
    let (w, h) = (extent.width as i64, extent.height as i64);
    reservoirs
        .iter()
        .enumerate()
        .map(|(i, center)| {
            if center.samples == 0.0 {
                return *center;
            }
            let (x, y) = (i as i64 % w, i as i64 / w);
            let mut radiance = 0.0;
            let mut count = 0.0;
            for ny in (y - 1).max(0)..=(y + 1).min(h - 1) {
                for nx in (x - 1).max(0)..=(x + 1).min(w - 1) {
                    let neighbour = reservoirs[(ny * w + nx) as usize];
                    if neighbour.samples > 0.0 {
                        radiance += neighbour.radiance;
                        count += 1.0;
                    }
                }
            }
            Reservoir {
                radiance: radiance / count,
                samples: center.samples,
            }
        })
        .collect()
}
