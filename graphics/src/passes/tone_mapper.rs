//! HDR to display tone mapping.

use passgraph_core::config::{ConfigError, ConfigReader, ConfigRecord};
use passgraph_core::option_enum;

use crate::error::PassError;
use crate::graph::{
    BypassRule, InputPort, OutputPort, PassContext, PassReflection, RenderPass, Submission,
};
use crate::types::{luminance, FormatSet, ResourceFormat, SizePolicy};

use super::{read_output_size, FIXED_OUTPUT_SIZE, OUTPUT_SIZE};

option_enum! {
    /// Tone curve applied per channel.
    #[derive(Default)]
    pub enum ToneMapOperator {
        Linear,
        Reinhard,
        ReinhardModified,
        HejiHableAlu,
        HableUc2,
        #[default]
        Aces,
    }
}

option_enum! {
    /// Which camera setting is held fixed when the exposure is edited.
    #[derive(Default)]
    pub enum ExposureMode {
        #[default]
        AperturePriority,
        ShutterPriority,
    }
}

/// Validated `ToneMapper` options.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneMapperConfig {
    pub output_size: SizePolicy,
    pub use_scene_metadata: bool,
    /// Exposure offset in EV.
    pub exposure_compensation: f32,
    pub auto_exposure: bool,
    /// ISO.
    pub film_speed: f32,
    pub white_balance: bool,
    /// Color temperature in kelvin.
    pub white_point: f32,
    pub operator: ToneMapOperator,
    pub clamp: bool,
    pub white_max_luminance: f32,
    pub white_scale: f32,
    pub f_number: f32,
    /// Shutter speed as the denominator of the exposure time.
    pub shutter: f32,
    pub exposure_mode: ExposureMode,
}

impl Default for ToneMapperConfig {
    fn default() -> Self {
        Self {
            output_size: SizePolicy::Default,
            use_scene_metadata: true,
            exposure_compensation: 0.0,
            auto_exposure: false,
            film_speed: 100.0,
            white_balance: false,
            white_point: 6500.0,
            operator: ToneMapOperator::Aces,
            clamp: true,
            white_max_luminance: 1.0,
            white_scale: 11.2,
            f_number: 1.0,
            shutter: 1.0,
            exposure_mode: ExposureMode::AperturePriority,
        }
    }
}

impl ToneMapperConfig {
    const KEYS: &'static [&'static str] = &[
        OUTPUT_SIZE,
        FIXED_OUTPUT_SIZE,
        "useSceneMetadata",
        "exposureCompensation",
        "autoExposure",
        "filmSpeed",
        "whiteBalance",
        "whitePoint",
        "operator",
        "clamp",
        "whiteMaxLuminance",
        "whiteScale",
        "fNumber",
        "shutter",
        "exposureMode",
    ];

    /// Validate a configuration record.
    pub fn from_record(record: &ConfigRecord) -> Result<Self, ConfigError> {
        let d = Self::default();
        let r = ConfigReader::new(ToneMapper::TYPE_NAME, record, Self::KEYS)?;
        Ok(Self {
            output_size: read_output_size(&r)?,
            use_scene_metadata: r.bool("useSceneMetadata", d.use_scene_metadata)?,
            exposure_compensation: r.float(
                "exposureCompensation",
                d.exposure_compensation,
                -12.0..=12.0,
            )?,
            auto_exposure: r.bool("autoExposure", d.auto_exposure)?,
            film_speed: r.float("filmSpeed", d.film_speed, 1.0..=6400.0)?,
            white_balance: r.bool("whiteBalance", d.white_balance)?,
            white_point: r.float("whitePoint", d.white_point, 1905.0..=25000.0)?,
            operator: r.enumeration("operator", d.operator)?,
            clamp: r.bool("clamp", d.clamp)?,
            white_max_luminance: r.float("whiteMaxLuminance", d.white_max_luminance, 0.1..=100.0)?,
            white_scale: r.float("whiteScale", d.white_scale, 1.0..=100.0)?,
            f_number: r.float("fNumber", d.f_number, 0.1..=100.0)?,
            shutter: r.float("shutter", d.shutter, 0.1..=10000.0)?,
            exposure_mode: r.enumeration("exposureMode", d.exposure_mode)?,
        })
    }

    /// Linear scale from the manual camera settings and compensation.
    pub fn exposure_scale(&self) -> f32 {
        let ev100 = (self.f_number * self.f_number * self.shutter * 100.0 / self.film_speed).log2();
        2f32.powf(self.exposure_compensation) / (1.2 * 2f32.powf(ev100))
    }
}

impl ToneMapOperator {
    /// Map one linear channel value.
    pub fn apply(self, x: f32, config: &ToneMapperConfig) -> f32 {
        match self {
            Self::Linear => x,
            Self::Reinhard => x / (1.0 + x),
            Self::ReinhardModified => {
                let white = config.white_max_luminance * config.white_max_luminance;
                x * (1.0 + x / white) / (1.0 + x)
            }
            Self::HejiHableAlu => {
                let x = (x - 0.004).max(0.0);
                (x * (6.2 * x + 0.5)) / (x * (6.2 * x + 1.7) + 0.06)
            }
            Self::HableUc2 => hable(2.0 * x) / hable(config.white_scale),
            Self::Aces => {
                let x = x * 0.6;
                (x * (2.51 * x + 0.03)) / (x * (2.43 * x + 0.59) + 0.14)
            }
        }
    }
}

fn hable(x: f32) -> f32 {
    const A: f32 = 0.15;
    const B: f32 = 0.50;
    const C: f32 = 0.10;
    const D: f32 = 0.20;
    const E: f32 = 0.02;
    const F: f32 = 0.30;
    ((x * (A * x + C * B) + D * E) / (x * (A * x + B) + D * F)) - E / F
}

/// Approximate sRGB tint of a black body at `kelvin`, each channel in `[0, 1]`.
fn blackbody(kelvin: f32) -> [f32; 3] {
    let t = kelvin / 100.0;
    let r = if t <= 66.0 {
        1.0
    } else {
        (1.292_936_2 * (t - 60.0).powf(-0.133_204_76)).clamp(0.0, 1.0)
    };
    let g = if t <= 66.0 {
        (0.390_081_58 * t.ln() - 0.631_841_4).clamp(0.0, 1.0)
    } else {
        (1.129_890_9 * (t - 60.0).powf(-0.075_514_846)).clamp(0.0, 1.0)
    };
    let b = if t >= 66.0 {
        1.0
    } else if t <= 19.0 {
        0.0
    } else {
        (0.543_206_8 * (t - 10.0).ln() - 1.196_254_1).clamp(0.0, 1.0)
    };
    [r, g, b]
}

/// Maps `src` to a displayable `dst`.
///
/// The pipeline is exposure (manual camera model, compensation and an
/// optional log-average auto exposure), white balance towards a D65 white,
/// then the selected tone curve and an optional clamp.
#[derive(Debug, Clone, Default)]
pub struct ToneMapper {
    config: ToneMapperConfig,
}

impl ToneMapper {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "ToneMapper";

    pub fn new(config: ToneMapperConfig) -> Self {
        Self { config }
    }

    /// Create the pass from a configuration record.
    pub fn from_config(record: &ConfigRecord) -> Result<Self, ConfigError> {
        ToneMapperConfig::from_record(record).map(Self::new)
    }

    pub fn config(&self) -> &ToneMapperConfig {
        &self.config
    }

    fn white_balance(&self) -> [f32; 3] {
        if !self.config.white_balance {
            return [1.0; 3];
        }
        let reference = blackbody(6500.0);
        let white = blackbody(self.config.white_point);
        [
            reference[0] / white[0].max(1e-4),
            reference[1] / white[1].max(1e-4),
            reference[2] / white[2].max(1e-4),
        ]
    }
}

impl RenderPass for ToneMapper {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn reflect(&self) -> PassReflection {
        PassReflection::new()
            .with_input(InputPort::new("src", FormatSet::COLOR | FormatSet::HDR_COLOR))
            .with_output(
                OutputPort::new("dst", ResourceFormat::Rgba8Unorm)
                    .with_formats(FormatSet::COLOR)
                    .with_size(self.config.output_size),
            )
    }

    fn bypass(&self, _output: &str) -> BypassRule {
        BypassRule::PassThrough("src")
    }

    fn execute(&mut self, ctx: &PassContext) -> Result<Submission, PassError> {
        let src = ctx.require_input("src")?;
        let Some(dst) = ctx.output("dst") else {
            return Ok(Submission::Complete);
        };

        let mut scale = self.config.exposure_scale();
        let texels = src.snapshot();
        if self.config.auto_exposure && !texels.is_empty() {
            let log_sum: f32 = texels
                .iter()
                .map(|t| (luminance(t) * scale).max(1e-4).ln())
                .sum();
            let average = (log_sum / texels.len() as f32).exp();
            scale *= 0.18 / average;
        }
        let balance = self.white_balance();
        let config = &self.config;

        let src_extent = src.extent();
        let extent = dst.extent();
        dst.with_texels_mut(|out| {
            for y in 0..extent.height {
                for x in 0..extent.width {
                    let sx = (x * src_extent.width / extent.width).min(src_extent.width - 1);
                    let sy = (y * src_extent.height / extent.height).min(src_extent.height - 1);
                    let input = texels[(sy * src_extent.width + sx) as usize];
                    let mut texel = [0.0, 0.0, 0.0, input[3]];
                    for c in 0..3 {
                        let mapped = config.operator.apply(input[c] * scale * balance[c], config);
                        texel[c] = if config.clamp {
                            mapped.clamp(0.0, 1.0)
                        } else {
                            mapped
                        };
                    }
                    out[(y * extent.width + x) as usize] = texel;
                }
            }
        });
        Ok(Submission::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, HostDevice};
    use crate::resources::TextureDesc;
    use crate::types::Extent2d;
    use passgraph_core::config::ConfigValue;
    use rstest::rstest;

    fn reference_record() -> ConfigRecord {
        ConfigRecord::new()
            .with("outputSize", ConfigValue::enumeration("Default"))
            .with("useSceneMetadata", true)
            .with("exposureCompensation", 10.0)
            .with("autoExposure", false)
            .with("filmSpeed", 100.0)
            .with("whiteBalance", false)
            .with("whitePoint", 6500.0)
            .with("operator", ConfigValue::enumeration("Aces"))
            .with("clamp", true)
            .with("whiteMaxLuminance", 1.0)
            .with("whiteScale", 11.199999809265137)
            .with("fNumber", 1.0)
            .with("shutter", 1.0)
            .with("exposureMode", ConfigValue::enumeration("AperturePriority"))
    }

    fn map(config: ToneMapperConfig, value: f32) -> [f32; 4] {
        let device = HostDevice::new();
        let extent = Extent2d::new(2, 2);
        let src = device
            .create_texture(&TextureDesc::new("src", extent, ResourceFormat::Rgba32Float))
            .unwrap();
        src.fill([value, value, value, 1.0]);
        let dst = device
            .create_texture(&TextureDesc::new("dst", extent, ResourceFormat::Rgba8Unorm))
            .unwrap();
        let ctx = PassContext::new(0, extent)
            .with_input("src", src)
            .with_output("dst", dst);
        ToneMapper::new(config).execute(&ctx).unwrap();
        ctx.output("dst").unwrap().load(1, 1)
    }

    #[test]
    fn test_reference_options() {
        let pass = ToneMapper::from_config(&reference_record()).unwrap();
        assert_eq!(pass.config().exposure_compensation, 10.0);
        assert_eq!(pass.config().operator, ToneMapOperator::Aces);
        assert!((pass.config().white_scale - 11.2).abs() < 1e-5);
    }

    #[rstest]
    #[case::exposure_range("exposureCompensation", ConfigValue::Float(12.5))]
    #[case::white_point("whitePoint", ConfigValue::Float(1000.0))]
    #[case::operator("operator", ConfigValue::enumeration("Filmic"))]
    #[case::clamp_kind("clamp", ConfigValue::Float(1.0))]
    fn test_invalid_options(#[case] key: &str, #[case] value: ConfigValue) {
        let record = reference_record().with(key, value);
        let err = ToneMapper::from_config(&record).unwrap_err();
        assert_eq!(err.key(), key);
    }

    #[rstest]
    #[case::linear(ToneMapOperator::Linear, 1.0, 1.0)]
    #[case::reinhard(ToneMapOperator::Reinhard, 1.0, 0.5)]
    #[case::reinhard_modified(ToneMapOperator::ReinhardModified, 1.0, 1.0)]
    #[case::aces_black(ToneMapOperator::Aces, 0.0, 0.0)]
    #[case::hable_white(ToneMapOperator::HableUc2, 5.6, 1.0)]
    fn test_operator_curves(#[case] op: ToneMapOperator, #[case] x: f32, #[case] expected: f32) {
        let config = ToneMapperConfig::default();
        assert!((op.apply(x, &config) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_exposure_scale() {
        let config = ToneMapperConfig::default();
        assert!((config.exposure_scale() - 1.0 / 1.2).abs() < 1e-6);

        let brighter = ToneMapperConfig {
            exposure_compensation: 1.0,
            ..ToneMapperConfig::default()
        };
        assert!((brighter.exposure_scale() - 2.0 / 1.2).abs() < 1e-5);
    }

    #[test]
    fn test_linear_execute() {
        let config = ToneMapperConfig {
            operator: ToneMapOperator::Linear,
            ..ToneMapperConfig::default()
        };
        let texel = map(config, 0.6);
        assert!((texel[0] - 0.5).abs() < 1e-6);
        assert_eq!(texel[3], 1.0);
    }

    #[test]
    fn test_clamp() {
        let config = ToneMapperConfig {
            operator: ToneMapOperator::Linear,
            ..ToneMapperConfig::default()
        };
        assert_eq!(map(config.clone(), 100.0)[0], 1.0);

        let unclamped = ToneMapperConfig {
            clamp: false,
            ..config
        };
        assert!(map(unclamped, 100.0)[0] > 1.0);
    }

    #[test]
    fn test_auto_exposure_targets_middle_grey() {
        let config = ToneMapperConfig {
            operator: ToneMapOperator::Linear,
            auto_exposure: true,
            ..ToneMapperConfig::default()
        };
        assert!((map(config, 7.0)[0] - 0.18).abs() < 1e-4);
    }

    #[test]
    fn test_white_balance_neutral_at_d65() {
        let pass = ToneMapper::new(ToneMapperConfig {
            white_balance: true,
            ..ToneMapperConfig::default()
        });
        for c in pass.white_balance() {
            assert!((c - 1.0).abs() < 1e-6);
        }
        let warm = ToneMapper::new(ToneMapperConfig {
            white_balance: true,
            white_point: 3000.0,
            ..ToneMapperConfig::default()
        });
        let balance = warm.white_balance();
        assert!(balance[2] > balance[0]);
    }
}
