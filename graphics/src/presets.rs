//! Ready-made graphs.

use passgraph_core::config::{ConfigRecord, ConfigValue};

use crate::error::BuildError;
use crate::graph::{GraphBuilder, RenderGraph};
use crate::registry::PassRegistry;

/// Final output of [`restir_dlss`].
pub const RESTIR_DLSS_OUTPUT: &str = "ToneMapper.dst";

fn accumulate_options() -> ConfigRecord {
    ConfigRecord::new()
        .with("enabled", false)
        .with("outputSize", ConfigValue::enumeration("Default"))
        .with("autoReset", true)
        .with("precisionMode", ConfigValue::enumeration("Single"))
        .with("subFrameCount", 0)
        .with("maxAccumulatedFrames", 1)
}

fn tone_mapper_options() -> ConfigRecord {
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

fn dlss_options() -> ConfigRecord {
    ConfigRecord::new()
        .with("enabled", true)
        .with("outputSize", ConfigValue::enumeration("Default"))
        .with("profile", ConfigValue::enumeration("Balanced"))
        .with("motionVectorScale", ConfigValue::enumeration("Relative"))
        .with("isHDR", true)
        .with("sharpness", 0.0)
        .with("exposure", 0.0)
}

fn vbuffer_options() -> ConfigRecord {
    ConfigRecord::new()
        .with("outputSize", ConfigValue::enumeration("Default"))
        .with("samplePattern", ConfigValue::enumeration("Center"))
        .with("sampleCount", 16)
        .with("useAlphaTest", true)
        .with("adjustShadingNormals", true)
        .with("forceCullMode", false)
        .with("cull", ConfigValue::enumeration("CullBack"))
        .with("useTraceRayInline", false)
        .with("useDOF", true)
}

/// The ReSTIR direct lighting pipeline upscaled by DLSS.
///
/// ```text
/// VBufferRT ─vbuffer,mvec─> ReSTIRPass ─color─> AccumulatePass ─output─> DLSSPass ─output─> ToneMapper ─dst─> (final)
///     └──────────────────────────depth,mvec───────────────────────────────────┘
/// ```
///
/// `AccumulatePass` is declared disabled and forwards its input until it is
/// switched on with [`RenderGraph::set_pass_enabled`].
pub fn restir_dlss(registry: &PassRegistry) -> Result<RenderGraph, BuildError> {
    let mut builder = GraphBuilder::new(registry);
    builder.add_pass("ReSTIRPass", "ReSTIRPass", &ConfigRecord::new())?;
    builder.add_pass("AccumulatePass", "AccumulatePass", &accumulate_options())?;
    builder.add_pass("ToneMapper", "ToneMapper", &tone_mapper_options())?;
    builder.add_pass("DLSSPass", "DLSSPass", &dlss_options())?;
    builder.add_pass("VBufferRT", "VBufferRT", &vbuffer_options())?;

    builder.add_edge("VBufferRT.depth", "DLSSPass.depth")?;
    builder.add_edge("ReSTIRPass.color", "AccumulatePass.input")?;
    builder.add_edge("VBufferRT.mvec", "DLSSPass.mvec")?;
    builder.add_edge("AccumulatePass.output", "DLSSPass.color")?;
    builder.add_edge("DLSSPass.output", "ToneMapper.src")?;
    builder.add_edge("VBufferRT.vbuffer", "ReSTIRPass.vbuffer")?;
    builder.add_edge("VBufferRT.mvec", "ReSTIRPass.mvec")?;
    builder.mark_output(RESTIR_DLSS_OUTPUT)?;
    Ok(builder.build())
}
