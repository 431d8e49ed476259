//! Command line arguments.

use clap::Parser;

/// Run the ReSTIR + DLSS render graph headless on the host device.
///
/// ```bash
/// # Ten frames at 320x180 with temporal accumulation
/// ./restir_dlss --frames 10 --width 320 --height 180 --enable-accumulate
/// ```
#[derive(Parser, Debug, Clone)]
#[command(name = "restir_dlss", version)]
pub struct DemoArgs {
    /// Number of frames to run.
    #[arg(long, default_value_t = 8)]
    pub frames: u64,

    /// Swap-chain width in pixels.
    #[arg(long, default_value_t = 160, value_parser = clap::value_parser!(u32).range(1..=16384))]
    pub width: u32,

    /// Swap-chain height in pixels.
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u32).range(1..=16384))]
    pub height: u32,

    /// Switch AccumulatePass on (the graph declares it disabled).
    #[arg(long)]
    pub enable_accumulate: bool,

    /// Bypass DLSSPass.
    #[arg(long)]
    pub disable_dlss: bool,

    /// Frames an unused pooled texture is kept before it is freed.
    #[arg(long, default_value_t = 3)]
    pub trim_frames: u32,
}
