//! # ReSTIR + DLSS Demo
//!
//! Builds the reference render graph, compiles it for the requested
//! resolution and runs it headless on the host device.

use std::process::ExitCode;

use clap::Parser;
use passgraph_demos::{run_restir_dlss, DemoArgs};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    passgraph_graphics::init();

    let args = DemoArgs::parse();
    log::info!("Starting with {:?}", args);

    match run_restir_dlss(&args) {
        Ok(summary) => {
            log::info!(
                "Done: {} frames, {} allocations",
                summary.frames,
                summary.allocations
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
