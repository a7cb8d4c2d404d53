mod app;
mod args;
mod controls;
mod headless;
mod heightmap;
mod shaders;

use anyhow::{Context, Result};
use clap::Parser;
use skyline_engine::coords::Viewport;
use skyline_engine::device::GpuInit;
use skyline_engine::geometry::{synthesize, CityParams};
use skyline_engine::logging::{init_logging, LoggingConfig};
use skyline_engine::window::{LogicalSize, Runtime, RuntimeConfig};

use crate::app::CityViewer;
use crate::args::Args;

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(LoggingConfig {
        env_filter: args.log_filter.clone(),
        ..LoggingConfig::default()
    });

    let hm = heightmap::load(&args.heightmap)?;
    log::info!("heightmap {}: {}x{}", args.heightmap.display(), hm.width, hm.height);

    let params = CityParams {
        with_normals: args.normals,
        ..CityParams::default()
    };
    let meshes = synthesize(&hm.pixels, hm.width, hm.height, &params).context("failed to build city geometry")?;
    let transform = args.initial_transform();

    if args.headless {
        let viewport = Viewport::new(args.width as f32, args.height as f32);
        let report = headless::run(meshes, transform, viewport, args.frames)?;
        println!("{}", headless::summarize(&report));
        return Ok(());
    }

    let config = RuntimeConfig {
        title: "skyline".to_string(),
        initial_size: LogicalSize::new(f64::from(args.width), f64::from(args.height)),
    };
    Runtime::run(config, GpuInit::default(), CityViewer::new(meshes, transform))
}
