use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use apcam_core::{
    CameraConfig, CameraController, FrameSize, LifecycleSettings, PixelFormat, SharedCamera,
    SimDriver, SoftJpegEncoder,
};
use apcam_http::{CameraServer, ServerConfig};
use clap::{Parser, ValueEnum};
use embedded_hal::delay::DelayNs;
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Camera AP firmware HTTP surface on a simulated sensor", long_about = None)]
struct Args {
    /// Address to serve on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Pixel format the simulated sensor produces
    #[arg(short, long, value_enum, default_value = "jpeg")]
    format: Format,

    /// Initial frame size (esp32-camera framesize_t value, 8 = VGA)
    #[arg(long, default_value_t = 8)]
    framesize: u32,

    /// Frame rate cap, 0 for unpaced
    #[arg(long, default_value_t = 15)]
    fps: u32,

    /// Initial JPEG quality, 1 (best) to 63
    #[arg(short, long, default_value_t = 12)]
    quality: u8,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Jpeg,
    Rgb565,
    Rgb888,
    Yuv422,
    Grayscale,
}

impl From<Format> for PixelFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Jpeg => PixelFormat::Jpeg,
            Format::Rgb565 => PixelFormat::Rgb565,
            Format::Rgb888 => PixelFormat::Rgb888,
            Format::Yuv422 => PixelFormat::Yuv422,
            Format::Grayscale => PixelFormat::Grayscale,
        }
    }
}

/// `DelayNs` over `thread::sleep`.
struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns as u64));
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let frame_size = FrameSize::from_raw(args.framesize)
        .with_context(|| format!("unknown frame size {}", args.framesize))?;
    if !(1..=63).contains(&args.quality) {
        anyhow::bail!("quality must be between 1 and 63, got {}", args.quality);
    }

    let config = CameraConfig {
        pixel_format: args.format.into(),
        frame_size,
        jpeg_quality: args.quality,
        ..Default::default()
    };
    info!(
        "Simulated camera: {:?} {} q{} @ {} fps",
        config.pixel_format, frame_size, args.quality, args.fps
    );

    let driver = SimDriver::new().with_fps(args.fps);
    let controller = CameraController::new(driver, StdDelay, config, LifecycleSettings::default());
    let camera = SharedCamera::new(controller);
    if let Err(e) = camera.initialize() {
        // keep serving so /reinit and /health stay reachable
        warn!("Camera init failed: {}", e);
    }

    let server = CameraServer::new(camera, SoftJpegEncoder::new(), ServerConfig::default());
    info!("Open http://{}/ in a browser", args.bind);
    server.run(args.bind)
}
