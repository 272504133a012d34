mod board;
mod camera;
mod config;
mod diag;
#[cfg(feature = "display")]
mod display;
mod encoder;
mod wifi;

use std::net::SocketAddr;
use std::thread;

use anyhow::Result;
use apcam_core::{CameraConfig, CameraController, FrameSize, LifecycleSettings, SharedCamera};
use apcam_http::{CameraServer, ServerConfig};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use crate::camera::EspCameraDriver;
use crate::encoder::EspJpegEncoder;

#[toml_cfg::toml_config]
pub struct Config {
    #[default("T-CameraPlus")]
    ap_ssid: &'static str,
    #[default("")]
    ap_password: &'static str,
    #[default(6)]
    ap_channel: u8,
    #[default(false)]
    ap_hidden: bool,
    #[default(4)]
    ap_max_clients: u8,
    #[default(8)]
    frame_size: u32,
    #[default(12)]
    jpeg_quality: u8,
    #[default(80)]
    http_port: u16,
    #[default(-1)]
    display_sclk: i32,
    #[default(-1)]
    display_mosi: i32,
    #[default(-1)]
    display_cs: i32,
    #[default(-1)]
    display_dc: i32,
    #[default(-1)]
    display_rst: i32,
    #[default(-1)]
    display_backlight: i32,
    #[default(-1)]
    ircut_pin: i32,
}

/// Accept loop stack; each connection gets `CONNECTION_STACK`.
const SERVER_STACK: usize = 8 * 1024;
const CONNECTION_STACK: usize = 16 * 1024;
const HEAP_LOG_TICKS: u32 = 1000;

#[cfg(feature = "display")]
type Screen = display::StatusDisplay;

#[cfg(feature = "display")]
fn show(screen: &mut Option<Screen>, lines: &[&str]) {
    if let Some(screen) = screen.as_mut() {
        if let Err(e) = screen.show(lines) {
            warn!("{}", e);
        }
    }
}

#[cfg(not(feature = "display"))]
type Screen = ();

#[cfg(not(feature = "display"))]
fn show(_screen: &mut Option<Screen>, _lines: &[&str]) {}

fn main() -> Result<()> {
    esp_idf_sys::link_patches();
    EspLogger::initialize_default();

    info!("Booting {}", board::BOARD);
    diag::log_chip_info();
    diag::log_heap("boot");

    let app = &CONFIG;
    config::validate(app)?;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    // erases and retries when the partition is full or from a newer layout
    let nvs = EspDefaultNvsPartition::take()?;
    info!("NVS ready");

    let _ircut = match config::pin(app.ircut_pin) {
        Some(n) => {
            // SAFETY: IR-cut line comes from cfg.toml and is not claimed elsewhere
            let mut line = PinDriver::output(unsafe { AnyOutputPin::new(n) })?;
            line.set_low()?;
            info!("IR-cut on GPIO{} driven low", n);
            Some(line)
        }
        None => None,
    };

    #[cfg(feature = "display")]
    let mut screen: Option<Screen> = match display::StatusDisplay::new(peripherals.spi2, app) {
        Ok(screen) => screen,
        Err(e) => {
            warn!("Display unavailable: {}", e);
            None
        }
    };
    #[cfg(not(feature = "display"))]
    let mut screen: Option<Screen> = None;
    show(&mut screen, &["Booting..."]);

    let frame_size = FrameSize::from_raw(app.frame_size).unwrap_or_else(|| {
        warn!("Unknown frame size {} in cfg.toml, using VGA", app.frame_size);
        FrameSize::Vga
    });
    let requested = CameraConfig {
        frame_size,
        jpeg_quality: app.jpeg_quality.clamp(1, 63),
        ..Default::default()
    };

    diag::log_heap("pre-camera");
    board::CAMERA_PINS.log();
    let driver = EspCameraDriver::new(board::CAMERA_PINS);
    let controller = CameraController::new(driver, FreeRtos, requested, LifecycleSettings::default());
    let camera = SharedCamera::new(controller);

    match camera.initialize() {
        Ok(()) => {
            diag::log_heap("post-camera");
            show(&mut screen, &["Camera OK"]);
        }
        Err(e) => {
            // keep going so /reinit and /health stay reachable
            error!("Camera bring-up failed: {}", e);
            show(&mut screen, &["Camera init FAILED"]);
        }
    }

    let (_wifi, ip) = wifi::start_access_point(peripherals.modem, sysloop, nvs, app)?;
    let ip_line = ip.to_string();
    show(&mut screen, &[app.ap_ssid, ip_line.as_str()]);

    let server_config = ServerConfig {
        worker_stack: CONNECTION_STACK,
        ..Default::default()
    };
    let server = CameraServer::new(camera, EspJpegEncoder, server_config);
    let addr = SocketAddr::from(([0, 0, 0, 0], app.http_port));
    thread::Builder::new()
        .name("httpd".into())
        .stack_size(SERVER_STACK)
        .spawn(move || {
            if let Err(e) = server.run(addr) {
                error!("HTTP server stopped: {:?}", e);
            }
        })?;

    info!("Open: http://{}/", ip);
    info!("Stream: http://{}/stream", ip);

    let mut ticks: u32 = 0;
    loop {
        FreeRtos::delay_ms(1);
        ticks = ticks.wrapping_add(1);
        if ticks % HEAP_LOG_TICKS == 0 {
            diag::log_heap("loop");
        }
    }
}
