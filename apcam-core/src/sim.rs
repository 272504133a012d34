//! Synthetic camera for host runs and integration tests.
//!
//! Produces a scrolling colour pattern at the configured frame size and pixel
//! format. Faults can be injected through a [`SimHandle`] while the driver is
//! owned by a controller.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::config::{CameraConfig, MemoryStats};
use crate::driver::CameraDriver;
use crate::encoder::JpegEncoder;
use crate::error::{ControlError, DriverError};
use crate::frame::{Frame, FrameSize, PixelFormat};
use crate::sensor::{Sensor, SensorId, SensorSetting};
use crate::soft_jpeg::SoftJpegEncoder;

/// `ESP_ERR_NOT_SUPPORTED`
const ERR_NOT_SUPPORTED: i32 = 0x106;

#[derive(Debug, Default)]
struct Faults {
    failing_inits: VecDeque<i32>,
    empty_frames: usize,
    inits: usize,
    deinits: usize,
    acquired: u64,
    returned: u64,
}

/// Shared fault-injection and bookkeeping handle.
#[derive(Debug, Clone, Default)]
pub struct SimHandle {
    faults: Arc<Mutex<Faults>>,
}

impl SimHandle {
    fn lock(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next `codes.len()` init calls fail with these codes.
    pub fn fail_inits(&self, codes: &[i32]) {
        self.lock().failing_inits.extend(codes.iter().copied());
    }

    /// The next `count` acquisitions return nothing.
    pub fn drop_frames(&self, count: usize) {
        self.lock().empty_frames += count;
    }

    pub fn inits(&self) -> usize {
        self.lock().inits
    }

    pub fn deinits(&self) -> usize {
        self.lock().deinits
    }

    /// Frames handed out and not yet released.
    pub fn outstanding(&self) -> u64 {
        let faults = self.lock();
        faults.acquired - faults.returned
    }
}

#[derive(Debug, Clone)]
pub struct SimFrame {
    data: Vec<u8>,
    width: usize,
    height: usize,
    format: PixelFormat,
    timestamp: Duration,
}

impl Frame for SimFrame {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn timestamp(&self) -> Duration {
        self.timestamp
    }
}

/// Register state of the pretend OV2640.
#[derive(Debug, Clone)]
pub struct SimSensor {
    frame_size: FrameSize,
    quality: u8,
    hmirror: bool,
    vflip: bool,
}

impl Sensor for SimSensor {
    fn id(&self) -> SensorId {
        SensorId {
            pid: 0x26,
            ver: 0x42,
            midh: 0x7f,
            midl: 0xa2,
        }
    }

    fn apply(&mut self, setting: SensorSetting) -> Result<(), ControlError> {
        match setting {
            SensorSetting::FrameSize(size) => self.frame_size = size,
            SensorSetting::Quality(q) => self.quality = q,
            SensorSetting::HMirror(on) => self.hmirror = on,
            SensorSetting::VFlip(on) => self.vflip = on,
            _ => {}
        }
        Ok(())
    }
}

pub struct SimDriver {
    handle: SimHandle,
    memory: MemoryStats,
    frame_interval: Duration,
    format: PixelFormat,
    sensor: Option<SimSensor>,
    encoder: SoftJpegEncoder,
    started: Instant,
    next_due: Instant,
    seq: u32,
}

impl SimDriver {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            handle: SimHandle::default(),
            memory: MemoryStats {
                free_internal: 180 << 10,
                total_internal: 320 << 10,
                free_psram: 7 << 20,
                total_psram: 8 << 20,
            },
            frame_interval: Duration::ZERO,
            format: PixelFormat::Jpeg,
            sensor: None,
            encoder: SoftJpegEncoder::new(),
            started: now,
            next_due: now,
            seq: 0,
        }
    }

    /// Paces acquisitions to roughly `fps` frames per second. 0 is unpaced.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.frame_interval = if fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / fps
        };
        self
    }

    pub fn with_memory(mut self, memory: MemoryStats) -> Self {
        self.memory = memory;
        self
    }

    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }

    // Never sleeps; callers honour `next_frame_at` before the lock is taken
    fn schedule_next(&mut self) {
        if !self.frame_interval.is_zero() {
            self.next_due = Instant::now() + self.frame_interval;
        }
    }

    fn render(&mut self, sensor: &SimSensor) -> Option<SimFrame> {
        let (w, h) = sensor.frame_size.dimensions();
        let (width, height) = (w as usize, h as usize);
        let timestamp = self.started.elapsed();
        let rgb = pattern(width, height, self.seq, sensor.hmirror, sensor.vflip);

        let (data, format) = match self.format {
            PixelFormat::Rgb888 => (rgb, PixelFormat::Rgb888),
            PixelFormat::Rgb565 => (to_rgb565(&rgb), PixelFormat::Rgb565),
            PixelFormat::Grayscale => (to_luma(&rgb), PixelFormat::Grayscale),
            PixelFormat::Yuv422 => (to_yuyv(&rgb), PixelFormat::Yuv422),
            PixelFormat::Jpeg => {
                let raw = SimFrame {
                    data: rgb,
                    width,
                    height,
                    format: PixelFormat::Rgb888,
                    timestamp,
                };
                match self.encoder.encode(&raw, sensor.quality) {
                    Ok(jpeg) => (jpeg, PixelFormat::Jpeg),
                    Err(err) => {
                        warn!("Simulated JPEG capture failed: {}", err);
                        return None;
                    }
                }
            }
            _ => return None,
        };

        Some(SimFrame {
            data,
            width,
            height,
            format,
            timestamp,
        })
    }
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDriver for SimDriver {
    type Frame = SimFrame;

    fn init(&mut self, config: &CameraConfig) -> Result<(), DriverError> {
        let mut faults = self.handle.lock();
        faults.inits += 1;
        if let Some(code) = faults.failing_inits.pop_front() {
            return Err(DriverError::new(code));
        }
        drop(faults);

        match config.pixel_format {
            PixelFormat::Jpeg
            | PixelFormat::Rgb565
            | PixelFormat::Rgb888
            | PixelFormat::Grayscale
            | PixelFormat::Yuv422 => {}
            other => {
                debug!("Simulator cannot produce {:?}", other);
                return Err(DriverError::new(ERR_NOT_SUPPORTED));
            }
        }

        self.format = config.pixel_format;
        self.sensor = Some(SimSensor {
            frame_size: config.frame_size,
            quality: config.jpeg_quality,
            hmirror: false,
            vflip: false,
        });
        self.next_due = Instant::now();
        Ok(())
    }

    fn deinit(&mut self) {
        self.handle.lock().deinits += 1;
        self.sensor = None;
    }

    fn next_frame_at(&self) -> Option<Instant> {
        (!self.frame_interval.is_zero()).then_some(self.next_due)
    }

    fn acquire(&mut self) -> Option<SimFrame> {
        let sensor = self.sensor.clone()?;
        {
            let mut faults = self.handle.lock();
            if faults.empty_frames > 0 {
                faults.empty_frames -= 1;
                return None;
            }
        }

        self.schedule_next();
        let frame = self.render(&sensor)?;
        self.seq = self.seq.wrapping_add(1);
        self.handle.lock().acquired += 1;
        Some(frame)
    }

    fn release(&mut self, _frame: SimFrame) {
        self.handle.lock().returned += 1;
    }

    fn sensor(&mut self) -> Option<&mut dyn Sensor> {
        self.sensor.as_mut().map(|s| s as &mut dyn Sensor)
    }

    fn memory(&self) -> MemoryStats {
        self.memory
    }
}

// Diagonal colour bands that scroll one step per frame
fn pattern(width: usize, height: usize, seq: u32, hmirror: bool, vflip: bool) -> Vec<u8> {
    let shift = seq as usize * 4;
    let mut out = Vec::with_capacity(width * height * 3);
    for row in 0..height {
        let y = if vflip { height - 1 - row } else { row };
        for col in 0..width {
            let x = if hmirror { width - 1 - col } else { col };
            let band = (x + y + shift) % 256;
            out.push(band as u8);
            out.push((y * 255 / height.max(1)) as u8);
            out.push((x * 255 / width.max(1)) as u8);
        }
    }
    out
}

fn to_rgb565(rgb: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgb.len() / 3 * 2);
    for px in rgb.chunks_exact(3) {
        let v = ((px[0] as u16 & 0xF8) << 8) | ((px[1] as u16 & 0xFC) << 3) | (px[2] as u16 >> 3);
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

fn luma(px: &[u8]) -> u8 {
    ((77 * px[0] as u32 + 150 * px[1] as u32 + 29 * px[2] as u32) >> 8) as u8
}

fn to_luma(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3).map(luma).collect()
}

// Luma only, neutral chroma
fn to_yuyv(rgb: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgb.len() / 3 * 2);
    for pair in rgb.chunks_exact(6) {
        out.extend_from_slice(&[luma(&pair[..3]), 128, luma(&pair[3..]), 128]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifecycleSettings;
    use crate::lifecycle::{CameraController, CameraState};
    use crate::shared::SharedCamera;
    use crate::source::FrameSource;
    use crate::testing::NoDelay;
    use std::thread;

    fn small(format: PixelFormat) -> CameraConfig {
        CameraConfig {
            pixel_format: format,
            frame_size: FrameSize::Qqvga,
            ..Default::default()
        }
    }

    #[test]
    fn test_jpeg_frames_are_jpeg() {
        let mut driver = SimDriver::new();
        driver.init(&small(PixelFormat::Jpeg)).unwrap();

        let frame = driver.acquire().unwrap();
        assert_eq!(frame.format(), PixelFormat::Jpeg);
        assert_eq!((frame.width(), frame.height()), (160, 120));
        assert_eq!(&frame.data()[..2], &[0xFF, 0xD8]);
        driver.release(frame);
        assert_eq!(driver.handle().outstanding(), 0);
    }

    #[test]
    fn test_raw_formats_have_exact_length() {
        for (format, bpp) in [
            (PixelFormat::Rgb565, 2),
            (PixelFormat::Yuv422, 2),
            (PixelFormat::Grayscale, 1),
            (PixelFormat::Rgb888, 3),
        ] {
            let mut driver = SimDriver::new();
            driver.init(&small(format)).unwrap();
            let frame = driver.acquire().unwrap();
            assert_eq!(frame.len(), 160 * 120 * bpp, "{:?}", format);
        }
    }

    #[test]
    fn test_pattern_moves() {
        let mut driver = SimDriver::new();
        driver.init(&small(PixelFormat::Grayscale)).unwrap();
        let first = driver.acquire().unwrap();
        let second = driver.acquire().unwrap();
        assert_ne!(first.data(), second.data());
        assert!(second.timestamp() >= first.timestamp());
    }

    #[test]
    fn test_unsupported_format_fails_init() {
        let mut driver = SimDriver::new();
        let err = driver.init(&small(PixelFormat::Yuv420)).unwrap_err();
        assert_eq!(err.code, ERR_NOT_SUPPORTED);
        assert!(driver.acquire().is_none());
    }

    #[test]
    fn test_framesize_control_changes_output() {
        let mut driver = SimDriver::new();
        driver.init(&small(PixelFormat::Grayscale)).unwrap();
        driver
            .sensor()
            .unwrap()
            .apply(SensorSetting::FrameSize(FrameSize::R96x96))
            .unwrap();
        let frame = driver.acquire().unwrap();
        assert_eq!((frame.width(), frame.height()), (96, 96));
    }

    #[test]
    fn test_injected_faults_drive_lifecycle() {
        let driver = SimDriver::new();
        let handle = driver.handle();
        handle.fail_inits(&[0x105]);
        let mut cam = CameraController::new(
            driver,
            NoDelay,
            small(PixelFormat::Jpeg),
            LifecycleSettings::default(),
        );

        cam.initialize().unwrap();
        assert_eq!(handle.inits(), 2);
        assert_eq!(cam.config().xclk_hz, 10_000_000);

        handle.drop_frames(3);
        assert!(!cam.probe());
        assert_eq!(cam.state(), CameraState::Degraded);
        assert!(cam.probe());
        assert_eq!(handle.outstanding(), 0);
    }

    #[test]
    fn test_paced_acquire_does_not_block() {
        let mut driver = SimDriver::new().with_fps(1);
        assert_eq!(driver.next_frame_at(), None);
        driver.init(&small(PixelFormat::Grayscale)).unwrap();

        let started = Instant::now();
        let first = driver.acquire().unwrap();
        let due = driver.next_frame_at().unwrap();
        let second = driver.acquire().unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(due >= started + Duration::from_millis(900));
        assert!(driver.next_frame_at().unwrap() >= due);
        driver.release(first);
        driver.release(second);
    }

    #[test]
    fn test_status_answers_while_stream_waits_for_frame() {
        let driver = SimDriver::new().with_fps(2);
        let camera = SharedCamera::new(CameraController::new(
            driver,
            NoDelay,
            small(PixelFormat::Grayscale),
            LifecycleSettings::default(),
        ));
        camera.initialize().unwrap();

        let mut source = camera.clone();
        let started = Instant::now();
        let waiter = thread::spawn(move || {
            let frame = source.acquire().unwrap();
            let waited = started.elapsed();
            source.release(frame);
            waited
        });

        thread::sleep(Duration::from_millis(50));
        let asked = Instant::now();
        assert!(camera.status().ready);
        assert!(asked.elapsed() < Duration::from_millis(200));

        let waited = waiter.join().unwrap();
        assert!(waited >= Duration::from_millis(300));
    }
}
