//! Camera bring-up, recovery and health probing.
//!
//! ```text
//! Uninitialized -> Initializing -> Ready <-> Degraded
//!                       |            |
//!                       v            v
//!                    Failed <- Reinitializing -> Ready
//! ```

use core::fmt;
use core::time::Duration;
use std::time::Instant;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::config::{CameraConfig, LifecycleSettings, MemoryStats};
use crate::control::{apply_control, ControlOutcome, ControlRequest, Rejection};
use crate::driver::CameraDriver;
use crate::error::{ControlError, LifecycleError};
use crate::frame::{Frame, PixelFormat};
use crate::sensor::{SensorId, SensorSetting};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    Uninitialized,
    Initializing,
    Ready,
    /// Pipeline is up but the last health probe got no frame.
    Degraded,
    Reinitializing,
    Failed,
}

impl CameraState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
            Self::Reinitializing => "reinitializing",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for CameraState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A driver frame counted against the pipeline until it is released.
#[derive(Debug)]
pub struct Lease<F> {
    frame: F,
}

impl<F: Frame> Frame for Lease<F> {
    fn data(&self) -> &[u8] {
        self.frame.data()
    }

    fn width(&self) -> usize {
        self.frame.width()
    }

    fn height(&self) -> usize {
        self.frame.height()
    }

    fn format(&self) -> PixelFormat {
        self.frame.format()
    }

    fn timestamp(&self) -> Duration {
        self.frame.timestamp()
    }
}

/// Owns the driver and the process-wide camera state.
pub struct CameraController<D, T> {
    driver: D,
    delay: T,
    settings: LifecycleSettings,
    /// What the operator asked for; placement may shrink it.
    requested: CameraConfig,
    /// What the pipeline is actually running with.
    active: CameraConfig,
    state: CameraState,
    ready: bool,
    pipeline_up: bool,
    outstanding: usize,
    sensor_id: Option<SensorId>,
    last_error: Option<LifecycleError>,
}

impl<D, T> CameraController<D, T>
where
    D: CameraDriver,
    T: DelayNs,
{
    pub fn new(driver: D, delay: T, config: CameraConfig, settings: LifecycleSettings) -> Self {
        Self {
            driver,
            delay,
            settings,
            active: config.clone(),
            requested: config,
            state: CameraState::Uninitialized,
            ready: false,
            pipeline_up: false,
            outstanding: 0,
            sensor_id: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn config(&self) -> &CameraConfig {
        &self.active
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    pub fn sensor_id(&self) -> Option<SensorId> {
        self.sensor_id
    }

    pub fn last_error(&self) -> Option<LifecycleError> {
        self.last_error
    }

    /// Frames handed out from the current pipeline and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn memory(&self) -> MemoryStats {
        self.driver.memory()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Runs the full bring-up procedure. A running pipeline is torn down
    /// first, which is refused while any of its frames are still leased.
    ///
    /// `ready` stays false until every step has completed.
    pub fn initialize(&mut self) -> Result<(), LifecycleError> {
        if self.pipeline_up && self.outstanding > 0 {
            warn!("Refusing reinit with {} frames still held", self.outstanding);
            return Err(LifecycleError::Busy {
                outstanding: self.outstanding,
            });
        }

        self.state = if self.pipeline_up {
            CameraState::Reinitializing
        } else {
            CameraState::Initializing
        };
        self.ready = false;

        if self.pipeline_up {
            info!("Releasing camera pipeline");
            self.driver.deinit();
            self.pipeline_up = false;
            self.sensor_id = None;
        }

        match self
            .driver
            .recover_bus(&mut self.delay, self.settings.bus_recovery_cycles)
        {
            Some(r) if r.released => info!("SCCB bus recovered after {} pulses", r.pulses),
            Some(r) => warn!("SCCB data line still low after {} pulses", r.pulses),
            None => debug!("No SCCB recovery lines on this board"),
        }

        if self.driver.pulse_power(&mut self.delay) {
            info!("Camera power/reset line pulsed");
        }

        let memory = self.driver.memory();
        info!("psram present = {}", memory.has_psram());
        let mut config = self.requested.placed_for(&memory);
        log_config(&config);

        info!("Initializing camera...");
        if let Err(first) = self.driver.init(&config) {
            config.xclk_hz = self.settings.fallback_xclk_hz;
            config.fb_count = 1;
            warn!(
                "Camera init failed: 0x{:x}, retry with XCLK={}MHz & fb_count=1",
                first.code,
                config.xclk_hz / 1_000_000
            );
            if let Err(second) = self.driver.init(&config) {
                error!("Camera init failed again: 0x{:x}", second.code);
                let err = LifecycleError::InitFailed {
                    code: first.code,
                    fallback_code: second.code,
                };
                self.state = CameraState::Failed;
                self.last_error = Some(err);
                return Err(err);
            }
        }
        self.pipeline_up = true;
        self.active = config;
        info!("Camera init OK");

        self.apply_baseline();
        self.warm_up();

        self.ready = true;
        self.state = CameraState::Ready;
        self.last_error = None;
        Ok(())
    }

    pub fn reinit(&mut self) -> Result<(), LifecycleError> {
        info!("Camera reinit requested (state={})", self.state);
        self.initialize()
    }

    /// Stops handing out frames ahead of a reinit. Returns the state to
    /// hand back to [`resume`](Self::resume) if the reinit is abandoned.
    pub fn suspend(&mut self) -> CameraState {
        let previous = self.state;
        if self.ready {
            self.ready = false;
            self.state = CameraState::Reinitializing;
        }
        previous
    }

    /// Undoes [`suspend`](Self::suspend) on a pipeline that was never torn down.
    pub fn resume(&mut self, previous: CameraState) {
        if self.state != CameraState::Reinitializing || !self.pipeline_up {
            return;
        }
        self.state = previous;
        self.ready = matches!(previous, CameraState::Ready | CameraState::Degraded);
    }

    /// Tries a few acquisitions and reports whether any produced a frame.
    /// Configuration is left untouched.
    pub fn probe(&mut self) -> bool {
        if !self.ready {
            return false;
        }

        let mut alive = false;
        for attempt in 1..=self.settings.probe_attempts {
            if let Some(frame) = self.driver.acquire() {
                self.driver.release(frame);
                alive = true;
                break;
            }
            debug!("Health probe attempt {} got no frame", attempt);
            self.delay.delay_ms(self.settings.probe_delay_ms);
        }

        self.state = match (self.state, alive) {
            (CameraState::Ready, false) => {
                warn!("Health probe failed, camera degraded");
                CameraState::Degraded
            }
            (CameraState::Degraded, true) => {
                info!("Health probe recovered");
                CameraState::Ready
            }
            (state, _) => state,
        };
        alive
    }

    pub fn next_frame_at(&self) -> Option<Instant> {
        if !self.ready {
            return None;
        }
        self.driver.next_frame_at()
    }

    pub fn acquire(&mut self) -> Option<Lease<D::Frame>> {
        if !self.ready {
            return None;
        }
        let frame = self.driver.acquire()?;
        self.outstanding += 1;
        Some(Lease { frame })
    }

    pub fn release(&mut self, lease: Lease<D::Frame>) {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.driver.release(lease.frame);
    }

    /// Applies a runtime parameter to the live sensor. Accepted values are
    /// kept for later reinits.
    pub fn apply_control(&mut self, request: ControlRequest) -> ControlOutcome {
        if !self.ready {
            return ControlOutcome::Rejected(Rejection::NotReady);
        }
        let Some(sensor) = self.driver.sensor() else {
            return ControlOutcome::Rejected(Rejection::Unsupported);
        };

        let outcome = apply_control(sensor, &mut self.active, request);
        if outcome.is_applied() {
            self.requested.frame_size = self.active.frame_size;
            self.requested.jpeg_quality = self.active.jpeg_quality;
        }
        outcome
    }

    fn apply_baseline(&mut self) {
        let Some(sensor) = self.driver.sensor() else {
            warn!("No sensor control handle after init");
            return;
        };

        let id = sensor.id();
        info!("Sensor ID: {}", id);
        self.sensor_id = Some(id);

        for setting in baseline(&self.active) {
            match sensor.apply(setting) {
                Ok(()) => debug!("Applied {:?}", setting),
                Err(ControlError::Unsupported) => {
                    debug!("Sensor has no {} control, skipped", setting.name())
                }
                Err(err) => warn!("Setting {} failed: {}", setting.name(), err),
            }
        }
    }

    // Grab and discard a few frames so no stale buffer reaches a client
    fn warm_up(&mut self) {
        for _ in 0..self.settings.warmup_frames {
            if let Some(frame) = self.driver.acquire() {
                self.driver.release(frame);
            }
            self.delay.delay_ms(self.settings.warmup_delay_ms);
        }
        info!("Camera warm-up complete");
    }
}

fn baseline(config: &CameraConfig) -> [SensorSetting; 8] {
    [
        SensorSetting::FrameSize(config.frame_size),
        SensorSetting::Quality(config.jpeg_quality),
        SensorSetting::GainCtrl(true),
        SensorSetting::ExposureCtrl(true),
        SensorSetting::WhiteBalance(true),
        SensorSetting::AwbGain(true),
        SensorSetting::HMirror(false),
        SensorSetting::VFlip(false),
    ]
}

fn log_config(config: &CameraConfig) {
    info!(
        "Camera config: xclk={} Hz pixel_format={:?} frame_size={} jpeg_q={} fb_count={} fb_loc={:?} grab={:?}",
        config.xclk_hz,
        config.pixel_format,
        config.frame_size,
        config.jpeg_quality,
        config.fb_count,
        config.fb_location,
        config.grab_mode
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FbLocation;
    use crate::error::DriverError;
    use crate::frame::FrameSize;
    use crate::testing::{psram, MockDriver, MockSensor, NoDelay};

    fn controller(driver: MockDriver) -> CameraController<MockDriver, NoDelay> {
        CameraController::new(
            driver,
            NoDelay,
            CameraConfig::default(),
            LifecycleSettings::default(),
        )
    }

    #[test]
    fn test_first_init_reaches_ready() {
        let mut cam = controller(MockDriver::new());
        assert_eq!(cam.state(), CameraState::Uninitialized);

        cam.initialize().unwrap();
        assert_eq!(cam.state(), CameraState::Ready);
        assert!(cam.is_ready());
        assert_eq!(cam.driver().init_calls.len(), 1);
        assert_eq!(cam.driver().deinit_calls, 0);
        assert_eq!(cam.config().xclk_hz, 20_000_000);
        // warm-up frames all went back
        assert_eq!(cam.driver().acquired, 5);
        assert_eq!(cam.driver().live(), 0);
    }

    #[test]
    fn test_fallback_clock_recorded_on_second_attempt() {
        let mut driver = MockDriver::new();
        driver.init_results.push_back(Err(DriverError::new(0x105)));
        let mut cam = controller(driver);

        cam.initialize().unwrap();
        assert_eq!(cam.state(), CameraState::Ready);
        assert_eq!(cam.config().xclk_hz, 10_000_000);
        assert_eq!(cam.config().fb_count, 1);
        assert_eq!(cam.driver().init_calls.len(), 2);
        assert_eq!(cam.driver().init_calls[1].xclk_hz, 10_000_000);
    }

    #[test]
    fn test_double_failure_is_failed_not_ready() {
        let mut driver = MockDriver::new();
        driver.init_results.push_back(Err(DriverError::new(0x105)));
        driver.init_results.push_back(Err(DriverError::new(0x20001)));
        let mut cam = controller(driver);

        let err = cam.initialize().unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InitFailed {
                code: 0x105,
                fallback_code: 0x20001
            }
        );
        assert_eq!(cam.state(), CameraState::Failed);
        assert!(!cam.is_ready());
        assert_eq!(cam.last_error(), Some(err));
        // never loops past the one retry
        assert_eq!(cam.driver().init_calls.len(), 2);
        assert!(cam.acquire().is_none());
    }

    #[test]
    fn test_reinit_releases_pipeline_and_recovers_lines() {
        let mut driver = MockDriver::new();
        driver.has_bus_lines = true;
        driver.has_power_line = true;
        let mut cam = controller(driver);
        cam.initialize().unwrap();
        cam.reinit().unwrap();

        let driver = cam.driver();
        assert_eq!(driver.deinit_calls, 1);
        assert_eq!(driver.bus_recoveries, 2);
        assert_eq!(driver.power_pulses, 2);
        assert_eq!(cam.state(), CameraState::Ready);
    }

    #[test]
    fn test_unsupported_baseline_controls_are_skipped() {
        let mut driver = MockDriver::new();
        driver.sensor = Some(MockSensor {
            unsupported: vec!["awb_gain", "hmirror", "vflip"],
            ..Default::default()
        });
        let mut cam = controller(driver);
        cam.initialize().unwrap();

        let applied = &cam.driver().sensor.as_ref().unwrap().applied;
        assert_eq!(applied.len(), 5);
        assert_eq!(applied[0], SensorSetting::FrameSize(FrameSize::Vga));
        assert_eq!(applied[1], SensorSetting::Quality(12));
        assert!(cam.is_ready());
    }

    #[test]
    fn test_missing_sensor_handle_still_ready() {
        let mut driver = MockDriver::new();
        driver.sensor = None;
        let mut cam = controller(driver);
        cam.initialize().unwrap();
        assert!(cam.is_ready());
        assert_eq!(cam.sensor_id(), None);
    }

    #[test]
    fn test_without_psram_runs_from_dram() {
        let mut driver = MockDriver::new();
        driver.memory = Default::default();
        let mut cam = controller(driver);
        cam.initialize().unwrap();
        assert_eq!(cam.config().fb_location, FbLocation::Dram);
        assert_eq!(cam.config().fb_count, 1);
        assert_eq!(cam.config().frame_size, FrameSize::Qvga);
    }

    #[test]
    fn test_probe_degrades_and_recovers() {
        let mut cam = controller(MockDriver::new());
        cam.initialize().unwrap();

        cam.driver_mut().empty_acquires = 3;
        assert!(!cam.probe());
        assert_eq!(cam.state(), CameraState::Degraded);
        assert!(cam.is_ready());

        assert!(cam.probe());
        assert_eq!(cam.state(), CameraState::Ready);
        assert_eq!(cam.config(), &CameraConfig::default().placed_for(&psram()));
    }

    #[test]
    fn test_probe_before_init_is_false() {
        let mut cam = controller(MockDriver::new());
        assert!(!cam.probe());
        assert_eq!(cam.driver().acquired, 0);
    }

    #[test]
    fn test_reinit_with_live_lease_keeps_pipeline() {
        let mut cam = controller(MockDriver::new());
        cam.initialize().unwrap();

        let lease = cam.acquire().unwrap();
        assert_eq!(cam.outstanding(), 1);
        assert_eq!(cam.reinit(), Err(LifecycleError::Busy { outstanding: 1 }));
        assert_eq!(cam.driver().deinit_calls, 0);
        assert_eq!(cam.driver().init_calls.len(), 1);
        assert_eq!(cam.state(), CameraState::Ready);
        assert!(cam.is_ready());
        assert_eq!(cam.last_error(), None);

        cam.release(lease);
        assert_eq!(cam.driver().live(), 0);
        cam.reinit().unwrap();
        assert_eq!(cam.driver().deinit_calls, 1);
    }

    #[test]
    fn test_resume_restores_degraded_state() {
        let mut cam = controller(MockDriver::new());
        cam.initialize().unwrap();
        cam.driver_mut().empty_acquires = 3;
        assert!(!cam.probe());

        let previous = cam.suspend();
        assert!(!cam.is_ready());
        assert!(cam.acquire().is_none());
        cam.resume(previous);
        assert_eq!(cam.state(), CameraState::Degraded);
        assert!(cam.is_ready());
    }

    #[test]
    fn test_control_survives_reinit() {
        let mut cam = controller(MockDriver::new());
        assert_eq!(
            cam.apply_control(ControlRequest::parse("quality", "20").unwrap()),
            ControlOutcome::Rejected(Rejection::NotReady)
        );

        cam.initialize().unwrap();
        let outcome = cam.apply_control(ControlRequest::parse("quality", "20").unwrap());
        assert!(outcome.is_applied());
        assert_eq!(cam.config().jpeg_quality, 20);

        cam.reinit().unwrap();
        assert_eq!(cam.config().jpeg_quality, 20);
    }
}
