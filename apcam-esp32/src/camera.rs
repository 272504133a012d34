// Camera driver over the esp32-camera component.
//
// FFI layout follows https://github.com/Kezii/esp32cam_rs
// Copyright (c) Kezii
// Used under MIT license with attribution as required

use std::ffi::c_int;
use std::ptr::NonNull;
use std::slice;
use std::time::Duration;

use apcam_core::recovery::{pulse_line, recover_bus, BusRecovery, Polarity};
use apcam_core::{
    CameraConfig, CameraDriver, ControlError, DriverError, FbLocation, Frame, FrameSize,
    GrabMode, MemoryStats, PixelFormat, Sensor, SensorId, SensorSetting,
};
use embedded_hal::delay::DelayNs;
use esp_idf_hal::gpio::{AnyIOPin, PinDriver, Pull};
use esp_idf_sys::{self as sys, camera, esp, EspError};
use log::{debug, warn};

use crate::board::CameraPins;
use crate::diag;

const OV2640_PID: u16 = 0x26;
const OV3660_PID: u16 = 0x3660;
const OV5640_PID: u16 = 0x5640;
const OV7725_PID: u16 = 0x77;

/// PWDN/RESET hold and settle times.
const PULSE_HOLD_MS: u32 = 10;
const PULSE_SETTLE_MS: u32 = 20;

/// A frame buffer owned by the esp32-camera driver until returned.
pub struct EspFrame {
    fb: NonNull<camera::camera_fb_t>,
}

// SAFETY: the buffer is only touched by whoever holds the lease, and the
// lifecycle controller hands each lease to exactly one thread.
unsafe impl Send for EspFrame {}

impl EspFrame {
    fn raw(&self) -> &camera::camera_fb_t {
        unsafe { self.fb.as_ref() }
    }
}

impl Frame for EspFrame {
    fn data(&self) -> &[u8] {
        let fb = self.raw();
        if fb.buf.is_null() {
            return &[];
        }
        unsafe { slice::from_raw_parts(fb.buf, fb.len) }
    }

    fn width(&self) -> usize {
        self.raw().width
    }

    fn height(&self) -> usize {
        self.raw().height
    }

    fn format(&self) -> PixelFormat {
        PixelFormat::from_raw(self.raw().format as u32).unwrap_or(PixelFormat::Raw)
    }

    fn timestamp(&self) -> Duration {
        let ts = self.raw().timestamp;
        Duration::from_secs(ts.tv_sec.max(0) as u64) + Duration::from_micros(ts.tv_usec.max(0) as u64)
    }
}

type IntSetter = unsafe extern "C" fn(*mut camera::sensor_t, c_int) -> c_int;

/// Control handle returned by `esp_camera_sensor_get`.
pub struct EspSensor {
    raw: NonNull<camera::sensor_t>,
}

// SAFETY: only reached through the controller mutex.
unsafe impl Send for EspSensor {}

fn set_int(
    raw: *mut camera::sensor_t,
    setter: Option<IntSetter>,
    value: c_int,
) -> Result<(), ControlError> {
    let setter = setter.ok_or(ControlError::Unsupported)?;
    check(unsafe { setter(raw, value) })
}

fn check(code: c_int) -> Result<(), ControlError> {
    match code {
        0 => Ok(()),
        code => Err(ControlError::Rejected(code)),
    }
}

impl Sensor for EspSensor {
    fn id(&self) -> SensorId {
        let id = unsafe { self.raw.as_ref() }.id;
        SensorId {
            pid: id.PID as u16,
            ver: id.VER,
            midh: id.MIDH,
            midl: id.MIDL,
        }
    }

    fn apply(&mut self, setting: SensorSetting) -> Result<(), ControlError> {
        let raw = self.raw.as_ptr();
        // SAFETY: valid until esp_camera_deinit, which drops this handle first
        let s = unsafe { &*raw };
        match setting {
            SensorSetting::FrameSize(size) => {
                let setter = s.set_framesize.ok_or(ControlError::Unsupported)?;
                check(unsafe { setter(raw, size.raw() as camera::framesize_t) })
            }
            SensorSetting::Quality(q) => set_int(raw, s.set_quality, q as c_int),
            SensorSetting::GainCtrl(on) => set_int(raw, s.set_gain_ctrl, on as c_int),
            SensorSetting::ExposureCtrl(on) => set_int(raw, s.set_exposure_ctrl, on as c_int),
            SensorSetting::WhiteBalance(on) => set_int(raw, s.set_whitebal, on as c_int),
            SensorSetting::AwbGain(on) => set_int(raw, s.set_awb_gain, on as c_int),
            SensorSetting::HMirror(on) => set_int(raw, s.set_hmirror, on as c_int),
            SensorSetting::VFlip(on) => set_int(raw, s.set_vflip, on as c_int),
        }
    }

    fn max_frame_size(&self) -> FrameSize {
        match self.id().pid {
            OV2640_PID => FrameSize::Uxga,
            OV3660_PID => FrameSize::Qxga,
            OV5640_PID => FrameSize::Qsxga,
            OV7725_PID => FrameSize::Vga,
            _ => FrameSize::Uxga,
        }
    }
}

/// esp32-camera pipeline on one board's DVP connector.
pub struct EspCameraDriver {
    pins: CameraPins,
    sda: AnyIOPin,
    scl: AnyIOPin,
    pwdn: Option<AnyIOPin>,
    reset: Option<AnyIOPin>,
    sensor: Option<EspSensor>,
}

impl EspCameraDriver {
    pub fn new(pins: CameraPins) -> Self {
        // SAFETY: the camera lines are never taken from `Peripherals`
        // elsewhere, so these handles are their only owners.
        let line = |n: i32| (n >= 0).then(|| unsafe { AnyIOPin::new(n) });
        Self {
            pins,
            sda: unsafe { AnyIOPin::new(pins.sda) },
            scl: unsafe { AnyIOPin::new(pins.scl) },
            pwdn: line(pins.pwdn),
            reset: line(pins.reset),
            sensor: None,
        }
    }

    fn raw_config(&self, config: &CameraConfig) -> camera::camera_config_t {
        let p = &self.pins;
        camera::camera_config_t {
            pin_pwdn: p.pwdn,
            pin_reset: p.reset,
            pin_xclk: p.xclk,

            pin_d0: p.data[0],
            pin_d1: p.data[1],
            pin_d2: p.data[2],
            pin_d3: p.data[3],
            pin_d4: p.data[4],
            pin_d5: p.data[5],
            pin_d6: p.data[6],
            pin_d7: p.data[7],
            pin_vsync: p.vsync,
            pin_href: p.href,
            pin_pclk: p.pclk,

            xclk_freq_hz: config.xclk_hz as c_int,
            ledc_timer: sys::ledc_timer_t_LEDC_TIMER_0,
            ledc_channel: sys::ledc_channel_t_LEDC_CHANNEL_0,

            pixel_format: config.pixel_format as camera::pixformat_t,
            frame_size: config.frame_size.raw() as camera::framesize_t,

            jpeg_quality: config.jpeg_quality as c_int,
            fb_count: config.fb_count as usize,
            grab_mode: match config.grab_mode {
                GrabMode::WhenEmpty => camera::camera_grab_mode_t_CAMERA_GRAB_WHEN_EMPTY,
                GrabMode::Latest => camera::camera_grab_mode_t_CAMERA_GRAB_LATEST,
            },
            fb_location: match config.fb_location {
                FbLocation::Psram => camera::camera_fb_location_t_CAMERA_FB_IN_PSRAM,
                FbLocation::Dram => camera::camera_fb_location_t_CAMERA_FB_IN_DRAM,
            },

            __bindgen_anon_1: camera::camera_config_t__bindgen_ty_1 {
                pin_sccb_sda: p.sda,
            },
            __bindgen_anon_2: camera::camera_config_t__bindgen_ty_2 {
                pin_sccb_scl: p.scl,
            },

            ..Default::default()
        }
    }

    fn bus_recovery(
        &mut self,
        delay: &mut dyn DelayNs,
        max_pulses: u8,
    ) -> Result<BusRecovery, EspError> {
        let mut scl = PinDriver::input_output_od(&mut self.scl)?;
        let mut sda = PinDriver::input_output_od(&mut self.sda)?;
        scl.set_pull(Pull::Up)?;
        sda.set_pull(Pull::Up)?;

        // both drivers drop on return, handing the lines back to esp_camera_init
        match recover_bus(&mut scl, &mut sda, delay, max_pulses) {
            Ok(result) => Ok(result),
            Err(kind) => {
                warn!("SCCB recovery aborted: {:?}", kind);
                Ok(BusRecovery {
                    pulses: 0,
                    released: false,
                })
            }
        }
    }
}

fn pulse(pin: &mut AnyIOPin, polarity: Polarity, delay: &mut dyn DelayNs) -> bool {
    let mut line = match PinDriver::output(pin) {
        Ok(line) => line,
        Err(e) => {
            warn!("Could not claim camera control line: {}", e);
            return false;
        }
    };
    match pulse_line(&mut line, polarity, delay, PULSE_HOLD_MS, PULSE_SETTLE_MS) {
        Ok(()) => true,
        Err(kind) => {
            warn!("Camera control line pulse failed: {:?}", kind);
            false
        }
    }
}

impl CameraDriver for EspCameraDriver {
    type Frame = EspFrame;

    fn init(&mut self, config: &CameraConfig) -> Result<(), DriverError> {
        let raw = self.raw_config(config);
        esp!(unsafe { camera::esp_camera_init(&raw) }).map_err(|e| DriverError::new(e.code()))?;

        self.sensor = NonNull::new(unsafe { camera::esp_camera_sensor_get() })
            .map(|raw| EspSensor { raw });
        if self.sensor.is_none() {
            warn!("Camera running without a sensor control handle");
        }
        Ok(())
    }

    fn deinit(&mut self) {
        self.sensor = None;
        if let Err(e) = esp!(unsafe { camera::esp_camera_deinit() }) {
            warn!("esp_camera_deinit failed: {}", e);
        }
    }

    fn recover_bus(&mut self, delay: &mut dyn DelayNs, max_pulses: u8) -> Option<BusRecovery> {
        match self.bus_recovery(delay, max_pulses) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("Could not claim SCCB lines: {}", e);
                None
            }
        }
    }

    fn pulse_power(&mut self, delay: &mut dyn DelayNs) -> bool {
        let mut pulsed = false;
        if let Some(pin) = self.pwdn.as_mut() {
            debug!("Pulsing PWDN on GPIO{}", self.pins.pwdn);
            pulsed |= pulse(pin, Polarity::ActiveHigh, delay);
        }
        if let Some(pin) = self.reset.as_mut() {
            debug!("Pulsing RESET on GPIO{}", self.pins.reset);
            pulsed |= pulse(pin, Polarity::ActiveLow, delay);
        }
        pulsed
    }

    fn acquire(&mut self) -> Option<EspFrame> {
        NonNull::new(unsafe { camera::esp_camera_fb_get() }).map(|fb| EspFrame { fb })
    }

    fn release(&mut self, frame: EspFrame) {
        unsafe { camera::esp_camera_fb_return(frame.fb.as_ptr()) }
    }

    fn sensor(&mut self) -> Option<&mut dyn Sensor> {
        self.sensor.as_mut().map(|s| s as &mut dyn Sensor)
    }

    fn memory(&self) -> MemoryStats {
        diag::memory_stats()
    }
}
