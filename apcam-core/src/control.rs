//! Runtime parameter setters exposed to the HTTP `/control` route.

use core::fmt;
use core::str::FromStr;

use crate::config::{CameraConfig, FbLocation, DRAM_MAX_FRAME_SIZE};
use crate::error::ControlError;
use crate::frame::FrameSize;
use crate::sensor::{Sensor, SensorSetting};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlParam {
    FrameSize,
    Quality,
}

impl FromStr for ControlParam {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "framesize" => Ok(Self::FrameSize),
            "quality" => Ok(Self::Quality),
            _ => Err(Rejection::UnknownParam),
        }
    }
}

/// Why a control request left the sensor untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnknownParam,
    InvalidValue,
    OutOfRange,
    NotReady,
    Unsupported,
    Sensor(i32),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownParam => f.write_str("unknown parameter"),
            Self::InvalidValue => f.write_str("value is not an integer"),
            Self::OutOfRange => f.write_str("value out of range"),
            Self::NotReady => f.write_str("camera not ready"),
            Self::Unsupported => f.write_str("control not supported by sensor"),
            Self::Sensor(code) => write!(f, "sensor error {}", code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    Applied,
    Rejected(Rejection),
}

impl ControlOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// A parsed `var`/`val` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    pub param: ControlParam,
    pub value: i32,
}

impl ControlRequest {
    pub fn parse(var: &str, val: &str) -> Result<Self, Rejection> {
        let param = var.parse()?;
        let value = val.trim().parse().map_err(|_| Rejection::InvalidValue)?;
        Ok(Self { param, value })
    }
}

/// Validates `request` against the sensor's range and writes it straight to
/// the live sensor. Out-of-range values are rejected, never clamped. On
/// success `config` is updated so later reads reflect the new value.
///
/// Frame sizes are additionally capped at QVGA while buffers live in DRAM.
pub fn apply_control(
    sensor: &mut dyn Sensor,
    config: &mut CameraConfig,
    request: ControlRequest,
) -> ControlOutcome {
    let setting = match validate(sensor, config, request) {
        Ok(setting) => setting,
        Err(rejection) => return ControlOutcome::Rejected(rejection),
    };

    match sensor.apply(setting) {
        Ok(()) => {
            match setting {
                SensorSetting::FrameSize(size) => config.frame_size = size,
                SensorSetting::Quality(q) => config.jpeg_quality = q,
                _ => {}
            }
            ControlOutcome::Applied
        }
        Err(ControlError::Unsupported) => ControlOutcome::Rejected(Rejection::Unsupported),
        Err(ControlError::Rejected(code)) => ControlOutcome::Rejected(Rejection::Sensor(code)),
    }
}

fn validate(
    sensor: &dyn Sensor,
    config: &CameraConfig,
    request: ControlRequest,
) -> Result<SensorSetting, Rejection> {
    match request.param {
        ControlParam::FrameSize => {
            let mut max = sensor.max_frame_size();
            if config.fb_location == FbLocation::Dram {
                max = max.min(DRAM_MAX_FRAME_SIZE);
            }
            let size = u32::try_from(request.value)
                .ok()
                .and_then(FrameSize::from_raw)
                .filter(|size| *size <= max)
                .ok_or(Rejection::OutOfRange)?;
            Ok(SensorSetting::FrameSize(size))
        }
        ControlParam::Quality => {
            let q = u8::try_from(request.value)
                .ok()
                .filter(|q| sensor.quality_range().contains(q))
                .ok_or(Rejection::OutOfRange)?;
            Ok(SensorSetting::Quality(q))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSensor;

    fn request(param: ControlParam, value: i32) -> ControlRequest {
        ControlRequest { param, value }
    }

    #[test]
    fn test_quality_bounds_are_rejected() {
        let mut sensor = MockSensor::default();
        let mut config = CameraConfig::default();

        for bad in [0, 64, -1, 1000] {
            let outcome = apply_control(&mut sensor, &mut config, request(ControlParam::Quality, bad));
            assert_eq!(outcome, ControlOutcome::Rejected(Rejection::OutOfRange));
        }
        assert!(sensor.applied.is_empty());
        assert_eq!(config.jpeg_quality, 12);
    }

    #[test]
    fn test_quality_in_range_is_applied_and_readable() {
        let mut sensor = MockSensor::default();
        let mut config = CameraConfig {
            jpeg_quality: 20,
            ..Default::default()
        };

        let outcome = apply_control(&mut sensor, &mut config, request(ControlParam::Quality, 12));
        assert!(outcome.is_applied());
        assert_eq!(config.jpeg_quality, 12);
        assert_eq!(sensor.applied, vec![SensorSetting::Quality(12)]);
    }

    #[test]
    fn test_framesize_beyond_sensor_max_is_rejected() {
        let mut sensor = MockSensor::default();
        let mut config = CameraConfig::default();

        // FHD exists in the enum but the OV2640-class mock tops out at UXGA
        let outcome = apply_control(
            &mut sensor,
            &mut config,
            request(ControlParam::FrameSize, FrameSize::Fhd.raw() as i32),
        );
        assert_eq!(outcome, ControlOutcome::Rejected(Rejection::OutOfRange));

        let outcome = apply_control(
            &mut sensor,
            &mut config,
            request(ControlParam::FrameSize, FrameSize::Svga.raw() as i32),
        );
        assert!(outcome.is_applied());
        assert_eq!(config.frame_size, FrameSize::Svga);
    }

    #[test]
    fn test_dram_placement_caps_framesize() {
        let mut sensor = MockSensor::default();
        let mut config = CameraConfig {
            fb_location: FbLocation::Dram,
            frame_size: FrameSize::Qvga,
            ..Default::default()
        };
        let outcome = apply_control(
            &mut sensor,
            &mut config,
            request(ControlParam::FrameSize, FrameSize::Vga.raw() as i32),
        );
        assert_eq!(outcome, ControlOutcome::Rejected(Rejection::OutOfRange));
        assert_eq!(config.frame_size, FrameSize::Qvga);
    }

    #[test]
    fn test_unsupported_control_leaves_config() {
        let mut sensor = MockSensor {
            unsupported: vec!["quality"],
            ..Default::default()
        };
        let mut config = CameraConfig::default();
        let outcome = apply_control(&mut sensor, &mut config, request(ControlParam::Quality, 30));
        assert_eq!(outcome, ControlOutcome::Rejected(Rejection::Unsupported));
        assert_eq!(config.jpeg_quality, 12);
    }

    #[test]
    fn test_parse_request() {
        assert_eq!(
            ControlRequest::parse("quality", "12"),
            Ok(request(ControlParam::Quality, 12))
        );
        assert_eq!(
            ControlRequest::parse("brightness", "1"),
            Err(Rejection::UnknownParam)
        );
        assert_eq!(
            ControlRequest::parse("framesize", "vga"),
            Err(Rejection::InvalidValue)
        );
    }
}
