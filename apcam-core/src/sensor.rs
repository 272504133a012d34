use core::fmt;
use core::ops::RangeInclusive;

use crate::error::ControlError;
use crate::frame::FrameSize;

/// One register-level setting on the image sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSetting {
    FrameSize(FrameSize),
    Quality(u8),
    GainCtrl(bool),
    ExposureCtrl(bool),
    WhiteBalance(bool),
    AwbGain(bool),
    HMirror(bool),
    VFlip(bool),
}

impl SensorSetting {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FrameSize(_) => "framesize",
            Self::Quality(_) => "quality",
            Self::GainCtrl(_) => "gain_ctrl",
            Self::ExposureCtrl(_) => "exposure_ctrl",
            Self::WhiteBalance(_) => "whitebal",
            Self::AwbGain(_) => "awb_gain",
            Self::HMirror(_) => "hmirror",
            Self::VFlip(_) => "vflip",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorId {
    pub pid: u16,
    pub ver: u8,
    pub midh: u8,
    pub midl: u8,
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PID=0x{:02x} VER=0x{:02x} MIDH=0x{:02x} MIDL=0x{:02x}",
            self.pid, self.ver, self.midh, self.midl
        )
    }
}

/// Control handle of the attached image sensor.
///
/// Controls a given sensor lacks report [`ControlError::Unsupported`].
pub trait Sensor {
    fn id(&self) -> SensorId;

    fn apply(&mut self, setting: SensorSetting) -> Result<(), ControlError>;

    /// Accepted JPEG quality values.
    fn quality_range(&self) -> RangeInclusive<u8> {
        1..=63
    }

    /// Largest frame size the sensor can produce.
    fn max_frame_size(&self) -> FrameSize {
        FrameSize::Uxga
    }
}
