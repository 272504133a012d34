use thiserror::Error;

use crate::multipart::PartStage;

/// Session-level failures. Each one ends only the current stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("no frame after {attempts} consecutive attempts")]
    AcquireEmpty { attempts: u8 },
    #[error("jpeg conversion failed")]
    EncodeFailed,
    #[error("sink write failed during {stage}")]
    WriteFailed { stage: PartStage },
}

/// Failure to bring the camera pipeline up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Both the primary and the fallback-clock attempt failed.
    #[error("camera init failed: 0x{code:x} (fallback 0x{fallback_code:x})")]
    InitFailed { code: i32, fallback_code: i32 },
    /// A reinit would tear down buffers that are still leased out.
    #[error("{outstanding} frames still held, pipeline left running")]
    Busy { outstanding: usize },
}

/// Error code reported by the hardware pipeline (an `esp_err_t` on target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("driver error 0x{code:x}")]
pub struct DriverError {
    pub code: i32,
}

impl DriverError {
    pub fn new(code: i32) -> Self {
        Self { code }
    }
}

/// Outcome of a single sensor register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControlError {
    /// The attached sensor has no such control. Skipped silently during init.
    #[error("control not supported by sensor")]
    Unsupported,
    #[error("sensor rejected value (code {0})")]
    Rejected(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("frame buffer of {len} bytes does not match {width}x{height}")]
    BadDimensions {
        width: usize,
        height: usize,
        len: usize,
    },
    #[error("pixel format cannot be converted")]
    UnsupportedFormat,
    #[error("encoder out of memory")]
    OutOfMemory,
    #[error("encoder failed")]
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BoundaryError {
    #[error("boundary must be 1..=70 characters")]
    Length,
    #[error("boundary contains a character outside the token set")]
    Character,
}
