//! Camera pipeline core: frame acquisition, MJPEG streaming, lifecycle and
//! control, independent of any particular board or HTTP stack.

pub mod config;
pub mod control;
pub mod driver;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod gate;
pub mod lifecycle;
pub mod multipart;
pub mod recovery;
pub mod sensor;
pub mod shared;
pub mod sink;
pub mod source;
pub mod stream;

#[cfg(feature = "soft-jpeg")]
pub mod soft_jpeg;

#[cfg(feature = "sim")]
pub mod sim;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{CameraConfig, FbLocation, GrabMode, LifecycleSettings, MemoryStats};
pub use control::{ControlOutcome, ControlParam, ControlRequest, Rejection};
pub use driver::CameraDriver;
pub use encoder::{check_dimensions, percent_quality, JpegEncoder};
pub use error::{
    BoundaryError, ControlError, DriverError, EncodeError, LifecycleError, StreamError,
};
pub use frame::{Frame, FrameSize, PixelFormat};
pub use gate::{StreamGate, StreamPermit};
pub use lifecycle::{CameraController, CameraState, Lease};
pub use multipart::{Boundary, MultipartWriter, PartStage};
pub use sensor::{Sensor, SensorId, SensorSetting};
pub use shared::{CameraStatus, Health, SharedCamera};
pub use sink::FrameSink;
pub use source::FrameSource;
pub use stream::{
    LogObserver, SessionEnd, SessionReport, StreamConfig, StreamObserver, StreamStats, Streamer,
};

#[cfg(feature = "soft-jpeg")]
pub use soft_jpeg::SoftJpegEncoder;

#[cfg(feature = "sim")]
pub use sim::{SimDriver, SimHandle};
