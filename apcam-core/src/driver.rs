use std::time::Instant;

use embedded_hal::delay::DelayNs;

use crate::config::{CameraConfig, MemoryStats};
use crate::error::DriverError;
use crate::frame::Frame;
use crate::recovery::BusRecovery;
use crate::sensor::Sensor;

/// Hardware side of the camera: pipeline bring-up, frame buffers, and the
/// sensor control handle.
///
/// Only the lifecycle controller talks to a driver directly; everything else
/// goes through [`SharedCamera`](crate::SharedCamera).
pub trait CameraDriver {
    type Frame: Frame;

    fn init(&mut self, config: &CameraConfig) -> Result<(), DriverError>;

    /// Tears the pipeline down. Frame buffers handed out before this call are
    /// invalid afterwards, so the controller only calls it with none leased.
    fn deinit(&mut self);

    /// Clears a half-finished transaction on the sensor control bus.
    /// `None` when the board has no way to drive the bus lines.
    fn recover_bus(&mut self, _delay: &mut dyn DelayNs, _max_pulses: u8) -> Option<BusRecovery> {
        None
    }

    /// Pulses the power-down and/or reset line. `false` when neither exists.
    fn pulse_power(&mut self, _delay: &mut dyn DelayNs) -> bool {
        false
    }

    /// Earliest moment the next capture should start. Callers wait for it
    /// before locking the camera; `None` never holds a frame back.
    fn next_frame_at(&self) -> Option<Instant> {
        None
    }

    fn acquire(&mut self) -> Option<Self::Frame>;

    fn release(&mut self, frame: Self::Frame);

    fn sensor(&mut self) -> Option<&mut dyn Sensor>;

    fn memory(&self) -> MemoryStats;
}
