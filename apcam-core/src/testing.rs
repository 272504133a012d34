//! Test doubles shared by the unit tests.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::config::{CameraConfig, MemoryStats};
use crate::driver::CameraDriver;
use crate::encoder::JpegEncoder;
use crate::error::{ControlError, DriverError, EncodeError};
use crate::frame::{Frame, PixelFormat};
use crate::recovery::BusRecovery;
use crate::sensor::{Sensor, SensorId, SensorSetting};
use crate::sink::FrameSink;
use crate::source::FrameSource;

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

pub fn psram() -> MemoryStats {
    MemoryStats {
        free_internal: 200 << 10,
        total_internal: 320 << 10,
        free_psram: 4 << 20,
        total_psram: 8 << 20,
    }
}

#[derive(Debug)]
pub struct MockFrame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub seq: u32,
}

impl MockFrame {
    pub fn new(format: PixelFormat, seq: u32) -> Self {
        let data = match format {
            PixelFormat::Jpeg => vec![0xFF, 0xD8, seq as u8, 0xFF, 0xD9],
            _ => vec![seq as u8; 4 * 4 * 2],
        };
        Self {
            data,
            width: 4,
            height: 4,
            format,
            seq,
        }
    }
}

impl Frame for MockFrame {
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
        Duration::from_millis(self.seq as u64)
    }
}

/// Frame source driven by a script; `None` entries are empty acquisitions.
/// Once the script runs out it keeps producing frames of `format`.
pub struct ScriptedSource {
    pub script: VecDeque<Option<PixelFormat>>,
    pub format: PixelFormat,
    pub acquired: usize,
    pub empties: usize,
    pub released: Vec<u32>,
    next_seq: u32,
}

impl ScriptedSource {
    pub fn new(format: PixelFormat) -> Self {
        Self {
            script: VecDeque::new(),
            format,
            acquired: 0,
            empties: 0,
            released: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn outstanding(&self) -> usize {
        self.acquired - self.released.len()
    }
}

impl FrameSource for ScriptedSource {
    type Frame = MockFrame;

    fn acquire(&mut self) -> Option<MockFrame> {
        let format = match self.script.pop_front() {
            Some(None) => {
                self.empties += 1;
                return None;
            }
            Some(Some(format)) => format,
            None => self.format,
        };
        self.acquired += 1;
        self.next_seq += 1;
        Some(MockFrame::new(format, self.next_seq))
    }

    fn release(&mut self, frame: MockFrame) {
        self.released.push(frame.seq);
    }
}

/// Encoder output that tracks how many buffers are still alive.
pub struct CountedBuf {
    bytes: Vec<u8>,
    live: Rc<Cell<i64>>,
}

impl AsRef<[u8]> for CountedBuf {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for CountedBuf {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

#[derive(Default)]
pub struct MockEncoder {
    pub calls: usize,
    pub fail_on: Option<usize>,
    pub live: Rc<Cell<i64>>,
}

impl MockEncoder {
    pub fn live_buffers(&self) -> i64 {
        self.live.get()
    }
}

impl JpegEncoder for MockEncoder {
    type Buffer = CountedBuf;

    fn encode<F: Frame>(&mut self, frame: &F, _quality: u8) -> Result<CountedBuf, EncodeError> {
        self.calls += 1;
        if self.fail_on == Some(self.calls) {
            return Err(EncodeError::Failed);
        }
        self.live.set(self.live.get() + 1);
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend_from_slice(&frame.data()[..1]);
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        Ok(CountedBuf {
            bytes,
            live: self.live.clone(),
        })
    }
}

/// Records every chunk. Can fail a given write or drop the connection after
/// a number of complete parts.
#[derive(Default)]
pub struct RecordingSink {
    pub preamble: Option<String>,
    pub chunks: Vec<Vec<u8>>,
    pub fail_preamble: bool,
    /// Index (0-based, counting chunk writes) of the write that fails.
    pub fail_write: Option<usize>,
    pub writes: usize,
    pub disconnect_after_parts: Option<usize>,
    /// Reports a drop from the `n+1`th connection check on.
    pub disconnect_after_checks: Option<usize>,
    pub checks: usize,
}

impl RecordingSink {
    pub fn parts(&self) -> usize {
        self.chunks.len() / 3
    }
}

impl FrameSink for RecordingSink {
    type Error = &'static str;

    fn write_preamble(&mut self, content_type: &str) -> Result<(), Self::Error> {
        if self.fail_preamble {
            return Err("preamble");
        }
        self.preamble = Some(content_type.to_string());
        Ok(())
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        let index = self.writes;
        self.writes += 1;
        if self.fail_write == Some(index) {
            return Err("write");
        }
        self.chunks.push(bytes.to_vec());
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.checks += 1;
        if self.disconnect_after_checks.is_some_and(|limit| self.checks > limit) {
            return false;
        }
        match self.disconnect_after_parts {
            Some(limit) => self.parts() < limit,
            None => true,
        }
    }
}

#[derive(Debug)]
pub struct MockSensor {
    pub applied: Vec<SensorSetting>,
    pub unsupported: Vec<&'static str>,
}

impl Default for MockSensor {
    fn default() -> Self {
        Self {
            applied: Vec::new(),
            unsupported: Vec::new(),
        }
    }
}

impl Sensor for MockSensor {
    fn id(&self) -> SensorId {
        SensorId {
            pid: 0x26,
            ver: 0x42,
            midh: 0x7f,
            midl: 0xa2,
        }
    }

    fn apply(&mut self, setting: SensorSetting) -> Result<(), ControlError> {
        if self.unsupported.contains(&setting.name()) {
            return Err(ControlError::Unsupported);
        }
        self.applied.push(setting);
        Ok(())
    }
}

pub struct MockDriver {
    pub init_results: VecDeque<Result<(), DriverError>>,
    pub init_calls: Vec<CameraConfig>,
    pub deinit_calls: usize,
    pub has_bus_lines: bool,
    pub has_power_line: bool,
    pub bus_recoveries: usize,
    pub power_pulses: usize,
    pub empty_acquires: usize,
    pub acquired: usize,
    pub released: usize,
    pub sensor: Option<MockSensor>,
    pub memory: MemoryStats,
    pub format: PixelFormat,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            init_results: VecDeque::new(),
            init_calls: Vec::new(),
            deinit_calls: 0,
            has_bus_lines: false,
            has_power_line: false,
            bus_recoveries: 0,
            power_pulses: 0,
            empty_acquires: 0,
            acquired: 0,
            released: 0,
            sensor: Some(MockSensor::default()),
            memory: psram(),
            format: PixelFormat::Jpeg,
        }
    }

    pub fn live(&self) -> i64 {
        self.acquired as i64 - self.released as i64
    }
}

impl CameraDriver for MockDriver {
    type Frame = MockFrame;

    fn init(&mut self, config: &CameraConfig) -> Result<(), DriverError> {
        self.init_calls.push(config.clone());
        self.init_results.pop_front().unwrap_or(Ok(()))
    }

    fn deinit(&mut self) {
        self.deinit_calls += 1;
    }

    fn recover_bus(&mut self, _delay: &mut dyn DelayNs, _max_pulses: u8) -> Option<BusRecovery> {
        if !self.has_bus_lines {
            return None;
        }
        self.bus_recoveries += 1;
        Some(BusRecovery {
            pulses: 0,
            released: true,
        })
    }

    fn pulse_power(&mut self, _delay: &mut dyn DelayNs) -> bool {
        if self.has_power_line {
            self.power_pulses += 1;
        }
        self.has_power_line
    }

    fn acquire(&mut self) -> Option<MockFrame> {
        if self.empty_acquires > 0 {
            self.empty_acquires -= 1;
            return None;
        }
        self.acquired += 1;
        Some(MockFrame::new(self.format, self.acquired as u32))
    }

    fn release(&mut self, _frame: MockFrame) {
        self.released += 1;
    }

    fn sensor(&mut self) -> Option<&mut dyn Sensor> {
        self.sensor.as_mut().map(|s| s as &mut dyn Sensor)
    }

    fn memory(&self) -> MemoryStats {
        self.memory
    }
}
