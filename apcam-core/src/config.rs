use core::time::Duration;

use crate::frame::{FrameSize, PixelFormat};

/// Where the driver places its frame buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FbLocation {
    /// External PSRAM.
    Psram,
    /// Internal DRAM.
    Dram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabMode {
    /// Fill buffers only when they are empty.
    WhenEmpty,
    /// Always overwrite with the most recent capture.
    Latest,
}

/// Pipeline configuration handed to the driver on each init.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    pub pixel_format: PixelFormat,
    pub frame_size: FrameSize,
    /// 1 (best) .. 63 (worst)
    pub jpeg_quality: u8,
    pub fb_count: u8,
    pub xclk_hz: u32,
    pub fb_location: FbLocation,
    pub grab_mode: GrabMode,
}

impl Default for CameraConfig {
    // VGA / q12 / 2 buffers is a safe start for the OV2640 at 20 MHz
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::Jpeg,
            frame_size: FrameSize::Vga,
            jpeg_quality: 12,
            fb_count: 2,
            xclk_hz: 20_000_000,
            fb_location: FbLocation::Psram,
            grab_mode: GrabMode::Latest,
        }
    }
}

/// Largest frame size that fits the internal-RAM fallback.
pub const DRAM_MAX_FRAME_SIZE: FrameSize = FrameSize::Qvga;

impl CameraConfig {
    /// Adapts buffer placement to the memory actually present.
    ///
    /// Without PSRAM the pipeline runs from internal DRAM with a single
    /// buffer and at most QVGA.
    pub fn placed_for(&self, memory: &MemoryStats) -> Self {
        let mut config = self.clone();
        if memory.has_psram() {
            config.fb_location = FbLocation::Psram;
        } else {
            config.fb_location = FbLocation::Dram;
            config.fb_count = 1;
            config.frame_size = config.frame_size.min(DRAM_MAX_FRAME_SIZE);
        }
        config
    }
}

/// Heap counters in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub free_internal: usize,
    pub total_internal: usize,
    pub free_psram: usize,
    pub total_psram: usize,
}

impl MemoryStats {
    pub fn has_psram(&self) -> bool {
        self.total_psram > 0
    }
}

/// Knobs for the init/reinit procedure and the health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Clock used for the single retry after a failed init.
    pub fallback_xclk_hz: u32,
    pub warmup_frames: u8,
    pub warmup_delay_ms: u32,
    pub probe_attempts: u8,
    pub probe_delay_ms: u32,
    /// Upper bound on SCL pulses while freeing a stuck SDA line.
    pub bus_recovery_cycles: u8,
    /// How long a reinit waits for streams to hand back their frames.
    pub drain_timeout: Duration,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            fallback_xclk_hz: 10_000_000,
            warmup_frames: 5,
            warmup_delay_ms: 30,
            probe_attempts: 3,
            probe_delay_ms: 10,
            bus_recovery_cycles: 9,
            drain_timeout: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psram_keeps_requested_buffers() {
        let memory = MemoryStats {
            total_psram: 8 << 20,
            free_psram: 8 << 20,
            ..Default::default()
        };
        let placed = CameraConfig::default().placed_for(&memory);
        assert_eq!(placed.fb_location, FbLocation::Psram);
        assert_eq!(placed.fb_count, 2);
        assert_eq!(placed.frame_size, FrameSize::Vga);
    }

    #[test]
    fn test_no_psram_forces_single_small_buffer() {
        let placed = CameraConfig::default().placed_for(&MemoryStats::default());
        assert_eq!(placed.fb_location, FbLocation::Dram);
        assert_eq!(placed.fb_count, 1);
        assert_eq!(placed.frame_size, FrameSize::Qvga);
    }

    #[test]
    fn test_no_psram_keeps_smaller_size() {
        let config = CameraConfig {
            frame_size: FrameSize::Qqvga,
            ..Default::default()
        };
        let placed = config.placed_for(&MemoryStats::default());
        assert_eq!(placed.frame_size, FrameSize::Qqvga);
    }
}
