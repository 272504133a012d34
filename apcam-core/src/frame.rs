use core::fmt;
use core::time::Duration;

/// Pixel formats produced by the camera pipeline.
///
/// Discriminants follow the esp32-camera `pixformat_t` numbering so the
/// firmware can convert with a plain cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PixelFormat {
    Rgb565 = 0,
    Yuv422 = 1,
    Yuv420 = 2,
    Grayscale = 3,
    Jpeg = 4,
    Rgb888 = 5,
    Raw = 6,
    Rgb444 = 7,
    Rgb555 = 8,
}

impl PixelFormat {
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::Rgb565,
            1 => Self::Yuv422,
            2 => Self::Yuv420,
            3 => Self::Grayscale,
            4 => Self::Jpeg,
            5 => Self::Rgb888,
            6 => Self::Raw,
            7 => Self::Rgb444,
            8 => Self::Rgb555,
            _ => return None,
        })
    }

    pub fn is_jpeg(self) -> bool {
        self == Self::Jpeg
    }

    /// Bytes per pixel for uncompressed formats, `None` for JPEG.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::Grayscale | Self::Raw => Some(1),
            Self::Rgb565 | Self::Yuv422 | Self::Rgb444 | Self::Rgb555 => Some(2),
            Self::Rgb888 => Some(3),
            Self::Yuv420 | Self::Jpeg => None,
        }
    }
}

/// Frame sizes known to the esp32-camera driver, in its `framesize_t` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum FrameSize {
    R96x96 = 0,
    Qqvga,
    Qcif,
    Hqvga,
    R240x240,
    Qvga,
    Cif,
    Hvga,
    Vga,
    Svga,
    Xga,
    Hd,
    Sxga,
    Uxga,
    Fhd,
    PHd,
    P3mp,
    Qxga,
    Qhd,
    Wqxga,
    PFhd,
    Qsxga,
}

impl FrameSize {
    pub const ALL: [FrameSize; 22] = [
        Self::R96x96,
        Self::Qqvga,
        Self::Qcif,
        Self::Hqvga,
        Self::R240x240,
        Self::Qvga,
        Self::Cif,
        Self::Hvga,
        Self::Vga,
        Self::Svga,
        Self::Xga,
        Self::Hd,
        Self::Sxga,
        Self::Uxga,
        Self::Fhd,
        Self::PHd,
        Self::P3mp,
        Self::Qxga,
        Self::Qhd,
        Self::Wqxga,
        Self::PFhd,
        Self::Qsxga,
    ];

    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn dimensions(self) -> (u16, u16) {
        match self {
            Self::R96x96 => (96, 96),
            Self::Qqvga => (160, 120),
            Self::Qcif => (176, 144),
            Self::Hqvga => (240, 176),
            Self::R240x240 => (240, 240),
            Self::Qvga => (320, 240),
            Self::Cif => (400, 296),
            Self::Hvga => (480, 320),
            Self::Vga => (640, 480),
            Self::Svga => (800, 600),
            Self::Xga => (1024, 768),
            Self::Hd => (1280, 720),
            Self::Sxga => (1280, 1024),
            Self::Uxga => (1600, 1200),
            Self::Fhd => (1920, 1080),
            Self::PHd => (720, 1280),
            Self::P3mp => (864, 1536),
            Self::Qxga => (2048, 1536),
            Self::Qhd => (2560, 1440),
            Self::Wqxga => (2560, 1600),
            Self::PFhd => (1080, 1920),
            Self::Qsxga => (2560, 1920),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::R96x96 => "96X96",
            Self::Qqvga => "QQVGA",
            Self::Qcif => "QCIF",
            Self::Hqvga => "HQVGA",
            Self::R240x240 => "240X240",
            Self::Qvga => "QVGA",
            Self::Cif => "CIF",
            Self::Hvga => "HVGA",
            Self::Vga => "VGA",
            Self::Svga => "SVGA",
            Self::Xga => "XGA",
            Self::Hd => "HD",
            Self::Sxga => "SXGA",
            Self::Uxga => "UXGA",
            Self::Fhd => "FHD",
            Self::PHd => "P_HD",
            Self::P3mp => "P_3MP",
            Self::Qxga => "QXGA",
            Self::Qhd => "QHD",
            Self::Wqxga => "WQXGA",
            Self::PFhd => "P_FHD",
            Self::Qsxga => "QSXGA",
        }
    }
}

/// Renders as `VGA(640x480)`.
impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        write!(f, "{}({}x{})", self.name(), w, h)
    }
}

/// A transient handle to one capture owned by a [`FrameSource`](crate::FrameSource).
///
/// Handles are only obtained from `acquire` and must go back through
/// `release` exactly once.
pub trait Frame {
    fn data(&self) -> &[u8];
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn format(&self) -> PixelFormat;
    /// Capture time relative to the pipeline's clock origin.
    fn timestamp(&self) -> Duration;

    fn len(&self) -> usize {
        self.data().len()
    }

    fn is_empty(&self) -> bool {
        self.data().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_labels() {
        assert_eq!(FrameSize::Vga.to_string(), "VGA(640x480)");
        assert_eq!(FrameSize::Qvga.to_string(), "QVGA(320x240)");
        assert_eq!(FrameSize::Uxga.to_string(), "UXGA(1600x1200)");
    }

    #[test]
    fn test_frame_size_raw_roundtrip_covers_enum() {
        for (i, size) in FrameSize::ALL.iter().enumerate() {
            assert_eq!(size.raw() as usize, i);
            assert_eq!(FrameSize::from_raw(i as u32), Some(*size));
        }
        assert_eq!(FrameSize::from_raw(22), None);
    }

    #[test]
    fn test_pixel_format_from_raw() {
        assert_eq!(PixelFormat::from_raw(4), Some(PixelFormat::Jpeg));
        assert_eq!(PixelFormat::from_raw(0), Some(PixelFormat::Rgb565));
        assert_eq!(PixelFormat::from_raw(42), None);
        assert_eq!(PixelFormat::Rgb888.bytes_per_pixel(), Some(3));
        assert_eq!(PixelFormat::Jpeg.bytes_per_pixel(), None);
    }
}
