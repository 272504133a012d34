use crate::error::EncodeError;
use crate::frame::Frame;

/// Best quality on the esp32-camera scale (lower is better).
pub const QUALITY_BEST: u8 = 1;
/// Worst quality on the esp32-camera scale.
pub const QUALITY_WORST: u8 = 63;

/// Converts a non-JPEG frame into an independently owned JPEG buffer.
///
/// Implementations must not keep any reference into `frame` once `encode`
/// returns, and must never hand back a partial image: a failure is always an
/// `Err`. Dropping the returned buffer frees it.
pub trait JpegEncoder {
    type Buffer: AsRef<[u8]>;

    fn encode<F: Frame>(&mut self, frame: &F, quality: u8) -> Result<Self::Buffer, EncodeError>;
}

impl<E: JpegEncoder + ?Sized> JpegEncoder for &mut E {
    type Buffer = E::Buffer;

    fn encode<F: Frame>(&mut self, frame: &F, quality: u8) -> Result<Self::Buffer, EncodeError> {
        (**self).encode(frame, quality)
    }
}

/// Maps camera quality (1 best .. 63 worst) onto a 100 (best) .. 1 percent
/// scale, as used by most JPEG libraries.
pub fn percent_quality(quality: u8) -> u8 {
    let q = quality.clamp(QUALITY_BEST, QUALITY_WORST) as u32;
    (100 - (q - 1) * 99 / 62) as u8
}

/// Checks that the frame buffer has exactly `width * height * bpp` bytes.
pub fn check_dimensions<F: Frame>(frame: &F, bytes_per_pixel: usize) -> Result<(), EncodeError> {
    let (width, height, len) = (frame.width(), frame.height(), frame.len());
    let expected = width
        .checked_mul(height)
        .and_then(|px| px.checked_mul(bytes_per_pixel));
    match expected {
        Some(n) if width > 0 && height > 0 && n == len => Ok(()),
        _ => Err(EncodeError::BadDimensions { width, height, len }),
    }
}
