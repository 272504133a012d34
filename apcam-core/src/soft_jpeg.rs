//! Pure-Rust JPEG conversion for hosts and the simulator.

use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::ExtendedColorType;

use crate::encoder::{check_dimensions, percent_quality, JpegEncoder};
use crate::error::EncodeError;
use crate::frame::{Frame, PixelFormat};

/// JPEG encoder backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftJpegEncoder;

impl SoftJpegEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl JpegEncoder for SoftJpegEncoder {
    type Buffer = Vec<u8>;

    fn encode<F: Frame>(&mut self, frame: &F, quality: u8) -> Result<Vec<u8>, EncodeError> {
        let format = frame.format();
        let bpp = format.bytes_per_pixel().ok_or(EncodeError::UnsupportedFormat)?;
        check_dimensions(frame, bpp)?;

        let (width, height) = (frame.width(), frame.height());
        let (w, h) = match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) => (w as u32, h as u32),
            _ => {
                return Err(EncodeError::BadDimensions {
                    width,
                    height,
                    len: frame.len(),
                })
            }
        };

        let data = frame.data();
        let (pixels, color) = match format {
            PixelFormat::Grayscale => (data.to_vec(), ExtendedColorType::L8),
            PixelFormat::Rgb888 => (data.to_vec(), ExtendedColorType::Rgb8),
            PixelFormat::Rgb565 => (rgb565_to_rgb888(data), ExtendedColorType::Rgb8),
            PixelFormat::Yuv422 => {
                if width % 2 != 0 {
                    return Err(EncodeError::BadDimensions {
                        width,
                        height,
                        len: frame.len(),
                    });
                }
                (yuyv_to_rgb888(data), ExtendedColorType::Rgb8)
            }
            _ => return Err(EncodeError::UnsupportedFormat),
        };

        let mut out = Vec::new();
        ImageJpegEncoder::new_with_quality(&mut out, percent_quality(quality))
            .encode(&pixels, w, h, color)
            .map_err(|_| EncodeError::Failed)?;
        Ok(out)
    }
}

/// Camera RGB565 is big-endian: high byte first.
pub fn rgb565_to_rgb888(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() / 2 * 3);
    for px in src.chunks_exact(2) {
        let v = u16::from_be_bytes([px[0], px[1]]);
        let r = ((v >> 11) & 0x1f) as u8;
        let g = ((v >> 5) & 0x3f) as u8;
        let b = (v & 0x1f) as u8;
        out.push((r << 3) | (r >> 2));
        out.push((g << 2) | (g >> 4));
        out.push((b << 3) | (b >> 2));
    }
    out
}

/// Packed YUYV (Y0 U Y1 V) to RGB888, BT.601 full range, 8.8 fixed point.
pub fn yuyv_to_rgb888(src: &[u8]) -> Vec<u8> {
    fn px(y: i32, u: i32, v: i32, out: &mut Vec<u8>) {
        let r = y + ((359 * v) >> 8);
        let g = y - ((88 * u + 183 * v) >> 8);
        let b = y + ((454 * u) >> 8);
        out.push(r.clamp(0, 255) as u8);
        out.push(g.clamp(0, 255) as u8);
        out.push(b.clamp(0, 255) as u8);
    }

    let mut out = Vec::with_capacity(src.len() / 2 * 3);
    for quad in src.chunks_exact(4) {
        let u = quad[1] as i32 - 128;
        let v = quad[3] as i32 - 128;
        px(quad[0] as i32, u, v, &mut out);
        px(quad[2] as i32, u, v, &mut out);
    }
    out
}
