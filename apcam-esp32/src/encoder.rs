use std::ptr::{self, NonNull};
use std::slice;

use apcam_core::{check_dimensions, percent_quality, EncodeError, Frame, JpegEncoder, PixelFormat};
use esp_idf_sys::{self as sys, camera};

/// JPEG encoding through the esp32-camera `fmt2jpg` converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct EspJpegEncoder;

/// Heap buffer allocated by `fmt2jpg`, freed on drop.
pub struct EspJpegBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

impl AsRef<[u8]> for EspJpegBuffer {
    fn as_ref(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for EspJpegBuffer {
    fn drop(&mut self) {
        unsafe { sys::free(self.ptr.as_ptr().cast()) }
    }
}

impl JpegEncoder for EspJpegEncoder {
    type Buffer = EspJpegBuffer;

    fn encode<F: Frame>(&mut self, frame: &F, quality: u8) -> Result<EspJpegBuffer, EncodeError> {
        let format = frame.format();
        let bpp = match format {
            PixelFormat::Rgb565 | PixelFormat::Yuv422 | PixelFormat::Grayscale | PixelFormat::Rgb888 => {
                format.bytes_per_pixel().ok_or(EncodeError::UnsupportedFormat)?
            }
            _ => return Err(EncodeError::UnsupportedFormat),
        };
        check_dimensions(frame, bpp)?;

        let bad_dimensions = || EncodeError::BadDimensions {
            width: frame.width(),
            height: frame.height(),
            len: frame.len(),
        };
        let width = u16::try_from(frame.width()).map_err(|_| bad_dimensions())?;
        let height = u16::try_from(frame.height()).map_err(|_| bad_dimensions())?;

        let mut out: *mut u8 = ptr::null_mut();
        let mut out_len: usize = 0;
        // fmt2jpg only reads the source buffer
        let ok = unsafe {
            camera::fmt2jpg(
                frame.data().as_ptr() as *mut u8,
                frame.len(),
                width,
                height,
                format as camera::pixformat_t,
                percent_quality(quality),
                &mut out,
                &mut out_len,
            )
        };

        match NonNull::new(out) {
            Some(ptr) if ok && out_len > 0 => Ok(EspJpegBuffer { ptr, len: out_len }),
            Some(ptr) => {
                unsafe { sys::free(ptr.as_ptr().cast()) };
                Err(EncodeError::Failed)
            }
            None if ok => Err(EncodeError::Failed),
            None => Err(EncodeError::OutOfMemory),
        }
    }
}
