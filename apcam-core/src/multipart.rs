//! `multipart/x-mixed-replace` framing for the MJPEG stream.
//!
//! One part on the wire:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: <decimal length>\r\n
//! \r\n
//! <raw JPEG bytes>\r\n
//! ```

use core::fmt::{self, Write as _};

use crate::error::BoundaryError;
use crate::sink::FrameSink;

pub const DEFAULT_BOUNDARY: &str = "frame";
pub const PART_CONTENT_TYPE: &str = "image/jpeg";

const MAX_BOUNDARY_LEN: usize = 70;
// "--" + boundary + CRLF + content-type line + "Content-Length: " + u64 digits + CRLF CRLF
const PART_HEADER_CAPACITY: usize = 160;

/// A validated multipart boundary token (RFC 2046 `bchars` minus space).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary(heapless::String<MAX_BOUNDARY_LEN>);

impl Boundary {
    pub fn new(token: &str) -> Result<Self, BoundaryError> {
        if token.is_empty() || token.len() > MAX_BOUNDARY_LEN {
            return Err(BoundaryError::Length);
        }
        if !token.bytes().all(is_bchar) {
            return Err(BoundaryError::Character);
        }
        let mut s = heapless::String::new();
        s.push_str(token).map_err(|_| BoundaryError::Length)?;
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Boundary {
    fn default() -> Self {
        let mut s = heapless::String::new();
        // "frame" always fits
        let _ = s.push_str(DEFAULT_BOUNDARY);
        Self(s)
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_bchar(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"'()+_,-./:=?".contains(&b)
}

/// Which of the three writes of a part failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartStage {
    Header,
    Payload,
    Terminator,
}

impl fmt::Display for PartStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Header => "header",
            Self::Payload => "payload",
            Self::Terminator => "terminator",
        })
    }
}

#[derive(Debug)]
pub enum PartError<E> {
    /// The part header did not fit its buffer.
    Format,
    Write { stage: PartStage, source: E },
}

impl<E> PartError<E> {
    pub fn stage(&self) -> PartStage {
        match self {
            Self::Format => PartStage::Header,
            Self::Write { stage, .. } => *stage,
        }
    }
}

/// Writes single multipart parts. Owns no payload and never retries.
#[derive(Debug, Clone, Default)]
pub struct MultipartWriter {
    boundary: Boundary,
}

impl MultipartWriter {
    pub fn new(boundary: Boundary) -> Self {
        Self { boundary }
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Value for the response `Content-Type` header.
    pub fn content_type(&self) -> heapless::String<128> {
        let mut s = heapless::String::new();
        let _ = write!(s, "multipart/x-mixed-replace; boundary={}", self.boundary);
        s
    }

    pub fn part_header(&self, len: usize) -> Result<heapless::String<PART_HEADER_CAPACITY>, fmt::Error> {
        let mut s = heapless::String::new();
        write!(
            s,
            "--{}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
            self.boundary, PART_CONTENT_TYPE, len
        )?;
        Ok(s)
    }

    /// Header, payload and CRLF terminator as three separate writes.
    pub fn write_part<K: FrameSink>(
        &self,
        sink: &mut K,
        payload: &[u8],
    ) -> Result<(), PartError<K::Error>> {
        let header = self.part_header(payload.len()).map_err(|_| PartError::Format)?;
        sink.write_chunk(header.as_bytes())
            .map_err(|source| PartError::Write {
                stage: PartStage::Header,
                source,
            })?;
        sink.write_chunk(payload).map_err(|source| PartError::Write {
            stage: PartStage::Payload,
            source,
        })?;
        sink.write_chunk(b"\r\n").map_err(|source| PartError::Write {
            stage: PartStage::Terminator,
            source,
        })?;
        Ok(())
    }
}
