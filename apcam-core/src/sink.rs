use core::fmt::Debug;

/// The client side of a stream session: usually a socket.
pub trait FrameSink {
    type Error: Debug;

    /// Sends the response head announcing `content_type`. Called once per session.
    fn write_preamble(&mut self, content_type: &str) -> Result<(), Self::Error>;

    /// One fallible write of raw body bytes.
    fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Whether the peer is still there. Sinks that cannot tell report `true`
    /// and rely on write failures instead.
    fn is_connected(&mut self) -> bool {
        true
    }
}

impl<K: FrameSink + ?Sized> FrameSink for &mut K {
    type Error = K::Error;

    fn write_preamble(&mut self, content_type: &str) -> Result<(), Self::Error> {
        (**self).write_preamble(content_type)
    }

    fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write_chunk(bytes)
    }

    fn is_connected(&mut self) -> bool {
        (**self).is_connected()
    }
}
